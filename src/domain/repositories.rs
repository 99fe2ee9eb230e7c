//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::DomainError;
use super::error_log::ErrorLevel;

/// Request metadata attached to an error report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub method: Option<String>,
    pub url: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Error log entry as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLogEntry {
    pub id: String,
    pub timestamp: String,
    pub logged_at: String,
    pub source_service: String,
    pub level: ErrorLevel,
    pub error_message: String,
    pub error_code: Option<String>,
    pub request_details: RequestDetails,
    pub stack_trace: Option<String>,
    pub additional_context: Option<Value>,
}

/// Input for storing an error report
#[derive(Debug, Clone, Default)]
pub struct NewErrorLog {
    pub timestamp: String,
    pub source_service: String,
    pub level: ErrorLevel,
    pub error_message: String,
    pub error_code: Option<String>,
    pub request_details: RequestDetails,
    pub stack_trace: Option<String>,
    pub additional_context: Option<Value>,
}

/// Filter criteria for error log queries
#[derive(Debug, Clone)]
pub struct ErrorLogFilter {
    pub source_service: Option<String>,
    pub level: Option<ErrorLevel>,
    pub error_code: Option<String>,
    pub limit: u64,
    pub newest_first: bool,
}

impl Default for ErrorLogFilter {
    fn default() -> Self {
        Self {
            source_service: None,
            level: None,
            error_code: None,
            limit: 20,
            newest_first: true,
        }
    }
}

/// Reports sharing source, level and code within a stats window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorGroup {
    pub source_service: String,
    pub level: ErrorLevel,
    pub error_code: Option<String>,
    pub count: u64,
    pub last_occurrence: String,
}

/// One page of matching entries plus the total match count
#[derive(Debug)]
pub struct ErrorLogPage {
    pub entries: Vec<ErrorLogEntry>,
    pub total: u64,
}

/// Repository trait for ErrorLog entity
#[async_trait]
pub trait ErrorLogRepository: Send + Sync {
    /// Store a new entry
    async fn insert(&self, entry: NewErrorLog) -> Result<ErrorLogEntry, DomainError>;

    /// Find entries matching the filter
    async fn find(&self, filter: ErrorLogFilter) -> Result<ErrorLogPage, DomainError>;

    /// Find an entry by ID
    async fn find_by_id(&self, id: &str) -> Result<Option<ErrorLogEntry>, DomainError>;

    /// Groups of entries at or after `since`, largest first, at most `limit`
    async fn group_since(&self, since: &str, limit: u64) -> Result<Vec<ErrorGroup>, DomainError>;

    /// Delete entries whose timestamp is before `cutoff`, returning the count
    async fn delete_before(&self, cutoff: &str) -> Result<u64, DomainError>;

    /// Cheap liveness probe of the backing store
    async fn ping(&self) -> Result<(), DomainError>;
}
