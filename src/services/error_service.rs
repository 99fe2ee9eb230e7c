//! Error Service - ingestion, querying and retention of error reports

use std::net::IpAddr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::error_log::{self, ErrorLevel};
use crate::domain::validation::Validator;
use crate::domain::{
    DomainError, ErrorGroup, ErrorLogEntry, ErrorLogFilter, ErrorLogRepository, NewErrorLog,
    RequestDetails,
};
use crate::utils::time;

/// How many groups the stats endpoint returns at most
const STATS_GROUP_LIMIT: u64 = 50;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetailsInput {
    pub method: Option<String>,
    pub url: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogErrorRequest {
    pub timestamp: Option<String>,
    pub source_service: Option<String>,
    pub error_message: Option<String>,
    /// Reporters send either a code string or an HTTP status number
    pub error_code: Option<Value>,
    pub level: Option<String>,
    pub request_details: Option<Value>,
    pub stack_trace: Option<String>,
    pub additional_context: Option<Value>,
}

impl LogErrorRequest {
    pub fn validate(self) -> Result<NewErrorLog, DomainError> {
        let mut v = Validator::new();
        let source_service = v.required_text(
            "sourceService",
            self.source_service.as_deref(),
            1,
            200,
            "Source service is required.",
            "Source service must be at most 200 characters.",
        );
        let error_message = v.required_text(
            "errorMessage",
            self.error_message.as_deref(),
            1,
            10_000,
            "Error message is required.",
            "Error message must be at most 10000 characters.",
        );

        let timestamp = match self.timestamp.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => Some(time::now()),
            Some(raw) => {
                let parsed = time::normalize(raw);
                if parsed.is_none() {
                    v.fail("timestamp", "Timestamp must be a valid ISO 8601 date.");
                }
                parsed
            }
        };

        let error_code = match self.error_code {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s).filter(|s| !s.trim().is_empty()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                v.fail("errorCode", "Error code must be a string.");
                None
            }
        };

        let level = v
            .optional_enum::<ErrorLevel>("level", self.level.as_deref())
            .unwrap_or_default();

        let request_details = match self.request_details {
            None | Some(Value::Null) => RequestDetails::default(),
            Some(value @ Value::Object(_)) => match serde_json::from_value::<RequestDetailsInput>(value) {
                Ok(input) => {
                    if let Some(ip) = &input.ip_address {
                        if ip.parse::<IpAddr>().is_err() {
                            v.fail(
                                "requestDetails.ipAddress",
                                "Request IP address must be a valid IP address.",
                            );
                        }
                    }
                    RequestDetails {
                        method: input.method,
                        url: input.url,
                        user_id: input.user_id,
                        ip_address: input.ip_address,
                    }
                }
                Err(_) => {
                    v.fail(
                        "requestDetails",
                        "Request details fields must be strings.",
                    );
                    RequestDetails::default()
                }
            },
            Some(_) => {
                v.fail("requestDetails", "Request details must be an object.");
                RequestDetails::default()
            }
        };

        let additional_context = match self.additional_context {
            None | Some(Value::Null) => None,
            Some(value @ Value::Object(_)) => Some(value),
            Some(_) => {
                v.fail("additionalContext", "Additional context must be an object.");
                None
            }
        };

        v.finish()?;
        Ok(NewErrorLog {
            timestamp: timestamp.unwrap_or_else(time::now),
            source_service: source_service.unwrap_or_default(),
            level,
            error_message: error_message.unwrap_or_default(),
            error_code,
            request_details,
            stack_trace: self.stack_trace,
            additional_context,
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorListQuery {
    pub source_service: Option<String>,
    pub level: Option<String>,
    pub error_code: Option<String>,
    pub limit: Option<String>,
    pub sort_order: Option<String>,
}

impl ErrorListQuery {
    pub fn to_filter(&self) -> Result<ErrorLogFilter, DomainError> {
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let mut v = Validator::new();

        let limit = match blank(&self.limit) {
            None => 20,
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|l| (1..=100).contains(l))
                .unwrap_or_else(|| {
                    v.fail("limit", "Limit must be an integer between 1 and 100.");
                    20
                }),
        };
        let newest_first = match blank(&self.sort_order).as_deref() {
            None | Some("newest") => true,
            Some("oldest") => false,
            Some(_) => {
                v.fail("sortOrder", "sortOrder must be either \"newest\" or \"oldest\".");
                true
            }
        };
        let level = v.optional_enum::<ErrorLevel>("level", blank(&self.level).as_deref());
        v.finish()?;

        Ok(ErrorLogFilter {
            source_service: blank(&self.source_service),
            level,
            error_code: blank(&self.error_code),
            limit,
            newest_first,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorListPagination {
    pub total: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorList {
    pub message: &'static str,
    pub data: Vec<ErrorLogEntry>,
    pub pagination: ErrorListPagination,
}

#[derive(Debug, Serialize)]
pub struct ErrorStats {
    pub timeframe: String,
    pub since: String,
    pub stats: Vec<ErrorGroup>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub message: String,
    pub deleted_count: u64,
}

pub async fn log_error(
    repo: &dyn ErrorLogRepository,
    req: LogErrorRequest,
) -> Result<ErrorLogEntry, DomainError> {
    let entry = req.validate()?;
    let stored = repo.insert(entry).await?;
    tracing::info!(
        error_id = %stored.id,
        source = %stored.source_service,
        level = stored.level.as_str(),
        "error report stored"
    );
    Ok(stored)
}

pub async fn list_errors(
    repo: &dyn ErrorLogRepository,
    query: ErrorListQuery,
) -> Result<ErrorList, DomainError> {
    let filter = query.to_filter()?;
    let limit = filter.limit;
    let page = repo.find(filter).await?;
    Ok(ErrorList {
        message: "Errors retrieved successfully.",
        data: page.entries,
        pagination: ErrorListPagination {
            total: page.total,
            limit,
        },
    })
}

pub async fn get_error(
    repo: &dyn ErrorLogRepository,
    id: &str,
) -> Result<ErrorLogEntry, DomainError> {
    repo.find_by_id(id)
        .await?
        .ok_or_else(|| DomainError::not_found("Error log not found."))
}

pub async fn stats(
    repo: &dyn ErrorLogRepository,
    timeframe: Option<&str>,
) -> Result<ErrorStats, DomainError> {
    let timeframe = match timeframe {
        Some(tf @ ("1h" | "24h" | "7d" | "30d")) => tf,
        _ => "24h",
    };
    let since = time::format(Utc::now() - error_log::stats_window(Some(timeframe)));
    let stats = repo.group_since(&since, STATS_GROUP_LIMIT).await?;
    Ok(ErrorStats {
        timeframe: timeframe.to_string(),
        since,
        stats,
    })
}

pub async fn cleanup(
    repo: &dyn ErrorLogRepository,
    older_than: Option<&str>,
) -> Result<CleanupResult, DomainError> {
    let older_than = match older_than {
        Some(o @ ("7d" | "30d" | "90d")) => o,
        _ => "30d",
    };
    let cutoff = time::format(Utc::now() - error_log::cleanup_age(Some(older_than)));
    let deleted = repo.delete_before(&cutoff).await?;
    tracing::info!(older_than, deleted, "error log cleanup");
    Ok(CleanupResult {
        message: format!("Deleted error logs older than {}.", older_than),
        deleted_count: deleted,
    })
}

/// Delete entries older than the retention period, once per `every`.
pub async fn run_retention(
    repo: std::sync::Arc<dyn ErrorLogRepository>,
    retention_days: i64,
    every: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let cutoff = time::format(Utc::now() - chrono::Duration::days(retention_days));
        match repo.delete_before(&cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(deleted = n, retention_days, "expired error logs removed"),
            Err(e) => tracing::warn!(error = %e, "error log retention sweep failed"),
        }
    }
}
