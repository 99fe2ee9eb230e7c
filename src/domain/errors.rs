//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.
//! The HTTP mapping lives in `api::error`.

use std::fmt;

use serde::Serialize;

/// A single failed field check, shaped like the `errors` array clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum DomainError {
    /// Resource not found, with a client-facing message
    NotFound(String),
    /// One or more request fields failed validation
    Validation(Vec<FieldError>),
    /// Request is well-formed but semantically rejected
    BadRequest(String),
    /// Caller identity is missing
    Unauthorized(String),
    /// Caller is known but not allowed
    Forbidden(String),
    /// Uniqueness or state conflict
    Conflict(String),
    /// Database/persistence error
    Database(String),
    /// External service error
    External(String),
    /// Generic internal error
    Internal(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        DomainError::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        DomainError::BadRequest(msg.into())
    }

    /// Stable code used when the error is forwarded to the errors service.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::Validation(_) => "VALIDATION_FAILED",
            DomainError::BadRequest(_) => "BAD_REQUEST",
            DomainError::Unauthorized(_) => "UNAUTHORIZED",
            DomainError::Forbidden(_) => "FORBIDDEN",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::Database(_) => "DATABASE_ERROR",
            DomainError::External(_) => "UPSTREAM_ERROR",
            DomainError::Internal(_) => "UNHANDLED_EXCEPTION",
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::NotFound(msg) => write!(f, "{}", msg),
            DomainError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                write!(f, "Validation failed for: {}", fields.join(", "))
            }
            DomainError::BadRequest(msg) => write!(f, "{}", msg),
            DomainError::Unauthorized(msg) => write!(f, "{}", msg),
            DomainError::Forbidden(msg) => write!(f, "{}", msg),
            DomainError::Conflict(msg) => write!(f, "{}", msg),
            DomainError::Database(msg) => write!(f, "Database error: {}", msg),
            DomainError::External(msg) => write!(f, "External service error: {}", msg),
            DomainError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

// Conversion from SeaORM errors (used in infrastructure and service layers)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint failed") || msg.contains("duplicate key value") {
            return DomainError::Conflict("Resource already exists.".to_string());
        }
        DomainError::Database(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_becomes_conflict() {
        let err = sea_orm::DbErr::Custom(
            "error returned from database: UNIQUE constraint failed: categories.name".to_string(),
        );
        assert!(matches!(DomainError::from(err), DomainError::Conflict(_)));
    }

    #[test]
    fn other_db_errors_stay_database() {
        let err = sea_orm::DbErr::Custom("disk I/O error".to_string());
        let domain = DomainError::from(err);
        assert!(matches!(domain, DomainError::Database(_)));
        assert_eq!(domain.code(), "DATABASE_ERROR");
    }

    #[test]
    fn validation_display_lists_fields() {
        let err = DomainError::Validation(vec![
            FieldError::new("title", "Task title is required."),
            FieldError::new("priority", "Invalid priority."),
        ]);
        assert_eq!(err.to_string(), "Validation failed for: title, priority");
    }
}
