//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no SeaORM, no Axum).
//! Only vocabulary types, access rules, validation, trait definitions and
//! domain error types.

pub mod access;
pub mod error_log;
pub mod errors;
pub mod repositories;
pub mod task;
pub mod validation;

pub use access::{ADMIN_ROLE, Caller, ProjectAccess, ProjectRole, SERVICE_ROLE, TaskAccess};
pub use errors::{DomainError, FieldError};
pub use repositories::*;
pub use task::{TaskPriority, TaskStatus};
