//! Business logic, one module per resource. Services take a
//! `&DatabaseConnection` and return `DomainError`s; the HTTP layer only
//! parses requests and shapes responses.

pub mod category_service;
pub mod error_service;
pub mod export_service;
pub mod import_service;
pub mod member_service;
pub mod project_service;
pub mod report_service;
pub mod task_service;
pub mod user_service;

use serde::Serialize;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Pagination block of list responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(2, 20, 21).total_pages, 2);
    }
}
