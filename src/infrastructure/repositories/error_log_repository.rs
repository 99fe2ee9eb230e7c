//! SeaORM implementation of ErrorLogRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, sea_query::Expr,
};

use crate::domain::error_log::ErrorLevel;
use crate::domain::{
    DomainError, ErrorGroup, ErrorLogEntry, ErrorLogFilter, ErrorLogPage, ErrorLogRepository,
    NewErrorLog, RequestDetails,
};
use crate::models::error_log::{self, ActiveModel, Entity as ErrorLogEntity};
use crate::utils::time;

/// SeaORM-based implementation of ErrorLogRepository
pub struct SeaOrmErrorLogRepository {
    db: DatabaseConnection,
}

impl SeaOrmErrorLogRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_entry(m: error_log::Model) -> ErrorLogEntry {
    ErrorLogEntry {
        level: m.level.parse().unwrap_or_default(),
        additional_context: m
            .additional_context
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok()),
        request_details: RequestDetails {
            method: m.request_method,
            url: m.request_url,
            user_id: m.request_user_id,
            ip_address: m.request_ip_address,
        },
        id: m.id,
        timestamp: m.timestamp,
        logged_at: m.logged_at,
        source_service: m.source_service,
        error_message: m.error_message,
        error_code: m.error_code,
        stack_trace: m.stack_trace,
    }
}

#[async_trait]
impl ErrorLogRepository for SeaOrmErrorLogRepository {
    async fn insert(&self, entry: NewErrorLog) -> Result<ErrorLogEntry, DomainError> {
        let details = entry.request_details;
        let model = ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            timestamp: Set(entry.timestamp),
            logged_at: Set(time::now()),
            source_service: Set(entry.source_service),
            level: Set(entry.level.as_str().to_string()),
            error_message: Set(entry.error_message),
            error_code: Set(entry.error_code),
            request_method: Set(details.method),
            request_url: Set(details.url),
            request_user_id: Set(details.user_id),
            request_ip_address: Set(details.ip_address),
            stack_trace: Set(entry.stack_trace),
            additional_context: Set(entry.additional_context.map(|v| v.to_string())),
        };

        let result = model.insert(&self.db).await?;
        Ok(to_entry(result))
    }

    async fn find(&self, filter: ErrorLogFilter) -> Result<ErrorLogPage, DomainError> {
        let mut query = ErrorLogEntity::find();
        if let Some(source) = filter.source_service {
            query = query.filter(error_log::Column::SourceService.eq(source));
        }
        if let Some(level) = filter.level {
            query = query.filter(error_log::Column::Level.eq(level.as_str()));
        }
        if let Some(code) = filter.error_code {
            query = query.filter(error_log::Column::ErrorCode.eq(code));
        }

        let total = query.clone().count(&self.db).await?;
        let query = if filter.newest_first {
            query.order_by_desc(error_log::Column::Timestamp)
        } else {
            query.order_by_asc(error_log::Column::Timestamp)
        };
        let entries = query
            .limit(filter.limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(to_entry)
            .collect();

        Ok(ErrorLogPage { entries, total })
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ErrorLogEntry>, DomainError> {
        let found = ErrorLogEntity::find_by_id(id.to_string()).one(&self.db).await?;
        Ok(found.map(to_entry))
    }

    async fn group_since(&self, since: &str, limit: u64) -> Result<Vec<ErrorGroup>, DomainError> {
        let count = Expr::col(error_log::Column::Id).count();
        let last = Expr::col(error_log::Column::Timestamp).max();
        let rows: Vec<(String, String, Option<String>, i64, String)> = ErrorLogEntity::find()
            .select_only()
            .column(error_log::Column::SourceService)
            .column(error_log::Column::Level)
            .column(error_log::Column::ErrorCode)
            .column_as(count.clone(), "count")
            .column_as(last.clone(), "last_occurrence")
            .filter(error_log::Column::Timestamp.gte(since))
            .group_by(error_log::Column::SourceService)
            .group_by(error_log::Column::Level)
            .group_by(error_log::Column::ErrorCode)
            .order_by_desc(count)
            .order_by_desc(last)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(source_service, level, error_code, count, last_occurrence)| ErrorGroup {
                source_service,
                level: level.parse().unwrap_or_default(),
                error_code,
                count: count.max(0) as u64,
                last_occurrence,
            })
            .collect())
    }

    async fn delete_before(&self, cutoff: &str) -> Result<u64, DomainError> {
        let result = ErrorLogEntity::delete_many()
            .filter(error_log::Column::Timestamp.lt(cutoff))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                "SELECT 1".to_owned(),
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn report(source: &str, level: ErrorLevel, timestamp: &str) -> NewErrorLog {
        NewErrorLog {
            timestamp: timestamp.to_string(),
            source_service: source.to_string(),
            level,
            error_message: "boom".to_string(),
            additional_context: Some(serde_json::json!({ "attempt": 2 })),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stores_and_filters_entries() {
        let repo = SeaOrmErrorLogRepository::new(db::init_db("sqlite::memory:").await.unwrap());
        repo.insert(report("tasks-api", ErrorLevel::Error, "2026-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        repo.insert(report("tasks-api", ErrorLevel::Warning, "2026-01-02T00:00:00.000Z"))
            .await
            .unwrap();
        let stored = repo
            .insert(report("projects-api", ErrorLevel::Error, "2026-01-03T00:00:00.000Z"))
            .await
            .unwrap();
        assert_eq!(stored.additional_context, Some(serde_json::json!({ "attempt": 2 })));

        let page = repo
            .find(ErrorLogFilter {
                source_service: Some("tasks-api".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.entries[0].timestamp, "2026-01-02T00:00:00.000Z");

        let oldest_first = repo
            .find(ErrorLogFilter {
                limit: 1,
                newest_first: false,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(oldest_first.total, 3);
        assert_eq!(oldest_first.entries.len(), 1);
        assert_eq!(oldest_first.entries[0].timestamp, "2026-01-01T00:00:00.000Z");

        let removed = repo.delete_before("2026-01-02T12:00:00.000Z").await.unwrap();
        assert_eq!(removed, 2);
        assert!(repo.find_by_id(&stored.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn groups_are_counted_in_the_database() {
        let repo = SeaOrmErrorLogRepository::new(db::init_db("sqlite::memory:").await.unwrap());
        for ts in ["2026-01-01T10:00:00.000Z", "2026-01-01T12:00:00.000Z"] {
            let mut r = report("tasks-api", ErrorLevel::Error, ts);
            r.error_code = Some("DATABASE_ERROR".to_string());
            repo.insert(r).await.unwrap();
        }
        repo.insert(report("projects-api", ErrorLevel::Warning, "2026-01-01T11:00:00.000Z"))
            .await
            .unwrap();
        repo.insert(report("tasks-api", ErrorLevel::Error, "2025-12-01T00:00:00.000Z"))
            .await
            .unwrap();

        let groups = repo.group_since("2026-01-01T00:00:00.000Z", 50).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source_service, "tasks-api");
        assert_eq!(groups[0].error_code.as_deref(), Some("DATABASE_ERROR"));
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].last_occurrence, "2026-01-01T12:00:00.000Z");
        assert_eq!(groups[1].level, ErrorLevel::Warning);
        assert_eq!(groups[1].error_code, None);

        let top = repo.group_since("2026-01-01T00:00:00.000Z", 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].count, 2);
    }
}
