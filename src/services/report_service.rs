//! Report Service - task counts per status and priority

use std::collections::BTreeMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, sea_query::Expr};
use serde::Serialize;

use crate::domain::{Caller, DomainError, TaskPriority, TaskStatus};
use crate::models::task;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub total_tasks: u64,
    pub finished_tasks: u64,
    pub unfinished_tasks: u64,
    pub tasks_by_status: BTreeMap<&'static str, u64>,
    pub tasks_by_priority: BTreeMap<&'static str, u64>,
}

async fn count_by<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    column: task::Column,
) -> Result<Vec<(String, i64)>, DomainError> {
    Ok(task::Entity::find()
        .select_only()
        .column(column)
        .column_as(Expr::col(task::Column::Id).count(), "count")
        .filter(task::Column::UserId.eq(user_id))
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?)
}

/// Summary of the caller's own tasks. Finished means DONE or CANCELLED.
pub async fn summary<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
) -> Result<SummaryReport, DomainError> {
    let mut by_status: BTreeMap<&'static str, u64> =
        TaskStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut by_priority: BTreeMap<&'static str, u64> =
        TaskPriority::ALL.iter().map(|p| (p.as_str(), 0)).collect();
    let mut finished = 0;
    let mut unfinished = 0;

    for (raw, count) in count_by(db, &caller.user_id, task::Column::Status).await? {
        let Ok(status) = raw.parse::<TaskStatus>() else {
            tracing::warn!(status = %raw, "ignoring unknown task status in report");
            continue;
        };
        let count = count.max(0) as u64;
        by_status.insert(status.as_str(), count);
        if status.is_finished() {
            finished += count;
        } else {
            unfinished += count;
        }
    }

    for (raw, count) in count_by(db, &caller.user_id, task::Column::Priority).await? {
        if let Ok(priority) = raw.parse::<TaskPriority>() {
            by_priority.insert(priority.as_str(), count.max(0) as u64);
        }
    }

    Ok(SummaryReport {
        total_tasks: finished + unfinished,
        finished_tasks: finished,
        unfinished_tasks: unfinished,
        tasks_by_status: by_status,
        tasks_by_priority: by_priority,
    })
}
