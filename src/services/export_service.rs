//! Export Service - task exports as JSON or CSV

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Select,
};
use serde::{Deserialize, Serialize};

use super::task_service::TaskScope;
use crate::domain::validation::Validator;
use crate::domain::{Caller, DomainError};
use crate::infrastructure::exports::{ExportFile, ExportJobs};
use crate::models::{category, project, task};
use crate::utils::time;

/// Column order of CSV exports
pub const EXPORT_COLUMNS: [&str; 13] = [
    "id",
    "title",
    "description",
    "priority",
    "status",
    "dueDate",
    "createdAt",
    "updatedAt",
    "categoryName",
    "projectName",
    "userId",
    "projectId",
    "categoryId",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

/// Flattened task as written to export files. Missing values are empty
/// strings so JSON and CSV carry the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub due_date: String,
    pub created_at: String,
    pub updated_at: String,
    pub category_name: String,
    pub project_name: String,
    pub user_id: String,
    pub project_id: String,
    pub category_id: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

impl ExportQuery {
    pub fn scope(&self) -> Result<TaskScope, DomainError> {
        let mut v = Validator::new();
        let scope = TaskScope::parse(
            &mut v,
            self.status.as_deref(),
            self.priority.as_deref(),
            self.category_id.as_deref(),
            self.project_id.as_deref(),
            self.user_id.as_deref(),
        );
        v.finish()?;
        Ok(scope)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilters {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExportRequest {
    pub format: Option<String>,
    #[serde(default)]
    pub filters: ExportFilters,
}

impl ExportRequest {
    pub fn validate(&self) -> Result<(ExportFormat, TaskScope), DomainError> {
        let mut v = Validator::new();
        let format = self.format.as_deref().map(str::trim).and_then(ExportFormat::parse);
        if format.is_none() {
            v.fail("format", "Format must be either 'csv' or 'json'.");
        }
        let f = &self.filters;
        let scope = TaskScope::parse(
            &mut v,
            f.status.as_deref(),
            f.priority.as_deref(),
            f.category_id.as_deref(),
            f.project_id.as_deref(),
            None,
        );
        v.finish()?;
        Ok((format.unwrap_or(ExportFormat::Json), scope))
    }
}

/// Build the export query for `caller`: access checks run here, before any
/// background work is scheduled.
pub async fn export_query<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    scope: &TaskScope,
) -> Result<Select<task::Entity>, DomainError> {
    Ok(scope
        .apply(db, caller, task::Entity::find())
        .await?
        .order_by_asc(task::Column::CreatedAt))
}

pub async fn collect_rows<C: ConnectionTrait>(
    db: &C,
    query: Select<task::Entity>,
) -> Result<Vec<ExportRow>, DomainError> {
    let tasks = query.all(db).await?;

    let category_ids: HashSet<String> =
        tasks.iter().filter_map(|t| t.category_id.clone()).collect();
    let project_ids: HashSet<String> = tasks.iter().filter_map(|t| t.project_id.clone()).collect();

    let category_names: HashMap<String, String> = if category_ids.is_empty() {
        HashMap::new()
    } else {
        category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect()
    };
    let project_names: HashMap<String, String> = if project_ids.is_empty() {
        HashMap::new()
    } else {
        project::Entity::find()
            .filter(project::Column::Id.is_in(project_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect()
    };

    Ok(tasks
        .into_iter()
        .map(|t| {
            let lookup = |names: &HashMap<String, String>, id: &Option<String>| {
                id.as_ref()
                    .and_then(|id| names.get(id).cloned())
                    .unwrap_or_default()
            };
            ExportRow {
                category_name: lookup(&category_names, &t.category_id),
                project_name: lookup(&project_names, &t.project_id),
                due_date: t.due_date.as_deref().map(time::date_part).unwrap_or_default(),
                description: t.description.unwrap_or_default(),
                project_id: t.project_id.unwrap_or_default(),
                category_id: t.category_id.unwrap_or_default(),
                id: t.id,
                title: t.title,
                priority: t.priority,
                status: t.status,
                created_at: t.created_at,
                updated_at: t.updated_at,
                user_id: t.user_id,
            }
        })
        .collect())
}

pub fn render(format: ExportFormat, rows: &[ExportRow]) -> Result<Vec<u8>, DomainError> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(rows)
            .map_err(|e| DomainError::Internal(format!("JSON export failed: {}", e))),
        ExportFormat::Csv => {
            let fail = |e: csv::Error| DomainError::Internal(format!("CSV export failed: {}", e));
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(Vec::new());
            writer.write_record(EXPORT_COLUMNS).map_err(fail)?;
            for row in rows {
                writer.serialize(row).map_err(fail)?;
            }
            writer
                .into_inner()
                .map_err(|e| DomainError::Internal(format!("CSV export failed: {}", e)))
        }
    }
}

/// Render an export on a background task and track it in `jobs`.
/// Returns the export id immediately.
pub fn spawn_export(
    db: DatabaseConnection,
    jobs: ExportJobs,
    owner_id: &str,
    format: ExportFormat,
    query: Select<task::Entity>,
) -> String {
    let export_id = jobs.start(owner_id);
    let id = export_id.clone();

    tokio::spawn(async move {
        let rendered = match collect_rows(&db, query).await {
            Ok(rows) => render(format, &rows),
            Err(e) => Err(e),
        };
        match rendered {
            Ok(bytes) => {
                tracing::info!(export_id = %id, bytes = bytes.len(), "export ready");
                jobs.complete(
                    &id,
                    ExportFile {
                        file_name: format!("export-{}.{}", id, format.extension()),
                        content_type: format.content_type(),
                        bytes,
                    },
                );
            }
            Err(e) => {
                tracing::error!(export_id = %id, error = %e, "export failed");
                jobs.fail(&id, e.to_string());
            }
        }
    });

    export_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ExportRow {
        ExportRow {
            id: "t1".into(),
            title: "Plan, then \"ship\"".into(),
            description: String::new(),
            priority: "HIGH".into(),
            status: "TODO".into(),
            due_date: "2026-04-01".into(),
            created_at: "2026-03-01T10:00:00.000Z".into(),
            updated_at: "2026-03-01T10:00:00.000Z".into(),
            category_name: "Work".into(),
            project_name: String::new(),
            user_id: "u1".into(),
            project_id: String::new(),
            category_id: "c1".into(),
        }
    }

    #[test]
    fn csv_has_fixed_header_and_quotes_fields() {
        let out = String::from_utf8(render(ExportFormat::Csv, &[row()]).unwrap()).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some(EXPORT_COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some(
                "t1,\"Plan, then \"\"ship\"\"\",,HIGH,TODO,2026-04-01,2026-03-01T10:00:00.000Z,\
                 2026-03-01T10:00:00.000Z,Work,,u1,,c1"
            )
        );
    }

    #[test]
    fn empty_csv_still_has_header() {
        let out = String::from_utf8(render(ExportFormat::Csv, &[]).unwrap()).unwrap();
        assert_eq!(out.trim_end(), EXPORT_COLUMNS.join(","));
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let out: serde_json::Value =
            serde_json::from_slice(&render(ExportFormat::Json, &[row()]).unwrap()).unwrap();
        assert_eq!(out[0]["categoryName"], "Work");
        assert_eq!(out[0]["dueDate"], "2026-04-01");
    }

    #[test]
    fn export_request_requires_known_format() {
        let req: ExportRequest = serde_json::from_str(r#"{"format":"xml"}"#).unwrap();
        assert!(matches!(req.validate(), Err(DomainError::Validation(_))));

        let req: ExportRequest =
            serde_json::from_str(r#"{"format":"csv","filters":{"status":"DONE"}}"#).unwrap();
        let (format, scope) = req.validate().unwrap();
        assert_eq!(format, ExportFormat::Csv);
        assert_eq!(scope.status, Some(crate::domain::TaskStatus::Done));
    }
}
