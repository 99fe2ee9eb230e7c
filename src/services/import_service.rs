//! Import Service - bulk task creation from uploaded JSON or CSV files
//!
//! Files are parsed up front; rows are then imported one by one so a bad row
//! only fails itself.

use csv::{ReaderBuilder, Trim};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{category_service, project_service, task_service, user_service};
use super::task_service::CreateTaskRequest;
use crate::domain::{Caller, DomainError};

pub const MAX_IMPORT_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Csv,
}

impl ImportFormat {
    /// Pick the format from the upload's content type, falling back to the
    /// file extension for clients that send `application/octet-stream`.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Option<Self> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());
        match mime.as_deref() {
            Some("application/json") => return Some(ImportFormat::Json),
            Some("text/csv") | Some("application/csv") => return Some(ImportFormat::Csv),
            _ => {}
        }
        let ext = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Some(ImportFormat::Json),
            Some("csv") => Some(ImportFormat::Csv),
            _ => None,
        }
    }
}

/// One task as it appears in an import file
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub project_id: Option<String>,
}

impl ImportRow {
    fn normalized(self) -> Self {
        let keep = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        Self {
            title: keep(self.title),
            description: keep(self.description),
            priority: keep(self.priority),
            status: keep(self.status),
            due_date: keep(self.due_date),
            category_id: keep(self.category_id),
            category_name: keep(self.category_name),
            project_id: keep(self.project_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedImport {
    pub task_title: String,
    pub reason: String,
}

impl FailedImport {
    fn new(title: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            task_title: title.unwrap_or("N/A").to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub successfully_imported: u64,
    pub failed_imports: Vec<FailedImport>,
}

/// Rows of a file, each either parsed or already failed.
pub type ParsedRows = Vec<Result<ImportRow, FailedImport>>;

pub fn parse_file(format: ImportFormat, bytes: &[u8]) -> Result<ParsedRows, DomainError> {
    match format {
        ImportFormat::Json => parse_json(bytes),
        ImportFormat::Csv => parse_csv(bytes),
    }
}

fn parse_json(bytes: &[u8]) -> Result<ParsedRows, DomainError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::bad_request(format!("Invalid JSON file: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(DomainError::bad_request(
            "Invalid JSON format. Expected an array of tasks.",
        ));
    };

    Ok(items
        .into_iter()
        .map(|item| {
            let title = item.get("title").and_then(Value::as_str).map(str::to_string);
            serde_json::from_value::<ImportRow>(item)
                .map(ImportRow::normalized)
                .map_err(|e| FailedImport::new(title.as_deref(), format!("Invalid task entry: {}", e)))
        })
        .collect())
}

fn parse_csv(bytes: &[u8]) -> Result<ParsedRows, DomainError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| DomainError::bad_request(format!("Invalid CSV file: {}", e)))?
        .clone();
    if headers.iter().all(str::is_empty) {
        return Err(DomainError::bad_request("CSV file must have a header row."));
    }
    let title_col = headers.iter().position(|h| h == "title");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| DomainError::bad_request(format!("Invalid CSV file: {}", e)))?;
        let title = title_col.and_then(|i| record.get(i)).filter(|t| !t.is_empty());
        rows.push(
            record
                .deserialize::<ImportRow>(Some(&headers))
                .map(ImportRow::normalized)
                .map_err(|e| FailedImport::new(title, format!("Invalid task entry: {}", e))),
        );
    }
    Ok(rows)
}

fn failure_reason(err: DomainError) -> String {
    match err {
        DomainError::Validation(errors) => errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Rows are fully checked before the first write so a failed row leaves
/// no category behind.
async fn import_row<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    row: ImportRow,
) -> Result<(), DomainError> {
    if row.title.is_none() {
        return Err(DomainError::bad_request("Task title is required."));
    }
    if let Some(name) = &row.category_name {
        let len = name.chars().count();
        if !(2..=50).contains(&len) {
            return Err(DomainError::bad_request(
                "Category name must be between 2 and 50 characters.",
            ));
        }
    }

    let mut input = CreateTaskRequest {
        title: row.title,
        description: row.description,
        status: row.status,
        priority: row.priority,
        due_date: row.due_date,
        category_id: None,
        project_id: None,
    }
    .validate()?;

    input.project_id = match &row.project_id {
        Some(id) => match project_service::load_with_access(db, caller, id).await {
            Ok((project, access)) if access.can_create_tasks() => Some(project.id),
            Ok(_) => {
                return Err(DomainError::forbidden(
                    "Forbidden: You do not have permission to add tasks to this project.",
                ));
            }
            Err(DomainError::NotFound(_)) => {
                tracing::debug!(project_id = %id, "dropping unknown project from imported task");
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };

    input.category_id = if let Some(name) = &row.category_name {
        Some(category_service::find_or_create(db, &caller.user_id, name).await?.id)
    } else if let Some(id) = &row.category_id {
        category_service::find_owned(db, &caller.user_id, id)
            .await?
            .map(|c| c.id)
    } else {
        None
    };

    task_service::insert_task(db, &caller.user_id, input).await?;
    Ok(())
}

pub async fn import_tasks<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    rows: ParsedRows,
) -> Result<ImportResult, DomainError> {
    user_service::ensure_user(db, &caller.user_id).await?;

    let mut result = ImportResult::default();
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(failed) => {
                result.failed_imports.push(failed);
                continue;
            }
        };
        let title = row.title.clone();
        match import_row(db, caller, row).await {
            Ok(()) => result.successfully_imported += 1,
            Err(err @ DomainError::Database(_)) => return Err(err),
            Err(err) => result
                .failed_imports
                .push(FailedImport::new(title.as_deref(), failure_reason(err))),
        }
    }

    tracing::info!(
        user = %caller.user_id,
        imported = result.successfully_imported,
        failed = result.failed_imports.len(),
        "task import finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection_prefers_content_type() {
        assert_eq!(
            ImportFormat::detect(Some("application/json; charset=utf-8"), Some("x.csv")),
            Some(ImportFormat::Json)
        );
        assert_eq!(
            ImportFormat::detect(Some("application/octet-stream"), Some("tasks.CSV")),
            Some(ImportFormat::Csv)
        );
        assert_eq!(ImportFormat::detect(Some("text/plain"), Some("notes.txt")), None);
    }

    #[test]
    fn json_must_be_an_array() {
        let err = parse_file(ImportFormat::Json, br#"{"title":"one"}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid JSON format. Expected an array of tasks."
        );
        assert!(parse_file(ImportFormat::Json, b"[{").is_err());
    }

    #[test]
    fn json_rows_fail_individually() {
        let rows = parse_file(
            ImportFormat::Json,
            br#"[{"title":"Good one","priority":"HIGH"},{"title":"Bad","status":7},{"title":"  "}]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_ref().unwrap().priority.as_deref(), Some("HIGH"));
        assert_eq!(rows[1].as_ref().unwrap_err().task_title, "Bad");
        assert_eq!(rows[2].as_ref().unwrap().title, None);
    }

    #[test]
    fn csv_uses_header_names_and_blanks_become_none() {
        let csv = "id,title,description,priority,status,dueDate,categoryName\n\
                   1,Write report,,HIGH,TODO,2026-02-01,Work\n\
                   2, Call mom ,,,,,\n";
        let rows = parse_file(ImportFormat::Csv, csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.title.as_deref(), Some("Write report"));
        assert_eq!(first.description, None);
        assert_eq!(first.category_name.as_deref(), Some("Work"));
        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.title.as_deref(), Some("Call mom"));
        assert_eq!(second.priority, None);
    }

    #[test]
    fn validation_reasons_are_joined() {
        let reason = failure_reason(DomainError::Validation(vec![
            crate::domain::FieldError::new("priority", "Invalid priority."),
            crate::domain::FieldError::new("dueDate", "Invalid due date."),
        ]));
        assert_eq!(reason, "Invalid priority. Invalid due date.");
    }
}
