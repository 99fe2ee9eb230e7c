use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use super::error::ApiError;
use crate::domain::Caller;
use crate::infrastructure::TasksState;
use crate::infrastructure::exports::{Download, ExportFile};
use crate::services::export_service::{self, ExportFormat, ExportQuery, ExportRequest};

fn attachment(file: ExportFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file.file_name),
            ),
        ],
        file.bytes,
    )
        .into_response()
}

async fn export_now(
    db: &DatabaseConnection,
    caller: &Caller,
    query: ExportQuery,
    format: ExportFormat,
) -> Result<Response, ApiError> {
    let scope = query.scope()?;
    let select = export_service::export_query(db, caller, &scope).await?;
    let rows = export_service::collect_rows(db, select).await?;
    let bytes = export_service::render(format, &rows)?;
    tracing::info!(user = %caller.user_id, rows = rows.len(), ?format, "tasks exported");

    Ok(attachment(ExportFile {
        file_name: format!("tasks_export.{}", format.extension()),
        content_type: format.content_type(),
        bytes,
    }))
}

pub async fn export_json(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    export_now(&db, &caller, query, ExportFormat::Json).await
}

pub async fn export_csv(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    export_now(&db, &caller, query, ExportFormat::Csv).await
}

/// `POST /export`: schedule a background export and hand out its download link.
pub async fn request_export(
    State(state): State<TasksState>,
    caller: Caller,
    Json(payload): Json<ExportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (format, scope) = payload.validate()?;
    let select = export_service::export_query(state.db(), &caller, &scope).await?;
    let export_id = export_service::spawn_export(
        state.db().clone(),
        state.exports.clone(),
        &caller.user_id,
        format,
        select,
    );
    let download_url = format!(
        "{}/gw/export/download/{}",
        state.public_gateway_url, export_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Export request accepted. The file is being generated.",
            "exportId": export_id,
            "downloadUrl": download_url,
        })),
    ))
}

pub async fn download_export(
    State(state): State<TasksState>,
    caller: Caller,
    Path(export_id): Path<String>,
) -> Response {
    match state.exports.take(&export_id, &caller.user_id) {
        Download::Ready(file) => attachment(file),
        Download::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Export job not found or has expired." })),
        )
            .into_response(),
        Download::Forbidden => (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Forbidden: You did not request this export." })),
        )
            .into_response(),
        Download::Processing => (
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Export is still being processed. Please try again in a moment."
            })),
        )
            .into_response(),
        Download::Failed(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Export job failed.", "error": error })),
        )
            .into_response(),
    }
}
