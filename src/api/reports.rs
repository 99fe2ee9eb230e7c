use axum::{Json, extract::State, response::IntoResponse};
use sea_orm::DatabaseConnection;

use super::error::ApiError;
use crate::domain::Caller;
use crate::services::report_service;

#[utoipa::path(
    get,
    path = "/reports/summary",
    responses((status = 200, description = "Task counts of the caller by status and priority"))
)]
pub async fn summary(
    State(db): State<DatabaseConnection>,
    caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    let report = report_service::summary(&db, &caller).await?;
    Ok(Json(report))
}
