use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use crate::domain::{Caller, DomainError};
use crate::infrastructure::ErrorsState;
use crate::services::error_service::{self, ErrorListQuery, LogErrorRequest};
use crate::utils::time;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub timeframe: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupQuery {
    pub older_than: Option<String>,
}

fn require_admin(caller: &Caller) -> Result<(), DomainError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(DomainError::forbidden(
            "Forbidden: Administrator access required.",
        ))
    }
}

pub async fn health(State(state): State<ErrorsState>) -> Response {
    match state.repo.ping().await {
        Ok(()) => Json(json!({
            "status": "OK",
            "message": "Errors API is healthy",
            "timestamp": time::now(),
            "dependencies": { "database": "connected" },
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "errors API health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "ERROR",
                    "message": "Errors API is unhealthy.",
                    "timestamp": time::now(),
                    "dependencies": { "database": "failed" },
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

pub async fn service_health(State(state): State<ErrorsState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "timestamp": time::now(),
    }))
}

/// Ingestion endpoint used by the other services' error reporters.
pub async fn log_error(
    State(state): State<ErrorsState>,
    caller: Caller,
    Json(payload): Json<LogErrorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !caller.is_privileged() {
        return Err(DomainError::forbidden(
            "Forbidden: Service or administrator role required to log errors.",
        )
        .into());
    }
    let stored = error_service::log_error(state.repo.as_ref(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Error logged successfully",
            "errorId": stored.id,
        })),
    ))
}

pub async fn list_errors(
    State(state): State<ErrorsState>,
    caller: Caller,
    Query(query): Query<ErrorListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;
    let list = error_service::list_errors(state.repo.as_ref(), query).await?;
    Ok(Json(list))
}

pub async fn stats(
    State(state): State<ErrorsState>,
    caller: Caller,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;
    let stats = error_service::stats(state.repo.as_ref(), query.timeframe.as_deref()).await?;
    Ok(Json(stats))
}

pub async fn get_error(
    State(state): State<ErrorsState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;
    let entry = error_service::get_error(state.repo.as_ref(), &id).await?;
    Ok(Json(entry))
}

pub async fn cleanup(
    State(state): State<ErrorsState>,
    caller: Caller,
    Query(query): Query<CleanupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&caller)?;
    let result = error_service::cleanup(state.repo.as_ref(), query.older_than.as_deref()).await?;
    Ok(Json(result))
}
