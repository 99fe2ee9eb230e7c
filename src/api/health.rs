use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DatabaseConnection;
use serde_json::json;

use crate::infrastructure::{ProjectsState, TasksState};
use crate::utils::time;

/// Liveness plus a database round-trip; 503 when the database is unreachable.
pub async fn database_health(db: &DatabaseConnection, service: &str) -> Response {
    match db.ping().await {
        Ok(()) => Json(json!({
            "status": "ok",
            "service": service,
            "timestamp": time::now(),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(service, error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "service": service,
                    "message": "Database connection failed",
                    "timestamp": time::now(),
                })),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are reachable"),
        (status = 503, description = "Database connection failed")
    )
)]
pub async fn tasks_health(State(state): State<TasksState>) -> Response {
    database_health(state.db(), state.reporter.service_name()).await
}

pub async fn projects_health(State(state): State<ProjectsState>) -> Response {
    database_health(state.db(), state.reporter.service_name()).await
}

pub async fn tasks_welcome(State(state): State<TasksState>) -> impl IntoResponse {
    Json(json!({
        "message": format!("Welcome to the {} - v1", state.reporter.service_name())
    }))
}

pub async fn projects_info(State(state): State<ProjectsState>) -> impl IntoResponse {
    Json(json!({
        "message": format!("Welcome to the {} - v1", state.reporter.service_name())
    }))
}
