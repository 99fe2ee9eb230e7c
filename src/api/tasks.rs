use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use super::error::ApiError;
use crate::domain::Caller;
use crate::services::task_service::{
    self, CreateTaskRequest, ListTasksQuery, UpdateTaskRequest,
};

#[derive(Debug, Default, Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriorityBody {
    pub priority: Option<String>,
}

#[utoipa::path(
    get,
    path = "/tasks",
    responses(
        (status = 200, description = "Page of tasks visible to the caller"),
        (status = 400, description = "Invalid filter, paging or sort parameter"),
        (status = 403, description = "Caller may not list these tasks")
    )
)]
pub async fn list_tasks(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Query(query): Query<ListTasksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = task_service::list_tasks(&db, &caller, query).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/tasks",
    responses(
        (status = 201, description = "Task created"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Category or project not found")
    )
)]
pub async fn create_task(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = task_service::create_task(&db, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found"),
        (status = 403, description = "Task not visible to the caller"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = task_service::get_task(&db, &caller, &id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    put,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task updated"),
        (status = 400, description = "Validation failed or empty update"),
        (status = 403, description = "Caller may not modify this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = task_service::update_task(&db, &caller, &id, payload).await?;
    Ok(Json(task))
}

pub async fn update_status(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<StatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let task = task_service::update_status(&db, &caller, &id, payload.status.as_deref()).await?;
    Ok(Json(task))
}

pub async fn update_priority(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<PriorityBody>,
) -> Result<impl IntoResponse, ApiError> {
    let task =
        task_service::update_priority(&db, &caller, &id, payload.priority.as_deref()).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Caller may not delete this task"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    task_service::delete_task(&db, &caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
