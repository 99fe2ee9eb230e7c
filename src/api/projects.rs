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
use crate::infrastructure::ProjectsState;
use crate::services::member_service::{self, AddMemberRequest, UpdateRoleRequest};
use crate::services::project_service::{self, CreateProjectRequest, UpdateProjectRequest};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListQuery {
    pub user_id: Option<String>,
}

pub async fn create_project(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = project_service::create_project(&db, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Query(query): Query<ProjectListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = query.user_id.filter(|u| !u.trim().is_empty());
    let projects = project_service::list_projects(&db, &caller, owner).await?;
    Ok(Json(projects))
}

pub async fn get_project(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let project = project_service::get_project(&db, &caller, &id).await?;
    Ok(Json(project))
}

pub async fn update_project(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let project = project_service::update_project(&db, &caller, &id, payload).await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    project_service::delete_project(&db, &caller, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let members = member_service::list_members(&db, &caller, &project_id).await?;
    Ok(Json(members))
}

pub async fn add_member(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path(project_id): Path<String>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let membership = member_service::add_member(&db, &caller, &project_id, payload).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn update_member_role(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path((project_id, user_id)): Path<(String, String)>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let membership =
        member_service::update_member_role(&db, &caller, &project_id, &user_id, payload).await?;
    Ok(Json(membership))
}

pub async fn remove_member(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Path((project_id, user_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    member_service::remove_member(&db, &caller, &project_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Relays the tasks API's answer for this project.
pub async fn project_tasks(
    State(state): State<ProjectsState>,
    caller: Caller,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks =
        project_service::project_tasks(state.db(), &caller, &project_id, &state.tasks_client)
            .await?;
    Ok(Json(tasks))
}
