//! Categories are addressed through the request body and query string
//! rather than the path.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;

use super::error::ApiError;
use crate::domain::Caller;
use crate::services::category_service::{self, CategoryQuery, CategoryRequest};

pub async fn create_category(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = category_service::create_category(&db, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = category_service::list_categories(&db, &caller, query).await?;
    Ok(Json(listing))
}

pub async fn update_category(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = category_service::update_category(&db, &caller, payload).await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(db): State<DatabaseConnection>,
    caller: Caller,
    Json(payload): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    category_service::delete_category(&db, &caller, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}
