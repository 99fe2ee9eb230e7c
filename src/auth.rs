//! Caller identity as seen by the backend services.
//!
//! Token verification happens at the gateway, which forwards the verified
//! subject and realm roles in `X-User-ID` / `X-User-Roles`. Services only read
//! those headers.

use axum::{
    async_trait,
    extract::{FromRequestParts, Json},
    http::{StatusCode, request::Parts},
};
use serde_json::json;

use crate::domain::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "message": "Unauthorized: User identifier not provided by gateway."
                })),
            ))?;

        let roles = parts
            .headers
            .get(USER_ROLES_HEADER)
            .and_then(|h| h.to_str().ok());

        Ok(Caller::from_headers(user_id, roles))
    }
}
