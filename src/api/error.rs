//! HTTP mapping of domain errors

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::DomainError;

/// Marker left on 5xx responses so the reporting middleware can forward the
/// underlying failure to the errors service.
#[derive(Debug, Clone)]
pub struct ReportedError {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError(e)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(e: sea_orm::DbErr) -> Self {
        ApiError(e.into())
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Validation(_) | DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::External(_) => StatusCode::BAD_GATEWAY,
            DomainError::Database(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self.0 {
            DomainError::Validation(errors) => json!({ "errors": errors }),
            DomainError::External(msg) => json!({ "message": msg }),
            DomainError::Database(_) | DomainError::Internal(_) => {
                json!({ "message": "An unexpected internal server error occurred." })
            }
            other => json!({ "message": other.to_string() }),
        };

        if !status.is_server_error() {
            return (status, Json(body)).into_response();
        }

        tracing::error!(code = self.0.code(), error = %self.0, "request failed");
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ReportedError {
            code: self.0.code(),
            message: self.0.to_string(),
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldError;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let response = ApiError(DomainError::Validation(vec![FieldError::new(
            "title",
            "Title is required.",
        )]))
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ReportedError>().is_none());
        let body = body_of(response).await;
        assert_eq!(body["errors"][0]["field"], "title");
        assert_eq!(body["errors"][0]["message"], "Title is required.");
    }

    #[tokio::test]
    async fn server_errors_hide_details_but_are_marked() {
        let response = ApiError(DomainError::Database("disk I/O error".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let marker = response.extensions().get::<ReportedError>().cloned().unwrap();
        assert_eq!(marker.code, "DATABASE_ERROR");
        let body = body_of(response).await;
        assert!(!body["message"].as_str().unwrap().contains("disk"));
    }

    #[tokio::test]
    async fn upstream_failures_are_bad_gateway() {
        let response =
            ApiError(DomainError::External("tasks-service unreachable".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_of(response).await["message"], "tasks-service unreachable");
    }

    #[test]
    fn client_errors_keep_their_status() {
        assert_eq!(
            ApiError(DomainError::not_found("Task not found.")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(DomainError::Conflict("dup".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(DomainError::forbidden("no")).status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
