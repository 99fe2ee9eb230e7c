//! Forwards 5xx responses produced from domain errors to the errors service

use std::any::Any;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::error::{ApiError, ReportedError};
use crate::auth::USER_ID_HEADER;
use crate::domain::DomainError;
use crate::integrations::ErrorReporter;
use crate::integrations::error_reporter::ReportRequestDetails;

pub async fn report_server_errors(
    State(reporter): State<ErrorReporter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let details = ReportRequestDetails {
        method: Some(req.method().to_string()),
        url: Some(req.uri().to_string()),
        user_id: req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let response = next.run(req).await;
    if let Some(failure) = response.extensions().get::<ReportedError>() {
        let mut report = reporter.build(failure.code, failure.message.clone(), details);
        report
            .additional_context
            .insert("statusCode".to_string(), json!(response.status().as_u16()));
        reporter.spawn_report(report);
    }
    response
}

/// Turns a handler panic into a 500 that the reporting middleware forwards.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError(DomainError::Internal(format!("handler panicked: {}", detail))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use tower::util::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    async fn boom() -> &'static str {
        panic!("index out of range")
    }

    #[tokio::test]
    async fn panicking_handler_becomes_a_reported_500() {
        let app: Router = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let marker = response.extensions().get::<ReportedError>().unwrap();
        assert_eq!(marker.code, "UNHANDLED_EXCEPTION");
        assert!(marker.message.contains("index out of range"));

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "An unexpected internal server error occurred.");
    }
}
