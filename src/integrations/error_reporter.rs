//! Forwards a service's unhandled errors to the central errors service,
//! through the gateway's service-token protected endpoint.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use super::TokenProvider;
use crate::config::ServiceConfig;
use crate::domain::DomainError;
use crate::utils::time;

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequestDetails {
    pub method: Option<String>,
    pub url: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub timestamp: String,
    pub source_service: String,
    pub error_message: String,
    pub error_code: String,
    pub request_details: ReportRequestDetails,
    pub stack_trace: Option<String>,
    pub additional_context: Map<String, Value>,
}

#[derive(Clone)]
pub struct ErrorReporter {
    client: reqwest::Client,
    service_name: String,
    endpoint: Option<String>,
    tokens: TokenProvider,
}

impl ErrorReporter {
    pub fn new(config: &ServiceConfig, tokens: TokenProvider) -> Result<Self, reqwest::Error> {
        if config.error_endpoint.is_none() {
            tracing::warn!(
                service = %config.service_name,
                "API_GATEWAY_INTERNAL_ERROR_ENDPOINT is not set, errors will only be logged"
            );
        }
        let client = reqwest::Client::builder().timeout(REPORT_TIMEOUT).build()?;
        Ok(Self {
            client,
            service_name: config.service_name.clone(),
            endpoint: config.error_endpoint.clone(),
            tokens,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Start a report stamped with the current time and this service's name.
    pub fn build(
        &self,
        code: &str,
        message: impl Into<String>,
        details: ReportRequestDetails,
    ) -> ErrorReport {
        ErrorReport {
            timestamp: time::now(),
            source_service: self.service_name.clone(),
            error_message: message.into(),
            error_code: code.to_string(),
            request_details: details,
            stack_trace: None,
            additional_context: Map::new(),
        }
    }

    /// Deliver a report. Without an endpoint the report is only logged.
    pub async fn report(&self, report: ErrorReport) -> Result<(), DomainError> {
        let Some(endpoint) = &self.endpoint else {
            tracing::error!(
                source = %report.source_service,
                code = %report.error_code,
                message = %report.error_message,
                "unreported service error"
            );
            return Ok(());
        };

        let token = self.tokens.access_token().await?;
        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(token)
            .json(&report)
            .send()
            .await
            .map_err(|e| DomainError::External(format!("No response from error endpoint: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::External(format!(
                "Error endpoint answered {}: {}",
                status, body
            )));
        }
        tracing::debug!(code = %report.error_code, "error reported to gateway");
        Ok(())
    }

    /// Fire-and-forget delivery. Failures are logged, never propagated.
    pub fn spawn_report(&self, report: ErrorReport) {
        let reporter = self.clone();
        tokio::spawn(async move {
            let code = report.error_code.clone();
            if let Err(e) = reporter.report(report).await {
                tracing::warn!(
                    service = %reporter.service_name,
                    code = %code,
                    error = %e,
                    "failed to report error"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthClientConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_identity_provider(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/realms/todo/protocol/openid-connect/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "svc-token",
                "expires_in": 300
            })))
            .mount(server)
            .await;
    }

    fn service_config(server: &MockServer) -> ServiceConfig {
        let mut config = ServiceConfig::local("tasks-api");
        config.error_endpoint = Some(format!("{}/gw/errors", server.uri()));
        config.oauth = OAuthClientConfig {
            url: Some(server.uri()),
            realm: Some("todo".to_string()),
            client_id: Some("tasks-api".to_string()),
            client_secret: Some("secret".to_string()),
        };
        config
    }

    fn reporter_for(config: &ServiceConfig) -> ErrorReporter {
        ErrorReporter::new(config, TokenProvider::new(config.oauth.clone()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn report_is_posted_with_service_token() {
        let server = MockServer::start().await;
        mock_identity_provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/gw/errors"))
            .and(header("authorization", "Bearer svc-token"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let config = service_config(&server);
        let reporter = reporter_for(&config);
        let err = DomainError::Database("connection reset".to_string());
        let report = reporter.build(
            err.code(),
            err.to_string(),
            ReportRequestDetails {
                method: Some("GET".to_string()),
                url: Some("/tasks".to_string()),
                user_id: Some("u1".to_string()),
            },
        );
        assert_eq!(report.error_code, "DATABASE_ERROR");
        reporter.report(report).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let posted = received
            .iter()
            .find(|r| r.url.path() == "/gw/errors")
            .unwrap();
        let body: Value = serde_json::from_slice(&posted.body).unwrap();
        assert_eq!(body["sourceService"], "tasks-api");
        assert_eq!(body["requestDetails"]["userId"], "u1");
    }

    #[tokio::test]
    async fn rejected_report_is_an_error() {
        let server = MockServer::start().await;
        mock_identity_provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/gw/errors"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let config = service_config(&server);
        let reporter = reporter_for(&config);
        let report = reporter.build("UNHANDLED_EXCEPTION", "boom", ReportRequestDetails::default());
        assert!(reporter.report(report).await.is_err());
    }

    #[tokio::test]
    async fn without_endpoint_reports_are_logged_only() {
        let config = ServiceConfig::local("errors-api");
        let reporter = reporter_for(&config);
        let report = reporter.build("UNHANDLED_EXCEPTION", "boom", ReportRequestDetails::default());
        reporter.report(report).await.unwrap();
    }
}
