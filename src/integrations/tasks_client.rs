//! Client used by the projects service to list a project's tasks through
//! the tasks API, authenticated with the service's own M2M token.

use std::time::Duration;

use serde_json::Value;

use super::TokenProvider;
use crate::domain::DomainError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TasksClient {
    client: reqwest::Client,
    tasks_url: String,
    tokens: TokenProvider,
}

impl TasksClient {
    pub fn new(tasks_url: impl Into<String>, tokens: TokenProvider) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            tasks_url: tasks_url.into(),
            tokens,
        })
    }

    /// Tasks of one project, relayed as returned by the tasks API.
    pub async fn project_tasks(&self, project_id: &str) -> Result<Value, DomainError> {
        let token = self.tokens.access_token().await.map_err(|e| {
            DomainError::External(format!(
                "Failed to obtain M2M token for internal service call: {}",
                e
            ))
        })?;

        tracing::debug!(url = %self.tasks_url, project_id, "calling tasks API");
        let resp = self
            .client
            .get(&self.tasks_url)
            .query(&[("projectId", project_id)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                DomainError::External(format!(
                    "Failed to retrieve tasks from tasks-service: {}",
                    e
                ))
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "tasks API rejected project task listing");
            return Err(DomainError::External(format!(
                "Failed to retrieve tasks from tasks-service: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            )));
        }

        resp.json::<Value>().await.map_err(|e| {
            DomainError::External(format!("Invalid response from tasks-service: {}", e))
        })
    }
}
