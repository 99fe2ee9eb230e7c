//! Application state of each service, shared across its handlers

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::{ErrorsConfig, ProjectsConfig, TasksConfig};
use crate::domain::ErrorLogRepository;
use crate::infrastructure::SeaOrmErrorLogRepository;
use crate::infrastructure::exports::ExportJobs;
use crate::integrations::{ErrorReporter, TasksClient, TokenProvider};

/// State of the tasks service
#[derive(Clone)]
pub struct TasksState {
    db: DatabaseConnection,
    /// Background export jobs awaiting download
    pub exports: ExportJobs,
    pub reporter: ErrorReporter,
    /// Base of the download links handed out for async exports
    pub public_gateway_url: String,
}

impl TasksState {
    pub fn new(db: DatabaseConnection, config: &TasksConfig) -> Result<Self, reqwest::Error> {
        let tokens = TokenProvider::new(config.service.oauth.clone())?;
        Ok(Self {
            db,
            exports: ExportJobs::new(config.export_ttl),
            reporter: ErrorReporter::new(&config.service, tokens)?,
            public_gateway_url: config.public_gateway_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl axum::extract::FromRef<TasksState> for DatabaseConnection {
    fn from_ref(state: &TasksState) -> Self {
        state.db.clone()
    }
}

/// State of the projects service
#[derive(Clone)]
pub struct ProjectsState {
    db: DatabaseConnection,
    pub tasks_client: TasksClient,
    pub reporter: ErrorReporter,
}

impl ProjectsState {
    pub fn new(db: DatabaseConnection, config: &ProjectsConfig) -> Result<Self, reqwest::Error> {
        let tokens = TokenProvider::new(config.service.oauth.clone())?;
        Ok(Self {
            db,
            tasks_client: TasksClient::new(config.tasks_api_url.clone(), tokens.clone())?,
            reporter: ErrorReporter::new(&config.service, tokens)?,
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

impl axum::extract::FromRef<ProjectsState> for DatabaseConnection {
    fn from_ref(state: &ProjectsState) -> Self {
        state.db.clone()
    }
}

/// State of the errors service. Errors are logged locally; the service does
/// not report its own failures back to itself.
#[derive(Clone)]
pub struct ErrorsState {
    pub repo: Arc<dyn ErrorLogRepository>,
    pub service_name: String,
}

impl ErrorsState {
    pub fn new(db: DatabaseConnection, config: &ErrorsConfig) -> Self {
        Self {
            repo: Arc::new(SeaOrmErrorLogRepository::new(db)),
            service_name: config.service.service_name.clone(),
        }
    }
}
