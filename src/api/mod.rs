pub mod categories;
pub mod error;
pub mod errors;
pub mod export;
pub mod health;
pub mod import;
pub mod projects;
pub mod reporting;
pub mod reports;
pub mod tasks;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_docs::ApiDoc;
use crate::infrastructure::{ErrorsState, ProjectsState, TasksState};
use crate::services::import_service::MAX_IMPORT_BYTES;

pub use error::ApiError;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn tasks_router(state: TasksState) -> Router {
    let reporter = state.reporter.clone();
    Router::new()
        .route("/", get(health::tasks_welcome))
        .route("/health", get(health::tasks_health))
        // Tasks
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/:id/status", patch(tasks::update_status))
        .route("/tasks/:id/priority", patch(tasks::update_priority))
        // Categories
        .route(
            "/categories",
            get(categories::list_categories)
                .post(categories::create_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Reports
        .route("/reports/summary", get(reports::summary))
        // Import / export
        .route(
            "/import",
            post(import::import_tasks)
                .layer(DefaultBodyLimit::max(MAX_IMPORT_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/export", post(export::request_export))
        .route("/export/json", get(export::export_json))
        .route("/export/csv", get(export::export_csv))
        .route("/export/download/:export_id", get(export::download_export))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CatchPanicLayer::custom(reporting::panic_response))
        .layer(from_fn_with_state(reporter, reporting::report_server_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn projects_router(state: ProjectsState) -> Router {
    let reporter = state.reporter.clone();
    let projects = Router::new()
        .route(
            "/",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/info", get(health::projects_info))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route(
            "/:id/members",
            get(projects::list_members).post(projects::add_member),
        )
        .route(
            "/:id/members/:user_id",
            put(projects::update_member_role).delete(projects::remove_member),
        )
        .route("/:id/tasks", get(projects::project_tasks));

    Router::new()
        .route("/health", get(health::projects_health))
        .nest("/api/v1/projects", projects)
        .layer(CatchPanicLayer::custom(reporting::panic_response))
        .layer(from_fn_with_state(reporter, reporting::report_server_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn errors_router(state: ErrorsState) -> Router {
    Router::new()
        .route("/health", get(errors::service_health))
        .route(
            "/api/errors",
            get(errors::list_errors).post(errors::log_error),
        )
        .route("/api/errors/health", get(errors::health))
        .route("/api/errors/stats", get(errors::stats))
        .route("/api/errors/cleanup", delete(errors::cleanup))
        .route("/api/errors/:id", get(errors::get_error))
        .layer(CatchPanicLayer::custom(reporting::panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
