//! Outbound calls to the identity provider and to other services.

pub mod error_reporter;
pub mod keycloak;
pub mod tasks_client;

pub use error_reporter::{ErrorReport, ErrorReporter};
pub use keycloak::TokenProvider;
pub use tasks_client::TasksClient;
