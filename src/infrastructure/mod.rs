//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - In-memory export job store (exports)
//! - Repository implementations (repositories)
//! - HTTP server setup and tracing (server)
//! - Per-service application state (state)

pub mod exports;
pub mod repositories;
pub mod server;
pub mod state;

pub use repositories::*;
pub use state::{ErrorsState, ProjectsState, TasksState};
