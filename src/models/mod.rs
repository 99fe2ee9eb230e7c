pub mod category;
pub mod error_log;
pub mod project;
pub mod project_membership;
pub mod task;
pub mod user;

pub use category::Model as Category;
pub use project::Model as Project;
pub use project_membership::Model as ProjectMembership;
pub use task::Model as Task;
