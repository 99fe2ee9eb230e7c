//! Access-control rules for projects, tasks and categories.
//!
//! Every service endpoint resolves a [`Caller`] (from the identity headers the
//! gateway injects) and asks these types what it may do. The rules are pure so
//! they can be checked without a database.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "admin";
pub const SERVICE_ROLE: &str = "service-role";

/// Identity of the user (or service account) behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
        }
    }

    /// Parse the comma-joined role list carried in `X-User-Roles`.
    pub fn from_headers(user_id: &str, roles_header: Option<&str>) -> Self {
        let roles = roles_header
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(user_id, roles)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }

    pub fn is_service(&self) -> bool {
        self.has_role(SERVICE_ROLE)
    }

    /// Admins and internal services see everything.
    pub fn is_privileged(&self) -> bool {
        self.is_admin() || self.is_service()
    }
}

/// Role of a user inside a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectRole {
    Owner,
    Editor,
    Member,
    Viewer,
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 4] = [
        ProjectRole::Owner,
        ProjectRole::Editor,
        ProjectRole::Member,
        ProjectRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "OWNER",
            ProjectRole::Editor => "EDITOR",
            ProjectRole::Member => "MEMBER",
            ProjectRole::Viewer => "VIEWER",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid role. Must be one of: {}",
                    ProjectRole::ALL.map(|r| r.as_str()).join(", ")
                )
            })
    }
}

/// What a caller may do with one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectAccess {
    pub is_admin: bool,
    pub is_service: bool,
    pub is_owner: bool,
    pub membership: Option<ProjectRole>,
}

impl ProjectAccess {
    pub fn resolve(caller: &Caller, owner_id: &str, membership: Option<ProjectRole>) -> Self {
        Self {
            is_admin: caller.is_admin(),
            is_service: caller.is_service(),
            is_owner: caller.user_id == owner_id,
            membership,
        }
    }

    fn has_role(&self, roles: &[ProjectRole]) -> bool {
        self.membership.is_some_and(|m| roles.contains(&m))
    }

    pub fn can_view(&self) -> bool {
        self.is_admin || self.is_service || self.is_owner || self.membership.is_some()
    }

    pub fn can_update(&self) -> bool {
        self.is_admin || self.is_owner || self.has_role(&[ProjectRole::Owner, ProjectRole::Editor])
    }

    pub fn can_delete(&self) -> bool {
        self.is_admin || self.is_owner
    }

    pub fn can_manage_members(&self) -> bool {
        self.can_update()
    }

    pub fn can_create_tasks(&self) -> bool {
        self.is_admin
            || self.is_owner
            || self.has_role(&[ProjectRole::Owner, ProjectRole::Editor, ProjectRole::Member])
    }

    pub fn can_edit_tasks(&self) -> bool {
        self.can_update()
    }

    pub fn can_delete_tasks(&self) -> bool {
        self.is_admin || self.is_owner
    }
}

/// What a caller may do with one task. `project` is the caller's access to the
/// task's project, when the task belongs to one.
#[derive(Debug, Clone, Copy)]
pub struct TaskAccess {
    pub is_creator: bool,
    pub is_privileged: bool,
    pub is_admin: bool,
    pub project: Option<ProjectAccess>,
}

impl TaskAccess {
    pub fn resolve(caller: &Caller, creator_id: &str, project: Option<ProjectAccess>) -> Self {
        Self {
            is_creator: caller.user_id == creator_id,
            is_privileged: caller.is_privileged(),
            is_admin: caller.is_admin(),
            project,
        }
    }

    pub fn can_view(&self) -> bool {
        self.is_creator || self.is_privileged || self.project.is_some_and(|p| p.can_view())
    }

    pub fn can_edit(&self) -> bool {
        self.is_creator || self.is_admin || self.project.is_some_and(|p| p.can_edit_tasks())
    }

    pub fn can_delete(&self) -> bool {
        self.is_creator || self.is_admin || self.project.is_some_and(|p| p.can_delete_tasks())
    }
}
