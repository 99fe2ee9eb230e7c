//! Project Service - projects and the access checks other services share

use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Query},
};
use serde::{Deserialize, Serialize};

use super::{new_id, user_service};
use crate::domain::validation::Validator;
use crate::domain::{Caller, DomainError, ProjectAccess, ProjectRole};
use crate::integrations::TasksClient;
use crate::models::{project, project_membership as membership, task};
use crate::utils::serde_ext::double_option;
use crate::utils::time;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
}

impl UpdateProjectRequest {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.due_date.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectCounts {
    pub tasks: u64,
    pub members: u64,
}

/// List entry: the project, its members and counters
#[derive(Debug, Serialize)]
pub struct ProjectSummary {
    #[serde(flatten)]
    pub project: project::Model,
    pub members: Vec<membership::Model>,
    #[serde(rename = "_count")]
    pub count: ProjectCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskBrief {
    pub id: String,
    pub title: String,
    pub status: String,
}

/// Single project with members and a brief of its tasks
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: project::Model,
    pub members: Vec<membership::Model>,
    pub tasks: Vec<TaskBrief>,
}

pub async fn find_project<C: ConnectionTrait>(
    db: &C,
    project_id: &str,
) -> Result<project::Model, DomainError> {
    project::Entity::find_by_id(project_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Project not found."))
}

pub async fn membership_role<C: ConnectionTrait>(
    db: &C,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectRole>, DomainError> {
    let row = membership::Entity::find_by_id((project_id.to_string(), user_id.to_string()))
        .one(db)
        .await?;
    Ok(row.and_then(|m| m.role.parse().ok()))
}

/// What `caller` may do with `project`.
pub async fn access_to<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project: &project::Model,
) -> Result<ProjectAccess, DomainError> {
    let role = membership_role(db, &project.id, &caller.user_id).await?;
    Ok(ProjectAccess::resolve(caller, &project.owner_id, role))
}

/// Load a project and the caller's access to it (404 when absent).
pub async fn load_with_access<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
) -> Result<(project::Model, ProjectAccess), DomainError> {
    let project = find_project(db, project_id).await?;
    let access = access_to(db, caller, &project).await?;
    Ok((project, access))
}

fn validate_create(req: &CreateProjectRequest) -> Result<(String, Option<String>, Option<String>), DomainError> {
    let mut v = Validator::new();
    let name = v.required_text(
        "name",
        req.name.as_deref(),
        3,
        100,
        "Project name is required.",
        "Project name must be between 3 and 100 characters.",
    );
    let description = v.optional_text(
        "description",
        req.description.as_deref(),
        500,
        "Description cannot exceed 500 characters.",
    );
    let due_date = v.optional_date("dueDate", req.due_date.as_deref());
    v.finish()?;
    Ok((name.unwrap_or_default(), description, due_date))
}

pub async fn create_project<C: TransactionTrait + ConnectionTrait>(
    db: &C,
    caller: &Caller,
    req: CreateProjectRequest,
) -> Result<ProjectDetail, DomainError> {
    let (name, description, due_date) = validate_create(&req)?;
    let now = time::now();

    let txn = db.begin().await?;
    user_service::ensure_user(&txn, &caller.user_id).await?;

    let project = project::ActiveModel {
        id: Set(new_id()),
        name: Set(name),
        description: Set(description),
        due_date: Set(due_date),
        owner_id: Set(caller.user_id.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
    }
    .insert(&txn)
    .await?;

    let owner = membership::ActiveModel {
        project_id: Set(project.id.clone()),
        user_id: Set(caller.user_id.clone()),
        role: Set(ProjectRole::Owner.as_str().to_string()),
        assigned_at: Set(now),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(project_id = %project.id, owner = %caller.user_id, "project created");

    Ok(ProjectDetail {
        project,
        members: vec![owner],
        tasks: Vec::new(),
    })
}

/// Admins see every project (or one owner's, with `owner_filter`); everyone
/// else sees the projects they belong to. Newest first.
pub async fn list_projects<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    owner_filter: Option<String>,
) -> Result<Vec<ProjectSummary>, DomainError> {
    let mut query = project::Entity::find();
    if caller.is_admin() {
        if let Some(owner) = owner_filter {
            query = query.filter(project::Column::OwnerId.eq(owner));
        }
    } else {
        query = query.filter(
            project::Column::Id.in_subquery(
                Query::select()
                    .column(membership::Column::ProjectId)
                    .from(membership::Entity)
                    .and_where(membership::Column::UserId.eq(caller.user_id.clone()))
                    .to_owned(),
            ),
        );
    }
    let projects = query
        .order_by_desc(project::Column::CreatedAt)
        .all(db)
        .await?;
    if projects.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();

    let mut members_by_project: HashMap<String, Vec<membership::Model>> = HashMap::new();
    for m in membership::Entity::find()
        .filter(membership::Column::ProjectId.is_in(ids.clone()))
        .order_by_asc(membership::Column::AssignedAt)
        .all(db)
        .await?
    {
        members_by_project.entry(m.project_id.clone()).or_default().push(m);
    }

    let task_counts: HashMap<String, i64> = task::Entity::find()
        .select_only()
        .column(task::Column::ProjectId)
        .column_as(Expr::col(task::Column::Id).count(), "count")
        .filter(task::Column::ProjectId.is_in(ids))
        .group_by(task::Column::ProjectId)
        .into_tuple::<(String, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    Ok(projects
        .into_iter()
        .map(|project| {
            let members = members_by_project.remove(&project.id).unwrap_or_default();
            let count = ProjectCounts {
                tasks: task_counts.get(&project.id).copied().unwrap_or(0) as u64,
                members: members.len() as u64,
            };
            ProjectSummary {
                project,
                members,
                count,
            }
        })
        .collect())
}

async fn detail<C: ConnectionTrait>(
    db: &C,
    project: project::Model,
) -> Result<ProjectDetail, DomainError> {
    let members = membership::Entity::find()
        .filter(membership::Column::ProjectId.eq(project.id.clone()))
        .order_by_asc(membership::Column::AssignedAt)
        .all(db)
        .await?;
    let tasks = task::Entity::find()
        .filter(task::Column::ProjectId.eq(project.id.clone()))
        .order_by_desc(task::Column::CreatedAt)
        .all(db)
        .await?
        .into_iter()
        .map(|t| TaskBrief {
            id: t.id,
            title: t.title,
            status: t.status,
        })
        .collect();
    Ok(ProjectDetail {
        project,
        members,
        tasks,
    })
}

pub async fn get_project<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
) -> Result<ProjectDetail, DomainError> {
    let (project, access) = load_with_access(db, caller, project_id).await?;
    if !access.can_view() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have access to this project.",
        ));
    }
    detail(db, project).await
}

/// Tasks of a project, fetched from the tasks API once the caller is known
/// to be allowed to see them.
pub async fn project_tasks<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
    tasks: &TasksClient,
) -> Result<serde_json::Value, DomainError> {
    let (project, access) = load_with_access(db, caller, project_id).await?;
    if !access.can_view() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have access to this project's tasks.",
        ));
    }
    tasks.project_tasks(&project.id).await
}

pub async fn update_project<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
    req: UpdateProjectRequest,
) -> Result<ProjectDetail, DomainError> {
    let (project, access) = load_with_access(db, caller, project_id).await?;
    if !access.can_update() {
        return Err(DomainError::forbidden(
            "Forbidden: You cannot update this project.",
        ));
    }
    if req.is_empty() {
        return Err(DomainError::bad_request("No valid fields provided for update."));
    }

    let mut v = Validator::new();
    let name = req.name.as_deref().and_then(|name| {
        v.required_text(
            "name",
            Some(name),
            3,
            100,
            "Project name cannot be empty if provided.",
            "Project name must be between 3 and 100 characters.",
        )
    });
    let description = req.description.as_ref().map(|d| {
        v.optional_text(
            "description",
            d.as_deref(),
            500,
            "Description cannot exceed 500 characters.",
        )
    });
    let due_date = req
        .due_date
        .as_ref()
        .map(|d| v.optional_date("dueDate", d.as_deref()));
    v.finish()?;

    let mut active: project::ActiveModel = project.into();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(description) = description {
        active.description = Set(description);
    }
    if let Some(due_date) = due_date {
        active.due_date = Set(due_date);
    }
    active.updated_at = Set(time::now());
    let project = active.update(db).await?;

    detail(db, project).await
}

/// Delete a project. Memberships go with it; tasks stay and lose their
/// project reference.
pub async fn delete_project<C: TransactionTrait + ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
) -> Result<(), DomainError> {
    let (project, access) = load_with_access(db, caller, project_id).await?;
    if !access.can_delete() {
        return Err(DomainError::forbidden(
            "Forbidden: You cannot delete this project.",
        ));
    }

    let txn = db.begin().await?;
    task::Entity::update_many()
        .col_expr(task::Column::ProjectId, Expr::value(Option::<String>::None))
        .filter(task::Column::ProjectId.eq(project.id.clone()))
        .exec(&txn)
        .await?;
    membership::Entity::delete_many()
        .filter(membership::Column::ProjectId.eq(project.id.clone()))
        .exec(&txn)
        .await?;
    let res = project::Entity::delete_by_id(project.id.clone())
        .exec(&txn)
        .await?;
    if res.rows_affected == 0 {
        return Err(DomainError::not_found("Project not found or already deleted."));
    }
    txn.commit().await?;

    tracing::info!(project_id = %project.id, by = %caller.user_id, "project deleted");
    Ok(())
}
