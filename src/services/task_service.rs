//! Task Service - Pure business logic without HTTP layer

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set,
    sea_query::{Expr, SimpleExpr},
};
use serde::{Deserialize, Serialize};

use super::{Pagination, category_service, new_id, project_service, user_service};
use crate::domain::validation::Validator;
use crate::domain::{Caller, DomainError, TaskAccess, TaskPriority, TaskStatus};
use crate::models::task;
use crate::utils::serde_ext::double_option;
use crate::utils::time;

const TITLE_REQUIRED: &str = "Task title is required.";
const TITLE_LENGTH: &str = "Title must be between 3 and 100 characters.";
const DESCRIPTION_LENGTH: &str = "Description cannot exceed 500 characters.";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub project_id: Option<Option<String>>,
}

impl UpdateTaskRequest {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.category_id.is_none()
            && self.project_id.is_none()
    }
}

/// Validated fields of a new task
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
}

impl CreateTaskRequest {
    pub fn validate(&self) -> Result<NewTask, DomainError> {
        let mut v = Validator::new();
        let title = v.required_text(
            "title",
            self.title.as_deref(),
            3,
            100,
            TITLE_REQUIRED,
            TITLE_LENGTH,
        );
        let description =
            v.optional_text("description", self.description.as_deref(), 500, DESCRIPTION_LENGTH);
        let status = v.optional_enum::<TaskStatus>("status", self.status.as_deref());
        let priority = v.optional_enum::<TaskPriority>("priority", self.priority.as_deref());
        let due_date = v.optional_date("dueDate", self.due_date.as_deref());
        let category_id = v.optional_id("categoryId", self.category_id.as_deref(), "Category ID");
        let project_id = v.optional_id("projectId", self.project_id.as_deref(), "Project ID");
        v.finish()?;

        Ok(NewTask {
            title: title.unwrap_or_default(),
            description,
            status: status.unwrap_or_default(),
            priority: priority.unwrap_or_default(),
            due_date,
            category_id,
            project_id,
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskPage {
    pub data: Vec<task::Model>,
    pub pagination: Pagination,
}

/// Filters shared by listing and export
#[derive(Debug, Default, Clone)]
pub struct TaskScope {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub category_id: Option<String>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
}

impl SortField {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "createdAt" => Some(SortField::CreatedAt),
            "updatedAt" => Some(SortField::UpdatedAt),
            "dueDate" => Some(SortField::DueDate),
            "priority" => Some(SortField::Priority),
            "title" => Some(SortField::Title),
            _ => None,
        }
    }
}

fn blank_to_none(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl TaskScope {
    /// Parse the filter fields common to listing and export queries.
    pub fn parse(
        v: &mut Validator,
        status: Option<&str>,
        priority: Option<&str>,
        category_id: Option<&str>,
        project_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            status: v.optional_enum("status", blank_to_none(status)),
            priority: v.optional_enum("priority", blank_to_none(priority)),
            category_id: blank_to_none(category_id).map(str::to_string),
            project_id: blank_to_none(project_id).map(str::to_string),
            user_id: blank_to_none(user_id).map(str::to_string),
        }
    }

    /// Restrict a task query to what `caller` may see under this scope.
    ///
    /// With a project filter every task of the project is included once the
    /// caller may view it. Otherwise callers see their own tasks, admins see
    /// everything (or one user's with `user_id`).
    pub async fn apply<C: ConnectionTrait>(
        &self,
        db: &C,
        caller: &Caller,
        mut query: Select<task::Entity>,
    ) -> Result<Select<task::Entity>, DomainError> {
        if let Some(user_id) = &self.user_id {
            if user_id != &caller.user_id && !caller.is_admin() {
                return Err(DomainError::forbidden(
                    "Forbidden: Only administrators can access other users' tasks.",
                ));
            }
        }

        if let Some(project_id) = &self.project_id {
            let (_, access) = project_service::load_with_access(db, caller, project_id).await?;
            if !access.can_view() {
                return Err(DomainError::forbidden(
                    "Forbidden: You do not have access to this project's tasks.",
                ));
            }
            query = query.filter(task::Column::ProjectId.eq(project_id.clone()));
            if let Some(user_id) = &self.user_id {
                query = query.filter(task::Column::UserId.eq(user_id.clone()));
            }
        } else if caller.is_admin() {
            if let Some(user_id) = &self.user_id {
                query = query.filter(task::Column::UserId.eq(user_id.clone()));
            }
        } else {
            query = query.filter(task::Column::UserId.eq(caller.user_id.clone()));
        }

        if let Some(status) = self.status {
            query = query.filter(task::Column::Status.eq(status.as_str()));
        }
        if let Some(priority) = self.priority {
            query = query.filter(task::Column::Priority.eq(priority.as_str()));
        }
        if let Some(category_id) = &self.category_id {
            query = query.filter(task::Column::CategoryId.eq(category_id.clone()));
        }
        Ok(query)
    }
}

fn priority_rank() -> SimpleExpr {
    let col = || Expr::col(task::Column::Priority);
    Expr::case(col().eq(TaskPriority::Low.as_str()), TaskPriority::Low.rank())
        .case(col().eq(TaskPriority::Medium.as_str()), TaskPriority::Medium.rank())
        .case(col().eq(TaskPriority::High.as_str()), TaskPriority::High.rank())
        .finally(TaskPriority::Urgent.rank())
        .into()
}

pub async fn list_tasks<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    q: ListTasksQuery,
) -> Result<TaskPage, DomainError> {
    let mut v = Validator::new();
    let scope = TaskScope::parse(
        &mut v,
        q.status.as_deref(),
        q.priority.as_deref(),
        q.category_id.as_deref(),
        q.project_id.as_deref(),
        q.user_id.as_deref(),
    );

    let page = match blank_to_none(q.page.as_deref()) {
        None => 1,
        Some(raw) => raw.parse::<u64>().ok().filter(|p| *p >= 1).unwrap_or_else(|| {
            v.fail("page", "Page must be a positive integer.");
            1
        }),
    };
    let limit = match blank_to_none(q.limit.as_deref()) {
        None => 20,
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|l| (1..=100).contains(l))
            .unwrap_or_else(|| {
                v.fail("limit", "Limit must be between 1 and 100.");
                20
            }),
    };
    let sort = match blank_to_none(q.sort.as_deref()) {
        None => SortField::CreatedAt,
        Some(raw) => SortField::parse(raw).unwrap_or_else(|| {
            v.fail(
                "sort",
                "Sort must be one of: createdAt, updatedAt, dueDate, priority, title.",
            );
            SortField::CreatedAt
        }),
    };
    let order = match blank_to_none(q.order.as_deref()) {
        None | Some("desc") => Order::Desc,
        Some("asc") => Order::Asc,
        Some(_) => {
            v.fail("order", "Order must be 'asc' or 'desc'.");
            Order::Desc
        }
    };
    v.finish()?;

    let query = scope.apply(db, caller, task::Entity::find()).await?;
    let query = match sort {
        SortField::CreatedAt => query.order_by(task::Column::CreatedAt, order),
        SortField::UpdatedAt => query.order_by(task::Column::UpdatedAt, order),
        SortField::DueDate => query.order_by(task::Column::DueDate, order),
        SortField::Title => query.order_by(task::Column::Title, order),
        SortField::Priority => query.order_by(priority_rank(), order),
    };
    let query = query.order_by_desc(task::Column::CreatedAt);

    let paginator = query.paginate(db, limit);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page - 1).await?;

    Ok(TaskPage {
        data,
        pagination: Pagination::new(page, limit, total),
    })
}

async fn find_task<C: ConnectionTrait>(db: &C, task_id: &str) -> Result<task::Model, DomainError> {
    task::Entity::find_by_id(task_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Task not found."))
}

/// Caller's access to a task, taking its project into account.
pub async fn task_access<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task: &task::Model,
) -> Result<TaskAccess, DomainError> {
    let project = match &task.project_id {
        Some(project_id) => {
            match project_service::find_project(db, project_id).await {
                Ok(project) => Some(project_service::access_to(db, caller, &project).await?),
                Err(DomainError::NotFound(_)) => None,
                Err(e) => return Err(e),
            }
        }
        None => None,
    };
    Ok(TaskAccess::resolve(caller, &task.user_id, project))
}

async fn check_category<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    category_id: &str,
) -> Result<(), DomainError> {
    category_service::find_owned(db, &caller.user_id, category_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| DomainError::not_found("Category not found."))
}

async fn check_project_for_tasks<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
) -> Result<(), DomainError> {
    let (_, access) = project_service::load_with_access(db, caller, project_id).await?;
    if !access.can_create_tasks() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have permission to add tasks to this project.",
        ));
    }
    Ok(())
}

/// Insert an already validated task for `owner`. Category and project
/// references are expected to be checked by the caller.
pub async fn insert_task<C: ConnectionTrait>(
    db: &C,
    owner: &str,
    input: NewTask,
) -> Result<task::Model, DomainError> {
    user_service::ensure_user(db, owner).await?;
    let now = time::now();
    let completed_at = (input.status == TaskStatus::Done).then(|| now.clone());
    Ok(task::ActiveModel {
        id: Set(new_id()),
        title: Set(input.title),
        description: Set(input.description),
        status: Set(input.status.as_str().to_string()),
        priority: Set(input.priority.as_str().to_string()),
        due_date: Set(input.due_date),
        completed_at: Set(completed_at),
        user_id: Set(owner.to_string()),
        category_id: Set(input.category_id),
        project_id: Set(input.project_id),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(db)
    .await?)
}

pub async fn create_task<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    req: CreateTaskRequest,
) -> Result<task::Model, DomainError> {
    let input = req.validate()?;
    if let Some(category_id) = &input.category_id {
        check_category(db, caller, category_id).await?;
    }
    if let Some(project_id) = &input.project_id {
        check_project_for_tasks(db, caller, project_id).await?;
    }
    let created = insert_task(db, &caller.user_id, input).await?;
    tracing::debug!(task_id = %created.id, user = %caller.user_id, "task created");
    Ok(created)
}

pub async fn get_task<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task_id: &str,
) -> Result<task::Model, DomainError> {
    let task = find_task(db, task_id).await?;
    if !task_access(db, caller, &task).await?.can_view() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have access to this task.",
        ));
    }
    Ok(task)
}

async fn editable_task<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task_id: &str,
) -> Result<task::Model, DomainError> {
    let task = find_task(db, task_id).await?;
    if !task_access(db, caller, &task).await?.can_edit() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have permission to modify this task.",
        ));
    }
    Ok(task)
}

/// Moving into DONE stamps the completion time; leaving DONE clears it.
fn apply_status(active: &mut task::ActiveModel, current: &task::Model, status: TaskStatus) {
    if status == TaskStatus::Done {
        if current.completed_at.is_none() || current.status != TaskStatus::Done.as_str() {
            active.completed_at = Set(Some(time::now()));
        }
    } else {
        active.completed_at = Set(None);
    }
    active.status = Set(status.as_str().to_string());
}

pub async fn update_task<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task_id: &str,
    req: UpdateTaskRequest,
) -> Result<task::Model, DomainError> {
    if req.is_empty() {
        return Err(DomainError::bad_request("No valid fields provided for update."));
    }

    let mut v = Validator::new();
    let title = req.title.as_deref().and_then(|t| {
        v.required_text("title", Some(t), 3, 100, TITLE_REQUIRED, TITLE_LENGTH)
    });
    let description = req
        .description
        .as_ref()
        .map(|d| v.optional_text("description", d.as_deref(), 500, DESCRIPTION_LENGTH));
    let status = v.optional_enum::<TaskStatus>("status", req.status.as_deref());
    let priority = v.optional_enum::<TaskPriority>("priority", req.priority.as_deref());
    let due_date = req
        .due_date
        .as_ref()
        .map(|d| v.optional_date("dueDate", d.as_deref()));
    let category_id = req
        .category_id
        .as_ref()
        .map(|c| c.as_deref().and_then(|c| v.optional_id("categoryId", Some(c), "Category ID")));
    let project_id = req
        .project_id
        .as_ref()
        .map(|p| p.as_deref().and_then(|p| v.optional_id("projectId", Some(p), "Project ID")));
    v.finish()?;

    let current = editable_task(db, caller, task_id).await?;

    if let Some(Some(category_id)) = &category_id {
        check_category(db, caller, category_id).await?;
    }
    if let Some(Some(project_id)) = &project_id {
        if current.project_id.as_deref() != Some(project_id.as_str()) {
            check_project_for_tasks(db, caller, project_id).await?;
        }
    }

    let mut active: task::ActiveModel = current.clone().into();
    if let Some(title) = title {
        active.title = Set(title);
    }
    if let Some(description) = description {
        active.description = Set(description);
    }
    if let Some(status) = status {
        apply_status(&mut active, &current, status);
    }
    if let Some(priority) = priority {
        active.priority = Set(priority.as_str().to_string());
    }
    if let Some(due_date) = due_date {
        active.due_date = Set(due_date);
    }
    if let Some(category_id) = category_id {
        active.category_id = Set(category_id);
    }
    if let Some(project_id) = project_id {
        active.project_id = Set(project_id);
    }
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

pub async fn update_status<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task_id: &str,
    status: Option<&str>,
) -> Result<task::Model, DomainError> {
    let mut v = Validator::new();
    let status = match blank_to_none(status) {
        None => {
            v.fail("status", "Status is required.");
            None
        }
        given => v.optional_enum::<TaskStatus>("status", given),
    };
    v.finish()?;
    let status = status.unwrap_or_default();

    let current = editable_task(db, caller, task_id).await?;
    let mut active: task::ActiveModel = current.clone().into();
    apply_status(&mut active, &current, status);
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

pub async fn update_priority<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task_id: &str,
    priority: Option<&str>,
) -> Result<task::Model, DomainError> {
    let mut v = Validator::new();
    let priority = match blank_to_none(priority) {
        None => {
            v.fail("priority", "Priority is required.");
            None
        }
        given => v.optional_enum::<TaskPriority>("priority", given),
    };
    v.finish()?;
    let priority = priority.unwrap_or_default();

    let current = editable_task(db, caller, task_id).await?;
    let mut active: task::ActiveModel = current.into();
    active.priority = Set(priority.as_str().to_string());
    active.updated_at = Set(time::now());
    Ok(active.update(db).await?)
}

pub async fn delete_task<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    task_id: &str,
) -> Result<(), DomainError> {
    let task = find_task(db, task_id).await?;
    if !task_access(db, caller, &task).await?.can_delete() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have permission to delete this task.",
        ));
    }
    task::Entity::delete_by_id(task.id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_applies_defaults() {
        let req = CreateTaskRequest {
            title: Some("  Buy milk ".to_string()),
            ..Default::default()
        };
        let task = req.validate().unwrap();
        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn create_request_reports_each_bad_field() {
        let req = CreateTaskRequest {
            title: Some("ab".to_string()),
            description: Some("x".repeat(501)),
            priority: Some("CRITICAL".to_string()),
            category_id: Some("".to_string()),
            ..Default::default()
        };
        match req.validate() {
            Err(DomainError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["title", "description", "priority", "categoryId"]);
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let req: UpdateTaskRequest =
            serde_json::from_str(r#"{"dueDate": null, "title": "New title"}"#).unwrap();
        assert_eq!(req.due_date, Some(None));
        assert_eq!(req.category_id, None);
        assert!(!req.is_empty());

        let empty: UpdateTaskRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn sort_fields_are_camel_case() {
        assert_eq!(SortField::parse("dueDate"), Some(SortField::DueDate));
        assert_eq!(SortField::parse("due_date"), None);
    }
}
