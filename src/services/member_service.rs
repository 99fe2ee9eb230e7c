//! Member Service - project memberships and roles

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use serde::Deserialize;

use super::project_service::load_with_access;
use super::user_service;
use crate::domain::validation::Validator;
use crate::domain::{Caller, DomainError, ProjectRole};
use crate::models::project_membership as membership;
use crate::utils::time;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Option<String>,
}

pub async fn list_members<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
) -> Result<Vec<membership::Model>, DomainError> {
    let (project, access) = load_with_access(db, caller, project_id).await?;
    if !access.can_view() {
        return Err(DomainError::forbidden(
            "Forbidden: You cannot view members of this project.",
        ));
    }
    Ok(membership::Entity::find()
        .filter(membership::Column::ProjectId.eq(project.id))
        .order_by_asc(membership::Column::AssignedAt)
        .all(db)
        .await?)
}

/// Add a member, or change the role of an existing one. Defaults to MEMBER.
pub async fn add_member<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
    req: AddMemberRequest,
) -> Result<membership::Model, DomainError> {
    let mut v = Validator::new();
    let user_id = v.required_text(
        "userId",
        req.user_id.as_deref(),
        1,
        255,
        "User ID of the member to add is required.",
        "User ID must be a string.",
    );
    let role = v.optional_enum::<ProjectRole>("role", req.role.as_deref());
    v.finish()?;
    let user_id = user_id.unwrap_or_default();
    let role = role.unwrap_or(ProjectRole::Member);

    if role == ProjectRole::Owner {
        return Err(DomainError::bad_request(
            "Cannot assign the OWNER role. Transfer ownership via a dedicated endpoint.",
        ));
    }

    let (project, access) = load_with_access(db, caller, project_id).await?;
    if !access.can_manage_members() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have permission to add members to this project.",
        ));
    }
    if project.owner_id == user_id {
        return Err(DomainError::bad_request(
            "Project owner's role cannot be changed from OWNER this way.",
        ));
    }

    user_service::ensure_user(db, &user_id).await?;

    let row = membership::ActiveModel {
        project_id: Set(project.id.clone()),
        user_id: Set(user_id.clone()),
        role: Set(role.as_str().to_string()),
        assigned_at: Set(time::now()),
    };
    membership::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([membership::Column::ProjectId, membership::Column::UserId])
                .update_column(membership::Column::Role)
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    tracing::info!(project_id = %project.id, member = %user_id, role = %role, "member added");

    membership::Entity::find_by_id((project.id, user_id))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::Internal("Membership vanished after upsert".to_string()))
}

pub async fn update_member_role<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
    member_id: &str,
    req: UpdateRoleRequest,
) -> Result<membership::Model, DomainError> {
    let mut v = Validator::new();
    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => {
            v.fail("role", "Role is required.");
            None
        }
        given => v.optional_enum::<ProjectRole>("role", given),
    };
    v.finish()?;
    let role = role.unwrap_or(ProjectRole::Member);

    if role == ProjectRole::Owner {
        return Err(DomainError::bad_request(
            "Cannot change role to OWNER. Transfer ownership via a dedicated endpoint.",
        ));
    }

    let (project, access) = load_with_access(db, caller, project_id).await?;
    if project.owner_id == member_id {
        return Err(DomainError::bad_request(
            "Project owner's role cannot be changed from OWNER this way.",
        ));
    }
    if !access.can_manage_members() {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have permission to update member roles in this project.",
        ));
    }

    let existing = membership::Entity::find_by_id((project.id.clone(), member_id.to_string()))
        .one(db)
        .await?
        .ok_or_else(|| DomainError::not_found("Membership not found for role update."))?;

    let mut active: membership::ActiveModel = existing.into();
    active.role = Set(role.as_str().to_string());
    let updated = active.update(db).await?;

    tracing::info!(project_id = %project.id, member = %member_id, role = %role, "member role changed");
    Ok(updated)
}

/// Remove a member. Managers may remove anyone but the owner; other members
/// may only remove themselves.
pub async fn remove_member<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    project_id: &str,
    member_id: &str,
) -> Result<(), DomainError> {
    let (project, access) = load_with_access(db, caller, project_id).await?;
    if project.owner_id == member_id {
        let msg = if caller.user_id == member_id {
            "Project owner cannot leave the project. Transfer ownership or delete the project."
        } else {
            "Cannot remove the project owner. Transfer ownership first or delete the project."
        };
        return Err(DomainError::bad_request(msg));
    }
    if !access.can_manage_members() && caller.user_id != member_id {
        return Err(DomainError::forbidden(
            "Forbidden: You do not have permission to remove this member.",
        ));
    }

    let res = membership::Entity::delete_by_id((project.id.clone(), member_id.to_string()))
        .exec(db)
        .await?;
    if res.rows_affected == 0 {
        return Err(DomainError::not_found(
            "Membership not found or member already removed.",
        ));
    }

    tracing::info!(project_id = %project.id, member = %member_id, "member removed");
    Ok(())
}
