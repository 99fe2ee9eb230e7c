//! Category Service - per-user task categories

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};

use super::{new_id, user_service};
use crate::domain::validation::Validator;
use crate::domain::{Caller, DomainError};
use crate::models::{category, task};
use crate::utils::time;

#[derive(Debug, Default, Deserialize)]
pub struct CategoryRequest {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryQuery {
    pub id: Option<String>,
    pub user_id: Option<String>,
}

/// `GET /categories` answers with one category when addressed by id.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CategoryListing {
    One(category::Model),
    Many(Vec<category::Model>),
}

fn validate_name(v: &mut Validator, name: Option<&str>) -> Option<String> {
    v.required_text(
        "name",
        name,
        2,
        50,
        "Category name is required.",
        "Category name must be between 2 and 50 characters.",
    )
}

fn validate_id(v: &mut Validator, id: Option<&str>) -> Option<String> {
    v.required_text(
        "id",
        id,
        1,
        255,
        "Category ID is required.",
        "Category ID must be a string.",
    )
}

async fn name_taken<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    name: &str,
    except: Option<&str>,
) -> Result<bool, DomainError> {
    let mut query = category::Entity::find()
        .filter(category::Column::UserId.eq(user_id))
        .filter(category::Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(category::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

/// Find a category owned by `user_id`.
pub async fn find_owned<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    category_id: &str,
) -> Result<Option<category::Model>, DomainError> {
    Ok(category::Entity::find_by_id(category_id.to_string())
        .filter(category::Column::UserId.eq(user_id))
        .one(db)
        .await?)
}

/// Find the caller's category by name, creating it when missing.
pub async fn find_or_create<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    name: &str,
) -> Result<category::Model, DomainError> {
    let existing = category::Entity::find()
        .filter(category::Column::UserId.eq(user_id))
        .filter(category::Column::Name.eq(name))
        .one(db)
        .await?;
    if let Some(found) = existing {
        return Ok(found);
    }
    user_service::ensure_user(db, user_id).await?;
    let now = time::now();
    Ok(category::ActiveModel {
        id: Set(new_id()),
        name: Set(name.to_string()),
        user_id: Set(user_id.to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(db)
    .await?)
}

pub async fn create_category<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    req: CategoryRequest,
) -> Result<category::Model, DomainError> {
    let mut v = Validator::new();
    let name = validate_name(&mut v, req.name.as_deref());
    v.finish()?;
    let name = name.unwrap_or_default();

    let duplicate =
        || DomainError::Conflict("A category with this name already exists for this user.".into());
    if name_taken(db, &caller.user_id, &name, None).await? {
        return Err(duplicate());
    }

    user_service::ensure_user(db, &caller.user_id).await?;
    let now = time::now();
    category::ActiveModel {
        id: Set(new_id()),
        name: Set(name),
        user_id: Set(caller.user_id.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(|e| match DomainError::from(e) {
        DomainError::Conflict(_) => duplicate(),
        other => other,
    })
}

/// Own categories by name; a single one with `id`; admins may list another
/// user's with `userId`.
pub async fn list_categories<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    query: CategoryQuery,
) -> Result<CategoryListing, DomainError> {
    if let Some(id) = query.id.filter(|id| !id.trim().is_empty()) {
        let found = category::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| DomainError::not_found("Category not found."))?;
        if found.user_id != caller.user_id && !caller.is_admin() {
            return Err(DomainError::forbidden(
                "Forbidden: You do not have access to this category.",
            ));
        }
        return Ok(CategoryListing::One(found));
    }

    let owner = match query.user_id.filter(|u| !u.trim().is_empty()) {
        Some(other) if other != caller.user_id => {
            if !caller.is_admin() {
                return Err(DomainError::forbidden(
                    "Forbidden: Only administrators can list other users' categories.",
                ));
            }
            other
        }
        _ => caller.user_id.clone(),
    };

    let categories = category::Entity::find()
        .filter(category::Column::UserId.eq(owner))
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;
    Ok(CategoryListing::Many(categories))
}

pub async fn update_category<C: ConnectionTrait>(
    db: &C,
    caller: &Caller,
    req: CategoryRequest,
) -> Result<category::Model, DomainError> {
    let mut v = Validator::new();
    let id = validate_id(&mut v, req.id.as_deref());
    let name = validate_name(&mut v, req.name.as_deref());
    v.finish()?;
    let (id, name) = (id.unwrap_or_default(), name.unwrap_or_default());

    let existing = find_owned(db, &caller.user_id, &id).await?.ok_or_else(|| {
        DomainError::not_found("Category not found or you do not have permission to update it.")
    })?;

    let duplicate = || {
        DomainError::Conflict("Another category with this name already exists for this user.".into())
    };
    if name_taken(db, &caller.user_id, &name, Some(&id)).await? {
        return Err(duplicate());
    }

    let mut active: category::ActiveModel = existing.into();
    active.name = Set(name);
    active.updated_at = Set(time::now());
    active.update(db).await.map_err(|e| match DomainError::from(e) {
        DomainError::Conflict(_) => duplicate(),
        other => other,
    })
}

/// Delete a category. Its tasks stay and lose the category reference.
pub async fn delete_category<C: TransactionTrait + ConnectionTrait>(
    db: &C,
    caller: &Caller,
    req: CategoryRequest,
) -> Result<(), DomainError> {
    let mut v = Validator::new();
    let id = validate_id(&mut v, req.id.as_deref());
    v.finish()?;
    let id = id.unwrap_or_default();

    find_owned(db, &caller.user_id, &id).await?.ok_or_else(|| {
        DomainError::not_found("Category not found or you do not have permission to delete it.")
    })?;

    let txn = db.begin().await?;
    task::Entity::update_many()
        .col_expr(task::Column::CategoryId, Expr::value(Option::<String>::None))
        .filter(task::Column::CategoryId.eq(id.clone()))
        .exec(&txn)
        .await?;
    let res = category::Entity::delete_by_id(id).exec(&txn).await?;
    if res.rows_affected == 0 {
        return Err(DomainError::not_found("Category not found or already deleted."));
    }
    txn.commit().await?;
    Ok(())
}
