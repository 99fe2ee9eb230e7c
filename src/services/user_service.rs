//! Users are owned by the identity provider; the database only keeps their
//! ids so rows can reference them.

use sea_orm::{ConnectionTrait, EntityTrait, Set, sea_query::OnConflict};

use crate::domain::DomainError;
use crate::models::user;
use crate::utils::time;

/// Insert the user row if it does not exist yet.
pub async fn ensure_user<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<(), DomainError> {
    let row = user::ActiveModel {
        id: Set(user_id.to_string()),
        created_at: Set(time::now()),
    };
    user::Entity::insert(row)
        .on_conflict(OnConflict::column(user::Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    Ok(())
}
