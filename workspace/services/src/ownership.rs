//! Who owns what.
//!
//! A manager account never owns clients itself: everything it creates or
//! reads belongs to the user who created the manager. [`resolve_owner`] is
//! the single place that indirection is applied.

use model::entities::{client, manager, user_client};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{debug, instrument, warn};

use crate::auth::Principal;
use crate::error::{Result, ServiceError};

/// Returns the creating user's id for a manager account, the id itself otherwise.
#[instrument(skip(db))]
pub async fn resolve_owner<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<i32> {
    let delegation = manager::Entity::find()
        .filter(manager::Column::UserManagerId.eq(user_id))
        .one(db)
        .await?;
    let owner = delegation.map_or(user_id, |m| m.user_created_id);
    debug!("User {} acts for owner {}", user_id, owner);
    Ok(owner)
}

pub async fn owns_client<C: ConnectionTrait>(db: &C, owner_id: i32, client_id: i32) -> Result<bool> {
    Ok(user_client::Entity::find_by_id((owner_id, client_id))
        .one(db)
        .await?
        .is_some())
}

/// Loads a client the principal may act on.
///
/// Missing clients are 404, clients of somebody else 403. Admins pass.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn ensure_client_access<C: ConnectionTrait>(
    db: &C,
    principal: &Principal,
    client_id: i32,
) -> Result<client::Model> {
    let client = client::Entity::find_by_id(client_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Client", client_id))?;

    if principal.is_admin() {
        return Ok(client);
    }

    let owner = resolve_owner(db, principal.user_id).await?;
    if owns_client(db, owner, client_id).await? {
        Ok(client)
    } else {
        warn!("User {} tried to access client {} of another owner", principal.user_id, client_id);
        Err(ServiceError::Forbidden(format!(
            "Client with id {client_id} belongs to another user"
        )))
    }
}

/// Ids of every client linked to `owner_id`.
pub async fn owned_client_ids<C: ConnectionTrait>(db: &C, owner_id: i32) -> Result<Vec<i32>> {
    Ok(user_client::Entity::find()
        .filter(user_client::Column::UserId.eq(owner_id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.client_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_client, new_manager, new_user, principal_for, setup_db};
    use model::entities::role;

    #[tokio::test]
    async fn test_manager_resolves_to_creator() {
        let db = setup_db().await;
        let owner = new_user(&db, "creator").await;
        let helper = new_manager(&db, &owner, "helper").await;

        assert_eq!(resolve_owner(&db, helper.id).await.unwrap(), owner.id);
        assert_eq!(resolve_owner(&db, owner.id).await.unwrap(), owner.id);
    }

    #[tokio::test]
    async fn test_client_access_rules() {
        let db = setup_db().await;
        let owner = new_user(&db, "alice").await;
        let stranger = new_user(&db, "mallory").await;
        let helper = new_manager(&db, &owner, "alice_helper").await;
        let client = new_client(&db, &owner, 5).await;

        let as_owner = principal_for(&owner, &[role::USER]);
        let as_helper = principal_for(&helper, &[role::MANAGER]);
        let as_stranger = principal_for(&stranger, &[role::USER]);
        let as_admin = principal_for(&stranger, &[role::ADMIN]);

        assert!(ensure_client_access(&db, &as_owner, client.id).await.is_ok());
        assert!(ensure_client_access(&db, &as_helper, client.id).await.is_ok());
        assert!(ensure_client_access(&db, &as_admin, client.id).await.is_ok());
        assert!(matches!(
            ensure_client_access(&db, &as_stranger, client.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_client_access(&db, &as_owner, 9999).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
