//! Delegated sub-accounts.
//!
//! A manager is a full user account with the `manager` role plus a
//! `managers` row pointing back at the user that created it. Everything the
//! manager does is attributed to the creator through
//! [`crate::ownership::resolve_owner`].

use model::entities::{manager, purchase, role, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use tracing::{debug, info, instrument, trace, warn};

use crate::audit;
use crate::auth::Principal;
use crate::error::{Result, ServiceError};
use crate::users::{NewUser, UserChanges, apply_changes, create_account, get_user};

const ENTITY: &str = "Manager";

/// A `managers` row together with the account it delegates to.
#[derive(Debug, Clone)]
pub struct ManagerAccount {
    pub manager: manager::Model,
    pub account: user::Model,
}

#[derive(Clone, Default)]
pub struct ManagerChanges {
    pub username: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Creates the manager account on the creator's tariff.
#[instrument(skip(db, principal, new_manager), fields(creator = principal.user_id))]
pub async fn create_manager(
    db: &DatabaseConnection,
    principal: &Principal,
    new_manager: NewUser,
) -> Result<ManagerAccount> {
    trace!("Entering create_manager function");
    let creator = get_user(db, principal.user_id).await?;

    let txn = db.begin().await?;
    let account = create_account(&txn, new_manager, creator.tariff_id, role::MANAGER).await?;
    let manager = manager::ActiveModel {
        username: Set(account.username.clone()),
        user_created_id: Set(creator.id),
        user_manager_id: Set(account.id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("User {} created manager {} ({})", creator.id, manager.id, account.username);
    audit::record(db, creator.id, audit::CREATE, ENTITY, manager.id).await;
    Ok(ManagerAccount { manager, account })
}

#[instrument(skip(db, principal), fields(creator = principal.user_id))]
pub async fn list_managers(db: &DatabaseConnection, principal: &Principal) -> Result<Vec<ManagerAccount>> {
    let rows = manager::Entity::find()
        .filter(manager::Column::UserCreatedId.eq(principal.user_id))
        .order_by_asc(manager::Column::Id)
        .all(db)
        .await?;

    let mut managers = Vec::with_capacity(rows.len());
    for manager in rows {
        let account = get_user(db, manager.user_manager_id).await?;
        managers.push(ManagerAccount { manager, account });
    }
    debug!("User {} has {} managers", principal.user_id, managers.len());
    Ok(managers)
}

/// A manager row owned by the caller. Anybody else's manager is reported missing.
async fn find_own_manager(
    db: &DatabaseConnection,
    principal: &Principal,
    manager_id: i32,
) -> Result<manager::Model> {
    let found = manager::Entity::find_by_id(manager_id)
        .filter(manager::Column::UserCreatedId.eq(principal.user_id))
        .one(db)
        .await?;
    found.ok_or_else(|| {
        warn!("Manager {} not found for user {}", manager_id, principal.user_id);
        ServiceError::NotFound("Manager not found or does not belong to the user".to_string())
    })
}

#[instrument(skip(db, principal, changes), fields(creator = principal.user_id))]
pub async fn update_manager(
    db: &DatabaseConnection,
    principal: &Principal,
    manager_id: i32,
    changes: ManagerChanges,
) -> Result<ManagerAccount> {
    let manager = find_own_manager(db, principal, manager_id).await?;
    let account = get_user(db, manager.user_manager_id).await?;

    let txn = db.begin().await?;
    let account = apply_changes(
        &txn,
        account,
        UserChanges {
            username: changes.username,
            name: None,
            email: changes.email,
            phone: changes.phone,
            password: changes.password,
        },
    )
    .await?;
    let manager = if manager.username != account.username {
        let mut active = manager.into_active_model();
        active.username = Set(account.username.clone());
        active.update(&txn).await?
    } else {
        manager
    };
    txn.commit().await?;

    info!("Manager {} updated", manager.id);
    audit::record(db, principal.user_id, audit::UPDATE, ENTITY, manager.id).await;
    Ok(ManagerAccount { manager, account })
}

/// Removes the managers row and the manager's account.
///
/// Purchases the manager recorded are handed to the creator first so the
/// sales history survives the account.
#[instrument(skip(db, principal), fields(creator = principal.user_id))]
pub async fn delete_manager(db: &DatabaseConnection, principal: &Principal, manager_id: i32) -> Result<()> {
    let manager = find_own_manager(db, principal, manager_id).await?;
    let account_id = manager.user_manager_id;

    let txn = db.begin().await?;
    let moved = purchase::Entity::update_many()
        .col_expr(purchase::Column::UserId, Expr::value(manager.user_created_id))
        .filter(purchase::Column::UserId.eq(account_id))
        .exec(&txn)
        .await?;
    manager.delete(&txn).await?;
    user::Entity::delete_by_id(account_id).exec(&txn).await?;
    txn.commit().await?;

    info!(
        "Manager {} deleted, {} purchases moved to user {}",
        manager_id, moved.rows_affected, principal.user_id
    );
    audit::record(db, principal.user_id, audit::DELETE, ENTITY, manager_id).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::resolve_owner;
    use crate::purchases::create_purchase;
    use crate::roles::role_names_for_user;
    use crate::testing::{new_client, new_user, principal_for, setup_db};
    use rust_decimal::Decimal;

    fn manager_input(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            name: None,
            email: format!("{name}@staff.test"),
            phone: Some("+79001112233".to_string()),
            password: "staffpass".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_manager_inherits_tariff() {
        let db = setup_db().await;
        let owner = new_user(&db, "boss").await;
        let created = create_manager(&db, &principal_for(&owner, &[role::USER]), manager_input("clerk"))
            .await
            .unwrap();

        assert_eq!(created.account.tariff_id, owner.tariff_id);
        assert_eq!(created.manager.user_created_id, owner.id);
        assert_eq!(
            role_names_for_user(&db, created.account.id).await.unwrap(),
            vec![role::MANAGER.to_string()]
        );
        assert_eq!(resolve_owner(&db, created.account.id).await.unwrap(), owner.id);
    }

    #[tokio::test]
    async fn test_only_creator_sees_and_edits() {
        let db = setup_db().await;
        let owner = new_user(&db, "lead").await;
        let stranger = new_user(&db, "rival").await;
        let as_owner = principal_for(&owner, &[role::USER]);
        let as_stranger = principal_for(&stranger, &[role::USER]);
        let created = create_manager(&db, &as_owner, manager_input("deputy")).await.unwrap();

        assert_eq!(list_managers(&db, &as_owner).await.unwrap().len(), 1);
        assert!(list_managers(&db, &as_stranger).await.unwrap().is_empty());

        let changes = ManagerChanges {
            username: Some("deputy_renamed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update_manager(&db, &as_stranger, created.manager.id, changes.clone()).await,
            Err(ServiceError::NotFound(_))
        ));
        let updated = update_manager(&db, &as_owner, created.manager.id, changes).await.unwrap();
        assert_eq!(updated.account.username, "deputy_renamed");
        assert_eq!(updated.manager.username, "deputy_renamed");
    }

    #[tokio::test]
    async fn test_delete_manager_keeps_purchases() {
        let db = setup_db().await;
        let owner = new_user(&db, "chief").await;
        let as_owner = principal_for(&owner, &[role::USER]);
        let client = new_client(&db, &owner, 5).await;
        let created = create_manager(&db, &as_owner, manager_input("temp")).await.unwrap();

        let receipt = create_purchase(
            &db,
            &principal_for(&created.account, &[role::MANAGER]),
            client.id,
            Decimal::new(300, 0),
        )
        .await
        .unwrap();

        delete_manager(&db, &as_owner, created.manager.id).await.unwrap();

        assert!(user::Entity::find_by_id(created.account.id).one(&db).await.unwrap().is_none());
        assert!(manager::Entity::find_by_id(created.manager.id).one(&db).await.unwrap().is_none());
        let kept = purchase::Entity::find_by_id(receipt.purchase.id).one(&db).await.unwrap().unwrap();
        assert_eq!(kept.user_id, owner.id);
    }
}
