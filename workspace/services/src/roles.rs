use model::entities::{role, user, user_role};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{Result, ServiceError};

/// Names of every role held by `user_id`, ordered by role id.
pub async fn role_names_for_user<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<Vec<String>> {
    let links = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .order_by_asc(user_role::Column::RoleId)
        .find_also_related(role::Entity)
        .all(db)
        .await?;
    Ok(links
        .into_iter()
        .filter_map(|(_, r)| r.map(|r| r.role_name))
        .collect())
}

pub async fn find_role_by_name<C: ConnectionTrait>(db: &C, name: &str) -> Result<role::Model> {
    role::Entity::find()
        .filter(role::Column::RoleName.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Role '{name}' was not found")))
}

/// Grants a role by name. Granting a role the user already holds is a no-op.
#[instrument(skip(db))]
pub async fn assign_role<C: ConnectionTrait>(db: &C, user_id: i32, role_name: &str) -> Result<()> {
    let target = find_role_by_name(db, role_name).await?;
    let existing = user_role::Entity::find_by_id((user_id, target.id)).one(db).await?;
    if existing.is_some() {
        debug!("User {} already has role {}", user_id, role_name);
        return Ok(());
    }

    user_role::ActiveModel {
        user_id: Set(user_id),
        role_id: Set(target.id),
    }
    .insert(db)
    .await?;
    info!("Granted role {} to user {}", role_name, user_id);
    Ok(())
}

#[instrument(skip(db))]
pub async fn list_roles(db: &DatabaseConnection) -> Result<Vec<role::Model>> {
    trace!("Entering list_roles function");
    Ok(role::Entity::find()
        .order_by_asc(role::Column::Id)
        .all(db)
        .await?)
}

#[instrument(skip(db))]
pub async fn create_role(
    db: &DatabaseConnection,
    role_name: &str,
    description: Option<String>,
) -> Result<role::Model> {
    let role_name = role_name.trim();
    if role_name.is_empty() {
        return Err(ServiceError::Validation("Role name must not be empty".to_string()));
    }
    if find_role_by_name(db, role_name).await.is_ok() {
        warn!("Role {} already exists", role_name);
        return Err(ServiceError::Conflict(format!("Role '{role_name}' already exists")));
    }

    let created = role::ActiveModel {
        role_name: Set(role_name.to_string()),
        description: Set(description),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!("Role {} created with id {}", created.role_name, created.id);
    Ok(created)
}

#[instrument(skip(db))]
pub async fn delete_role(db: &DatabaseConnection, role_id: i32) -> Result<()> {
    let existing = role::Entity::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Role", role_id))?;
    existing.delete(db).await?;
    info!("Role {} deleted", role_id);
    Ok(())
}

/// Replaces every role of a user with the single named role.
#[instrument(skip(db))]
pub async fn replace_role(db: &DatabaseConnection, user_id: i32, role_name: &str) -> Result<Vec<String>> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))?;

    let txn = db.begin().await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    assign_role(&txn, user_id, role_name).await?;
    let roles = role_names_for_user(&txn, user_id).await?;
    txn.commit().await?;

    info!("User {} now holds roles {:?}", user_id, roles);
    Ok(roles)
}

/// Adds a role to a user, keeping the existing ones.
#[instrument(skip(db))]
pub async fn grant_role(db: &DatabaseConnection, user_id: i32, role_name: &str) -> Result<Vec<String>> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))?;
    assign_role(db, user_id, role_name).await?;
    role_names_for_user(db, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_user, setup_db};

    #[tokio::test]
    async fn test_assign_is_idempotent() {
        let db = setup_db().await;
        let account = new_user(&db, "roles").await;

        assign_role(&db, account.id, role::USER).await.unwrap();
        let roles = grant_role(&db, account.id, role::ADMIN).await.unwrap();
        assert_eq!(roles, vec![role::USER.to_string(), role::ADMIN.to_string()]);
    }

    #[tokio::test]
    async fn test_replace_role() {
        let db = setup_db().await;
        let account = new_user(&db, "promoted").await;

        let roles = replace_role(&db, account.id, role::MANAGER).await.unwrap();
        assert_eq!(roles, vec![role::MANAGER.to_string()]);

        let err = replace_role(&db, account.id, "wizard").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        // Failed replacement rolled back
        assert_eq!(
            role_names_for_user(&db, account.id).await.unwrap(),
            vec![role::MANAGER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_duplicate_role() {
        let db = setup_db().await;
        let created = create_role(&db, "auditor", None).await.unwrap();
        assert_eq!(created.role_name, "auditor");
        assert!(matches!(
            create_role(&db, "auditor", None).await,
            Err(ServiceError::Conflict(_))
        ));
        delete_role(&db, created.id).await.unwrap();
        assert_eq!(list_roles(&db).await.unwrap().len(), 3);
    }
}
