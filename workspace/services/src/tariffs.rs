use model::entities::{tariff, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};

use crate::error::{Result, ServiceError};

#[derive(Debug, Clone)]
pub struct NewTariff {
    pub name: String,
    pub price: Decimal,
    pub max_client: i32,
}

#[derive(Debug, Clone, Default)]
pub struct TariffChanges {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub max_client: Option<i32>,
}

/// Either an existing tariff or one to create on the fly.
#[derive(Debug, Clone)]
pub enum TariffChoice {
    Existing(i32),
    New(NewTariff),
}

fn check_limits(price: Option<Decimal>, max_client: Option<i32>) -> Result<()> {
    if price.is_some_and(|p| p.is_sign_negative()) {
        return Err(ServiceError::Validation("Price must not be negative".to_string()));
    }
    if max_client.is_some_and(|m| m < 0) {
        return Err(ServiceError::Validation(
            "Client limit must not be negative".to_string(),
        ));
    }
    Ok(())
}

async fn insert_tariff<C: ConnectionTrait>(db: &C, new_tariff: NewTariff) -> Result<tariff::Model> {
    check_limits(Some(new_tariff.price), Some(new_tariff.max_client))?;
    let taken = tariff::Entity::find()
        .filter(tariff::Column::Name.eq(new_tariff.name.as_str()))
        .one(db)
        .await?;
    if taken.is_some() {
        return Err(ServiceError::Conflict(format!(
            "Tariff '{}' already exists",
            new_tariff.name
        )));
    }

    Ok(tariff::ActiveModel {
        name: Set(new_tariff.name),
        price: Set(new_tariff.price),
        max_client: Set(new_tariff.max_client),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

#[instrument(skip(db))]
pub async fn list_tariffs(db: &DatabaseConnection) -> Result<Vec<tariff::Model>> {
    Ok(tariff::Entity::find()
        .order_by_asc(tariff::Column::Id)
        .all(db)
        .await?)
}

#[instrument(skip(db))]
pub async fn create_tariff(db: &DatabaseConnection, new_tariff: NewTariff) -> Result<tariff::Model> {
    let created = insert_tariff(db, new_tariff).await?;
    info!("Tariff {} created with id {}", created.name, created.id);
    Ok(created)
}

#[instrument(skip(db))]
pub async fn update_tariff(
    db: &DatabaseConnection,
    tariff_id: i32,
    changes: TariffChanges,
) -> Result<tariff::Model> {
    check_limits(changes.price, changes.max_client)?;
    let existing = tariff::Entity::find_by_id(tariff_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Tariff", tariff_id))?;

    let mut active = existing.into_active_model();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(price) = changes.price {
        active.price = Set(price);
    }
    if let Some(max_client) = changes.max_client {
        active.max_client = Set(max_client);
    }
    let updated = active.update(db).await?;
    info!("Tariff {} updated", updated.id);
    Ok(updated)
}

/// Deletes a tariff nobody is subscribed to.
#[instrument(skip(db))]
pub async fn delete_tariff(db: &DatabaseConnection, tariff_id: i32) -> Result<()> {
    let existing = tariff::Entity::find_by_id(tariff_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Tariff", tariff_id))?;

    let subscribers = existing.find_related(user::Entity).count(db).await?;
    if subscribers > 0 {
        warn!("Tariff {} still has {} users", tariff_id, subscribers);
        return Err(ServiceError::Conflict(format!(
            "Tariff is still assigned to {subscribers} users"
        )));
    }
    existing.delete(db).await?;
    info!("Tariff {} deleted", tariff_id);
    Ok(())
}

/// Moves a user onto a tariff, creating the tariff first when asked to.
#[instrument(skip(db))]
pub async fn assign_tariff(
    db: &DatabaseConnection,
    user_id: i32,
    choice: TariffChoice,
) -> Result<user::Model> {
    let txn = db.begin().await?;
    let account = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))?;

    let tariff_id = match choice {
        TariffChoice::Existing(id) => {
            tariff::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::not_found("Tariff", id))?
                .id
        }
        TariffChoice::New(new_tariff) => insert_tariff(&txn, new_tariff).await?.id,
    };

    let mut active = account.into_active_model();
    active.tariff_id = Set(tariff_id);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!("User {} moved to tariff {}", user_id, tariff_id);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_user, setup_db};

    #[tokio::test]
    async fn test_assign_new_tariff() {
        let db = setup_db().await;
        let account = new_user(&db, "upgrade").await;

        let updated = assign_tariff(
            &db,
            account.id,
            TariffChoice::New(NewTariff {
                name: "Custom".to_string(),
                price: Decimal::new(777, 0),
                max_client: 3,
            }),
        )
        .await
        .unwrap();
        let plan = tariff::Entity::find_by_id(updated.tariff_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(plan.name, "Custom");
        assert_eq!(plan.max_client, 3);
    }

    #[tokio::test]
    async fn test_delete_tariff_in_use_conflicts() {
        let db = setup_db().await;
        new_user(&db, "subscriber").await;

        assert!(matches!(
            delete_tariff(&db, 1).await,
            Err(ServiceError::Conflict(_))
        ));
        delete_tariff(&db, 3).await.unwrap();
        assert_eq!(list_tariffs(&db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_negative_limits_rejected() {
        let db = setup_db().await;
        let changes = TariffChanges {
            max_client: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            update_tariff(&db, 1, changes).await,
            Err(ServiceError::Validation(_))
        ));
    }
}
