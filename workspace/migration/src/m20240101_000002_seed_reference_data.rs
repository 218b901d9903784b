use model::entities::{role, tariff};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Roles in the order their ids are assigned: user(1), manager(2), admin(3).
const ROLES: [(&str, &str); 3] = [
    (role::USER, "Business owner managing own clients"),
    (role::MANAGER, "Delegated account acting for its creator"),
    (role::ADMIN, "System administrator"),
];

/// Tariffs as (name, price, max_client); Basic gets id 1 and is the default.
const TARIFFS: [(&str, i64, i32); 3] = [
    ("Basic", 1000, 100),
    ("Pro", 5000, 500),
    ("Enterprise", 10000, 1000),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, description) in ROLES {
            role::ActiveModel {
                role_name: Set(name.to_string()),
                description: Set(Some(description.to_string())),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }

        for (name, price, max_client) in TARIFFS {
            tariff::ActiveModel {
                name: Set(name.to_string()),
                price: Set(Decimal::new(price, 0)),
                max_client: Set(max_client),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        tariff::Entity::delete_many()
            .filter(tariff::Column::Name.is_in(TARIFFS.map(|(name, _, _)| name)))
            .exec(db)
            .await?;
        role::Entity::delete_many()
            .filter(role::Column::RoleName.is_in(ROLES.map(|(name, _)| name)))
            .exec(db)
            .await?;

        Ok(())
    }
}
