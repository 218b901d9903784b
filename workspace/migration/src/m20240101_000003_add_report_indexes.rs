use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::{cashback_transaction, purchase, visit};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Reports scan purchases per client in creation order
        manager
            .create_index(
                Index::create()
                    .name("idx_purchases_client_created")
                    .table(Purchase::table())
                    .col(Purchase::column(purchase::Column::ClientId))
                    .col(Purchase::column(purchase::Column::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cashback_transactions_client")
                    .table(CashbackTransaction::table())
                    .col(CashbackTransaction::column(
                        cashback_transaction::Column::ClientId,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_visits_client")
                    .table(Visit::table())
                    .col(Visit::column(visit::Column::ClientId))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, table) in [
            ("idx_visits_client", Visit::table()),
            ("idx_cashback_transactions_client", CashbackTransaction::table()),
            ("idx_purchases_client_created", Purchase::table()),
        ] {
            manager
                .drop_index(Index::drop().name(name).table(table).to_owned())
                .await?;
        }

        Ok(())
    }
}
