use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tariffs table
        manager
            .create_table(
                Table::create()
                    .table(Tariffs::Table)
                    .if_not_exists()
                    .col(pk_auto(Tariffs::Id))
                    .col(string(Tariffs::Name).unique_key())
                    .col(decimal(Tariffs::Price).decimal_len(16, 4))
                    .col(integer(Tariffs::MaxClient))
                    .col(timestamp_with_time_zone(Tariffs::CreatedAt))
                    .col(timestamp_with_time_zone(Tariffs::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .col(string_null(Users::Name))
                    .col(string(Users::PasswordHash))
                    .col(string(Users::Email).unique_key())
                    .col(string_null(Users::Phone))
                    .col(integer(Users::TariffId))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .col(timestamp_with_time_zone(Users::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_tariff")
                            .from(Users::Table, Users::TariffId)
                            .to(Tariffs::Table, Tariffs::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create roles table
        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(pk_auto(Roles::Id))
                    .col(string(Roles::RoleName).unique_key())
                    .col(string_null(Roles::Description))
                    .to_owned(),
            )
            .await?;

        // Create user_roles table (join table)
        manager
            .create_table(
                Table::create()
                    .table(UserRoles::Table)
                    .if_not_exists()
                    .col(integer(UserRoles::UserId))
                    .col(integer(UserRoles::RoleId))
                    .primary_key(
                        Index::create()
                            .name("pk_user_roles")
                            .col(UserRoles::UserId)
                            .col(UserRoles::RoleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_roles_user")
                            .from(UserRoles::Table, UserRoles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_roles_role")
                            .from(UserRoles::Table, UserRoles::RoleId)
                            .to(Roles::Table, Roles::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create clients table
        manager
            .create_table(
                Table::create()
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(pk_auto(Clients::Id))
                    .col(string_null(Clients::Name))
                    .col(string(Clients::Phone))
                    .col(string_null(Clients::Email))
                    .col(date_null(Clients::BirthDate))
                    .col(integer(Clients::CashbackPercentage).default(0))
                    .col(timestamp_with_time_zone(Clients::CreatedAt))
                    .col(timestamp_with_time_zone(Clients::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create user_clients table (join table)
        manager
            .create_table(
                Table::create()
                    .table(UserClients::Table)
                    .if_not_exists()
                    .col(integer(UserClients::UserId))
                    .col(integer(UserClients::ClientId))
                    .primary_key(
                        Index::create()
                            .name("pk_user_clients")
                            .col(UserClients::UserId)
                            .col(UserClients::ClientId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_clients_user")
                            .from(UserClients::Table, UserClients::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_clients_client")
                            .from(UserClients::Table, UserClients::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create managers table
        manager
            .create_table(
                Table::create()
                    .table(Managers::Table)
                    .if_not_exists()
                    .col(pk_auto(Managers::Id))
                    .col(string(Managers::Username))
                    .col(integer(Managers::UserCreatedId))
                    .col(integer(Managers::UserManagerId).unique_key())
                    .col(timestamp_with_time_zone(Managers::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_managers_creator")
                            .from(Managers::Table, Managers::UserCreatedId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_managers_account")
                            .from(Managers::Table, Managers::UserManagerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create visits table
        manager
            .create_table(
                Table::create()
                    .table(Visits::Table)
                    .if_not_exists()
                    .col(pk_auto(Visits::Id))
                    .col(integer(Visits::ClientId))
                    .col(timestamp_with_time_zone(Visits::VisitDate))
                    .col(timestamp_with_time_zone(Visits::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_visits_client")
                            .from(Visits::Table, Visits::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create purchases table
        manager
            .create_table(
                Table::create()
                    .table(Purchases::Table)
                    .if_not_exists()
                    .col(pk_auto(Purchases::Id))
                    .col(integer(Purchases::UserId))
                    .col(integer(Purchases::ClientId))
                    .col(integer(Purchases::VisitId))
                    .col(decimal(Purchases::Amount).decimal_len(16, 4))
                    .col(timestamp_with_time_zone(Purchases::CreatedAt))
                    .col(timestamp_with_time_zone(Purchases::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchases_user")
                            .from(Purchases::Table, Purchases::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchases_client")
                            .from(Purchases::Table, Purchases::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_purchases_visit")
                            .from(Purchases::Table, Purchases::VisitId)
                            .to(Visits::Table, Visits::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create cashback_transactions table
        manager
            .create_table(
                Table::create()
                    .table(CashbackTransactions::Table)
                    .if_not_exists()
                    .col(pk_auto(CashbackTransactions::Id))
                    .col(integer(CashbackTransactions::ClientId))
                    .col(decimal(CashbackTransactions::Amount).decimal_len(16, 4))
                    .col(timestamp_with_time_zone(CashbackTransactions::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cashback_transactions_client")
                            .from(CashbackTransactions::Table, CashbackTransactions::ClientId)
                            .to(Clients::Table, Clients::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create bank table
        manager
            .create_table(
                Table::create()
                    .table(Bank::Table)
                    .if_not_exists()
                    .col(pk_auto(Bank::Id))
                    .col(integer(Bank::UserId))
                    .col(string(Bank::Plan).string_len(16))
                    .col(decimal(Bank::Amount).decimal_len(16, 4))
                    .col(integer(Bank::CountMonth))
                    .col(boolean(Bank::IsSuccess).default(false))
                    .col(timestamp_with_time_zone_null(Bank::ExpiresAt))
                    .col(timestamp_with_time_zone(Bank::CreatedAt))
                    .col(timestamp_with_time_zone(Bank::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bank_user")
                            .from(Bank::Table, Bank::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create logs table; user_id carries no foreign key
        manager
            .create_table(
                Table::create()
                    .table(Logs::Table)
                    .if_not_exists()
                    .col(pk_auto(Logs::Id))
                    .col(integer(Logs::UserId))
                    .col(string(Logs::Action))
                    .col(string(Logs::Entity))
                    .col(integer(Logs::EntityId))
                    .col(timestamp_with_time_zone(Logs::Timestamp))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(Logs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Bank::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CashbackTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Purchases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Visits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Managers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserClients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserRoles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Roles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tariffs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Tariffs {
    Table,
    Id,
    Name,
    Price,
    MaxClient,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Name,
    PasswordHash,
    Email,
    Phone,
    TariffId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Roles {
    Table,
    Id,
    RoleName,
    Description,
}

#[derive(DeriveIden)]
enum UserRoles {
    Table,
    UserId,
    RoleId,
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
    Name,
    Phone,
    Email,
    BirthDate,
    CashbackPercentage,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum UserClients {
    Table,
    UserId,
    ClientId,
}

#[derive(DeriveIden)]
enum Managers {
    Table,
    Id,
    Username,
    UserCreatedId,
    UserManagerId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Visits {
    Table,
    Id,
    ClientId,
    VisitDate,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Purchases {
    Table,
    Id,
    UserId,
    ClientId,
    VisitId,
    Amount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CashbackTransactions {
    Table,
    Id,
    ClientId,
    Amount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Bank {
    Table,
    Id,
    UserId,
    Plan,
    Amount,
    CountMonth,
    IsSuccess,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Logs {
    Table,
    Id,
    UserId,
    Action,
    Entity,
    EntityId,
    Timestamp,
}
