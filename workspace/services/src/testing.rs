//! Fixtures shared by the service tests.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use migration::{Migrator, MigratorTrait};
use model::entities::{client, manager, role, tariff, user, user_client};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, IntoActiveModel,
    Set,
};

use crate::auth::Principal;
use crate::password::hash_password;
use crate::roles::assign_role;

/// Create an in-memory SQLite database with the full schema and seed data
pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// Every fixture user logs in with the password `password`.
fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("password").expect("hashing works"))
        .clone()
}

pub async fn new_user(db: &DatabaseConnection, name: &str) -> user::Model {
    static USER_ID: AtomicU64 = AtomicU64::new(0);
    let n = USER_ID.fetch_add(1, Ordering::SeqCst);

    let account = user::ActiveModel {
        username: Set(format!("{name}_{n}")),
        email: Set(format!("{name}_{n}@example.com")),
        password_hash: Set(password_hash()),
        tariff_id: Set(1),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user");
    assign_role(db, account.id, role::USER)
        .await
        .expect("Failed to assign role");
    account
}

/// A manager account delegated by `owner`.
pub async fn new_manager(db: &DatabaseConnection, owner: &user::Model, name: &str) -> user::Model {
    let account = user::ActiveModel {
        username: Set(format!("{name}_of_{}", owner.id)),
        email: Set(format!("{name}_of_{}@example.com", owner.id)),
        password_hash: Set(password_hash()),
        tariff_id: Set(owner.tariff_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create manager user");
    assign_role(db, account.id, role::MANAGER)
        .await
        .expect("Failed to assign role");
    manager::ActiveModel {
        username: Set(account.username.clone()),
        user_created_id: Set(owner.id),
        user_manager_id: Set(account.id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create manager row");
    account
}

pub async fn new_client(db: &DatabaseConnection, owner: &user::Model, cashback_percentage: i32) -> client::Model {
    static CLIENT_ID: AtomicU64 = AtomicU64::new(0);
    let n = CLIENT_ID.fetch_add(1, Ordering::SeqCst);

    let client = client::ActiveModel {
        name: Set(Some(format!("Client {n}"))),
        phone: Set(format!("+7900{n:07}")),
        email: Set(Some(format!("client{n}@example.com"))),
        birth_date: Set(None),
        cashback_percentage: Set(cashback_percentage),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create client");
    user_client::ActiveModel {
        user_id: Set(owner.id),
        client_id: Set(client.id),
    }
    .insert(db)
    .await
    .expect("Failed to link client");
    client
}

pub async fn set_client_limit(db: &DatabaseConnection, tariff_id: i32, max_client: i32) {
    let mut plan = tariff::Entity::find_by_id(tariff_id)
        .one(db)
        .await
        .expect("query works")
        .expect("tariff exists")
        .into_active_model();
    plan.max_client = Set(max_client);
    plan.update(db).await.expect("Failed to update tariff");
}

pub fn principal_for(account: &user::Model, roles: &[&str]) -> Principal {
    Principal {
        user_id: account.id,
        username: account.username.clone(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    }
}
