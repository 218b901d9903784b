//! Root of the SeaORM entity modules describing the CRM schema:
//! accounts and their roles, tariffs, clients with their visits, purchases
//! and cashback ledger, delegated managers, subscriptions and audit rows.

pub mod bank;
pub mod cashback_transaction;
pub mod client;
pub mod log;
pub mod manager;
pub mod purchase;
pub mod role;
pub mod tariff;
pub mod user;
pub mod user_client;
pub mod user_role;
pub mod visit;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::bank::Entity as Bank;
    pub use super::cashback_transaction::Entity as CashbackTransaction;
    pub use super::client::Entity as Client;
    pub use super::log::Entity as Log;
    pub use super::manager::Entity as Manager;
    pub use super::purchase::Entity as Purchase;
    pub use super::role::Entity as Role;
    pub use super::tariff::Entity as Tariff;
    pub use super::user::Entity as User;
    pub use super::user_client::Entity as UserClient;
    pub use super::user_role::Entity as UserRole;
    pub use super::visit::Entity as Visit;
}
