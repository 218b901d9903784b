pub mod initdb;
pub mod serve;
pub mod sweep_subscriptions;

pub use initdb::init_database;
pub use serve::serve;
pub use sweep_subscriptions::sweep_subscriptions;
