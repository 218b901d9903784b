pub mod auth;
pub mod bank;
pub mod clients;
pub mod health;
pub mod mail;
pub mod managers;
pub mod purchases;
pub mod reports;
pub mod roles;
pub mod tariffs;
pub mod transactions;
pub mod users;
pub mod visits;
