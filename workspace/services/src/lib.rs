//! Business logic of the CRM: accounts, clients, sales, cashback, reports
//! and subscriptions. Functions take an explicit database connection and,
//! where access rules apply, the authenticated [`auth::Principal`].

pub mod audit;
pub mod auth;
pub mod bank;
pub mod cashback;
pub mod clients;
pub mod error;
pub mod mail;
pub mod managers;
pub mod ownership;
pub mod password;
pub mod purchases;
pub mod reports;
pub mod roles;
pub mod tariffs;
pub mod users;
pub mod visits;

#[cfg(test)]
mod testing;

pub use error::{Result, ServiceError};
