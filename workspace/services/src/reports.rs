//! Sales analytics over the purchases of an owner's clients.
//!
//! Every report takes a [`DateFilter`] built from the optional `days`,
//! `startDate` and `endDate` query parameters and is scoped to the clients
//! of the caller's resolved owner. All queries are read-only.

mod filter;
mod metrics;

pub use filter::DateFilter;
pub use metrics::{
    active_clients, activity_days, average_ltv, churn_rate, cohorts, lifetime_values,
    main_metrics, mean_check_by_month, mean_check_for_client, purchase_frequency,
    repeat_purchase_rate,
};
