//! Transport-layer types shared between the service layer and the HTTP API.
//! Report payloads live here so handlers can document them in OpenAPI
//! without depending on how the services compute them.

mod reports;

pub use reports::{
    ActiveClients, ChurnRate, ClientActivityDays, ClientLtv, ClientMeanCheck,
    ClientPurchaseFrequency, CohortBucket, MainMetrics, MonthlyValue, RepeatPurchaseRate,
    round_percentage,
};
