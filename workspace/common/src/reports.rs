use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A value attributed to one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MonthlyValue {
    /// Month in `YYYY-MM` form
    pub month: String,
    #[schema(value_type = String)]
    pub value: Decimal,
}

/// Average order value of a single client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ClientMeanCheck {
    pub client_id: i32,
    pub purchase_count: u64,
    #[schema(value_type = String)]
    pub average_check: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ActiveClients {
    pub total_clients: u64,
    /// Clients with at least one purchase in the range
    pub active_clients: u64,
    pub active_percentage: f64,
}

/// Number of clients whose first purchase fell into `month`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CohortBucket {
    pub month: String,
    pub clients: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RepeatPurchaseRate {
    pub total_clients: u64,
    /// Clients with more than one purchase in the range
    pub repeat_clients: u64,
    pub repeat_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ChurnRate {
    pub total_clients: u64,
    /// Clients without any purchase in the range
    pub churned_clients: u64,
    pub churn_percentage: f64,
}

/// Lifetime value: the sum of a client's purchases.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ClientLtv {
    pub client_id: i32,
    pub name: Option<String>,
    #[schema(value_type = String)]
    pub ltv: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ClientActivityDays {
    pub client_id: i32,
    /// Distinct calendar days with at least one purchase
    pub activity_days: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ClientPurchaseFrequency {
    pub client_id: i32,
    pub purchases: u64,
    /// Purchases per day over the requested range
    pub frequency: f64,
}

/// The dashboard bundle computed in one request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MainMetrics {
    pub mean_check: Vec<MonthlyValue>,
    pub active_clients: ActiveClients,
    pub repeat_purchase: RepeatPurchaseRate,
    pub churn: ChurnRate,
    pub ltv: Vec<ClientLtv>,
    pub activity_days: Vec<ClientActivityDays>,
    pub purchase_frequency: Vec<ClientPurchaseFrequency>,
}

/// `part / total` as a percentage with two decimals; 0 for an empty total.
pub fn round_percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 10000.0 / total as f64).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_percentage() {
        assert_eq!(round_percentage(0, 0), 0.0);
        assert_eq!(round_percentage(1, 3), 33.33);
        assert_eq!(round_percentage(2, 3), 66.67);
        assert_eq!(round_percentage(4, 4), 100.0);
    }

    #[test]
    fn test_decimal_serializes_as_string() {
        let value = MonthlyValue {
            month: "2024-03".to_string(),
            value: Decimal::new(12345, 2),
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["month"], "2024-03");
        assert_eq!(json["value"], "123.45");
    }
}
