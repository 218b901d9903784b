//! Subscription payments through the hosted payment gateway.
//!
//! Checkout inserts a pending `bank` row and returns a signed form the
//! browser posts to the gateway. The gateway redirects back to
//! `{success_url}/{order_id}`, which confirms the row and starts the
//! subscription period.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Months, Utc};
use model::entities::bank::{self, Plan};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info, instrument, trace, warn};

use crate::audit;
use crate::error::{Result, ServiceError};
use crate::users::get_user;

const ENTITY: &str = "Bank";

/// Merchant credentials and redirect target of the payment gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    pub merchant: String,
    pub secret: String,
    pub success_url: String,
    pub testing: bool,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("merchant", &self.merchant)
            .field("success_url", &self.success_url)
            .field("testing", &self.testing)
            .finish_non_exhaustive()
    }
}

/// The signed form handed to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentForm {
    pub merchant: String,
    pub amount: String,
    pub order_id: i32,
    pub description: String,
    pub success_url: String,
    pub testing: String,
    pub receipt_contact: String,
    pub unix_timestamp: String,
    pub signature: String,
}

impl PaymentForm {
    fn fields(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("merchant", self.merchant.clone()),
            ("amount", self.amount.clone()),
            ("order_id", self.order_id.to_string()),
            ("description", self.description.clone()),
            ("success_url", self.success_url.clone()),
            ("testing", self.testing.clone()),
            ("receipt_contact", self.receipt_contact.clone()),
            ("unix_timestamp", self.unix_timestamp.clone()),
            ("signature", self.signature.clone()),
        ])
    }
}

/// Price of `months` of a plan. Only 1, 3, 6 and 12 months are sold.
pub fn plan_price(plan: Plan, months: i32) -> Result<Decimal> {
    let price = match (plan, months) {
        (Plan::Start, 1) => 500,
        (Plan::Start, 3) => 1425,
        (Plan::Start, 6) => 2700,
        (Plan::Start, 12) => 5100,
        (Plan::Business, 1) => 1000,
        (Plan::Business, 3) => 2850,
        (Plan::Business, 6) => 5400,
        (Plan::Business, 12) => 9600,
        _ => {
            return Err(ServiceError::Validation(format!(
                "Subscriptions are sold for 1, 3, 6 or 12 months, not {months}"
            )));
        }
    };
    Ok(Decimal::from(price))
}

pub fn plan_title(plan: Plan) -> &'static str {
    match plan {
        Plan::Start => "Start",
        Plan::Business => "Business",
    }
}

fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// Gateway signature over the form fields.
///
/// `signature` and empty values are skipped; the rest is sorted by key and
/// joined as `key=base64(value)` with `&`. The result is hashed twice, each
/// time prefixed with the secret.
pub fn sign<'a, I>(secret: &str, fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = fields
        .into_iter()
        .filter(|(key, value)| *key != "signature" && !value.is_empty())
        .collect();
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={}", STANDARD.encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    let first = sha1_hex(&format!("{secret}{joined}"));
    sha1_hex(&format!("{secret}{first}"))
}

/// Registers a pending payment and builds the gateway form for it.
#[instrument(skip(db, gateway))]
pub async fn create_checkout(
    db: &DatabaseConnection,
    gateway: &GatewayConfig,
    user_id: i32,
    plan: Plan,
    months: i32,
) -> Result<PaymentForm> {
    trace!("Entering create_checkout function");
    let amount = plan_price(plan, months)?;
    let buyer = get_user(db, user_id).await?;

    let order = bank::ActiveModel {
        user_id: Set(buyer.id),
        plan: Set(plan),
        amount: Set(amount),
        count_month: Set(months),
        is_success: Set(false),
        expires_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut form = PaymentForm {
        merchant: gateway.merchant.clone(),
        amount: amount.to_string(),
        order_id: order.id,
        description: format!("{} subscription for {} months", plan_title(plan), months),
        success_url: format!("{}/{}", gateway.success_url.trim_end_matches('/'), order.id),
        testing: if gateway.testing { "1" } else { "0" }.to_string(),
        receipt_contact: buyer.email,
        unix_timestamp: Utc::now().timestamp().to_string(),
        signature: String::new(),
    };
    let fields = form.fields();
    form.signature = sign(&gateway.secret, fields.iter().map(|(k, v)| (*k, v.as_str())));

    info!("Checkout {} for user {}: {:?} x{} = {}", order.id, user_id, plan, months, amount);
    Ok(form)
}

/// Marks a payment successful and starts its subscription period.
///
/// Confirming an already confirmed payment returns it unchanged.
#[instrument(skip(db))]
pub async fn confirm_payment(db: &DatabaseConnection, user_id: i32, order_id: i32) -> Result<bank::Model> {
    let txn = db.begin().await?;
    let order = bank::Entity::find_by_id(order_id)
        .filter(bank::Column::UserId.eq(user_id))
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Payment", order_id))?;

    if order.is_success {
        debug!("Payment {} already confirmed", order_id);
        return Ok(order);
    }

    let months = u32::try_from(order.count_month)
        .map_err(|_| ServiceError::Internal(format!("Payment {order_id} has a negative period")))?;
    let expires_at = order
        .created_at
        .checked_add_months(Months::new(months))
        .ok_or_else(|| ServiceError::Internal(format!("Payment {order_id} expiry overflows")))?;

    let mut active = order.into_active_model();
    active.is_success = Set(true);
    active.expires_at = Set(Some(expires_at));
    let confirmed = active.update(&txn).await?;
    txn.commit().await?;

    info!("Payment {} confirmed, subscription runs until {}", order_id, expires_at);
    audit::record(db, user_id, audit::PAYMENT, ENTITY, order_id).await;
    Ok(confirmed)
}

/// The subscription currently in force, the latest-expiring one if several.
#[instrument(skip(db))]
pub async fn subscription_status(db: &DatabaseConnection, user_id: i32) -> Result<Option<bank::Model>> {
    Ok(bank::Entity::find()
        .filter(bank::Column::UserId.eq(user_id))
        .filter(bank::Column::IsSuccess.eq(true))
        .filter(bank::Column::ExpiresAt.gt(Utc::now()))
        .order_by_desc(bank::Column::ExpiresAt)
        .one(db)
        .await?)
}

/// Deactivates every successful subscription that expired before `now`.
#[instrument(skip(db))]
pub async fn expire_subscriptions(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64> {
    trace!("Entering expire_subscriptions function");
    let result = bank::Entity::update_many()
        .col_expr(bank::Column::IsSuccess, Expr::value(false))
        .col_expr(bank::Column::UpdatedAt, Expr::value(now))
        .filter(bank::Column::IsSuccess.eq(true))
        .filter(bank::Column::ExpiresAt.lt(now))
        .exec(db)
        .await?;

    let expired = result.rows_affected;
    if expired > 0 {
        info!("Expired {} subscriptions", expired);
    } else {
        debug!("No subscriptions to expire");
    }
    let entity_id = i32::try_from(expired).unwrap_or_else(|_| {
        warn!("Expired count {} does not fit the audit row", expired);
        i32::MAX
    });
    audit::record(db, audit::SYSTEM_USER_ID, audit::EXPIRE, "Subscription", entity_id).await;
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_user, setup_db};
    use chrono::Duration;
    use model::entities::log;

    fn gateway() -> GatewayConfig {
        GatewayConfig {
            merchant: "m-1".to_string(),
            secret: "s3cret".to_string(),
            success_url: "https://crm.test/bank/success/".to_string(),
            testing: true,
        }
    }

    #[test]
    fn test_signature_matches_gateway_algorithm() {
        let fields = [
            ("merchant", "m-1"),
            ("amount", "500"),
            ("order_id", "7"),
            ("testing", "1"),
            ("description", ""),
            ("signature", "zzz"),
        ];
        assert_eq!(sign("s3cret", fields), "112a51dc5ae8af84a596db551efd97baa0ba2b87");
    }

    #[test]
    fn test_price_tiers() {
        assert_eq!(plan_price(Plan::Start, 3).unwrap(), Decimal::from(1425));
        assert_eq!(plan_price(Plan::Business, 12).unwrap(), Decimal::from(9600));
        assert!(matches!(plan_price(Plan::Start, 2), Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_checkout_and_confirm() {
        let db = setup_db().await;
        let buyer = new_user(&db, "payer").await;

        let form = create_checkout(&db, &gateway(), buyer.id, Plan::Business, 6).await.unwrap();
        assert_eq!(form.amount, "5400");
        assert_eq!(form.success_url, format!("https://crm.test/bank/success/{}", form.order_id));
        assert_eq!(form.receipt_contact, buyer.email);
        let fields = form.fields();
        assert_eq!(
            form.signature,
            sign("s3cret", fields.iter().map(|(k, v)| (*k, v.as_str())))
        );
        assert!(subscription_status(&db, buyer.id).await.unwrap().is_none());

        let confirmed = confirm_payment(&db, buyer.id, form.order_id).await.unwrap();
        assert!(confirmed.is_success);
        assert_eq!(
            confirmed.expires_at,
            confirmed.created_at.checked_add_months(Months::new(6))
        );
        let again = confirm_payment(&db, buyer.id, form.order_id).await.unwrap();
        assert_eq!(again.expires_at, confirmed.expires_at);
        assert!(subscription_status(&db, buyer.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_confirm_requires_own_order() {
        let db = setup_db().await;
        let buyer = new_user(&db, "buyer").await;
        let other = new_user(&db, "freeloader").await;
        let form = create_checkout(&db, &gateway(), buyer.id, Plan::Start, 1).await.unwrap();

        assert!(matches!(
            confirm_payment(&db, other.id, form.order_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_sweep() {
        let db = setup_db().await;
        let buyer = new_user(&db, "lapsed").await;
        let form = create_checkout(&db, &gateway(), buyer.id, Plan::Start, 1).await.unwrap();
        confirm_payment(&db, buyer.id, form.order_id).await.unwrap();

        assert_eq!(expire_subscriptions(&db, Utc::now()).await.unwrap(), 0);
        let later = Utc::now() + Duration::days(40);
        assert_eq!(expire_subscriptions(&db, later).await.unwrap(), 1);

        let row = bank::Entity::find_by_id(form.order_id).one(&db).await.unwrap().unwrap();
        assert!(!row.is_success);
        let system_rows = log::Entity::find()
            .filter(log::Column::UserId.eq(audit::SYSTEM_USER_ID))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(system_rows.len(), 2);
    }
}
