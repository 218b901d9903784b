use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::bank::{self, Plan};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use services::bank::PaymentForm;
use services::ServiceError;
use tracing::{info, instrument, trace};
use utoipa::ToSchema;

use crate::error::{ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Signed form fields to post to the payment gateway
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentFormResponse {
    pub merchant: String,
    pub amount: String,
    pub order_id: i32,
    pub description: String,
    /// Where the gateway redirects after a successful payment
    pub success_url: String,
    /// "1" in gateway test mode, "0" otherwise
    pub testing: String,
    pub receipt_contact: String,
    pub unix_timestamp: String,
    pub signature: String,
}

impl From<PaymentForm> for PaymentFormResponse {
    fn from(form: PaymentForm) -> Self {
        Self {
            merchant: form.merchant,
            amount: form.amount,
            order_id: form.order_id,
            description: form.description,
            success_url: form.success_url,
            testing: form.testing,
            receipt_contact: form.receipt_contact,
            unix_timestamp: form.unix_timestamp,
            signature: form.signature,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub active: bool,
    pub order_id: Option<i32>,
    pub plan: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    pub count_month: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionResponse {
    fn none() -> Self {
        Self {
            active: false,
            order_id: None,
            plan: None,
            amount: None,
            count_month: None,
            expires_at: None,
        }
    }
}

impl From<bank::Model> for SubscriptionResponse {
    fn from(model: bank::Model) -> Self {
        Self {
            active: model.is_success,
            order_id: Some(model.id),
            plan: Some(plan_name(model.plan).to_string()),
            amount: Some(model.amount),
            count_month: Some(model.count_month),
            expires_at: model.expires_at,
        }
    }
}

fn plan_name(plan: Plan) -> &'static str {
    match plan {
        Plan::Start => "start",
        Plan::Business => "business",
    }
}

fn parse_plan(raw: &str) -> Result<Plan, ServiceError> {
    match raw {
        "start" => Ok(Plan::Start),
        "business" => Ok(Plan::Business),
        other => Err(ServiceError::Validation(format!(
            "Unknown plan '{other}', expected 'start' or 'business'"
        ))),
    }
}

/// Starts a subscription purchase
#[utoipa::path(
    get,
    path = "/api/v1/bank/buy/{plan}/{count}",
    tag = "bank",
    security(("bearer" = [])),
    params(
        ("plan" = String, Path, description = "Plan: start or business"),
        ("count" = i32, Path, description = "Months: 1, 3, 6 or 12"),
    ),
    responses(
        (status = 200, description = "Payment form created", body = ApiResponse<PaymentFormResponse>),
        (status = 400, description = "Unknown plan or period", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn buy_subscription(
    Path((plan, count)): Path<(String, i32)>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<PaymentFormResponse> {
    trace!("Entering buy_subscription function");
    let plan = parse_plan(&plan).map_err(service_error)?;
    let form = services::bank::create_checkout(
        &state.db,
        &state.gateway,
        principal.user_id,
        plan,
        count,
    )
    .await
    .map_err(service_error)?;
    info!("Payment form {} issued to user {}", form.order_id, principal.user_id);
    respond(StatusCode::OK, PaymentFormResponse::from(form), "Payment form created")
}

/// Gateway success redirect target
#[utoipa::path(
    get,
    path = "/api/v1/bank/make-success/{order_id}",
    tag = "bank",
    security(("bearer" = [])),
    params(
        ("order_id" = i32, Path, description = "Payment order ID"),
    ),
    responses(
        (status = 200, description = "Payment confirmed", body = ApiResponse<SubscriptionResponse>),
        (status = 404, description = "No such payment for this user", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn confirm_payment(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<SubscriptionResponse> {
    let confirmed = services::bank::confirm_payment(&state.db, principal.user_id, order_id)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, SubscriptionResponse::from(confirmed), "Payment confirmed")
}

#[utoipa::path(
    get,
    path = "/api/v1/bank/status",
    tag = "bank",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Subscription status", body = ApiResponse<SubscriptionResponse>)
    )
)]
#[instrument(skip(state))]
pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<SubscriptionResponse> {
    let current = services::bank::subscription_status(&state.db, principal.user_id)
        .await
        .map_err(service_error)?;
    let response = current.map_or_else(SubscriptionResponse::none, SubscriptionResponse::from);
    respond(StatusCode::OK, response, "Subscription status")
}
