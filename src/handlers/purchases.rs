use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::purchase;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use services::purchases::{PurchaseReceipt, PurchaseReversal};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::handlers::transactions::CashbackTransactionResponse;
use crate::handlers::visits::VisitResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreatePurchaseRequest {
    /// Purchase total, must be positive
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseResponse {
    pub id: i32,
    /// The user who recorded the purchase
    pub user_id: i32,
    pub client_id: i32,
    pub visit_id: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<purchase::Model> for PurchaseResponse {
    fn from(model: purchase::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            client_id: model.client_id,
            visit_id: model.visit_id,
            amount: model.amount,
            created_at: model.created_at,
        }
    }
}

/// A recorded purchase with the visit and cashback credit it produced
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseReceiptResponse {
    pub purchase: PurchaseResponse,
    pub visit: VisitResponse,
    pub cashback: CashbackTransactionResponse,
}

impl From<PurchaseReceipt> for PurchaseReceiptResponse {
    fn from(receipt: PurchaseReceipt) -> Self {
        Self {
            purchase: receipt.purchase.into(),
            visit: receipt.visit.into(),
            cashback: receipt.cashback.into(),
        }
    }
}

/// A removed purchase and the ledger debit that took its cashback back
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurchaseReversalResponse {
    pub purchase: PurchaseResponse,
    pub debit: CashbackTransactionResponse,
}

impl From<PurchaseReversal> for PurchaseReversalResponse {
    fn from(reversal: PurchaseReversal) -> Self {
        Self {
            purchase: reversal.purchase.into(),
            debit: reversal.debit.into(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/purchase",
    tag = "purchases",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Purchases retrieved successfully", body = ApiResponse<Vec<PurchaseResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_all_purchases(State(state): State<AppState>) -> ApiResult<Vec<PurchaseResponse>> {
    let purchases = services::purchases::list_all(&state.db)
        .await
        .map_err(service_error)?;
    debug!("Retrieved {} purchases", purchases.len());
    respond(
        StatusCode::OK,
        purchases.into_iter().map(PurchaseResponse::from).collect(),
        "Purchases retrieved successfully",
    )
}

/// Records a purchase, its visit and the cashback credit
#[utoipa::path(
    post,
    path = "/api/v1/purchase/create/{client_id}",
    tag = "purchases",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    request_body = CreatePurchaseRequest,
    responses(
        (status = 201, description = "Purchase recorded successfully", body = ApiResponse<PurchaseReceiptResponse>),
        (status = 400, description = "Amount must be positive", body = ErrorResponse),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_purchase(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<CreatePurchaseRequest>>,
) -> ApiResult<PurchaseReceiptResponse> {
    trace!("Entering create_purchase function for client {}", client_id);
    let receipt =
        services::purchases::create_purchase(&state.db, &principal, client_id, request.amount)
            .await
            .map_err(service_error)?;
    info!(
        "Purchase {} of {} recorded for client {}",
        receipt.purchase.id, receipt.purchase.amount, client_id
    );
    respond(
        StatusCode::CREATED,
        PurchaseReceiptResponse::from(receipt),
        "Purchase recorded successfully",
    )
}

/// Purchases of the caller's clients, newest first
#[utoipa::path(
    get,
    path = "/api/v1/purchase/all",
    tag = "purchases",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Purchases retrieved successfully", body = ApiResponse<Vec<PurchaseResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_purchases(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<PurchaseResponse>> {
    let purchases = services::purchases::list_for_user(&state.db, &principal)
        .await
        .map_err(service_error)?;
    respond(
        StatusCode::OK,
        purchases.into_iter().map(PurchaseResponse::from).collect(),
        "Purchases retrieved successfully",
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/purchase/cancel/{purchase_id}",
    tag = "purchases",
    security(("bearer" = [])),
    params(
        ("purchase_id" = i32, Path, description = "Purchase ID"),
    ),
    responses(
        (status = 200, description = "Purchase cancelled", body = ApiResponse<PurchaseReversalResponse>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Purchase not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn cancel_purchase(
    Path(purchase_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<PurchaseReversalResponse> {
    let reversal = services::purchases::cancel_purchase(&state.db, &principal, purchase_id)
        .await
        .map_err(service_error)?;
    info!("Purchase {} cancelled", purchase_id);
    respond(StatusCode::OK, PurchaseReversalResponse::from(reversal), "Purchase cancelled")
}

#[utoipa::path(
    delete,
    path = "/api/v1/purchase/{purchase_id}",
    tag = "purchases",
    security(("bearer" = [])),
    params(
        ("purchase_id" = i32, Path, description = "Purchase ID"),
    ),
    responses(
        (status = 200, description = "Purchase deleted", body = ApiResponse<PurchaseReversalResponse>),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "Purchase not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_purchase(
    Path(purchase_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<PurchaseReversalResponse> {
    let reversal = services::purchases::delete_purchase(&state.db, &principal, purchase_id)
        .await
        .map_err(service_error)?;
    info!("Purchase {} deleted", purchase_id);
    respond(StatusCode::OK, PurchaseReversalResponse::from(reversal), "Purchase deleted")
}
