use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::cashback_transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use tracing::{info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Pays part of a bill with the client's cashback
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct BillQuery {
    /// Client ID
    #[validate(range(min = 1))]
    pub id: i32,
    /// Amount to pay with bonus
    #[schema(value_type = String)]
    #[param(value_type = String)]
    pub amount: Decimal,
}

/// One signed row of a client's cashback ledger
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashbackTransactionResponse {
    pub id: i32,
    pub client_id: i32,
    /// Positive for credits, negative for debits
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<cashback_transaction::Model> for CashbackTransactionResponse {
    fn from(model: cashback_transaction::Model) -> Self {
        Self {
            id: model.id,
            client_id: model.client_id,
            amount: model.amount,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/transaction/bill",
    tag = "transactions",
    security(("bearer" = [])),
    params(BillQuery),
    responses(
        (status = 200, description = "Bill paid with cashback", body = ApiResponse<CashbackTransactionResponse>),
        (status = 400, description = "Insufficient cashback or invalid amount", body = ErrorResponse),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn pay_by_bonus(
    Valid(Query(query)): Valid<Query<BillQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<CashbackTransactionResponse> {
    trace!("Entering pay_by_bonus function for client {}", query.id);
    let debit = services::cashback::pay_by_bonus(&state.db, &principal, query.id, query.amount)
        .await
        .map_err(service_error)?;
    info!("Client {} paid {} with cashback", query.id, query.amount);
    respond(
        StatusCode::OK,
        CashbackTransactionResponse::from(debit),
        "Bill paid with cashback",
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/transaction/client/{client_id}",
    tag = "transactions",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    responses(
        (status = 200, description = "Ledger retrieved successfully", body = ApiResponse<Vec<CashbackTransactionResponse>>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_client_transactions(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<CashbackTransactionResponse>> {
    let ledger = services::cashback::list_for_client(&state.db, &principal, client_id)
        .await
        .map_err(service_error)?;
    respond(
        StatusCode::OK,
        ledger.into_iter().map(CashbackTransactionResponse::from).collect(),
        "Ledger retrieved successfully",
    )
}
