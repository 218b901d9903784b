use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use model::entities::visit;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::error::{ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VisitResponse {
    pub id: i32,
    pub client_id: i32,
    pub visit_date: DateTime<Utc>,
}

impl From<visit::Model> for VisitResponse {
    fn from(model: visit::Model) -> Self {
        Self {
            id: model.id,
            client_id: model.client_id,
            visit_date: model.visit_date,
        }
    }
}

fn to_responses(visits: Vec<visit::Model>) -> Vec<VisitResponse> {
    visits.into_iter().map(VisitResponse::from).collect()
}

#[utoipa::path(
    get,
    path = "/api/v1/visit",
    tag = "visits",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Visits retrieved successfully", body = ApiResponse<Vec<VisitResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_all_visits(State(state): State<AppState>) -> ApiResult<Vec<VisitResponse>> {
    let visits = services::visits::list_all(&state.db)
        .await
        .map_err(service_error)?;
    debug!("Retrieved {} visits", visits.len());
    respond(StatusCode::OK, to_responses(visits), "Visits retrieved successfully")
}

#[utoipa::path(
    get,
    path = "/api/v1/visit/current/{client_id}",
    tag = "visits",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    responses(
        (status = 200, description = "Visits retrieved successfully", body = ApiResponse<Vec<VisitResponse>>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_client_visits(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<VisitResponse>> {
    let visits = services::visits::list_for_client(&state.db, &principal, client_id)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, to_responses(visits), "Visits retrieved successfully")
}

/// Visits of every client the caller owns
#[utoipa::path(
    get,
    path = "/api/v1/visit/user",
    tag = "visits",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Visits retrieved successfully", body = ApiResponse<Vec<VisitResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_visits(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<VisitResponse>> {
    let visits = services::visits::list_for_user(&state.db, &principal)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, to_responses(visits), "Visits retrieved successfully")
}
