use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use model::entities::client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use services::clients::{ClientChanges, ClientOverview, ClientWithBalance, NewClient};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::handlers::visits::VisitResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for creating a client
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateClientRequest {
    #[validate(length(max = 128))]
    pub name: Option<String>,
    /// Phone number, the client's primary lookup key
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Share of each purchase credited back, in whole percent
    #[validate(range(min = 0, max = 100))]
    pub cashback_percentage: i32,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(max = 128))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[validate(range(min = 0, max = 100))]
    pub cashback_percentage: Option<i32>,
}

/// Shares a client with another user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct GrantClientRequest {
    #[validate(range(min = 1))]
    pub user_id: i32,
}

/// Lookup by phone, or by email when no phone is given
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
pub struct FindClientQuery {
    #[validate(length(min = 1))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: i32,
    pub name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub cashback_percentage: i32,
    /// Signed sum of the client's cashback ledger, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub total_cashback: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<client::Model> for ClientResponse {
    fn from(model: client::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            email: model.email,
            birth_date: model.birth_date,
            cashback_percentage: model.cashback_percentage,
            total_cashback: None,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<ClientWithBalance> for ClientResponse {
    fn from(found: ClientWithBalance) -> Self {
        Self {
            total_cashback: Some(found.total_cashback),
            ..Self::from(found.client)
        }
    }
}

/// A client together with its visit history
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientOverviewResponse {
    pub client: ClientResponse,
    pub visits: Vec<VisitResponse>,
    #[schema(value_type = String)]
    pub total_cashback: Decimal,
}

impl From<ClientOverview> for ClientOverviewResponse {
    fn from(overview: ClientOverview) -> Self {
        Self {
            client: overview.client.into(),
            visits: overview.visits.into_iter().map(VisitResponse::from).collect(),
            total_cashback: overview.total_cashback,
        }
    }
}

/// Every client in the system
#[utoipa::path(
    get,
    path = "/api/v1/clients/all-users",
    tag = "clients",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Clients retrieved successfully", body = ApiResponse<Vec<ClientResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_all_clients(State(state): State<AppState>) -> ApiResult<Vec<ClientResponse>> {
    trace!("Entering get_all_clients function");
    let clients = services::clients::list_all(&state.db)
        .await
        .map_err(service_error)?;
    debug!("Retrieved {} clients", clients.len());
    respond(
        StatusCode::OK,
        clients.into_iter().map(ClientResponse::from).collect(),
        "Clients retrieved successfully",
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/clients/create",
    tag = "clients",
    security(("bearer" = [])),
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created successfully", body = ApiResponse<ClientResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Tariff client limit reached", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_client(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<CreateClientRequest>>,
) -> ApiResult<ClientResponse> {
    trace!("Entering create_client function");
    let created = services::clients::create_client(
        &state.db,
        &principal,
        NewClient {
            name: request.name,
            phone: request.phone,
            email: request.email,
            birth_date: request.birth_date,
            cashback_percentage: request.cashback_percentage,
        },
    )
    .await
    .map_err(service_error)?;
    info!("Client created with ID: {}", created.id);
    respond(StatusCode::CREATED, ClientResponse::from(created), "Client created successfully")
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/id/{client_id}",
    tag = "clients",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    responses(
        (status = 200, description = "Client retrieved successfully", body = ApiResponse<ClientResponse>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_client(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ClientResponse> {
    let found = services::clients::get_client(&state.db, &principal, client_id)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, ClientResponse::from(found), "Client retrieved successfully")
}

#[utoipa::path(
    get,
    path = "/api/v1/clients/current",
    tag = "clients",
    security(("bearer" = [])),
    params(FindClientQuery),
    responses(
        (status = 200, description = "Client found", body = ApiResponse<ClientResponse>),
        (status = 400, description = "Neither phone nor email given", body = ErrorResponse),
        (status = 404, description = "No matching client", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn find_client(
    Valid(Query(query)): Valid<Query<FindClientQuery>>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ClientResponse> {
    let found = services::clients::find_by_phone_or_email(
        &state.db,
        &principal,
        query.phone.as_deref(),
        query.email.as_deref(),
    )
    .await
    .map_err(service_error)?;
    respond(StatusCode::OK, ClientResponse::from(found), "Client found")
}

/// The caller's clients with their visits
#[utoipa::path(
    get,
    path = "/api/v1/clients/show",
    tag = "clients",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Clients retrieved successfully", body = ApiResponse<Vec<ClientOverviewResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_clients(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<ClientOverviewResponse>> {
    let clients = services::clients::list_for_user(&state.db, &principal)
        .await
        .map_err(service_error)?;
    respond(
        StatusCode::OK,
        clients.into_iter().map(ClientOverviewResponse::from).collect(),
        "Clients retrieved successfully",
    )
}

#[utoipa::path(
    put,
    path = "/api/v1/clients/{client_id}",
    tag = "clients",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Client updated successfully", body = ApiResponse<ClientResponse>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_client(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<UpdateClientRequest>>,
) -> ApiResult<ClientResponse> {
    let changes = ClientChanges {
        name: request.name,
        phone: request.phone,
        email: request.email,
        birth_date: request.birth_date,
        cashback_percentage: request.cashback_percentage,
    };
    let updated = services::clients::update_client(&state.db, &principal, client_id, changes)
        .await
        .map_err(service_error)?;
    info!("Client with ID {} updated successfully", client_id);
    respond(StatusCode::OK, ClientResponse::from(updated), "Client updated successfully")
}

#[utoipa::path(
    delete,
    path = "/api/v1/clients/{client_id}",
    tag = "clients",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    responses(
        (status = 200, description = "Client deleted successfully", body = ApiResponse<String>),
        (status = 403, description = "Client belongs to another user", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_client(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<String> {
    services::clients::delete_client(&state.db, &principal, client_id)
        .await
        .map_err(service_error)?;
    info!("Client with ID {} deleted successfully", client_id);
    respond(
        StatusCode::OK,
        format!("Client {} deleted", client_id),
        "Client deleted successfully",
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/clients/{client_id}/grant",
    tag = "clients",
    security(("bearer" = [])),
    params(
        ("client_id" = i32, Path, description = "Client ID"),
    ),
    request_body = GrantClientRequest,
    responses(
        (status = 200, description = "Access granted", body = ApiResponse<String>),
        (status = 404, description = "Client or user not found", body = ErrorResponse),
        (status = 409, description = "User already has access", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn grant_client(
    Path(client_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<GrantClientRequest>>,
) -> ApiResult<String> {
    services::clients::grant_client(&state.db, &principal, client_id, request.user_id)
        .await
        .map_err(service_error)?;
    info!("User {} granted access to client {}", request.user_id, client_id);
    respond(
        StatusCode::OK,
        format!("User {} granted access to client {}", request.user_id, client_id),
        "Access granted",
    )
}
