use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::tariff;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use services::tariffs::{NewTariff, TariffChanges, TariffChoice};
use services::ServiceError;
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::handlers::users::UserResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTariffRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    /// How many clients an owner on this tariff may keep
    #[validate(range(min = 0))]
    pub max_client: i32,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateTariffRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub max_client: Option<i32>,
}

/// Either `tariff_id` of an existing tariff, or the full definition of a new one
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct AssignTariffRequest {
    pub tariff_id: Option<i32>,
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub max_client: Option<i32>,
}

impl AssignTariffRequest {
    fn into_choice(self) -> Result<TariffChoice, ServiceError> {
        if let Some(id) = self.tariff_id {
            return Ok(TariffChoice::Existing(id));
        }
        match (self.name, self.price, self.max_client) {
            (Some(name), Some(price), Some(max_client)) => Ok(TariffChoice::New(NewTariff {
                name,
                price,
                max_client,
            })),
            _ => Err(ServiceError::Validation(
                "Either tariff_id or name, price and max_client are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TariffResponse {
    pub id: i32,
    pub name: String,
    #[schema(value_type = String)]
    pub price: Decimal,
    pub max_client: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<tariff::Model> for TariffResponse {
    fn from(model: tariff::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            price: model.price,
            max_client: model.max_client,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/tarrif/show",
    tag = "tariffs",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Tariffs retrieved successfully", body = ApiResponse<Vec<TariffResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_tariffs(State(state): State<AppState>) -> ApiResult<Vec<TariffResponse>> {
    let tariffs = services::tariffs::list_tariffs(&state.db)
        .await
        .map_err(service_error)?;
    debug!("Retrieved {} tariffs", tariffs.len());
    respond(
        StatusCode::OK,
        tariffs.into_iter().map(TariffResponse::from).collect(),
        "Tariffs retrieved successfully",
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/tarrif/create",
    tag = "tariffs",
    security(("bearer" = [])),
    request_body = CreateTariffRequest,
    responses(
        (status = 201, description = "Tariff created successfully", body = ApiResponse<TariffResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Tariff name already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_tariff(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateTariffRequest>>,
) -> ApiResult<TariffResponse> {
    trace!("Entering create_tariff function");
    let created = services::tariffs::create_tariff(
        &state.db,
        NewTariff {
            name: request.name,
            price: request.price,
            max_client: request.max_client,
        },
    )
    .await
    .map_err(service_error)?;
    info!("Tariff created with ID: {}", created.id);
    respond(StatusCode::CREATED, TariffResponse::from(created), "Tariff created successfully")
}

#[utoipa::path(
    put,
    path = "/api/v1/tarrif/update/{tariff_id}",
    tag = "tariffs",
    security(("bearer" = [])),
    params(
        ("tariff_id" = i32, Path, description = "Tariff ID"),
    ),
    request_body = UpdateTariffRequest,
    responses(
        (status = 200, description = "Tariff updated successfully", body = ApiResponse<TariffResponse>),
        (status = 404, description = "Tariff not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_tariff(
    Path(tariff_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<UpdateTariffRequest>>,
) -> ApiResult<TariffResponse> {
    let changes = TariffChanges {
        name: request.name,
        price: request.price,
        max_client: request.max_client,
    };
    let updated = services::tariffs::update_tariff(&state.db, tariff_id, changes)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, TariffResponse::from(updated), "Tariff updated successfully")
}

#[utoipa::path(
    delete,
    path = "/api/v1/tarrif/delete/{tariff_id}",
    tag = "tariffs",
    security(("bearer" = [])),
    params(
        ("tariff_id" = i32, Path, description = "Tariff ID"),
    ),
    responses(
        (status = 200, description = "Tariff deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Tariff not found", body = ErrorResponse),
        (status = 409, description = "Tariff still assigned to users", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_tariff(
    Path(tariff_id): Path<i32>,
    State(state): State<AppState>,
) -> ApiResult<String> {
    services::tariffs::delete_tariff(&state.db, tariff_id)
        .await
        .map_err(service_error)?;
    respond(
        StatusCode::OK,
        format!("Tariff {} deleted", tariff_id),
        "Tariff deleted successfully",
    )
}

/// Moves a user onto a tariff
#[utoipa::path(
    put,
    path = "/api/v1/tarrif/add/{user_id}",
    tag = "tariffs",
    security(("bearer" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = AssignTariffRequest,
    responses(
        (status = 200, description = "Tariff assigned successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Neither an existing nor a complete new tariff given", body = ErrorResponse),
        (status = 404, description = "User or tariff not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn assign_tariff(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<AssignTariffRequest>>,
) -> ApiResult<UserResponse> {
    let choice = request.into_choice().map_err(service_error)?;
    let updated = services::tariffs::assign_tariff(&state.db, user_id, choice)
        .await
        .map_err(service_error)?;
    info!("User {} is now on tariff {}", user_id, updated.tariff_id);
    respond(StatusCode::OK, UserResponse::from(updated), "Tariff assigned successfully")
}
