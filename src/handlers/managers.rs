use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use services::managers::{ManagerAccount, ManagerChanges};
use services::users::NewUser;
use tracing::{info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for creating a manager sub-account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateManagerRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateManagerRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ManagerResponse {
    /// Manager record ID, used in manager routes
    pub id: i32,
    /// The manager's own user account
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ManagerAccount> for ManagerResponse {
    fn from(found: ManagerAccount) -> Self {
        Self {
            id: found.manager.id,
            user_id: found.account.id,
            username: found.account.username,
            email: found.account.email,
            phone: found.account.phone,
            created_by: found.manager.user_created_id,
            created_at: found.manager.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/manager/create",
    tag = "managers",
    security(("bearer" = [])),
    request_body = CreateManagerRequest,
    responses(
        (status = 201, description = "Manager created successfully", body = ApiResponse<ManagerResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Username or email already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_manager(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<CreateManagerRequest>>,
) -> ApiResult<ManagerResponse> {
    trace!("Entering create_manager function");
    let created = services::managers::create_manager(
        &state.db,
        &principal,
        NewUser {
            username: request.username,
            name: None,
            email: request.email,
            phone: request.phone,
            password: request.password,
        },
    )
    .await
    .map_err(service_error)?;
    info!("Manager {} created by user {}", created.manager.id, principal.user_id);
    respond(StatusCode::CREATED, ManagerResponse::from(created), "Manager created successfully")
}

/// Managers created by the caller
#[utoipa::path(
    get,
    path = "/api/v1/manager/show",
    tag = "managers",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Managers retrieved successfully", body = ApiResponse<Vec<ManagerResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_managers(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Vec<ManagerResponse>> {
    let managers = services::managers::list_managers(&state.db, &principal)
        .await
        .map_err(service_error)?;
    respond(
        StatusCode::OK,
        managers.into_iter().map(ManagerResponse::from).collect(),
        "Managers retrieved successfully",
    )
}

#[utoipa::path(
    put,
    path = "/api/v1/manager/{manager_id}",
    tag = "managers",
    security(("bearer" = [])),
    params(
        ("manager_id" = i32, Path, description = "Manager ID"),
    ),
    request_body = UpdateManagerRequest,
    responses(
        (status = 200, description = "Manager updated successfully", body = ApiResponse<ManagerResponse>),
        (status = 404, description = "Manager not found or does not belong to the user", body = ErrorResponse),
        (status = 409, description = "Username or email already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_manager(
    Path(manager_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<UpdateManagerRequest>>,
) -> ApiResult<ManagerResponse> {
    let changes = ManagerChanges {
        username: request.username,
        password: request.password,
        phone: request.phone,
        email: request.email,
    };
    let updated = services::managers::update_manager(&state.db, &principal, manager_id, changes)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, ManagerResponse::from(updated), "Manager updated successfully")
}

#[utoipa::path(
    delete,
    path = "/api/v1/manager/{manager_id}",
    tag = "managers",
    security(("bearer" = [])),
    params(
        ("manager_id" = i32, Path, description = "Manager ID"),
    ),
    responses(
        (status = 200, description = "Manager deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Manager not found or does not belong to the user", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_manager(
    Path(manager_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<String> {
    services::managers::delete_manager(&state.db, &principal, manager_id)
        .await
        .map_err(service_error)?;
    info!("Manager {} deleted by user {}", manager_id, principal.user_id);
    respond(
        StatusCode::OK,
        format!("Manager {} deleted", manager_id),
        "Manager deleted successfully",
    )
}
