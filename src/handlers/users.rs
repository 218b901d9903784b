use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use services::users::{NewUser, UserChanges};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::handlers::clients::ClientResponse;
use crate::handlers::tariffs::TariffResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use axum::response::Json;

/// Request body for registering a new account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    pub name: Option<String>,
    /// Login email (must be unique)
    #[validate(email)]
    pub email: String,
    pub phone: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Request body for updating a user
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: Option<String>,
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub tariff_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            name: model.name,
            email: model.email,
            phone: model.phone,
            tariff_id: model.tariff_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub roles: Vec<String>,
    pub tariff: Option<TariffResponse>,
    pub clients: Vec<ClientResponse>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Username or email already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<RegisterRequest>>,
) -> ApiResult<UserResponse> {
    trace!("Entering register function");
    debug!("Registering user with username: {}", request.username);

    let created = services::users::register(
        &state.db,
        NewUser {
            username: request.username,
            name: request.name,
            email: request.email,
            phone: request.phone,
            password: request.password,
        },
    )
    .await
    .map_err(service_error)?;

    info!("User registered with ID: {}", created.id);
    respond(StatusCode::CREATED, UserResponse::from(created), "User registered successfully")
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/users/all",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Vec<UserResponse>> {
    trace!("Entering get_users function");
    let users = services::users::list_users(&state.db)
        .await
        .map_err(service_error)?;
    info!("Successfully retrieved {} users", users.len());
    respond(
        StatusCode::OK,
        users.into_iter().map(UserResponse::from).collect(),
        "Users retrieved successfully",
    )
}

/// The caller's own account with roles, tariff and clients
#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    tag = "users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<ProfileResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<ProfileResponse> {
    let profile = services::users::get_profile(&state.db, principal.user_id)
        .await
        .map_err(service_error)?;
    let response = ProfileResponse {
        user: profile.user.into(),
        roles: profile.roles,
        tariff: profile.tariff.map(TariffResponse::from),
        clients: profile.clients.into_iter().map(ClientResponse::from).collect(),
    };
    respond(StatusCode::OK, response, "Profile retrieved successfully")
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    security(("bearer" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> ApiResult<UserResponse> {
    trace!("Entering get_user function for user_id: {}", user_id);
    let found = services::users::get_user(&state.db, user_id)
        .await
        .map_err(service_error)?;
    respond(StatusCode::OK, UserResponse::from(found), "User retrieved successfully")
}

/// Update a user (the account itself or an admin)
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    security(("bearer" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Not your account", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Username or email already taken", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<UpdateUserRequest>>,
) -> ApiResult<UserResponse> {
    trace!("Entering update_user function for user_id: {}", user_id);
    let changes = UserChanges {
        username: request.username,
        name: request.name,
        email: request.email,
        phone: request.phone,
        password: request.password,
    };
    let updated = services::users::update_user(&state.db, &principal, user_id, changes)
        .await
        .map_err(service_error)?;
    info!("User with ID {} updated successfully", user_id);
    respond(StatusCode::OK, UserResponse::from(updated), "User updated successfully")
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    security(("bearer" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<String>),
        (status = 403, description = "Admins only", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> ApiResult<String> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    services::users::delete_user(&state.db, user_id)
        .await
        .map_err(service_error)?;
    info!("User with ID {} deleted successfully", user_id);
    respond(StatusCode::OK, format!("User {} deleted", user_id), "User deleted successfully")
}
