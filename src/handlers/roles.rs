use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use model::entities::role;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 32))]
    pub role_name: String,
    pub description: Option<String>,
}

/// Names the role to grant or to replace the current ones with
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct AssignRoleRequest {
    #[validate(length(min = 1, max = 32))]
    pub role_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: i32,
    pub role_name: String,
    pub description: Option<String>,
}

impl From<role::Model> for RoleResponse {
    fn from(model: role::Model) -> Self {
        Self {
            id: model.id,
            role_name: model.role_name,
            description: model.description,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "roles",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Roles retrieved successfully", body = ApiResponse<Vec<RoleResponse>>),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_roles(State(state): State<AppState>) -> ApiResult<Vec<RoleResponse>> {
    let roles = services::roles::list_roles(&state.db)
        .await
        .map_err(service_error)?;
    respond(
        StatusCode::OK,
        roles.into_iter().map(RoleResponse::from).collect(),
        "Roles retrieved successfully",
    )
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    tag = "roles",
    security(("bearer" = [])),
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Role created successfully", body = ApiResponse<RoleResponse>),
        (status = 409, description = "Role already exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn create_role(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateRoleRequest>>,
) -> ApiResult<RoleResponse> {
    trace!("Entering create_role function");
    let created = services::roles::create_role(&state.db, &request.role_name, request.description)
        .await
        .map_err(service_error)?;
    info!("Role {} created with ID {}", created.role_name, created.id);
    respond(StatusCode::CREATED, RoleResponse::from(created), "Role created successfully")
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{role_id}",
    tag = "roles",
    security(("bearer" = [])),
    params(
        ("role_id" = i32, Path, description = "Role ID"),
    ),
    responses(
        (status = 200, description = "Role deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Role not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_role(
    Path(role_id): Path<i32>,
    State(state): State<AppState>,
) -> ApiResult<String> {
    services::roles::delete_role(&state.db, role_id)
        .await
        .map_err(service_error)?;
    info!("Role {} deleted", role_id);
    respond(StatusCode::OK, format!("Role {} deleted", role_id), "Role deleted successfully")
}

/// Adds a role to a user, keeping the roles they already hold
#[utoipa::path(
    put,
    path = "/api/v1/roles/users/{user_id}",
    tag = "roles",
    security(("bearer" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role granted successfully", body = ApiResponse<Vec<String>>),
        (status = 404, description = "User or role not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn grant_role(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<AssignRoleRequest>>,
) -> ApiResult<Vec<String>> {
    let roles = services::roles::grant_role(&state.db, user_id, &request.role_name)
        .await
        .map_err(service_error)?;
    info!("User {} now has roles {:?}", user_id, roles);
    respond(StatusCode::OK, roles, "Role granted successfully")
}

/// Replaces every role of a user with a single one
#[utoipa::path(
    put,
    path = "/api/v1/roles/users/{user_id}/replace",
    tag = "roles",
    security(("bearer" = [])),
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Roles replaced successfully", body = ApiResponse<Vec<String>>),
        (status = 404, description = "User or role not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn replace_role(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<AssignRoleRequest>>,
) -> ApiResult<Vec<String>> {
    let roles = services::roles::replace_role(&state.db, user_id, &request.role_name)
        .await
        .map_err(service_error)?;
    info!("User {} roles replaced with {:?}", user_id, roles);
    respond(StatusCode::OK, roles, "Roles replaced successfully")
}
