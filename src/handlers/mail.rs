use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use serde::{Deserialize, Serialize};
use services::auth::Principal;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiResult, respond, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    #[validate(email)]
    pub to: String,
    #[validate(length(min = 1, max = 10000))]
    pub message: String,
}

/// Confirmation code generated by the frontend, mailed to `email`
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct SendVerificationRequest {
    #[validate(email)]
    pub email: String,
    #[validate(range(min = 1000, max = 999999))]
    pub code: u32,
}

#[utoipa::path(
    post,
    path = "/api/v1/mail/send",
    tag = "mail",
    security(("bearer" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message sent", body = ApiResponse<String>),
        (status = 400, description = "Invalid address", body = ErrorResponse),
        (status = 502, description = "Mail delivery failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Valid(Json(request)): Valid<Json<SendMessageRequest>>,
) -> ApiResult<String> {
    services::mail::send_message(
        &state.db,
        state.mailer.as_ref(),
        principal.user_id,
        &request.to,
        &request.message,
    )
    .await
    .map_err(service_error)?;
    info!("User {} sent a message to {}", principal.user_id, request.to);
    respond(StatusCode::OK, format!("Message sent to {}", request.to), "Message sent")
}

/// Mails a registration confirmation code
#[utoipa::path(
    post,
    path = "/api/v1/mail/verify",
    tag = "mail",
    request_body = SendVerificationRequest,
    responses(
        (status = 200, description = "Code sent", body = ApiResponse<String>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Mail delivery failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request))]
pub async fn send_verification(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<SendVerificationRequest>>,
) -> ApiResult<String> {
    services::mail::send_verification_code(
        &state.db,
        state.mailer.as_ref(),
        &request.email,
        request.code,
    )
    .await
    .map_err(service_error)?;
    respond(StatusCode::OK, format!("Code sent to {}", request.email), "Code sent")
}

/// Mails a password change code to the caller's own address
#[utoipa::path(
    get,
    path = "/api/v1/mail/change-pass/{code}",
    tag = "mail",
    security(("bearer" = [])),
    params(
        ("code" = u32, Path, description = "Confirmation code"),
    ),
    responses(
        (status = 200, description = "Code sent", body = ApiResponse<String>),
        (status = 502, description = "Mail delivery failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, code))]
pub async fn send_password_change(
    Path(code): Path<u32>,
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<String> {
    services::mail::send_password_change_code(
        &state.db,
        state.mailer.as_ref(),
        principal.user_id,
        code,
    )
    .await
    .map_err(service_error)?;
    respond(StatusCode::OK, "Code sent".to_string(), "Code sent")
}
