use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_valid::Valid;
use serde::{Deserialize, Serialize};
use services::auth::{Principal, TokenPair};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{ApiError, error_response, service_error};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Name of the HTTP-only cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Short-lived access token; the refresh token travels in a cookie.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenCheckResponse {
    pub user_id: i32,
    pub username: String,
    pub roles: Vec<String>,
}

fn refresh_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.settings.cookie_secure)
        .path("/")
        .build()
}

fn cleared(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

fn issue(
    state: &AppState,
    jar: CookieJar,
    pair: TokenPair,
    message: &str,
) -> (StatusCode, CookieJar, Json<ApiResponse<TokenResponse>>) {
    let jar = jar.add(refresh_cookie(state, pair.refresh_token));
    let response = ApiResponse {
        data: TokenResponse {
            access_token: pair.access_token,
        },
        message: message.to_string(),
        success: true,
    };
    (StatusCode::OK, jar, Json(response))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, refresh token set as cookie", body = ApiResponse<TokenResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unknown email or wrong password", body = ErrorResponse)
    )
)]
#[instrument(skip(state, jar, request))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Valid(Json(request)): Valid<Json<LoginRequest>>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<TokenResponse>>), ApiError> {
    trace!("Entering login function");
    let pair = services::auth::login(&state.db, &state.keys, &request.email, &request.password)
        .await
        .map_err(service_error)?;
    info!("Login succeeded for {}", request.email);
    Ok(issue(&state, jar, pair, "Logged in successfully"))
}

/// Rotate the token pair using the refresh cookie
#[utoipa::path(
    post,
    path = "/api/v1/auth/update-token",
    tag = "auth",
    responses(
        (status = 200, description = "Tokens rotated", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Missing or invalid refresh token, cookie cleared", body = ErrorResponse)
    )
)]
#[instrument(skip(state, jar))]
pub async fn update_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<
    (StatusCode, CookieJar, Json<ApiResponse<TokenResponse>>),
    (StatusCode, CookieJar, Json<ErrorResponse>),
> {
    trace!("Entering update_token function");
    let Some(token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        debug!("No refresh cookie presented");
        let (status, body) =
            error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Refresh token is missing");
        return Err((status, cleared(jar), body));
    };

    match services::auth::refresh(&state.db, &state.keys, &token).await {
        Ok(pair) => Ok(issue(&state, jar, pair, "Tokens refreshed successfully")),
        Err(e) => {
            warn!("Refresh rejected: {}", e);
            let (status, body) =
                error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid refresh token");
            Err((status, cleared(jar), body))
        }
    }
}

/// Log out by clearing the refresh cookie
#[utoipa::path(
    get,
    path = "/api/v1/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Refresh cookie cleared", body = ApiResponse<String>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip(jar))]
pub async fn logout(
    Extension(principal): Extension<Principal>,
    jar: CookieJar,
) -> (StatusCode, CookieJar, Json<ApiResponse<String>>) {
    info!("User {} logged out", principal.user_id);
    let response = ApiResponse {
        data: principal.username,
        message: "Logged out successfully".to_string(),
        success: true,
    };
    (StatusCode::OK, cleared(jar), Json(response))
}

/// Check that the access token is valid
#[utoipa::path(
    get,
    path = "/api/v1/auth/check-token",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = ApiResponse<TokenCheckResponse>),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn check_token(
    Extension(principal): Extension<Principal>,
) -> Json<ApiResponse<TokenCheckResponse>> {
    Json(ApiResponse {
        data: TokenCheckResponse {
            user_id: principal.user_id,
            username: principal.username,
            roles: principal.roles,
        },
        message: "token is valid".to_string(),
        success: true,
    })
}
