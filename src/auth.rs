//! Request authentication and the per-route role gate.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use model::entities::role;
use services::auth::{TokenKeys, authenticate};
use tracing::{debug, warn};

use crate::error::{ApiError, error_response};
use crate::schemas::AppState;

/// Any authenticated caller.
pub const ANYONE: &[&str] = &[];
pub const ADMIN: &[&str] = &[role::ADMIN];
/// Account holders, excluding delegated managers.
pub const OWNERS: &[&str] = &[role::ADMIN, role::USER];
pub const STAFF: &[&str] = &[role::ADMIN, role::USER, role::MANAGER];

/// Roles allowed through a group of routes.
#[derive(Clone)]
pub struct RoleGate {
    keys: Arc<TokenKeys>,
    allowed: &'static [&'static str],
}

impl RoleGate {
    pub fn new(state: &AppState, allowed: &'static [&'static str]) -> Self {
        Self {
            keys: state.keys.clone(),
            allowed,
        }
    }

    fn admits(&self, roles: &[String]) -> bool {
        self.allowed.is_empty() || roles.iter().any(|r| self.allowed.contains(&r.as_str()))
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Middleware: verifies the access token, checks the caller's roles and
/// stores the [`services::auth::Principal`] for the handler.
pub async fn require_roles(
    State(gate): State<RoleGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&request) else {
        debug!("Missing bearer token for {}", request.uri());
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Missing bearer token",
        ));
    };

    let principal = authenticate(&gate.keys, token).map_err(|e| {
        debug!("Rejected token: {}", e);
        error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid or expired token")
    })?;

    if !gate.admits(&principal.roles) {
        warn!(
            "User {} with roles {:?} denied access to {}",
            principal.user_id,
            principal.roles,
            request.uri()
        );
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "Your role does not allow this action",
        ));
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
