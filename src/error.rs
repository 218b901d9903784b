use axum::http::StatusCode;
use axum::response::Json;
use services::ServiceError;
use tracing::{error, warn};

use crate::schemas::{ApiResponse, ErrorResponse};

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Validation(_) | ServiceError::InsufficientBalance { .. } => {
            StatusCode::BAD_REQUEST
        }
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Forbidden(_) | ServiceError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
        ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Mail(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Database(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
            success: false,
        }),
    )
}

/// Maps a service failure onto its HTTP status. Server-side failures keep
/// their details in the log only.
pub fn service_error(err: ServiceError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
        let message = match err {
            ServiceError::Mail(_) => "Mail delivery failed",
            _ => "Internal server error",
        };
        return error_response(status, err.code(), message);
    }
    warn!("Request rejected with {}: {}", status, err);
    error_response(status, err.code(), err.to_string())
}

pub fn respond<T>(status: StatusCode, data: T, message: &str) -> ApiResult<T> {
    Ok((
        status,
        Json(ApiResponse {
            data,
            message: message.to_string(),
            success: true,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&ServiceError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ServiceError::QuotaExceeded { max_client: 1 }), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&ServiceError::InsufficientBalance {
                available: Decimal::ONE,
                requested: Decimal::TWO,
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&ServiceError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&ServiceError::Mail("down".into())), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let (status, Json(body)) = service_error(ServiceError::Internal("secret detail".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.error.contains("secret"));
        assert!(!body.success);
    }
}
