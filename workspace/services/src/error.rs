use rust_decimal::Decimal;
use thiserror::Error;

/// Error types for the service layer.
///
/// Every variant maps to exactly one HTTP status in the API crate; the
/// stable machine-readable name is available through [`ServiceError::code`].
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed or semantically invalid input
    #[error("{0}")]
    Validation(String),

    /// The requested row does not exist
    #[error("{0}")]
    NotFound(String),

    /// Duplicate data or contradictory request parameters
    #[error("{0}")]
    Conflict(String),

    /// The caller is authenticated but may not touch the resource
    #[error("{0}")]
    Forbidden(String),

    /// Client creation beyond the tariff limit
    #[error("Client limit of {max_client} reached for the current tariff")]
    QuotaExceeded { max_client: i32 },

    /// Bad credentials or an invalid token
    #[error("{0}")]
    Unauthorized(String),

    /// Bonus payment larger than the available balance
    #[error("Not enough bonus: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },

    /// The mail transport refused the message
    #[error("Mail delivery failed: {0}")]
    Mail(String),

    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Runtime error for unexpected situations
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::QuotaExceeded { .. } => "CLIENT_QUOTA_EXCEEDED",
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ServiceError::Mail(_) => "MAIL_ERROR",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn not_found(entity: &str, id: i32) -> Self {
        ServiceError::NotFound(format!("{entity} with id {id} was not found"))
    }
}

/// Type alias for Result with ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;
