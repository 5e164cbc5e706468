use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid stream state: {0}")]
    InvalidState(String),

    #[error("Password required or incorrect")]
    PasswordRequired,

    #[error("Stream is private")]
    PrivateAccess,

    #[error("Premium entitlement required")]
    PremiumRequired,

    #[error("Stream viewer capacity exceeded")]
    CapacityExceeded,

    #[error("Concurrent stream limit reached")]
    TooManyActiveStreams,

    #[error("Credential error: {0}")]
    Credential(#[from] rtc_token::TokenError),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl AppError {
    /// Stable machine code surfaced to callers so each rejection can be
    /// presented distinctly (wrong password vs. capacity vs. premium).
    fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Redis(_) => "CACHE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::PasswordRequired => "PASSWORD_REQUIRED",
            AppError::PrivateAccess => "PRIVATE_ACCESS",
            AppError::PremiumRequired => "PREMIUM_REQUIRED",
            AppError::CapacityExceeded => "CAPACITY_EXCEEDED",
            AppError::TooManyActiveStreams => "TOO_MANY_ACTIVE_STREAMS",
            AppError::Credential(_) => "CREDENTIAL_ERROR",
            AppError::Token(_) => "TOKEN_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Redis(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::PasswordRequired => StatusCode::FORBIDDEN,
            AppError::PrivateAccess => StatusCode::FORBIDDEN,
            AppError::PremiumRequired => StatusCode::FORBIDDEN,
            AppError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::TooManyActiveStreams => StatusCode::TOO_MANY_REQUESTS,
            AppError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        })
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
