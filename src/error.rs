use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::handlers::shared::ApiResponse;

// Postgres SQLSTATE codes that mean "another transaction holds what you need".
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient balance: requested {requested} days, {remaining} remaining")]
    InsufficientBalance {
        requested: BigDecimal,
        remaining: BigDecimal,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource busy, retry the request: {0}")]
    TransientConflict(String),

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Internal server error{}", .0.as_ref().map_or("".to_string(), |s| format!(": {}", s)))]
    InternalServerError(Option<String>),
}

impl AppError {
    pub fn internal_server_error_message(message: impl Into<String>) -> Self {
        AppError::InternalServerError(Some(message.into()))
    }

    /// Errors the caller may retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransientConflict(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::TransientConflict(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        if status_code.is_server_error() && !self.is_retryable() {
            log::error!("Request failed with status {}: {}", status_code, error_message);
        } else {
            log::warn!("Request failed with status {}: {}", status_code, error_message);
        }

        let mut response = HttpResponse::build(status_code);
        if self.is_retryable() {
            response.insert_header(("Retry-After", "1"));
        }
        response.json(ApiResponse::<()>::error(&error_message))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        let code = error
            .as_database_error()
            .and_then(|db_error| db_error.code())
            .map(|code| code.into_owned());

        match code.as_deref() {
            Some(LOCK_NOT_AVAILABLE | DEADLOCK_DETECTED | SERIALIZATION_FAILURE) => {
                log::warn!("Lock contention: {}", error);
                AppError::TransientConflict("a balance row is locked by another operation".into())
            }
            Some(UNIQUE_VIOLATION) => {
                log::warn!("Unique constraint violated: {}", error);
                AppError::Conflict("a record with the same identity already exists".into())
            }
            _ => {
                log::error!("Database error: {}", error);
                AppError::DatabaseError(error)
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        log::error!("Anyhow error: {}", error);

        match error.downcast::<sqlx::Error>() {
            Ok(sqlx_err) => AppError::from(sqlx_err),
            Err(original_error) => AppError::InternalServerError(Some(original_error.to_string())),
        }
    }
}
