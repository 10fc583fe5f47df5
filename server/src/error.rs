use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("Order already paid")]
    AlreadyPaid,

    #[error("{0}")]
    InvalidState(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            // Payment Required, so clients can tell a failed business rule
            // apart from a retryable server error.
            AppError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            AppError::AlreadyPaid | AppError::InvalidState { .. } => StatusCode::CONFLICT,
            AppError::Database { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("{self}");
        }

        (status, self.to_string()).into_response()
    }
}

pub fn map_unique_violation(error: sqlx::Error, message: &str) -> AppError {
    match error.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::Validation(message.to_string()),
        _ => AppError::Database(error),
    }
}

pub fn map_foreign_key_violation(error: sqlx::Error, instead: AppError) -> AppError {
    match error.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => instead,
        _ => AppError::Database(error),
    }
}
