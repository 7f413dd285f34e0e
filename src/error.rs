use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::chain::status::OrderStatus;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Illegal transition for order {order_id}: {action} not allowed from {current:?}")]
    IllegalTransition {
        order_id: String,
        action: &'static str,
        current: OrderStatus,
        allowed: Vec<OrderStatus>,
    },

    #[error("Sweep '{0}' is already running")]
    SweepLocked(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized")]
    Unauthorized,
}

/// Errors surfaced by the escrow gateway client
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gateway rejected call: {code} - {message}")]
    Gateway { code: i64, message: String },

    #[error("Malformed gateway response: {0}")]
    Malformed(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::OrderNotFound(id) => (
                StatusCode::NOT_FOUND,
                "ORDER_NOT_FOUND",
                format!("Order {} was not found on chain", id),
                Some(serde_json::json!({
                    "order_id": id,
                    "hint": "The order may not be finalized yet, or it was created against a \
                             different escrow package. Retry with refresh=true, and verify the \
                             configured package id matches the one the order was created under.",
                })),
            ),
            AppError::IllegalTransition {
                order_id,
                action,
                current,
                allowed,
            } => (
                StatusCode::CONFLICT,
                "ILLEGAL_TRANSITION",
                format!(
                    "Cannot {} order {}: status is {:?}",
                    action, order_id, current
                ),
                Some(serde_json::json!({
                    "order_id": order_id,
                    "current_status": current,
                    "allowed_statuses": allowed,
                })),
            ),
            AppError::SweepLocked(name) => (
                StatusCode::TOO_MANY_REQUESTS,
                "SWEEP_LOCKED",
                format!("Sweep '{}' is held by another runner; retry next cycle", name),
                Some(serde_json::json!({ "sweep": name })),
            ),
            AppError::Chain(ref e) => (
                StatusCode::BAD_GATEWAY,
                "CHAIN_UNAVAILABLE",
                format!("Escrow gateway call failed: {}", e),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing or invalid cron credentials".to_string(),
                None,
            ),
            AppError::InvalidInput(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                msg,
                None,
            ),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                None,
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let summary = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages: Vec<String> = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");
        AppError::InvalidInput(format!("Validation failed: {}", summary))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(format!("{:?}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
