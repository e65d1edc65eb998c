use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::billing::stripe::StripeError;
use crate::llm_client::LlmError;
use crate::obfuscation::ObfuscationError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    #[error("Obfuscation error: {0}")]
    Obfuscation(#[from] ObfuscationError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Wire shape of every error response.
#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            message: None,
            details: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_)
            | AppError::Llm(_)
            | AppError::Stripe(_)
            | AppError::Obfuscation(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            AppError::Validation(msg) => ErrorBody::new(msg),
            AppError::Unauthorized(msg) => ErrorBody::new("Unauthorized").with_message(msg.clone()),
            AppError::Forbidden(msg) => ErrorBody::new("Forbidden").with_message(msg.clone()),
            AppError::NotFound(msg) => ErrorBody::new("Not found").with_message(msg.clone()),
            AppError::RateLimited => ErrorBody::new("Too many requests")
                .with_message("Rate limit exceeded. Please wait a minute and try again."),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                ErrorBody::new("Database error").with_details(e.to_string())
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                ErrorBody::new("AI processing failed").with_message(e.to_string())
            }
            AppError::Stripe(e) => {
                tracing::error!("Stripe error: {e}");
                ErrorBody::new("Payment processing failed").with_message(e.to_string())
            }
            AppError::Obfuscation(e) => {
                tracing::error!("Obfuscation error: {e}");
                ErrorBody::new("Resume content is corrupted").with_details(e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                ErrorBody::new("Internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
