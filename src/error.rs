//! Webhook gate errors and their HTTP rendering

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Missing header: {header}")]
    MissingHeader { header: &'static str },

    #[error("Malformed header: {header}")]
    MalformedHeader { header: &'static str },

    #[error("Integrity validation failed")]
    IntegrityValidationFailed,

    #[error("No bot registered for this webhook")]
    UnknownBot,

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Unauthorized")]
    Unauthorized,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl WebhookError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::MissingHeader { .. } => "webhook.missingHeader",
            WebhookError::MalformedHeader { .. } => "webhook.malformedHeader",
            WebhookError::IntegrityValidationFailed => "webhook.integrityValidationFailed",
            WebhookError::UnknownBot => "webhook.unknownBot",
            WebhookError::InvalidPayload(_) => "webhook.invalidPayload",
            WebhookError::Unauthorized => "webhook.unauthorized",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MissingHeader { .. }
            | WebhookError::MalformedHeader { .. }
            | WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::IntegrityValidationFailed | WebhookError::UnknownBot => {
                StatusCode::FORBIDDEN
            }
            WebhookError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
