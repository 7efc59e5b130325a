//! Error types for the relay's external boundaries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::intake::ValidationRejection;

/// Failure to persist a record.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Notion API returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notion response did not include a page id")]
    InvalidResponse,
}

/// Failure anywhere on the thank-you email path.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Mail configuration invalid: {0}")]
    Config(String),

    #[error("Access token request failed: {0}")]
    Token(String),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("SMTP server did not accept the connection test")]
    Unverified,

    #[error("Template rendering failed: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// Errors that end a webhook request early.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Submission rejected: {}", .0.error)]
    Rejected(ValidationRejection),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl From<ValidationRejection> for RelayError {
    fn from(rejection: ValidationRejection) -> Self {
        RelayError::Rejected(rejection)
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::Rejected(rejection) => {
                (StatusCode::BAD_REQUEST, Json(rejection)).into_response()
            }
            RelayError::Sink(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to submit form data to Notion",
                    "details": e.to_string(),
                })),
            )
                .into_response(),
        }
    }
}
