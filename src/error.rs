//! Error taxonomy shared by the session core and the HTTP boundary.
//!
//! Every public session operation classifies its own failures into
//! [`AuthError`]; the HTTP layer only maps a variant to a status code and a
//! JSON body. Internal failures keep their cause for the server log and are
//! answered with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

const INTERNAL_MESSAGE: &str = "Something went wrong!";

/// A single rejected input field.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input")]
    Validation(Vec<FieldError>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Authentication(String),
    /// No credential was presented where one is required.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Authentication(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller; internal causes are never exposed.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(_) => "Invalid input".to_string(),
            Self::Internal(_) => INTERNAL_MESSAGE.to_string(),
            Self::Conflict(message)
            | Self::Authentication(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message) => message.clone(),
        }
    }

    pub(crate) fn internal(message: &str) -> Self {
        Self::Internal(anyhow::anyhow!(message.to_string()))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Validation(errors) => (status, Json(json!({ "errors": errors }))).into_response(),
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                (status, Json(json!({ "message": INTERNAL_MESSAGE }))).into_response()
            }
            other => (status, Json(json!({ "message": other.public_message() }))).into_response(),
        }
    }
}
