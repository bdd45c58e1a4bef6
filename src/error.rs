//! Unified API error handling
//!
//! Every failure leaves the service as an [`ApiError`] and reaches the client
//! as the uniform envelope `{success: false, message, kind, ...}`.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::authz::Denial;
use crate::domain::{FieldError, FieldErrors};
use crate::store::StoreError;

/// Duplicate reasons reported with `conflict`
pub const ALREADY_MEMBER: &str = "already-member";
pub const ALREADY_INVITED: &str = "already-invited";
pub const CONCURRENT_MODIFICATION: &str = "concurrent-modification";
pub const EMAIL_TAKEN: &str = "email-taken";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input")]
    InvalidInput(Vec<FieldError>),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(Denial),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(&'static str),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        FieldErrors::single(field, message).into()
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable kind string
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid-input",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not-found",
            Self::Conflict(_) => "conflict",
            Self::InvalidState(_) => "invalid-state",
            Self::Internal(_) => "internal",
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Forbidden(denial) => Some(denial.as_str()),
            Self::Conflict(reason) => Some(*reason),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(_) => "Validation failed".to_string(),
            Self::Unauthorized(msg) => msg.clone(),
            Self::Forbidden(denial) => format!("Operation not permitted ({})", denial),
            Self::NotFound(what) => format!("{} not found", what),
            Self::Conflict(reason) => format!("Request conflicts with current state ({})", reason),
            Self::InvalidState(msg) => msg.clone(),
            // Don't leak internal error details
            Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        Self::InvalidInput(errors.into_inner())
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotFound => Self::NotFound("Resource".to_string()),
            other => Self::Forbidden(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => Self::Conflict(CONCURRENT_MODIFICATION),
            StoreError::EmailTaken => Self::Conflict(EMAIL_TAKEN),
            StoreError::Backend(e) => Self::Internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_field("body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::invalid_field("path", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_field("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut correlation_id = None;

        // Log internal errors
        match &self {
            Self::Internal(e) => {
                let id = Uuid::new_v4().to_string();
                tracing::error!(correlation_id = %id, error = ?e, "Internal server error");
                correlation_id = Some(id);
            }
            _ => {
                tracing::warn!(kind = self.kind(), error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            success: false,
            message: self.public_message(),
            kind: self.kind(),
            reason: self.reason(),
            errors: match self {
                Self::InvalidInput(errors) => errors,
                _ => Vec::new(),
            },
            correlation_id,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
