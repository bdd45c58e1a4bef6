//! Success envelope: `{success: true, message?, data, pagination?}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::pagination::{Page, PaginationMeta};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            pagination: None,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(data)
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn paginated(page: Page<T>) -> Self {
        Self {
            pagination: Some(page.meta),
            ..Self::new(page.items)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl ApiResponse<Option<()>> {
    /// Envelope for operations that return nothing
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_message(message, None)
    }
}

/// 201 with the success envelope
pub struct Created<T: Serialize>(pub ApiResponse<T>);

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}
