use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::api::ApiResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::ApiError;

/// GET /api/auth/me
///
/// The stored user record behind the bearer token.
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .get_user(auth.user_id())
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(ApiResponse::new(user))
}
