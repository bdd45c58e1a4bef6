use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use super::AuthContext;
use crate::app::AppState;
use crate::domain::Principal;
use crate::error::ApiError;

/// Extractor that requires a valid bearer token.
///
/// The principal behind the token is upserted into the user store so that
/// team hydration and invitation lookups see a current record.
///
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.principal.id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl RequireAuth {
    pub fn principal(&self) -> &Principal {
        &self.0.principal
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        ApiError::Unauthorized("Missing authorization token".into())
                    } else {
                        ApiError::Unauthorized("Invalid authorization format".into())
                    }
                })?;

        let claims = state.verifier.verify(bearer.token()).map_err(|e| {
            tracing::warn!(error = %e, "JWT verification failed");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        let context = AuthContext::from_claims(&claims).map_err(|e| {
            tracing::warn!(error = %e, "Failed to build auth context");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        state
            .store
            .upsert_user(&context.principal, (state.clock)())
            .await?;

        Ok(RequireAuth(context))
    }
}
