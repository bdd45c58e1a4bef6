//! Analytics routes, all computed against the request time

use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ApiPath, ApiResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::ApiError;

/// GET /api/teams/:id/analytics
pub async fn team_analytics(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let bundle = state
        .services
        .analytics
        .team_analytics(auth.principal(), team_id, (state.clock)())
        .await?;
    Ok(ApiResponse::new(bundle))
}

/// GET /api/teams/:id/members/:member_id/analytics
pub async fn member_analytics(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath((team_id, member_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let bundle = state
        .services
        .analytics
        .member_analytics(auth.principal(), team_id, member_id, (state.clock)())
        .await?;
    Ok(ApiResponse::new(bundle))
}

/// GET /api/teams/:id/workload
pub async fn workload(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let workload = state
        .services
        .analytics
        .workload(auth.principal(), team_id, (state.clock)())
        .await?;
    Ok(ApiResponse::new(workload))
}

/// GET /api/teams/:id/trends
pub async fn trends(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let trends = state
        .services
        .analytics
        .trends(auth.principal(), team_id, (state.clock)())
        .await?;
    Ok(ApiResponse::new(trends))
}
