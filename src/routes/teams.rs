//! Team routes
//!
//! Membership, invitations and role management.

use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath, ApiResponse, Created};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::teams::{ChangeRoleRequest, CreateTeamRequest, InviteRequest, UpdateTeamRequest};
use crate::error::ApiError;

/// GET /api/teams
pub async fn list_teams(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let teams = state.services.teams.list_user_teams(auth.principal()).await?;
    Ok(ApiResponse::new(teams))
}

/// POST /api/teams
pub async fn create_team(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiJson(req): ApiJson<CreateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state.services.teams.create_team(auth.principal(), &req).await?;
    Ok(Created(ApiResponse::with_message("Team created", team)))
}

/// GET /api/teams/:id
pub async fn get_team(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state.services.teams.get_team(auth.principal(), team_id).await?;
    Ok(ApiResponse::new(team))
}

/// PUT /api/teams/:id
pub async fn update_team(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state
        .services
        .teams
        .update_team(auth.principal(), team_id, &req)
        .await?;
    Ok(ApiResponse::with_message("Team updated", team))
}

/// DELETE /api/teams/:id
pub async fn delete_team(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.teams.delete_team(auth.principal(), team_id).await?;
    Ok(ApiResponse::message("Team deleted"))
}

/// POST /api/teams/:id/invite
pub async fn invite_member(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invitation = state
        .services
        .teams
        .invite_to_team(auth.principal(), team_id, &req)
        .await?;
    Ok(Created(ApiResponse::with_message("Invitation sent", invitation)))
}

/// DELETE /api/teams/:id/invitations/:invitation_id
pub async fn revoke_invitation(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath((team_id, invitation_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .teams
        .revoke_invitation(auth.principal(), team_id, invitation_id)
        .await?;
    Ok(ApiResponse::message("Invitation revoked"))
}

/// GET /api/teams/invitations
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let invitations = state.services.teams.list_invitations(auth.principal()).await?;
    Ok(ApiResponse::new(invitations))
}

/// POST /api/teams/invitations/:id/accept
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(invitation_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state
        .services
        .teams
        .accept_invitation(auth.principal(), invitation_id)
        .await?;
    Ok(ApiResponse::with_message("Invitation accepted", team))
}

/// POST /api/teams/invitations/:id/decline
pub async fn decline_invitation(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(invitation_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .teams
        .decline_invitation(auth.principal(), invitation_id)
        .await?;
    Ok(ApiResponse::message("Invitation declined"))
}

/// POST /api/teams/:id/leave
pub async fn leave_team(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.teams.leave_team(auth.principal(), team_id).await?;
    Ok(ApiResponse::message("Left team"))
}

/// DELETE /api/teams/:id/members/:member_id
pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath((team_id, member_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state
        .services
        .teams
        .remove_member(auth.principal(), team_id, member_id)
        .await?;
    Ok(ApiResponse::with_message("Member removed", team))
}

/// PUT /api/teams/:id/members/:member_id/role
pub async fn change_member_role(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath((team_id, member_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state
        .services
        .teams
        .change_member_role(auth.principal(), team_id, member_id, &req)
        .await?;
    Ok(ApiResponse::with_message("Member role updated", team))
}

/// PUT /api/teams/:id/transfer-ownership/:member_id
pub async fn transfer_ownership(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath((team_id, member_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state
        .services
        .teams
        .transfer_ownership(auth.principal(), team_id, member_id)
        .await?;
    Ok(ApiResponse::with_message("Ownership transferred", team))
}
