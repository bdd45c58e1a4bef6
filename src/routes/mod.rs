pub mod analytics;
pub mod health;
pub mod me;
pub mod tasks;
pub mod teams;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes; mounted under `/api`
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Identity
        .route("/auth/me", get(me::get_me))
        // Teams
        .route("/teams", get(teams::list_teams).post(teams::create_team))
        .route("/teams/invitations", get(teams::list_invitations))
        .route(
            "/teams/invitations/:id/accept",
            post(teams::accept_invitation),
        )
        .route(
            "/teams/invitations/:id/decline",
            post(teams::decline_invitation),
        )
        .route(
            "/teams/:id",
            get(teams::get_team)
                .put(teams::update_team)
                .delete(teams::delete_team),
        )
        .route("/teams/:id/invite", post(teams::invite_member))
        .route(
            "/teams/:id/invitations/:invitation_id",
            axum::routing::delete(teams::revoke_invitation),
        )
        .route("/teams/:id/leave", post(teams::leave_team))
        .route(
            "/teams/:id/members/:member_id",
            axum::routing::delete(teams::remove_member),
        )
        .route(
            "/teams/:id/members/:member_id/role",
            put(teams::change_member_role),
        )
        .route(
            "/teams/:id/transfer-ownership/:member_id",
            put(teams::transfer_ownership),
        )
        // Team-scoped tasks
        .route(
            "/teams/:id/tasks",
            get(tasks::list_team_tasks).post(tasks::create_team_task),
        )
        // Analytics
        .route("/teams/:id/analytics", get(analytics::team_analytics))
        .route("/teams/:id/workload", get(analytics::workload))
        .route("/teams/:id/trends", get(analytics::trends))
        .route(
            "/teams/:id/members/:member_id/analytics",
            get(analytics::member_analytics),
        )
        // Tasks
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
}
