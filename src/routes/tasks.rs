//! Task routes
//!
//! Personal and team task endpoints.

use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath, ApiQuery, ApiResponse, Created, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::tasks::{CreateTaskRequest, TaskFilter, UpdateTaskRequest};
use crate::error::ApiError;

/// GET /api/tasks
///
/// Tasks the principal created or holds, or one team's tasks with `?team=`.
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams::new(filter.page, filter.per_page);
    let page = state
        .services
        .tasks
        .list_tasks(auth.principal(), &filter, &pagination)
        .await?;
    Ok(ApiResponse::paginated(page))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.services.tasks.create_task(auth.principal(), &req).await?;
    Ok(Created(ApiResponse::with_message("Task created", task)))
}

/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(task_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.services.tasks.get_task(auth.principal(), task_id).await?;
    Ok(ApiResponse::new(task))
}

/// PUT /api/tasks/:id
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .services
        .tasks
        .update_task(auth.principal(), task_id, &req)
        .await?;
    Ok(ApiResponse::with_message("Task updated", task))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(task_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.tasks.delete_task(auth.principal(), task_id).await?;
    Ok(ApiResponse::message("Task deleted"))
}

/// POST /api/teams/:id/tasks
pub async fn create_team_task(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiJson(mut req): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.team = Some(team_id);
    let task = state.services.tasks.create_task(auth.principal(), &req).await?;
    Ok(Created(ApiResponse::with_message("Task created", task)))
}

/// GET /api/teams/:id/tasks
pub async fn list_team_tasks(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ApiPath(team_id): ApiPath<Uuid>,
    ApiQuery(mut filter): ApiQuery<TaskFilter>,
) -> Result<impl IntoResponse, ApiError> {
    filter.team = Some(team_id);
    let pagination = PaginationParams::new(filter.page, filter.per_page);
    let page = state
        .services
        .tasks
        .list_tasks(auth.principal(), &filter, &pagination)
        .await?;
    Ok(ApiResponse::paginated(page))
}
