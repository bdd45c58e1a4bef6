//! Persistence boundary
//!
//! Three document families: users, teams (members and invitations embedded)
//! and tasks. Team and task writes are compare-and-set on a `version`
//! counter; a stale version is reported as [`StoreError::Conflict`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Principal, Task, TaskPriority, TaskStatus, Team, User, Visibility};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The document changed since it was read
    #[error("optimistic concurrency conflict")]
    Conflict,

    /// Another user already holds this email
    #[error("email already in use")]
    EmailTaken,

    #[error("store backend failure")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Indexed task lookup. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub team: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    /// Only tasks without an assignee
    pub unassigned: bool,
    pub created_by: Option<Uuid>,
    /// Created by or assigned to this user
    pub involving: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub visibility: Option<Visibility>,
    pub tag: Option<String>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
}

impl TaskQuery {
    pub fn for_team(team: Uuid) -> Self {
        Self {
            team: Some(team),
            ..Default::default()
        }
    }

    pub fn for_team_member(team: Uuid, user: Uuid) -> Self {
        Self {
            team: Some(team),
            assigned_to: Some(user),
            ..Default::default()
        }
    }

    /// Evaluate the query against one task
    pub fn matches(&self, task: &Task) -> bool {
        self.team.map_or(true, |t| task.team == Some(t))
            && self.assigned_to.map_or(true, |u| task.assigned_to == Some(u))
            && (!self.unassigned || task.assigned_to.is_none())
            && self.created_by.map_or(true, |u| task.created_by == u)
            && self
                .involving
                .map_or(true, |u| task.created_by == u || task.assigned_to == Some(u))
            && self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
            && self.visibility.map_or(true, |v| task.visibility == v)
            && self
                .tag
                .as_deref()
                .map_or(true, |tag| task.tags.iter().any(|t| t == tag))
            && self
                .due_from
                .map_or(true, |from| task.due_date.is_some_and(|d| d >= from))
            && self
                .due_to
                .map_or(true, |to| task.due_date.is_some_and(|d| d <= to))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or refresh the user record behind an authenticated principal
    async fn upsert_user(&self, principal: &Principal, now: DateTime<Utc>) -> StoreResult<User>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn insert_team(&self, team: &Team) -> StoreResult<Team>;
    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>>;
    /// Active teams listing the user as a member
    async fn teams_for_member(&self, user: Uuid) -> StoreResult<Vec<Team>>;
    /// Active teams holding a pending invitation for the email or user id
    async fn teams_with_pending_invitation(
        &self,
        email: &str,
        user: Uuid,
    ) -> StoreResult<Vec<Team>>;
    async fn team_by_invitation(&self, invitation_id: Uuid) -> StoreResult<Option<Team>>;
    /// Compare-and-set on the whole team document
    async fn update_team(&self, team: &Team, expected_version: i64) -> StoreResult<Team>;

    async fn insert_task(&self, task: &Task) -> StoreResult<Task>;
    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>>;
    /// Matching tasks, newest first
    async fn find_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<Task>>;
    /// Compare-and-set on the whole task document
    async fn update_task(&self, task: &Task, expected_version: i64) -> StoreResult<Task>;
    /// Returns false when nothing was deleted
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    /// Cheap connectivity probe
    async fn ping(&self) -> StoreResult<()>;
    fn backend(&self) -> &'static str;
}
