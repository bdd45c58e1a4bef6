//! PostgreSQL store.
//!
//! Team members and invitations live in JSONB arrays on the team row so a
//! membership change is one conditional `UPDATE ... WHERE version = $n`.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, TaskQuery};
use crate::domain::tasks::AssignmentEntry;
use crate::domain::{
    Invitation, Member, Principal, Task, TaskPriority, TaskStatus, Team, User, UserRole,
    Visibility,
};

const USER_COLUMNS: &str =
    "id, name, email, role, preferences, is_deleted, created_at, last_active";
const TEAM_COLUMNS: &str = "id, name, description, created_by, is_active, members, invitations, \
     version, created_at, updated_at";
const TASK_COLUMNS: &str = "id, title, description, status, priority, tags, due_date, \
     completed_at, created_by, team_id, assigned_to, visibility, assignment_date, \
     assignment_history, version, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    preferences: serde_json::Value,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: UserRole::parse(&row.role),
            preferences: row.preferences,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            last_active: row.last_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_by: Uuid,
    is_active: bool,
    members: Json<Vec<Member>>,
    invitations: Json<Vec<Invitation>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_by: row.created_by,
            is_active: row.is_active,
            members: row.members.0,
            invitations: row.invitations.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    tags: Vec<String>,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_by: Uuid,
    team_id: Option<Uuid>,
    assigned_to: Option<Uuid>,
    visibility: String,
    assignment_date: Option<DateTime<Utc>>,
    assignment_history: Json<Vec<AssignmentEntry>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("task {} has unknown status {:?}", row.id, row.status))?;
        let priority = TaskPriority::parse(&row.priority)
            .ok_or_else(|| anyhow!("task {} has unknown priority {:?}", row.id, row.priority))?;
        let visibility = Visibility::parse(&row.visibility).ok_or_else(|| {
            anyhow!("task {} has unknown visibility {:?}", row.id, row.visibility)
        })?;

        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            status,
            priority,
            tags: row.tags,
            due_date: row.due_date,
            completed_at: row.completed_at,
            created_by: row.created_by,
            team: row.team_id,
            assigned_to: row.assigned_to,
            visibility,
            assignment_date: row.assignment_date,
            assignment_history: row.assignment_history.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_tasks(rows: Vec<TaskRow>) -> StoreResult<Vec<Task>> {
    rows.into_iter().map(Task::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_user(&self, principal: &Principal, now: DateTime<Utc>) -> StoreResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, created_at, last_active)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = CASE WHEN EXCLUDED.name <> '' THEN EXCLUDED.name ELSE users.name END,
                email = EXCLUDED.email,
                last_active = EXCLUDED.last_active
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(principal.id)
        .bind(&principal.name)
        .bind(&principal.email)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db)
                if db.is_unique_violation() && db.constraint() == Some("users_email_key") =>
            {
                StoreError::EmailTaken
            }
            _ => err.into(),
        })?;

        Ok(row.into())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND NOT is_deleted"
        ))
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_team(&self, team: &Team) -> StoreResult<Team> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            r#"
            INSERT INTO teams (id, name, description, created_by, is_active, members, invitations,
                               version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9)
            RETURNING {TEAM_COLUMNS}
            "#
        ))
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.created_by)
        .bind(team.is_active)
        .bind(Json(&team.members))
        .bind(Json(&team.invitations))
        .bind(team.created_at)
        .bind(team.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn teams_for_member(&self, user: Uuid) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!(
            r#"
            SELECT {TEAM_COLUMNS} FROM teams
            WHERE is_active AND members @> $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(Json(serde_json::json!([{ "userId": user }])))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn teams_with_pending_invitation(
        &self,
        email: &str,
        user: Uuid,
    ) -> StoreResult<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(&format!(
            r#"
            SELECT {TEAM_COLUMNS} FROM teams
            WHERE is_active AND (invitations @> $1 OR invitations @> $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(Json(serde_json::json!([
            { "inviteeEmail": email.to_lowercase(), "status": "pending" }
        ])))
        .bind(Json(serde_json::json!([
            { "inviteeUserId": user, "status": "pending" }
        ])))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn team_by_invitation(&self, invitation_id: Uuid) -> StoreResult<Option<Team>> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE invitations @> $1"
        ))
        .bind(Json(serde_json::json!([{ "id": invitation_id }])))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update_team(&self, team: &Team, expected_version: i64) -> StoreResult<Team> {
        let row = sqlx::query_as::<_, TeamRow>(&format!(
            r#"
            UPDATE teams SET
                name = $3,
                description = $4,
                is_active = $5,
                members = $6,
                invitations = $7,
                updated_at = $8,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {TEAM_COLUMNS}
            "#
        ))
        .bind(team.id)
        .bind(expected_version)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.is_active)
        .bind(Json(&team.members))
        .bind(Json(&team.invitations))
        .bind(team.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::Conflict)?;

        Ok(row.into())
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, tags, due_date,
                               completed_at, created_by, team_id, assigned_to, visibility,
                               assignment_date, assignment_history, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 1, $15, $16)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(&task.tags)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.created_by)
        .bind(task.team)
        .bind(task.assigned_to)
        .bind(task.visibility.as_str())
        .bind(task.assignment_date)
        .bind(Json(&task.assignment_history))
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Task::try_from).transpose()
    }

    async fn find_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks WHERE TRUE"));

        if let Some(team) = query.team {
            qb.push(" AND team_id = ").push_bind(team);
        }
        if let Some(user) = query.assigned_to {
            qb.push(" AND assigned_to = ").push_bind(user);
        }
        if query.unassigned {
            qb.push(" AND assigned_to IS NULL");
        }
        if let Some(user) = query.created_by {
            qb.push(" AND created_by = ").push_bind(user);
        }
        if let Some(user) = query.involving {
            qb.push(" AND (created_by = ")
                .push_bind(user)
                .push(" OR assigned_to = ")
                .push_bind(user)
                .push(")");
        }
        if let Some(status) = query.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(priority) = query.priority {
            qb.push(" AND priority = ").push_bind(priority.as_str());
        }
        if let Some(visibility) = query.visibility {
            qb.push(" AND visibility = ").push_bind(visibility.as_str());
        }
        if let Some(tag) = &query.tag {
            qb.push(" AND ").push_bind(tag.clone()).push(" = ANY(tags)");
        }
        if let Some(from) = query.due_from {
            qb.push(" AND due_date >= ").push_bind(from);
        }
        if let Some(to) = query.due_to {
            qb.push(" AND due_date <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let rows = qb.build_query_as::<TaskRow>().fetch_all(&self.pool).await?;
        into_tasks(rows)
    }

    async fn update_task(&self, task: &Task, expected_version: i64) -> StoreResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks SET
                title = $3,
                description = $4,
                status = $5,
                priority = $6,
                tags = $7,
                due_date = $8,
                completed_at = $9,
                assigned_to = $10,
                visibility = $11,
                assignment_date = $12,
                assignment_history = $13,
                updated_at = $14,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(expected_version)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(&task.tags)
        .bind(task.due_date)
        .bind(task.completed_at)
        .bind(task.assigned_to)
        .bind(task.visibility.as_str())
        .bind(task.assignment_date)
        .bind(Json(&task.assignment_history))
        .bind(task.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::Conflict)?;

        row.try_into()
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
