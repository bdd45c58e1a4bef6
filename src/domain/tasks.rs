//! Task domain types
//!
//! Personal tasks have no team, no assignee and `personal` visibility.
//! Team tasks are `team` when open and `assigned` when directed at a member;
//! every assignee change is appended to `assignment_history`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::validation::{char_len, FieldErrors};

pub const TASK_TITLE_MAX: usize = 100;
pub const TASK_DESCRIPTION_MAX: usize = 1000;
pub const TAG_MAX: usize = 30;

/// History reason recorded when an assignee is removed from the team
pub const REASON_MEMBER_REMOVED: &str = "member-removed";
/// History reason recorded when an assignee leaves the team
pub const REASON_MEMBER_LEFT: &str = "member-left";

/// Task status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(Self::Todo),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Task priority enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Visibility scope tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Personal,
    Team,
    Assigned,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Team => "team",
            Self::Assigned => "assigned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "personal" => Some(Self::Personal),
            "team" => Some(Self::Team),
            "assigned" => Some(Self::Assigned),
            _ => None,
        }
    }

    /// Visibility implied by team binding and assignee
    pub fn derive(team: Option<Uuid>, assigned_to: Option<Uuid>) -> Self {
        match (team, assigned_to) {
            (None, _) => Self::Personal,
            (Some(_), Some(_)) => Self::Assigned,
            (Some(_), None) => Self::Team,
        }
    }
}

/// One entry of the append-only assignment log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEntry {
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Uuid,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Task entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub team: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub visibility: Visibility,
    pub assignment_date: Option<DateTime<Utc>>,
    pub assignment_history: Vec<AssignmentEntry>,
    /// Optimistic concurrency token, bumped by the store on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Overdue is derived, never stored
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < now)
    }

    pub fn completed_within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.completed_at.is_some_and(|at| at > from && at <= to)
    }

    /// Change status keeping `completed_at` set iff the task is completed.
    /// Re-setting the current status is a no-op.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.completed_at = (status == TaskStatus::Completed).then_some(now);
    }

    /// Point the task at a new assignee and log it. No-op when unchanged.
    pub fn assign(
        &mut self,
        assigned_to: Option<Uuid>,
        assigned_by: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if self.team.is_none() || self.assigned_to == assigned_to {
            return false;
        }
        self.assigned_to = assigned_to;
        self.assignment_date = Some(now);
        self.visibility = Visibility::derive(self.team, assigned_to);
        self.assignment_history.push(AssignmentEntry {
            assigned_to,
            assigned_by,
            at: now,
            reason,
        });
        true
    }
}

/// Request DTO for creating a task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub team: Option<Uuid>,
    #[serde(default)]
    pub assigned_to: Option<Uuid>,
}

/// Validated task fields ready to become a [`Task`]
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
}

impl CreateTaskRequest {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<NewTask, FieldErrors> {
        let mut errors = FieldErrors::default();
        let title = validate_title(&self.title, &mut errors);
        let description = validate_description(self.description.as_deref(), &mut errors);
        let tags = normalize_tags(&self.tags, &mut errors);

        match self.due_date {
            None if self.team.is_some() => {
                errors.push("dueDate", "Due date is required for team tasks")
            }
            Some(due) => validate_due_date(due, now, &mut errors),
            None => {}
        }

        errors.into_result(NewTask {
            title,
            description,
            status: self.status.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            tags,
            due_date: self.due_date,
        })
    }
}

/// Request DTO for updating a task.
/// `assignedTo: null` unassigns; an absent key leaves the assignee alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<Uuid>>,
    #[serde(default)]
    pub assignment_reason: Option<String>,
}

/// Validated form of [`UpdateTaskRequest`]
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub assigned_to: Option<Option<Uuid>>,
    pub assignment_reason: Option<String>,
}

impl UpdateTaskRequest {
    /// Checks the fields that do not depend on the stored task
    pub fn validate(&self, now: DateTime<Utc>) -> Result<TaskPatch, FieldErrors> {
        let mut errors = FieldErrors::default();
        let title = self.title.as_deref().map(|t| validate_title(t, &mut errors));
        let description = self
            .description
            .as_ref()
            .map(|d| validate_description(d.as_deref(), &mut errors));
        let tags = self.tags.as_ref().map(|t| normalize_tags(t, &mut errors));
        if let Some(Some(due)) = self.due_date {
            validate_due_date(due, now, &mut errors);
        }

        errors.into_result(TaskPatch {
            title,
            description,
            status: self.status,
            priority: self.priority,
            tags,
            due_date: self.due_date,
            assigned_to: self.assigned_to,
            assignment_reason: self
                .assignment_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        })
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_title(raw: &str, errors: &mut FieldErrors) -> String {
    let title = raw.trim();
    match char_len(title) {
        0 => errors.push("title", "Title is required"),
        n if n > TASK_TITLE_MAX => errors.push(
            "title",
            format!("Title must be at most {} characters", TASK_TITLE_MAX),
        ),
        _ => {}
    }
    title.to_string()
}

fn validate_description(raw: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    let description = raw.map(str::trim).filter(|d| !d.is_empty())?;
    if char_len(description) > TASK_DESCRIPTION_MAX {
        errors.push(
            "description",
            format!(
                "Description must be at most {} characters",
                TASK_DESCRIPTION_MAX
            ),
        );
    }
    Some(description.to_string())
}

fn validate_due_date(due: DateTime<Utc>, now: DateTime<Utc>, errors: &mut FieldErrors) {
    if due.date_naive() < now.date_naive() {
        errors.push("dueDate", "Due date cannot be in the past");
    }
}

/// Trim, drop empties and deduplicate while keeping first-seen order
fn normalize_tags(raw: &[String], errors: &mut FieldErrors) -> Vec<String> {
    let mut tags: Vec<String> = Vec::with_capacity(raw.len());
    for tag in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if char_len(tag) > TAG_MAX {
            errors.push("tags", format!("Tags must be at most {} characters", TAG_MAX));
            continue;
        }
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Query parameters accepted by task listings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    pub team: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    /// `true` keeps only tasks nobody holds
    pub unassigned: Option<bool>,
    pub created_by: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub visibility: Option<Visibility>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub tag: Option<String>,
    pub overdue: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Response DTO for task
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub created_by: Uuid,
    pub team: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub visibility: Visibility,
    pub assignment_date: Option<DateTime<Utc>>,
    pub assignment_history: Vec<AssignmentEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskResponse {
    pub fn from_task(t: Task, now: DateTime<Utc>) -> Self {
        Self {
            overdue: t.is_overdue(now),
            id: t.id,
            title: t.title,
            description: t.description,
            status: t.status,
            priority: t.priority,
            tags: t.tags,
            due_date: t.due_date,
            completed_at: t.completed_at,
            created_by: t.created_by,
            team: t.team,
            assigned_to: t.assigned_to,
            visibility: t.visibility,
            assignment_date: t.assignment_date,
            assignment_history: t.assignment_history,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}
