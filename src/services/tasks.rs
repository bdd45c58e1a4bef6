//! Task lifecycle: creation, updates with assignment bookkeeping, deletion
//! and visibility-filtered listings.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{Clock, MAX_WRITE_ATTEMPTS, RELEASE_ATTEMPTS};
use crate::api::pagination::{Page, PaginationParams};
use crate::authz::{authorize, authorize_personal_task, Operation};
use crate::domain::tasks::{CreateTaskRequest, TaskFilter, TaskResponse, UpdateTaskRequest};
use crate::domain::{Principal, Task, TaskStatus, Team, Visibility};
use crate::error::{ApiError, ApiResult, CONCURRENT_MODIFICATION};
use crate::store::{Store, StoreError, TaskQuery};

#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn Store>,
    clock: Clock,
}

impl TaskService {
    pub fn new(store: Arc<dyn Store>, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub async fn create_task(
        &self,
        principal: &Principal,
        req: &CreateTaskRequest,
    ) -> ApiResult<TaskResponse> {
        let now = (self.clock)();
        let new = req.validate(now)?;

        let team = match req.team {
            Some(team_id) => {
                let team = self.load_team(team_id).await?;
                authorize(principal.id, &team, Operation::CreateTeamTask)?;
                if let Some(assignee) = req.assigned_to {
                    require_member(&team, assignee)?;
                }
                Some(team)
            }
            None => None,
        };
        let team_id = team.as_ref().map(|t| t.id);

        let mut task = Task {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            status: TaskStatus::Todo,
            priority: new.priority,
            tags: new.tags,
            due_date: new.due_date,
            completed_at: None,
            created_by: principal.id,
            team: team_id,
            assigned_to: None,
            visibility: Visibility::derive(team_id, None),
            assignment_date: None,
            assignment_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        task.set_status(new.status, now);
        if team_id.is_some() {
            task.assign(req.assigned_to, principal.id, None, now);
        }

        let task = self.store.insert_task(&task).await?;
        info!(task_id = %task.id, team_id = ?task.team, user_id = %principal.id, "Task created");
        Ok(TaskResponse::from_task(task, now))
    }

    pub async fn get_task(&self, principal: &Principal, task_id: Uuid) -> ApiResult<TaskResponse> {
        let task = self.load(task_id).await?;
        match task.team {
            Some(team_id) => {
                let team = self.load_team(team_id).await?;
                authorize(principal.id, &team, Operation::ReadTeamTask(&task))?;
            }
            None => authorize_personal_task(principal.id, &task)?,
        }
        Ok(TaskResponse::from_task(task, (self.clock)()))
    }

    pub async fn update_task(
        &self,
        principal: &Principal,
        task_id: Uuid,
        req: &UpdateTaskRequest,
    ) -> ApiResult<TaskResponse> {
        let patch = req.validate((self.clock)())?;

        let mut attempt = 1;
        loop {
            let now = (self.clock)();
            let mut task = self.load(task_id).await?;
            let expected_version = task.version;
            let team = self.authorize_write(principal, &task).await?;

            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            if let Some(description) = &patch.description {
                task.description = description.clone();
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(tags) = &patch.tags {
                task.tags = tags.clone();
            }
            if let Some(due_date) = patch.due_date {
                if due_date.is_none() && task.team.is_some() {
                    return Err(ApiError::invalid_field(
                        "dueDate",
                        "Due date is required for team tasks",
                    ));
                }
                task.due_date = due_date;
            }
            if let Some(status) = patch.status {
                task.set_status(status, now);
            }
            if let Some(assignee) = patch.assigned_to {
                match &team {
                    Some(team) => {
                        if let Some(user) = assignee {
                            require_member(team, user)?;
                        }
                        task.assign(assignee, principal.id, patch.assignment_reason.clone(), now);
                    }
                    None if assignee.is_some() => {
                        return Err(ApiError::invalid_field(
                            "assignedTo",
                            "Personal tasks cannot be assigned",
                        ));
                    }
                    None => {}
                }
            }
            task.updated_at = now;

            match self.store.update_task(&task, expected_version).await {
                Ok(saved) => {
                    info!(task_id = %task_id, user_id = %principal.id, "Task updated");
                    return Ok(TaskResponse::from_task(saved, now));
                }
                Err(StoreError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(task_id = %task_id, attempt, "Task write conflict, retrying");
                    attempt += 1;
                }
                Err(StoreError::Conflict) => {
                    return Err(ApiError::Conflict(CONCURRENT_MODIFICATION))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn delete_task(&self, principal: &Principal, task_id: Uuid) -> ApiResult<()> {
        let task = self.load(task_id).await?;
        self.authorize_write(principal, &task).await?;

        if !self.store.delete_task(task_id).await? {
            return Err(ApiError::not_found("Task"));
        }
        info!(task_id = %task_id, user_id = %principal.id, "Task deleted");
        Ok(())
    }

    /// Tasks visible to the principal. With `filter.team` the listing covers
    /// that team; otherwise it covers tasks the principal created or holds.
    pub async fn list_tasks(
        &self,
        principal: &Principal,
        filter: &TaskFilter,
        pagination: &PaginationParams,
    ) -> ApiResult<Page<TaskResponse>> {
        let now = (self.clock)();
        let mut query = TaskQuery {
            team: filter.team,
            assigned_to: filter.assigned_to,
            unassigned: filter.unassigned.unwrap_or(false),
            created_by: filter.created_by,
            status: filter.status,
            priority: filter.priority,
            visibility: filter.visibility,
            tag: filter.tag.as_deref().map(str::trim).map(str::to_string),
            due_from: filter.due_from,
            due_to: filter.due_to,
            ..Default::default()
        };

        // Teams the principal may read from, keyed by id
        let teams: HashMap<Uuid, Team> = match filter.team {
            Some(team_id) => {
                let team = self.load_team(team_id).await?;
                authorize(principal.id, &team, Operation::ReadTeam)?;
                HashMap::from([(team.id, team)])
            }
            None => {
                query.involving = Some(principal.id);
                self.store
                    .teams_for_member(principal.id)
                    .await?
                    .into_iter()
                    .map(|t| (t.id, t))
                    .collect()
            }
        };

        let tasks = self.store.find_tasks(&query).await?;
        let total = tasks.len();
        let visible: Vec<TaskResponse> = tasks
            .into_iter()
            .filter(|task| match task.team {
                Some(team_id) => teams.get(&team_id).is_some_and(|team| {
                    authorize(principal.id, team, Operation::ReadTeamTask(task)).is_ok()
                }),
                None => task.created_by == principal.id,
            })
            .filter(|task| filter.overdue.map_or(true, |wanted| task.is_overdue(now) == wanted))
            .map(|task| TaskResponse::from_task(task, now))
            .collect();

        debug!(
            user_id = %principal.id,
            matched = total,
            visible = visible.len(),
            "Task listing filtered"
        );
        Ok(Page::slice(visible, pagination))
    }

    async fn load(&self, task_id: Uuid) -> ApiResult<Task> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Task"))
    }

    async fn load_team(&self, team_id: Uuid) -> ApiResult<Team> {
        self.store
            .get_team(team_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Team"))
    }

    /// Update/delete rule; returns the owning team for team tasks
    async fn authorize_write(&self, principal: &Principal, task: &Task) -> ApiResult<Option<Team>> {
        match task.team {
            Some(team_id) => {
                let team = self.load_team(team_id).await?;
                authorize(principal.id, &team, Operation::ReadTeamTask(task))?;
                authorize(principal.id, &team, Operation::UpdateTeamTask(task))?;
                Ok(Some(team))
            }
            None => {
                authorize_personal_task(principal.id, task)?;
                Ok(None)
            }
        }
    }
}

fn require_member(team: &Team, user: Uuid) -> ApiResult<()> {
    if team.is_member(user) {
        Ok(())
    } else {
        Err(ApiError::invalid_field("assignedTo", "Assignee must be a member of the team"))
    }
}

/// Unassign every task in `team_id` held by `member`, logging `reason`.
/// Runs after the member has left the team document.
pub(crate) async fn release_assignments(
    store: &dyn Store,
    team_id: Uuid,
    member: Uuid,
    released_by: Uuid,
    reason: &str,
    now: DateTime<Utc>,
) -> ApiResult<usize> {
    let tasks = store
        .find_tasks(&TaskQuery::for_team_member(team_id, member))
        .await?;

    let mut released = 0;
    for task in tasks {
        let mut current = task;
        let mut attempt = 1;
        loop {
            let expected_version = current.version;
            if !current.assign(None, released_by, Some(reason.to_string()), now) {
                break;
            }
            current.updated_at = now;

            match store.update_task(&current, expected_version).await {
                Ok(_) => {
                    released += 1;
                    break;
                }
                Err(StoreError::Conflict) if attempt < RELEASE_ATTEMPTS => {
                    attempt += 1;
                    match store.get_task(current.id).await? {
                        Some(fresh) if fresh.assigned_to == Some(member) => current = fresh,
                        _ => break,
                    }
                }
                Err(StoreError::Conflict) => {
                    error!(
                        team_id = %team_id,
                        task_id = %current.id,
                        member_id = %member,
                        "Could not release assignment"
                    );
                    return Err(ApiError::Conflict(CONCURRENT_MODIFICATION));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!(team_id = %team_id, member_id = %member, released, reason, "Released member assignments");
    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Denial;
    use crate::domain::tasks::TaskPriority;
    use crate::domain::teams::{CreateTeamRequest, InviteRequest};
    use crate::domain::TeamRole;
    use crate::services::testing::{ConflictingStore, Harness, TestClock};
    use crate::services::Services;
    use chrono::Duration;
    use std::sync::atomic::Ordering;

    struct Crew {
        owner: Principal,
        dev: Principal,
        ops: Principal,
        team: Uuid,
    }

    async fn crew(h: &Harness) -> Crew {
        let owner = h.user("Owner").await;
        let dev = h.user("Dev").await;
        let ops = h.user("Ops").await;
        let teams = &h.services.teams;
        let team = teams
            .create_team(&owner, &CreateTeamRequest { name: "Alpha".into(), description: None })
            .await
            .unwrap();
        for p in [&dev, &ops] {
            let inv = teams
                .invite_to_team(&owner, team.id, &InviteRequest { email: p.email.clone() })
                .await
                .unwrap();
            teams.accept_invitation(p, inv.id).await.unwrap();
        }
        Crew { owner, dev, ops, team: team.id }
    }

    fn team_task(
        team: Uuid,
        title: &str,
        assigned_to: Option<Uuid>,
        due: DateTime<Utc>,
    ) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.into(),
            team: Some(team),
            assigned_to,
            due_date: Some(due),
            ..Default::default()
        }
    }

    fn patch(json: &str) -> UpdateTaskRequest {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn assignment_history_follows_reassignment_and_removal() {
        let h = Harness::new();
        let c = crew(&h).await;
        let due = h.clock.now() + Duration::days(2);
        let tasks = &h.services.tasks;

        let task = tasks
            .create_task(&c.owner, &team_task(c.team, "Deploy", Some(c.dev.id), due))
            .await
            .unwrap();
        assert_eq!(task.assignment_history.len(), 1);
        assert_eq!(task.visibility, Visibility::Assigned);

        let body = format!(r#"{{"assignedTo": "{}"}}"#, c.ops.id);
        let task = tasks.update_task(&c.owner, task.id, &patch(&body)).await.unwrap();
        assert_eq!(task.assignment_history.len(), 2);
        assert_eq!(task.assignment_history.last().unwrap().assigned_to, Some(c.ops.id));

        h.services.teams.remove_member(&c.owner, c.team, c.ops.id).await.unwrap();

        let stored = h.task(task.id).await;
        assert_eq!(stored.assigned_to, None);
        assert_eq!(stored.visibility, Visibility::Team);
        assert_eq!(stored.assignment_history.len(), 3);
        let last = stored.assignment_history.last().unwrap();
        assert_eq!(last.assigned_to, None);
        assert_eq!(last.reason.as_deref(), Some("member-removed"));
    }

    #[tokio::test]
    async fn leaving_releases_assignments() {
        let h = Harness::new();
        let c = crew(&h).await;
        let due = h.clock.now() + Duration::days(2);
        let task = h
            .services
            .tasks
            .create_task(&c.owner, &team_task(c.team, "Audit", Some(c.dev.id), due))
            .await
            .unwrap();

        h.services.teams.leave_team(&c.dev, c.team).await.unwrap();
        let stored = h.task(task.id).await;
        assert_eq!(stored.assigned_to, None);
        assert_eq!(
            stored.assignment_history.last().unwrap().reason.as_deref(),
            Some("member-left")
        );
    }

    #[tokio::test]
    async fn removal_cascade_outlasts_task_write_conflicts() {
        let h = Harness::new();
        let c = crew(&h).await;
        let due = h.clock.now() + Duration::days(2);
        let task = h
            .services
            .tasks
            .create_task(&c.owner, &team_task(c.team, "Deploy", Some(c.dev.id), due))
            .await
            .unwrap();

        h.store.task_conflicts.store(2, Ordering::SeqCst);
        h.services.teams.remove_member(&c.owner, c.team, c.dev.id).await.unwrap();

        assert!(!h.team(c.team).await.is_member(c.dev.id));
        assert_eq!(h.task(task.id).await.assigned_to, None);
    }

    #[tokio::test]
    async fn repeated_removal_finishes_an_interrupted_cascade() {
        let h = Harness::new();
        let c = crew(&h).await;
        let due = h.clock.now() + Duration::days(2);
        let task = h
            .services
            .tasks
            .create_task(&c.owner, &team_task(c.team, "Deploy", Some(c.dev.id), due))
            .await
            .unwrap();
        let teams = &h.services.teams;

        h.store.task_conflicts.store(u32::MAX, Ordering::SeqCst);
        let err = teams.remove_member(&c.owner, c.team, c.dev.id).await.unwrap_err();
        assert_eq!(err.reason(), Some(CONCURRENT_MODIFICATION));
        assert!(!h.team(c.team).await.is_member(c.dev.id));
        assert_eq!(h.task(task.id).await.assigned_to, Some(c.dev.id));

        h.store.task_conflicts.store(0, Ordering::SeqCst);
        let view = teams.remove_member(&c.owner, c.team, c.dev.id).await.unwrap();
        assert!(view.members.iter().all(|m| m.user_id != c.dev.id));
        let stored = h.task(task.id).await;
        assert_eq!(stored.assigned_to, None);
        assert_eq!(
            stored.assignment_history.last().unwrap().reason.as_deref(),
            Some("member-removed")
        );

        // Nothing left to reconcile
        let err = teams.remove_member(&c.owner, c.team, c.dev.id).await.unwrap_err();
        assert_eq!(err.kind(), "not-found");
    }

    #[tokio::test]
    async fn repeated_leave_finishes_an_interrupted_cascade() {
        let h = Harness::new();
        let c = crew(&h).await;
        let due = h.clock.now() + Duration::days(2);
        let task = h
            .services
            .tasks
            .create_task(&c.owner, &team_task(c.team, "Audit", Some(c.ops.id), due))
            .await
            .unwrap();
        let teams = &h.services.teams;

        h.store.task_conflicts.store(u32::MAX, Ordering::SeqCst);
        assert!(teams.leave_team(&c.ops, c.team).await.is_err());
        assert_eq!(h.task(task.id).await.assigned_to, Some(c.ops.id));

        h.store.task_conflicts.store(0, Ordering::SeqCst);
        teams.leave_team(&c.ops, c.team).await.unwrap();
        assert_eq!(h.task(task.id).await.assigned_to, None);

        let err = teams.leave_team(&c.ops, c.team).await.unwrap_err();
        assert_eq!(err.reason(), Some("not-member"));
    }

    #[tokio::test]
    async fn personal_tasks_ignore_team_fields() {
        let h = Harness::new();
        let c = crew(&h).await;
        let tasks = &h.services.tasks;

        let task = tasks
            .create_task(
                &c.dev,
                &CreateTaskRequest {
                    title: "Read book".into(),
                    assigned_to: Some(c.owner.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.visibility, Visibility::Personal);
        assert_eq!(task.assigned_to, None);
        assert!(task.assignment_history.is_empty());

        // only the creator can see it
        assert_eq!(tasks.get_task(&c.owner, task.id).await.unwrap_err().kind(), "not-found");
        let err = tasks
            .update_task(&c.dev, task.id, &patch(&format!(r#"{{"assignedTo": "{}"}}"#, c.owner.id)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-input");
    }

    #[tokio::test]
    async fn team_task_rules() {
        let h = Harness::new();
        let c = crew(&h).await;
        let tasks = &h.services.tasks;
        let due = h.clock.now() + Duration::days(1);

        let err = tasks
            .create_task(&c.dev, &team_task(c.team, "Nope", None, due))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(Denial::InsufficientRole)));

        let outsider = h.user("Outsider").await;
        let err = tasks
            .create_task(&c.owner, &team_task(c.team, "Nope", Some(outsider.id), due))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-input");

        let task = tasks
            .create_task(&c.owner, &team_task(c.team, "Plan", None, due))
            .await
            .unwrap();
        let err = tasks
            .update_task(&c.dev, task.id, &patch(r#"{"title": "Hijack"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(Denial::InsufficientRole)));
        let err = tasks
            .update_task(&c.owner, task.id, &patch(r#"{"dueDate": null}"#))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid-input");
        assert_eq!(tasks.get_task(&outsider, task.id).await.unwrap_err().kind(), "forbidden");
    }

    #[tokio::test]
    async fn demoted_creator_keeps_control_of_own_task() {
        let h = Harness::new();
        let c = crew(&h).await;
        let tasks = &h.services.tasks;
        let due = h.clock.now() + Duration::days(1);

        h.services
            .teams
            .change_member_role(
                &c.owner,
                c.team,
                c.dev.id,
                &crate::domain::teams::ChangeRoleRequest { role: TeamRole::Admin },
            )
            .await
            .unwrap();
        let task = tasks
            .create_task(&c.dev, &team_task(c.team, "Mine", None, due))
            .await
            .unwrap();
        h.services
            .teams
            .change_member_role(
                &c.owner,
                c.team,
                c.dev.id,
                &crate::domain::teams::ChangeRoleRequest { role: TeamRole::Collaborator },
            )
            .await
            .unwrap();

        tasks
            .update_task(&c.dev, task.id, &patch(r#"{"priority": "high"}"#))
            .await
            .unwrap();
        tasks.delete_task(&c.dev, task.id).await.unwrap();
        assert_eq!(tasks.get_task(&c.owner, task.id).await.unwrap_err().kind(), "not-found");
    }

    #[tokio::test]
    async fn completed_at_tracks_status() {
        let h = Harness::new();
        let c = crew(&h).await;
        let tasks = &h.services.tasks;
        let due = h.clock.now() + Duration::days(1);
        let task = tasks
            .create_task(&c.owner, &team_task(c.team, "Ship", None, due))
            .await
            .unwrap();

        let done = tasks
            .update_task(&c.owner, task.id, &patch(r#"{"status": "completed"}"#))
            .await
            .unwrap();
        assert_eq!(done.completed_at, Some(h.clock.now()));

        let reopened = tasks
            .update_task(&c.owner, task.id, &patch(r#"{"status": "in-progress"}"#))
            .await
            .unwrap();
        assert_eq!(reopened.completed_at, None);
    }

    #[tokio::test]
    async fn listing_respects_visibility() {
        let h = Harness::new();
        let c = crew(&h).await;
        let tasks = &h.services.tasks;
        let due = h.clock.now() + Duration::days(1);

        let open = tasks
            .create_task(&c.owner, &team_task(c.team, "Open", None, due))
            .await
            .unwrap();
        let for_dev = tasks
            .create_task(&c.owner, &team_task(c.team, "Dev", Some(c.dev.id), due))
            .await
            .unwrap();
        let for_ops = tasks
            .create_task(&c.owner, &team_task(c.team, "Ops", Some(c.ops.id), due))
            .await
            .unwrap();

        let filter = TaskFilter { team: Some(c.team), ..Default::default() };
        let params = PaginationParams::default();
        let ids =
            |page: Page<TaskResponse>| page.items.into_iter().map(|t| t.id).collect::<Vec<_>>();

        let seen = ids(tasks.list_tasks(&c.dev, &filter, &params).await.unwrap());
        assert!(seen.contains(&open.id));
        assert!(seen.contains(&for_dev.id));
        assert!(!seen.contains(&for_ops.id));

        let seen = ids(tasks.list_tasks(&c.owner, &filter, &params).await.unwrap());
        assert_eq!(seen.len(), 3);

        // unscoped listing covers tasks the principal holds
        let seen = ids(tasks.list_tasks(&c.dev, &TaskFilter::default(), &params).await.unwrap());
        assert_eq!(seen, vec![for_dev.id]);

        let open_only = TaskFilter {
            team: Some(c.team),
            unassigned: Some(true),
            ..Default::default()
        };
        let seen = ids(tasks.list_tasks(&c.owner, &open_only, &params).await.unwrap());
        assert_eq!(seen, vec![open.id]);

        let mine = tasks
            .create_task(&c.dev, &CreateTaskRequest { title: "Notes".into(), ..Default::default() })
            .await
            .unwrap();
        let by_dev = TaskFilter { created_by: Some(c.dev.id), ..Default::default() };
        let seen = ids(tasks.list_tasks(&c.dev, &by_dev, &params).await.unwrap());
        assert_eq!(seen, vec![mine.id]);

        let outsider = h.user("Outsider").await;
        let err = tasks.list_tasks(&outsider, &filter, &params).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(Denial::NotMember)));
    }

    #[tokio::test]
    async fn listing_filters_overdue_and_paginates() {
        let h = Harness::new();
        let c = crew(&h).await;
        let tasks = &h.services.tasks;

        for i in 0..5 {
            let due = h.clock.now() + Duration::hours(2 + i);
            tasks
                .create_task(
                    &c.owner,
                    &CreateTaskRequest {
                        title: format!("Task {i}"),
                        priority: Some(TaskPriority::High),
                        team: Some(c.team),
                        due_date: Some(due),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            h.clock.advance(Duration::minutes(1));
        }
        h.clock.advance(Duration::hours(4));

        let overdue = TaskFilter {
            team: Some(c.team),
            overdue: Some(true),
            ..Default::default()
        };
        let page = tasks
            .list_tasks(&c.owner, &overdue, &PaginationParams::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.meta.total_items, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|t| t.overdue));
        assert!(page.meta.has_next);
    }

    #[tokio::test]
    async fn inactive_team_tasks_are_unreadable() {
        let h = Harness::new();
        let c = crew(&h).await;
        let due = h.clock.now() + Duration::days(1);
        let task = h
            .services
            .tasks
            .create_task(&c.owner, &team_task(c.team, "Ghost", Some(c.dev.id), due))
            .await
            .unwrap();

        h.services.teams.delete_team(&c.owner, c.team).await.unwrap();
        let err = h.services.tasks.get_task(&c.dev, task.id).await.unwrap_err();
        assert_eq!(err.kind(), "not-found");
        let mine = h
            .services
            .tasks
            .list_tasks(&c.dev, &TaskFilter::default(), &PaginationParams::default())
            .await
            .unwrap();
        assert!(mine.items.is_empty());
    }

    #[tokio::test]
    async fn concurrent_reassignment_retries_then_conflicts() {
        let clock = TestClock::new();
        let store = Arc::new(ConflictingStore::new(0, 0));
        let services = Services::new(store.clone(), clock.clock(), Duration::days(7));
        let me = Principal::new(Uuid::new_v4(), "Me", "me@x");
        store.upsert_user(&me, clock.now()).await.unwrap();
        let task = services
            .tasks
            .create_task(&me, &CreateTaskRequest { title: "Solo".into(), ..Default::default() })
            .await
            .unwrap();

        store.task_conflicts.store(1, Ordering::SeqCst);
        let updated = services
            .tasks
            .update_task(&me, task.id, &patch(r#"{"title": "Solo 2"}"#))
            .await
            .unwrap();
        assert_eq!(updated.title, "Solo 2");

        store.task_conflicts.store(2, Ordering::SeqCst);
        let err = services
            .tasks
            .update_task(&me, task.id, &patch(r#"{"title": "Solo 3"}"#))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), Some(CONCURRENT_MODIFICATION));
    }
}
