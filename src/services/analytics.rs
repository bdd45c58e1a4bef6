//! Read-only analytics over a team's tasks.
//!
//! Each bundle is computed from one indexed task query plus one batched user
//! lookup; all arithmetic happens in memory against the caller's `now`.

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::authz::{authorize, Operation};
use crate::domain::analytics::{
    AnalyticsCore, DayCount, MemberAnalytics, MemberOverdue, MemberPerformance, MemberRef,
    MemberWorkload, PriorityDistribution, StatusDistribution, TeamAnalytics, TeamTrends,
    TeamWorkload, UNASSIGNED,
};
use crate::domain::{Principal, Task, TaskPriority, TaskStatus, Team, User};
use crate::error::{ApiError, ApiResult};
use crate::store::{Store, TaskQuery};

/// Days covered by `completionTrend`
pub const TREND_DAYS: u64 = 7;
/// Days covered by `completionCalendar`
pub const CALENDAR_DAYS: u64 = 90;

const UNKNOWN_MEMBER: &str = "Unknown member";

#[derive(Clone)]
pub struct AnalyticsService {
    store: Arc<dyn Store>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn team_analytics(
        &self,
        principal: &Principal,
        team_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<TeamAnalytics> {
        let team = self.team(principal, team_id, Operation::ReadTeamAnalytics).await?;
        let (tasks, users) = self.team_snapshot(&team).await?;
        let roster = Roster::new(&team, &users);

        debug!(team_id = %team_id, tasks = tasks.len(), "Computing team analytics");
        Ok(TeamAnalytics {
            team_id,
            core: core_metrics(&tasks, now),
            completion_calendar: daily_completions(&tasks, now, CALENDAR_DAYS),
            member_perf_agg: member_performance(&tasks, &roster),
            overdue_agg: overdue_by_member(&tasks, &roster, now),
        })
    }

    pub async fn member_analytics(
        &self,
        principal: &Principal,
        team_id: Uuid,
        member_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<MemberAnalytics> {
        let team = self.team(principal, team_id, Operation::ReadMemberAnalytics).await?;
        if !team.is_member(member_id) {
            return Err(ApiError::not_found("Member"));
        }

        let query = TaskQuery::for_team_member(team_id, member_id);
        let (tasks, user) = futures::try_join!(
            self.store.find_tasks(&query),
            self.store.get_user(member_id),
        )?;

        Ok(MemberAnalytics {
            team_id,
            member: MemberRef {
                id: member_id,
                name: user
                    .as_ref()
                    .map(|u| u.display_name().to_string())
                    .unwrap_or_else(|| UNKNOWN_MEMBER.to_string()),
            },
            core: core_metrics(&tasks, now),
        })
    }

    pub async fn workload(
        &self,
        principal: &Principal,
        team_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<TeamWorkload> {
        let team = self.team(principal, team_id, Operation::ReadTeamAnalytics).await?;
        let (tasks, users) = self.team_snapshot(&team).await?;
        let roster = Roster::new(&team, &users);

        Ok(TeamWorkload {
            team_id,
            members: workload_by_member(&tasks, &roster, now),
        })
    }

    pub async fn trends(
        &self,
        principal: &Principal,
        team_id: Uuid,
        now: DateTime<Utc>,
    ) -> ApiResult<TeamTrends> {
        let team = self.team(principal, team_id, Operation::ReadTeamAnalytics).await?;
        let tasks = self.store.find_tasks(&TaskQuery::for_team(team.id)).await?;
        let (this_week, last_week) = weekly_completions(&tasks, now);

        Ok(TeamTrends {
            team_id,
            completion_trend: daily_completions(&tasks, now, TREND_DAYS),
            completion_calendar: daily_completions(&tasks, now, CALENDAR_DAYS),
            tasks_completed_this_week: this_week,
            tasks_completed_last_week: last_week,
        })
    }

    async fn team(
        &self,
        principal: &Principal,
        team_id: Uuid,
        op: Operation<'_>,
    ) -> ApiResult<Team> {
        let team = self
            .store
            .get_team(team_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Team"))?;
        authorize(principal.id, &team, op)?;
        Ok(team)
    }

    /// Team tasks plus the user records of members and assignees
    async fn team_snapshot(&self, team: &Team) -> ApiResult<(Vec<Task>, Vec<User>)> {
        let tasks = self.store.find_tasks(&TaskQuery::for_team(team.id)).await?;
        let mut ids: Vec<Uuid> = team.members.iter().map(|m| m.user_id).collect();
        ids.extend(tasks.iter().filter_map(|t| t.assigned_to));
        ids.sort_unstable();
        ids.dedup();
        let users = self.store.get_users(&ids).await?;
        Ok((tasks, users))
    }
}

/// Display names for every member, plus any assignee who has since left
struct Roster {
    members: Vec<(Uuid, String)>,
    names: HashMap<Uuid, String>,
}

impl Roster {
    fn new(team: &Team, users: &[User]) -> Self {
        let names: HashMap<Uuid, String> = users
            .iter()
            .map(|u| (u.id, u.display_name().to_string()))
            .collect();
        let members = team
            .members
            .iter()
            .map(|m| {
                let name = names.get(&m.user_id).cloned();
                (m.user_id, name.unwrap_or_else(|| UNKNOWN_MEMBER.to_string()))
            })
            .collect();
        Self { members, names }
    }

    fn name_of(&self, user: Option<Uuid>) -> String {
        match user {
            None => UNASSIGNED.to_string(),
            Some(id) => self
                .names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_MEMBER.to_string()),
        }
    }

    /// Every member first, then buckets for other assignees seen in `tasks`
    fn buckets(&self, tasks: &[Task]) -> Vec<(Option<Uuid>, String)> {
        let mut buckets: Vec<(Option<Uuid>, String)> = self
            .members
            .iter()
            .map(|(id, name)| (Some(*id), name.clone()))
            .collect();
        for task in tasks {
            if !buckets.iter().any(|(id, _)| *id == task.assigned_to) {
                buckets.push((task.assigned_to, self.name_of(task.assigned_to)));
            }
        }
        buckets
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn status_distribution(tasks: &[Task], now: DateTime<Utc>) -> StatusDistribution {
    let mut dist = StatusDistribution::default();
    for task in tasks {
        match task.status {
            TaskStatus::Todo => dist.todo += 1,
            TaskStatus::InProgress => dist.in_progress += 1,
            TaskStatus::Completed => dist.completed += 1,
        }
        if task.is_overdue(now) {
            dist.overdue += 1;
        }
    }
    dist
}

fn priority_distribution(tasks: &[Task]) -> PriorityDistribution {
    let mut dist = PriorityDistribution::default();
    for task in tasks {
        match task.priority {
            TaskPriority::Low => dist.low += 1,
            TaskPriority::Medium => dist.medium += 1,
            TaskPriority::High => dist.high += 1,
            TaskPriority::Critical => dist.critical += 1,
        }
    }
    dist
}

/// Completions in `(now - 7d, now]` and `(now - 14d, now - 7d]`
pub fn weekly_completions(tasks: &[Task], now: DateTime<Utc>) -> (u64, u64) {
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = now - Duration::days(14);
    let this_week = tasks.iter().filter(|t| t.completed_within(week_ago, now)).count();
    let last_week = tasks
        .iter()
        .filter(|t| t.completed_within(two_weeks_ago, week_ago))
        .count();
    (this_week as u64, last_week as u64)
}

/// Completions per UTC day for the `days` days ending today, zero days included
pub fn daily_completions(tasks: &[Task], now: DateTime<Utc>, days: u64) -> Vec<DayCount> {
    let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
    for at in tasks.iter().filter_map(|t| t.completed_at) {
        *per_day.entry(at.date_naive()).or_default() += 1;
    }

    let today = now.date_naive();
    (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| DayCount {
            date,
            count: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

pub fn core_metrics(tasks: &[Task], now: DateTime<Utc>) -> AnalyticsCore {
    let status = status_distribution(tasks, now);
    let total = status.total();

    let completion_rate = (total > 0).then(|| status.completed as f64 / total as f64 * 100.0);

    let durations: Vec<f64> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| t.completed_at.map(|at| (at - t.created_at).num_seconds() as f64 / 3600.0))
        .collect();
    let avg_completion_time = (!durations.is_empty())
        .then(|| round1(durations.iter().sum::<f64>() / durations.len() as f64));

    let overdue_rate = status.overdue as f64 / total.max(1) as f64 * 100.0;
    let efficiency_score =
        round1((completion_rate.unwrap_or(0.0) - overdue_rate).clamp(0.0, 100.0));

    let (this_week, last_week) = weekly_completions(tasks, now);

    AnalyticsCore {
        total_tasks: tasks.len() as u64,
        priority_distribution: priority_distribution(tasks),
        completion_rate: completion_rate.map(round1),
        avg_completion_time,
        tasks_completed_this_week: this_week,
        tasks_completed_last_week: last_week,
        efficiency_score,
        completion_trend: daily_completions(tasks, now, TREND_DAYS),
        status_distribution: status,
    }
}

/// Completed and total per member; sorted by completed desc, total desc, name
fn member_performance(tasks: &[Task], roster: &Roster) -> Vec<MemberPerformance> {
    let mut perf: Vec<MemberPerformance> = roster
        .buckets(tasks)
        .into_iter()
        .map(|(user_id, name)| {
            let held = tasks.iter().filter(|t| t.assigned_to == user_id);
            let (completed, total) = held.fold((0, 0), |(done, all), t| {
                (done + u64::from(t.status == TaskStatus::Completed), all + 1)
            });
            MemberPerformance {
                user_id,
                name,
                completed,
                total,
            }
        })
        .filter(|p| p.user_id.is_some() || p.total > 0)
        .collect();

    perf.sort_by(|a, b| {
        b.completed
            .cmp(&a.completed)
            .then(b.total.cmp(&a.total))
            .then_with(|| a.name.cmp(&b.name))
    });
    perf
}

/// Members with at least one overdue task, most overdue first
fn overdue_by_member(tasks: &[Task], roster: &Roster, now: DateTime<Utc>) -> Vec<MemberOverdue> {
    let mut counts: Vec<MemberOverdue> = roster
        .buckets(tasks)
        .into_iter()
        .map(|(user_id, name)| MemberOverdue {
            count: tasks
                .iter()
                .filter(|t| t.assigned_to == user_id && t.is_overdue(now))
                .count() as u64,
            user_id,
            name,
        })
        .filter(|o| o.count > 0)
        .collect();

    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    counts
}

/// Per-member status counts, busiest (most open work) first
fn workload_by_member(tasks: &[Task], roster: &Roster, now: DateTime<Utc>) -> Vec<MemberWorkload> {
    let mut load: Vec<MemberWorkload> = roster
        .buckets(tasks)
        .into_iter()
        .map(|(user_id, name)| {
            let held: Vec<Task> = tasks
                .iter()
                .filter(|t| t.assigned_to == user_id)
                .cloned()
                .collect();
            let status = status_distribution(&held, now);
            MemberWorkload {
                user_id,
                name,
                todo: status.todo,
                in_progress: status.in_progress,
                completed: status.completed,
                overdue: status.overdue,
                total: held.len() as u64,
            }
        })
        .filter(|w| w.user_id.is_some() || w.total > 0)
        .collect();

    load.sort_by_key(|w| (Reverse(w.open()), Reverse(w.total), w.name.clone()));
    load
}
