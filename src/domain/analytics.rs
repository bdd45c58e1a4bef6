//! Analytics bundle types
//!
//! `StatusDistribution` reports `overdue` alongside the three real statuses.
//! Overdue tasks are also counted under their own status, so the four numbers
//! are not a partition of the task set; dashboards depend on this shape.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// Display name of the bucket holding tasks without an assignee
pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusDistribution {
    pub todo: u64,
    #[serde(rename = "in-progress")]
    pub in_progress: u64,
    pub completed: u64,
    /// Not subtracted from the other counts
    pub overdue: u64,
}

impl StatusDistribution {
    /// Sum of all four counters, overdue included
    pub fn total(&self) -> u64 {
        self.todo + self.in_progress + self.completed + self.overdue
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PriorityDistribution {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// Per-member completion rollup; `user_id` is `None` for the Unassigned bucket
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberPerformance {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub completed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberOverdue {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberWorkload {
    pub user_id: Option<Uuid>,
    pub name: String,
    pub todo: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub overdue: u64,
    pub total: u64,
}

impl MemberWorkload {
    pub fn open(&self) -> u64 {
        self.todo + self.in_progress
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MemberRef {
    pub id: Uuid,
    pub name: String,
}

/// Fields shared by team and member bundles
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsCore {
    pub total_tasks: u64,
    pub status_distribution: StatusDistribution,
    pub priority_distribution: PriorityDistribution,
    /// Percentage rounded to one decimal; `None` when there is nothing to rate
    pub completion_rate: Option<f64>,
    /// Mean hours from creation to completion, one decimal
    pub avg_completion_time: Option<f64>,
    pub tasks_completed_this_week: u64,
    pub tasks_completed_last_week: u64,
    pub efficiency_score: f64,
    pub completion_trend: Vec<DayCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamAnalytics {
    pub team_id: Uuid,
    #[serde(flatten)]
    pub core: AnalyticsCore,
    pub completion_calendar: Vec<DayCount>,
    pub member_perf_agg: Vec<MemberPerformance>,
    pub overdue_agg: Vec<MemberOverdue>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberAnalytics {
    pub team_id: Uuid,
    pub member: MemberRef,
    #[serde(flatten)]
    pub core: AnalyticsCore,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamWorkload {
    pub team_id: Uuid,
    pub members: Vec<MemberWorkload>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamTrends {
    pub team_id: Uuid,
    pub completion_trend: Vec<DayCount>,
    pub completion_calendar: Vec<DayCount>,
    pub tasks_completed_this_week: u64,
    pub tasks_completed_last_week: u64,
}
