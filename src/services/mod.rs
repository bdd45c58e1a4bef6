//! Service layer: team membership, tasks and analytics.
//!
//! Services are request-scoped in behaviour and hold no mutable state of their
//! own; the store is the only thing shared between concurrent requests.

pub mod analytics;
pub mod tasks;
pub mod teams;

pub use analytics::AnalyticsService;
pub use tasks::TaskService;
pub use teams::TeamService;

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::store::Store;

/// Writes are attempted at most this many times before surfacing `conflict`
pub const MAX_WRITE_ATTEMPTS: u32 = 2;

/// Per-task attempts when unassigning a member who left or was removed
pub const RELEASE_ATTEMPTS: u32 = 5;

/// Source of "now" for services that stamp documents
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// All services over one store
#[derive(Clone)]
pub struct Services {
    pub teams: TeamService,
    pub tasks: TaskService,
    pub analytics: AnalyticsService,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, clock: Clock, invitation_ttl: Duration) -> Self {
        Self {
            teams: TeamService::new(store.clone(), clock.clone(), invitation_ttl),
            tasks: TaskService::new(store.clone(), clock),
            analytics: AnalyticsService::new(store),
        }
    }
}
