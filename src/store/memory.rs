//! In-process store backed by `parking_lot` locks.
//!
//! Used when no database is configured and by the test suite. It honours
//! the same compare-and-set contract as the Postgres backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, TaskQuery};
use crate::domain::{Principal, Task, Team, User, UserRole};

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    teams: HashMap<Uuid, Team>,
    tasks: HashMap<Uuid, Task>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(&self, principal: &Principal, now: DateTime<Utc>) -> StoreResult<User> {
        let mut inner = self.inner.write();
        if inner
            .users
            .values()
            .any(|u| u.id != principal.id && u.email == principal.email)
        {
            return Err(StoreError::EmailTaken);
        }
        let user = inner.users.entry(principal.id).or_insert_with(|| User {
            id: principal.id,
            name: principal.name.clone(),
            email: principal.email.clone(),
            role: UserRole::User,
            preferences: serde_json::json!({}),
            is_deleted: false,
            created_at: now,
            last_active: now,
        });
        if !principal.name.is_empty() {
            user.name = principal.name.clone();
        }
        user.email = principal.email.clone();
        user.last_active = now;
        Ok(user.clone())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let inner = self.inner.read();
        Ok(ids.iter().filter_map(|id| inner.users.get(id).cloned()).collect())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_lowercase();
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|u| u.email == email && !u.is_deleted)
            .cloned())
    }

    async fn insert_team(&self, team: &Team) -> StoreResult<Team> {
        let mut stored = team.clone();
        stored.version = 1;
        self.inner.write().teams.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.inner.read().teams.get(&id).cloned())
    }

    async fn teams_for_member(&self, user: Uuid) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .inner
            .read()
            .teams
            .values()
            .filter(|t| t.is_active && t.is_member(user))
            .cloned()
            .collect();
        teams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(teams)
    }

    async fn teams_with_pending_invitation(
        &self,
        email: &str,
        user: Uuid,
    ) -> StoreResult<Vec<Team>> {
        Ok(self
            .inner
            .read()
            .teams
            .values()
            .filter(|t| {
                t.is_active
                    && t
                        .invitations
                        .iter()
                        .any(|i| i.is_pending() && i.addresses(user, email))
            })
            .cloned()
            .collect())
    }

    async fn team_by_invitation(&self, invitation_id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self
            .inner
            .read()
            .teams
            .values()
            .find(|t| t.invitation(invitation_id).is_some())
            .cloned())
    }

    async fn update_team(&self, team: &Team, expected_version: i64) -> StoreResult<Team> {
        let mut inner = self.inner.write();
        let current = inner.teams.get_mut(&team.id).ok_or(StoreError::Conflict)?;
        if current.version != expected_version {
            return Err(StoreError::Conflict);
        }
        let mut stored = team.clone();
        stored.version = expected_version + 1;
        *current = stored.clone();
        Ok(stored)
    }

    async fn insert_task(&self, task: &Task) -> StoreResult<Task> {
        let mut stored = task.clone();
        stored.version = 1;
        self.inner.write().tasks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.inner.read().tasks.get(&id).cloned())
    }

    async fn find_tasks(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .inner
            .read()
            .tasks
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn update_task(&self, task: &Task, expected_version: i64) -> StoreResult<Task> {
        let mut inner = self.inner.write();
        let current = inner.tasks.get_mut(&task.id).ok_or(StoreError::Conflict)?;
        if current.version != expected_version {
            return Err(StoreError::Conflict);
        }
        let mut stored = task.clone();
        stored.version = expected_version + 1;
        *current = stored.clone();
        Ok(stored)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().tasks.remove(&id).is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stale_team_write_conflicts() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let team = store
            .insert_team(&Team::new(owner, "Alpha".into(), None, Utc::now()))
            .await
            .unwrap();

        let mut first = team.clone();
        first.name = "Beta".into();
        let saved = store.update_team(&first, team.version).await.unwrap();
        assert_eq!(saved.version, team.version + 1);

        let mut second = team.clone();
        second.name = "Gamma".into();
        assert!(matches!(
            store.update_team(&second, team.version).await,
            Err(StoreError::Conflict)
        ));
        assert_eq!(store.get_team(team.id).await.unwrap().unwrap().name, "Beta");
    }

    #[tokio::test]
    async fn email_belongs_to_one_user() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ann = Principal::new(Uuid::new_v4(), "Ann", "ann@x");
        store.upsert_user(&ann, now).await.unwrap();
        store.upsert_user(&ann, now).await.unwrap();

        let impostor = Principal::new(Uuid::new_v4(), "Ann Two", "ANN@x");
        assert!(matches!(
            store.upsert_user(&impostor, now).await,
            Err(StoreError::EmailTaken)
        ));
        assert!(store.get_user(impostor.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_user_lowercases_and_refreshes() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        let now = Utc::now();
        store
            .upsert_user(&Principal::new(id, "Ann", "Ann@Example.com"), now)
            .await
            .unwrap();
        let user = store
            .find_user_by_email("ANN@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "ann@example.com");
    }
}
