use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global role, unrelated to team roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            _ => Self::User,
        }
    }
}

/// User entity. Users are never hard-deleted; `is_deleted` is a soft flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub preferences: serde_json::Value,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl User {
    /// Display name, falling back to the email's local part
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.email.split('@').next().unwrap_or_default()
        } else {
            &self.name
        }
    }
}

/// Authenticated principal as resolved by the identity adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    /// Lowercased
    pub email: String,
}

impl Principal {
    pub fn new(id: Uuid, name: impl Into<String>, email: &str) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.trim().to_lowercase(),
        }
    }
}
