//! Invitation domain types
//!
//! `pending -> {accepted, declined, revoked, expired}`; every non-pending
//! state is terminal. Expiry is applied lazily whenever the owning team is
//! read or written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Revoked,
    Expired,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: Uuid,
    pub team_id: Uuid,
    /// Lowercased
    pub invitee_email: String,
    /// Set when the email belonged to a registered user at invite time
    #[serde(default)]
    pub invitee_user_id: Option<Uuid>,
    pub invited_by: Uuid,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending
    }

    /// Whether this invitation addresses the given user
    pub fn addresses(&self, user_id: Uuid, email: &str) -> bool {
        self.invitee_user_id == Some(user_id) || self.invitee_email.eq_ignore_ascii_case(email)
    }

    /// Returns true when the invitation just expired
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_pending() && self.expires_at <= now {
            self.status = InvitationStatus::Expired;
            true
        } else {
            false
        }
    }

    /// Move a pending invitation to a terminal state.
    /// Returns false when it was not pending.
    pub fn resolve(&mut self, status: InvitationStatus, now: DateTime<Utc>) -> bool {
        if !self.is_pending() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.responded_at = Some(now);
        true
    }
}

/// Pending invitation as shown to its invitee
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationView {
    pub id: Uuid,
    pub team_id: Uuid,
    pub team_name: String,
    pub invitee_email: String,
    pub invited_by: Uuid,
    pub invited_by_name: Option<String>,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(now: DateTime<Utc>) -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            invitee_email: "u2@x".into(),
            invitee_user_id: None,
            invited_by: Uuid::new_v4(),
            status: InvitationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(7),
            responded_at: None,
        }
    }

    #[test]
    fn terminal_states_are_sinks() {
        let now = Utc::now();
        let mut inv = pending(now);
        assert!(inv.resolve(InvitationStatus::Declined, now));
        assert!(!inv.resolve(InvitationStatus::Accepted, now));
        assert_eq!(inv.status, InvitationStatus::Declined);
    }

    #[test]
    fn expiry_is_lazy_and_one_way() {
        let now = Utc::now();
        let mut inv = pending(now);
        assert!(!inv.expire_if_due(now + Duration::days(6)));
        assert!(inv.expire_if_due(now + Duration::days(7)));
        assert_eq!(inv.status, InvitationStatus::Expired);
        assert!(!inv.expire_if_due(now + Duration::days(8)));
    }

    #[test]
    fn addresses_by_email_case_insensitively() {
        let inv = pending(Utc::now());
        assert!(inv.addresses(Uuid::new_v4(), "U2@X"));
        assert!(!inv.addresses(Uuid::new_v4(), "u3@x"));
    }
}
