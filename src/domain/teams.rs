//! Team domain types
//!
//! A team embeds its members and invitations so that multi-member mutations
//! (ownership transfer, accepting an invitation) are a single document write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invitations::Invitation;
use super::users::User;
use super::validation::{char_len, FieldErrors};

pub const TEAM_NAME_MAX: usize = 50;
pub const TEAM_DESCRIPTION_MAX: usize = 200;

/// Role a user holds inside one team
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    Collaborator,
}

impl TeamRole {
    /// Owner and admin may manage team data
    pub fn is_manager(self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Collaborator => "collaborator",
        }
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded member record; storage holds ids only
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: Uuid,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub invited_by: Option<Uuid>,
}

/// Team aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub is_active: bool,
    pub members: Vec<Member>,
    pub invitations: Vec<Invitation>,
    /// Optimistic concurrency token, bumped by the store on every write
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// A fresh team whose creator is its sole owner
    pub fn new(
        creator: Uuid,
        name: String,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            created_by: creator,
            is_active: true,
            members: vec![Member {
                user_id: creator,
                role: TeamRole::Owner,
                joined_at: now,
                invited_by: None,
            }],
            invitations: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn member(&self, user_id: Uuid) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn member_mut(&mut self, user_id: Uuid) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.user_id == user_id)
    }

    pub fn role_of(&self, user_id: Uuid) -> Option<TeamRole> {
        self.member(user_id).map(|m| m.role)
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member(user_id).is_some()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Admins including the owner
    pub fn admin_count(&self) -> usize {
        self.members.iter().filter(|m| m.role.is_manager()).count()
    }

    pub fn invitation(&self, invitation_id: Uuid) -> Option<&Invitation> {
        self.invitations.iter().find(|i| i.id == invitation_id)
    }

    pub fn invitation_mut(&mut self, invitation_id: Uuid) -> Option<&mut Invitation> {
        self.invitations.iter_mut().find(|i| i.id == invitation_id)
    }

    /// Flip every pending invitation past its expiry to `expired`.
    /// Returns true when anything changed.
    pub fn expire_invitations(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;
        for invitation in &mut self.invitations {
            changed |= invitation.expire_if_due(now);
        }
        changed
    }
}

/// Request DTO for creating a team
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreateTeamRequest {
    /// Trim and validate, yielding `(name, description)`
    pub fn validate(&self) -> Result<(String, Option<String>), FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = validate_team_name(&self.name, &mut errors);
        let description = validate_team_description(self.description.as_deref(), &mut errors);
        errors.into_result((name, description))
    }
}

/// Request DTO for updating a team; only name and description are mutable
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTeamRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Validated form of [`UpdateTeamRequest`]
#[derive(Debug, Clone, Default)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl UpdateTeamRequest {
    pub fn validate(&self) -> Result<TeamPatch, FieldErrors> {
        let mut errors = FieldErrors::default();
        let name = self
            .name
            .as_deref()
            .map(|name| validate_team_name(name, &mut errors));
        let description = self
            .description
            .as_deref()
            .map(|d| validate_team_description(Some(d), &mut errors));
        errors.into_result(TeamPatch { name, description })
    }
}

fn validate_team_name(raw: &str, errors: &mut FieldErrors) -> String {
    let name = raw.trim();
    match char_len(name) {
        0 => errors.push("name", "Team name is required"),
        n if n > TEAM_NAME_MAX => errors.push(
            "name",
            format!("Team name must be at most {} characters", TEAM_NAME_MAX),
        ),
        _ => {}
    }
    name.to_string()
}

fn validate_team_description(raw: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    let description = raw.map(str::trim).filter(|d| !d.is_empty())?;
    if char_len(description) > TEAM_DESCRIPTION_MAX {
        errors.push(
            "description",
            format!(
                "Description must be at most {} characters",
                TEAM_DESCRIPTION_MAX
            ),
        );
    }
    Some(description.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: TeamRole,
}

/// Member with its user record resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
    pub invited_by: Option<Uuid>,
}

/// Response DTO for a team, hydrated with member user records
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub is_active: bool,
    pub members: Vec<MemberView>,
    pub member_count: usize,
    pub admin_count: usize,
    /// Role of the requesting principal, absent once they left
    pub my_role: Option<TeamRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamView {
    /// Build a view from a team and the user records of its members.
    /// Members whose user record is missing keep an empty name and email.
    pub fn hydrate(team: &Team, users: &[User], principal: Uuid) -> Self {
        let members = team
            .members
            .iter()
            .map(|m| {
                let user = users.iter().find(|u| u.id == m.user_id);
                MemberView {
                    user_id: m.user_id,
                    name: user.map(|u| u.name.clone()).unwrap_or_default(),
                    email: user.map(|u| u.email.clone()).unwrap_or_default(),
                    role: m.role,
                    joined_at: m.joined_at,
                    invited_by: m.invited_by,
                }
            })
            .collect();

        Self {
            id: team.id,
            name: team.name.clone(),
            description: team.description.clone(),
            created_by: team.created_by,
            is_active: team.is_active,
            members,
            member_count: team.member_count(),
            admin_count: team.admin_count(),
            my_role: team.role_of(principal),
            created_at: team.created_at,
            updated_at: team.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_team_has_creator_as_sole_owner() {
        let creator = Uuid::new_v4();
        let team = Team::new(creator, "Alpha".into(), None, Utc::now());

        assert_eq!(team.members.len(), 1);
        assert_eq!(team.role_of(creator), Some(TeamRole::Owner));
        assert_eq!(team.admin_count(), 1);
        assert!(team.is_active);
    }

    #[test]
    fn create_request_trims_name() {
        let req = CreateTeamRequest {
            name: "  Alpha  ".into(),
            description: Some("   ".into()),
        };
        let (name, description) = req.validate().unwrap();
        assert_eq!(name, "Alpha");
        assert_eq!(description, None);
    }

    #[test]
    fn create_request_rejects_blank_and_oversize_names() {
        let blank = CreateTeamRequest {
            name: "   ".into(),
            description: None,
        };
        assert_eq!(blank.validate().unwrap_err().fields(), vec!["name"]);

        let long = CreateTeamRequest {
            name: "x".repeat(TEAM_NAME_MAX + 1),
            description: Some("y".repeat(TEAM_DESCRIPTION_MAX + 1)),
        };
        assert_eq!(
            long.validate().unwrap_err().fields(),
            vec!["name", "description"]
        );
    }
}
