//! Team membership and role state machine.
//!
//! Every membership mutation loads the team, applies the change in memory and
//! writes it back with a compare-and-set on the team version. A lost race is
//! retried once against a fresh copy before surfacing as `conflict`.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::tasks::release_assignments;
use super::{Clock, MAX_WRITE_ATTEMPTS};
use crate::authz::{authorize, Operation};
use crate::domain::tasks::{REASON_MEMBER_LEFT, REASON_MEMBER_REMOVED};
use crate::domain::teams::{ChangeRoleRequest, CreateTeamRequest, InviteRequest, UpdateTeamRequest};
use crate::domain::validation::is_plausible_email;
use crate::domain::{
    Invitation, InvitationStatus, InvitationView, Member, Principal, Team, TeamRole, TeamView,
    User,
};
use crate::error::{ApiError, ApiResult, ALREADY_INVITED, ALREADY_MEMBER, CONCURRENT_MODIFICATION};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn Store>,
    clock: Clock,
    invitation_ttl: Duration,
}

impl TeamService {
    pub fn new(store: Arc<dyn Store>, clock: Clock, invitation_ttl: Duration) -> Self {
        Self {
            store,
            clock,
            invitation_ttl,
        }
    }

    pub async fn create_team(
        &self,
        principal: &Principal,
        req: &CreateTeamRequest,
    ) -> ApiResult<TeamView> {
        let (name, description) = req.validate()?;
        let team = Team::new(principal.id, name, description, (self.clock)());
        let team = self.store.insert_team(&team).await?;

        info!(team_id = %team.id, user_id = %principal.id, "Team created");
        self.view(&team, principal.id).await
    }

    /// Active teams the principal belongs to, newest first
    pub async fn list_user_teams(&self, principal: &Principal) -> ApiResult<Vec<TeamView>> {
        let teams = self.store.teams_for_member(principal.id).await?;

        let ids: Vec<Uuid> = teams
            .iter()
            .flat_map(|t| t.members.iter().map(|m| m.user_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let users = self.store.get_users(&ids).await?;

        Ok(teams
            .iter()
            .map(|t| TeamView::hydrate(t, &users, principal.id))
            .collect())
    }

    pub async fn get_team(&self, principal: &Principal, team_id: Uuid) -> ApiResult<TeamView> {
        let team = self.load(team_id).await?;
        authorize(principal.id, &team, Operation::ReadTeam)?;
        self.view(&team, principal.id).await
    }

    pub async fn update_team(
        &self,
        principal: &Principal,
        team_id: Uuid,
        req: &UpdateTeamRequest,
    ) -> ApiResult<TeamView> {
        let patch = req.validate()?;
        let (team, ()) = self
            .mutate(team_id, |team, _| {
                authorize(principal.id, team, Operation::UpdateTeam)?;
                if let Some(name) = &patch.name {
                    team.name = name.clone();
                }
                if let Some(description) = &patch.description {
                    team.description = description.clone();
                }
                Ok(())
            })
            .await?;

        info!(team_id = %team_id, user_id = %principal.id, "Team updated");
        self.view(&team, principal.id).await
    }

    /// Soft delete; the team disappears from listings and reads
    pub async fn delete_team(&self, principal: &Principal, team_id: Uuid) -> ApiResult<()> {
        self.mutate(team_id, |team, _| {
            authorize(principal.id, team, Operation::DeleteTeam)?;
            team.is_active = false;
            Ok(())
        })
        .await?;

        info!(team_id = %team_id, user_id = %principal.id, "Team deactivated");
        Ok(())
    }

    pub async fn invite_to_team(
        &self,
        principal: &Principal,
        team_id: Uuid,
        req: &InviteRequest,
    ) -> ApiResult<Invitation> {
        let email = req.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(ApiError::invalid_field("email", "A valid email is required"));
        }
        let invitee = self.store.find_user_by_email(&email).await?;
        let invitee_id = invitee.as_ref().map(|u| u.id);
        let ttl = self.invitation_ttl;

        let (_, invitation) = self
            .mutate(team_id, |team, now| {
                authorize(principal.id, team, Operation::InviteMember)?;

                if invitee_id.is_some_and(|id| team.is_member(id)) {
                    return Err(ApiError::Conflict(ALREADY_MEMBER));
                }
                let duplicate = team.invitations.iter().any(|i| {
                    i.is_pending()
                        && (i.invitee_email == email
                            || (invitee_id.is_some() && i.invitee_user_id == invitee_id))
                });
                if duplicate {
                    return Err(ApiError::Conflict(ALREADY_INVITED));
                }

                let invitation = Invitation {
                    id: Uuid::new_v4(),
                    team_id: team.id,
                    invitee_email: email.clone(),
                    invitee_user_id: invitee_id,
                    invited_by: principal.id,
                    status: InvitationStatus::Pending,
                    created_at: now,
                    expires_at: now + ttl,
                    responded_at: None,
                };
                team.invitations.push(invitation.clone());
                Ok(invitation)
            })
            .await?;

        info!(
            team_id = %team_id,
            invitation_id = %invitation.id,
            invited_by = %principal.id,
            "Invitation issued"
        );
        Ok(invitation)
    }

    /// Pending, unexpired invitations addressed to the principal
    pub async fn list_invitations(&self, principal: &Principal) -> ApiResult<Vec<InvitationView>> {
        let now = (self.clock)();
        let teams = self
            .store
            .teams_with_pending_invitation(&principal.email, principal.id)
            .await?;

        let pending: Vec<(&Team, &Invitation)> = teams
            .iter()
            .flat_map(|team| team.invitations.iter().map(move |inv| (team, inv)))
            .filter(|(_, inv)| {
                inv.is_pending()
                    && inv.expires_at > now
                    && inv.addresses(principal.id, &principal.email)
            })
            .collect();

        let inviter_ids: Vec<Uuid> = pending.iter().map(|(_, inv)| inv.invited_by).collect();
        let inviters = self.store.get_users(&inviter_ids).await?;

        Ok(pending
            .into_iter()
            .map(|(team, inv)| InvitationView {
                id: inv.id,
                team_id: team.id,
                team_name: team.name.clone(),
                invitee_email: inv.invitee_email.clone(),
                invited_by: inv.invited_by,
                invited_by_name: inviters
                    .iter()
                    .find(|u| u.id == inv.invited_by)
                    .map(|u| u.display_name().to_string()),
                status: inv.status,
                created_at: inv.created_at,
                expires_at: inv.expires_at,
            })
            .collect())
    }

    pub async fn accept_invitation(
        &self,
        principal: &Principal,
        invitation_id: Uuid,
    ) -> ApiResult<TeamView> {
        let team_id = self.invitation_team(principal, invitation_id).await?;

        let (team, ()) = self
            .mutate(team_id, |team, now| {
                let invited_by =
                    respond(team, principal, invitation_id, InvitationStatus::Accepted, now)?;
                if team.is_member(principal.id) {
                    return Err(ApiError::Conflict(ALREADY_MEMBER));
                }
                team.members.push(Member {
                    user_id: principal.id,
                    role: TeamRole::Collaborator,
                    joined_at: now,
                    invited_by: Some(invited_by),
                });
                Ok(())
            })
            .await?;

        info!(team_id = %team_id, user_id = %principal.id, "Invitation accepted");
        self.view(&team, principal.id).await
    }

    /// Declining is final; the team can issue a fresh invitation later
    pub async fn decline_invitation(
        &self,
        principal: &Principal,
        invitation_id: Uuid,
    ) -> ApiResult<()> {
        let team_id = self.invitation_team(principal, invitation_id).await?;

        self.mutate(team_id, |team, now| {
            respond(team, principal, invitation_id, InvitationStatus::Declined, now).map(|_| ())
        })
        .await?;

        info!(team_id = %team_id, user_id = %principal.id, "Invitation declined");
        Ok(())
    }

    pub async fn revoke_invitation(
        &self,
        principal: &Principal,
        team_id: Uuid,
        invitation_id: Uuid,
    ) -> ApiResult<()> {
        self.mutate(team_id, |team, now| {
            authorize(principal.id, team, Operation::InviteMember)?;
            let invitation = team
                .invitation_mut(invitation_id)
                .ok_or_else(|| ApiError::not_found("Invitation"))?;
            if !invitation.resolve(InvitationStatus::Revoked, now) {
                return Err(ApiError::invalid_state(format!(
                    "Invitation is no longer pending ({})",
                    invitation.status.as_str()
                )));
            }
            Ok(())
        })
        .await?;

        info!(team_id = %team_id, invitation_id = %invitation_id, "Invitation revoked");
        Ok(())
    }

    /// Remove a member and unassign their tasks in this team
    pub async fn remove_member(
        &self,
        principal: &Principal,
        team_id: Uuid,
        member_id: Uuid,
    ) -> ApiResult<TeamView> {
        // A repeated removal finishes a cascade that an earlier call left short
        let current = self.load(team_id).await?;
        if current.role_of(member_id).is_none()
            && authorize(principal.id, &current, Operation::ReleaseAssignments).is_ok()
        {
            let released = self
                .release(team_id, member_id, principal.id, REASON_MEMBER_REMOVED)
                .await?;
            if released > 0 {
                return self.view(&current, principal.id).await;
            }
        }

        let (team, ()) = self
            .mutate(team_id, |team, _| {
                authorize(principal.id, team, Operation::RemoveMember { target: member_id })?;
                team.members.retain(|m| m.user_id != member_id);
                Ok(())
            })
            .await?;

        info!(
            team_id = %team_id,
            member_id = %member_id,
            removed_by = %principal.id,
            "Member removed"
        );
        self.release(team_id, member_id, principal.id, REASON_MEMBER_REMOVED).await?;

        self.view(&team, principal.id).await
    }

    /// Owners must transfer ownership before leaving
    pub async fn leave_team(&self, principal: &Principal, team_id: Uuid) -> ApiResult<()> {
        let current = self.load(team_id).await?;
        if current.is_active && current.role_of(principal.id).is_none() {
            let released =
                self.release(team_id, principal.id, principal.id, REASON_MEMBER_LEFT).await?;
            if released > 0 {
                return Ok(());
            }
        }

        self.mutate(team_id, |team, _| {
            authorize(principal.id, team, Operation::LeaveTeam)?;
            team.members.retain(|m| m.user_id != principal.id);
            Ok(())
        })
        .await?;

        info!(team_id = %team_id, user_id = %principal.id, "Member left team");
        self.release(team_id, principal.id, principal.id, REASON_MEMBER_LEFT).await?;
        Ok(())
    }

    pub async fn change_member_role(
        &self,
        principal: &Principal,
        team_id: Uuid,
        member_id: Uuid,
        req: &ChangeRoleRequest,
    ) -> ApiResult<TeamView> {
        let new_role = req.role;
        if new_role == TeamRole::Owner {
            return Err(ApiError::invalid_field(
                "role",
                "Role must be admin or collaborator; use ownership transfer instead",
            ));
        }

        let (team, ()) = self
            .mutate(team_id, |team, _| {
                authorize(principal.id, team, Operation::ChangeRole { target: member_id })?;
                let member = team
                    .member_mut(member_id)
                    .ok_or_else(|| ApiError::not_found("Member"))?;
                if member.role == TeamRole::Owner {
                    return Err(ApiError::invalid_state(
                        "The owner can only change through ownership transfer",
                    ));
                }
                member.role = new_role;
                Ok(())
            })
            .await?;

        info!(team_id = %team_id, member_id = %member_id, role = %new_role, "Member role changed");
        self.view(&team, principal.id).await
    }

    /// Swap roles in one write: the old owner becomes admin, the target owner
    pub async fn transfer_ownership(
        &self,
        principal: &Principal,
        team_id: Uuid,
        member_id: Uuid,
    ) -> ApiResult<TeamView> {
        let (team, ()) = self
            .mutate(team_id, |team, _| {
                authorize(principal.id, team, Operation::TransferOwnership { target: member_id })?;
                for member in &mut team.members {
                    if member.user_id == principal.id {
                        member.role = TeamRole::Admin;
                    } else if member.user_id == member_id {
                        member.role = TeamRole::Owner;
                    }
                }
                Ok(())
            })
            .await?;

        info!(team_id = %team_id, from = %principal.id, to = %member_id, "Ownership transferred");
        self.view(&team, principal.id).await
    }

    async fn release(
        &self,
        team_id: Uuid,
        member_id: Uuid,
        released_by: Uuid,
        reason: &str,
    ) -> ApiResult<usize> {
        release_assignments(
            self.store.as_ref(),
            team_id,
            member_id,
            released_by,
            reason,
            (self.clock)(),
        )
        .await
    }

    async fn load(&self, team_id: Uuid) -> ApiResult<Team> {
        self.store
            .get_team(team_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Team"))
    }

    /// Resolve the active team owning an invitation addressed to the principal
    async fn invitation_team(&self, principal: &Principal, invitation_id: Uuid) -> ApiResult<Uuid> {
        let team = self
            .store
            .team_by_invitation(invitation_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| ApiError::not_found("Invitation"))?;
        match team.invitation(invitation_id) {
            Some(inv) if inv.addresses(principal.id, &principal.email) => Ok(team.id),
            _ => Err(ApiError::not_found("Invitation")),
        }
    }

    /// Load, modify and compare-and-set a team. `apply` runs against the
    /// freshest copy on each attempt, after lazy invitation expiry.
    async fn mutate<T, F>(&self, team_id: Uuid, mut apply: F) -> ApiResult<(Team, T)>
    where
        F: FnMut(&mut Team, DateTime<Utc>) -> ApiResult<T> + Send,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            let now = (self.clock)();
            let mut team = self.load(team_id).await?;
            let expected_version = team.version;

            team.expire_invitations(now);
            let output = apply(&mut team, now)?;
            team.updated_at = now;
            debug_assert!(
                !team.is_active
                    || team.members.iter().filter(|m| m.role == TeamRole::Owner).count() == 1
            );

            match self.store.update_team(&team, expected_version).await {
                Ok(saved) => return Ok((saved, output)),
                Err(StoreError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(team_id = %team_id, attempt, "Team write conflict, retrying");
                    attempt += 1;
                }
                Err(StoreError::Conflict) => {
                    return Err(ApiError::Conflict(CONCURRENT_MODIFICATION))
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn view(&self, team: &Team, principal: Uuid) -> ApiResult<TeamView> {
        let ids: Vec<Uuid> = team.members.iter().map(|m| m.user_id).collect();
        let users: Vec<User> = self.store.get_users(&ids).await?;
        Ok(TeamView::hydrate(team, &users, principal))
    }
}

/// Move an invitation addressed to `principal` out of `pending`.
/// Returns the inviter.
fn respond(
    team: &mut Team,
    principal: &Principal,
    invitation_id: Uuid,
    status: InvitationStatus,
    now: DateTime<Utc>,
) -> ApiResult<Uuid> {
    if !team.is_active {
        return Err(ApiError::not_found("Invitation"));
    }
    let invitation = team
        .invitation_mut(invitation_id)
        .filter(|inv| inv.addresses(principal.id, &principal.email))
        .ok_or_else(|| ApiError::not_found("Invitation"))?;
    if !invitation.resolve(status, now) {
        return Err(ApiError::invalid_state(format!(
            "Invitation is no longer pending ({})",
            invitation.status.as_str()
        )));
    }
    Ok(invitation.invited_by)
}
