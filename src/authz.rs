//! Authorisation evaluator
//!
//! Pure function of `(principal, team, operation)`. Rules are checked top-down
//! and the first failing check decides the denial. Membership of an active
//! team is a precondition of every team-scoped operation.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Task, Team, TeamRole, Visibility};

/// Typed reason for refusing an operation
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Denial {
    NotMember,
    InsufficientRole,
    LastOwner,
    SelfTarget,
    NotFound,
}

impl Denial {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotMember => "not-member",
            Self::InsufficientRole => "insufficient-role",
            Self::LastOwner => "last-owner",
            Self::SelfTarget => "self-target",
            Self::NotFound => "not-found",
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation tags understood by [`authorize`]
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    ReadTeam,
    UpdateTeam,
    InviteMember,
    RemoveMember { target: Uuid },
    /// Unassign tasks still held by someone no longer in the team
    ReleaseAssignments,
    ChangeRole { target: Uuid },
    TransferOwnership { target: Uuid },
    LeaveTeam,
    DeleteTeam,
    CreateTeamTask,
    ReadTeamTask(&'a Task),
    UpdateTeamTask(&'a Task),
    ReadTeamAnalytics,
    ReadMemberAnalytics,
}

pub fn authorize(principal: Uuid, team: &Team, op: Operation<'_>) -> Result<(), Denial> {
    if !team.is_active {
        return Err(Denial::NotFound);
    }
    let role = team.role_of(principal).ok_or(Denial::NotMember)?;

    match op {
        Operation::ReadTeam | Operation::ReadTeamAnalytics => Ok(()),

        Operation::UpdateTeam
        | Operation::InviteMember
        | Operation::CreateTeamTask
        | Operation::ReleaseAssignments
        | Operation::ReadMemberAnalytics => require_manager(role),

        Operation::RemoveMember { target } => {
            let target_role = team.role_of(target).ok_or(Denial::NotFound)?;
            if target == principal {
                return Err(Denial::SelfTarget);
            }
            match (role, target_role) {
                (_, TeamRole::Owner) => Err(Denial::InsufficientRole),
                (TeamRole::Owner, _) => Ok(()),
                (TeamRole::Admin, TeamRole::Collaborator) => Ok(()),
                _ => Err(Denial::InsufficientRole),
            }
        }

        Operation::ChangeRole { target } => {
            require_owner(role)?;
            if target == principal {
                return Err(Denial::SelfTarget);
            }
            team.role_of(target).ok_or(Denial::NotFound)?;
            Ok(())
        }

        Operation::TransferOwnership { target } => {
            require_owner(role)?;
            if target == principal {
                return Err(Denial::SelfTarget);
            }
            team.role_of(target).ok_or(Denial::NotFound)?;
            Ok(())
        }

        Operation::LeaveTeam => match role {
            TeamRole::Owner => Err(Denial::LastOwner),
            _ => Ok(()),
        },

        Operation::DeleteTeam => require_owner(role),

        Operation::ReadTeamTask(task) => {
            if task.visibility == Visibility::Team
                || task.assigned_to == Some(principal)
                || task.created_by == principal
                || role.is_manager()
            {
                Ok(())
            } else {
                Err(Denial::NotFound)
            }
        }

        Operation::UpdateTeamTask(task) => {
            if task.created_by == principal || role.is_manager() {
                Ok(())
            } else {
                Err(Denial::InsufficientRole)
            }
        }
    }
}

/// Personal tasks belong to their creator alone; anyone else gets `not-found`
pub fn authorize_personal_task(principal: Uuid, task: &Task) -> Result<(), Denial> {
    if task.created_by == principal {
        Ok(())
    } else {
        Err(Denial::NotFound)
    }
}

fn require_manager(role: TeamRole) -> Result<(), Denial> {
    if role.is_manager() {
        Ok(())
    } else {
        Err(Denial::InsufficientRole)
    }
}

fn require_owner(role: TeamRole) -> Result<(), Denial> {
    if role == TeamRole::Owner {
        Ok(())
    } else {
        Err(Denial::InsufficientRole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Member, TaskPriority, TaskStatus};
    use chrono::Utc;

    struct Fixture {
        team: Team,
        owner: Uuid,
        admin: Uuid,
        collab: Uuid,
        other_collab: Uuid,
        outsider: Uuid,
    }

    fn fixture() -> Fixture {
        let now = Utc::now();
        let owner = Uuid::new_v4();
        let mut team = Team::new(owner, "Alpha".into(), None, now);
        let [admin, collab, other_collab, outsider] = [(); 4].map(|_| Uuid::new_v4());
        for (user_id, role) in [
            (admin, TeamRole::Admin),
            (collab, TeamRole::Collaborator),
            (other_collab, TeamRole::Collaborator),
        ] {
            team.members.push(Member {
                user_id,
                role,
                joined_at: now,
                invited_by: Some(owner),
            });
        }
        Fixture {
            team,
            owner,
            admin,
            collab,
            other_collab,
            outsider,
        }
    }

    fn task(f: &Fixture, created_by: Uuid, assigned_to: Option<Uuid>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            tags: vec![],
            due_date: Some(now),
            completed_at: None,
            created_by,
            team: Some(f.team.id),
            assigned_to,
            visibility: Visibility::derive(Some(f.team.id), assigned_to),
            assignment_date: None,
            assignment_history: vec![],
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn outsiders_are_not_members() {
        let f = fixture();
        assert_eq!(
            authorize(f.outsider, &f.team, Operation::ReadTeam),
            Err(Denial::NotMember)
        );
        assert_eq!(
            authorize(f.outsider, &f.team, Operation::ReadTeamAnalytics),
            Err(Denial::NotMember)
        );
    }

    #[test]
    fn inactive_team_is_not_found() {
        let mut f = fixture();
        f.team.is_active = false;
        assert_eq!(
            authorize(f.owner, &f.team, Operation::ReadTeam),
            Err(Denial::NotFound)
        );
    }

    #[test]
    fn managers_update_and_invite() {
        let f = fixture();
        for op in [
            Operation::UpdateTeam,
            Operation::InviteMember,
            Operation::CreateTeamTask,
            Operation::ReleaseAssignments,
            Operation::ReadMemberAnalytics,
        ] {
            assert!(authorize(f.owner, &f.team, op).is_ok());
            assert!(authorize(f.admin, &f.team, op).is_ok());
            assert_eq!(
                authorize(f.collab, &f.team, op),
                Err(Denial::InsufficientRole)
            );
        }
    }

    #[test]
    fn remove_member_rules() {
        let f = fixture();
        let remove = |target| Operation::RemoveMember { target };

        assert!(authorize(f.owner, &f.team, remove(f.admin)).is_ok());
        assert!(authorize(f.owner, &f.team, remove(f.collab)).is_ok());
        assert!(authorize(f.admin, &f.team, remove(f.collab)).is_ok());

        assert_eq!(
            authorize(f.admin, &f.team, remove(f.owner)),
            Err(Denial::InsufficientRole)
        );
        assert_eq!(
            authorize(f.admin, &f.team, remove(f.admin)),
            Err(Denial::SelfTarget)
        );
        assert_eq!(
            authorize(f.owner, &f.team, remove(f.owner)),
            Err(Denial::SelfTarget)
        );
        assert_eq!(
            authorize(f.collab, &f.team, remove(f.other_collab)),
            Err(Denial::InsufficientRole)
        );
        assert_eq!(
            authorize(f.owner, &f.team, remove(f.outsider)),
            Err(Denial::NotFound)
        );
    }

    #[test]
    fn role_changes_are_owner_only() {
        let f = fixture();
        let change = |target| Operation::ChangeRole { target };

        assert!(authorize(f.owner, &f.team, change(f.collab)).is_ok());
        assert_eq!(
            authorize(f.collab, &f.team, change(f.owner)),
            Err(Denial::InsufficientRole)
        );
        assert_eq!(
            authorize(f.admin, &f.team, change(f.collab)),
            Err(Denial::InsufficientRole)
        );
        assert_eq!(
            authorize(f.owner, &f.team, change(f.owner)),
            Err(Denial::SelfTarget)
        );
    }

    #[test]
    fn transfer_and_leave() {
        let f = fixture();
        let transfer = |target| Operation::TransferOwnership { target };

        assert!(authorize(f.owner, &f.team, transfer(f.collab)).is_ok());
        assert_eq!(
            authorize(f.owner, &f.team, transfer(f.owner)),
            Err(Denial::SelfTarget)
        );
        assert_eq!(
            authorize(f.owner, &f.team, transfer(f.outsider)),
            Err(Denial::NotFound)
        );
        assert_eq!(
            authorize(f.admin, &f.team, transfer(f.collab)),
            Err(Denial::InsufficientRole)
        );

        assert!(authorize(f.admin, &f.team, Operation::LeaveTeam).is_ok());
        assert_eq!(
            authorize(f.owner, &f.team, Operation::LeaveTeam),
            Err(Denial::LastOwner)
        );
        assert_eq!(
            authorize(f.admin, &f.team, Operation::DeleteTeam),
            Err(Denial::InsufficientRole)
        );
    }

    #[test]
    fn team_task_visibility() {
        let f = fixture();
        let open = task(&f, f.admin, None);
        let directed = task(&f, f.admin, Some(f.collab));

        assert!(authorize(f.other_collab, &f.team, Operation::ReadTeamTask(&open)).is_ok());
        assert!(authorize(f.collab, &f.team, Operation::ReadTeamTask(&directed)).is_ok());
        assert!(authorize(f.owner, &f.team, Operation::ReadTeamTask(&directed)).is_ok());
        assert_eq!(
            authorize(f.other_collab, &f.team, Operation::ReadTeamTask(&directed)),
            Err(Denial::NotFound)
        );
    }

    #[test]
    fn team_task_updates() {
        let f = fixture();
        let own = task(&f, f.collab, None);
        let foreign = task(&f, f.admin, Some(f.collab));

        assert!(authorize(f.collab, &f.team, Operation::UpdateTeamTask(&own)).is_ok());
        assert!(authorize(f.admin, &f.team, Operation::UpdateTeamTask(&own)).is_ok());
        assert_eq!(
            authorize(f.collab, &f.team, Operation::UpdateTeamTask(&foreign)),
            Err(Denial::InsufficientRole)
        );
    }
}
