//! Domain types and DTOs
//!
//! Storage-shaped entities (ids only) plus the request and response types
//! exposed at the HTTP boundary.

pub mod analytics;
pub mod invitations;
pub mod tasks;
pub mod teams;
pub mod users;
pub mod validation;

// Re-export commonly used types
pub use invitations::{Invitation, InvitationStatus, InvitationView};
pub use tasks::{Task, TaskPriority, TaskStatus, Visibility};
pub use teams::{Member, Team, TeamRole, TeamView};
pub use users::{Principal, User, UserRole};
pub use validation::{FieldError, FieldErrors};
