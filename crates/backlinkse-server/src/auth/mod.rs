pub mod gate;
pub mod middleware;
pub mod password;
pub mod token;

use crate::models::Role;

pub use gate::{admit, admit_subject, authorize, AccountRejection};
pub use middleware::{require_auth, require_roles, AllowedRoles};
pub use token::{TokenError, TokenKind, TokenPair, TokenService};

pub const STAFF: &[Role] = &[Role::Admin, Role::Moderator];
pub const ADMIN: &[Role] = &[Role::Admin];
