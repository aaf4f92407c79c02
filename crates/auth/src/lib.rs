//! `glue-auth` — authentication/authorization collaborator contracts.
//!
//! This crate is intentionally decoupled from HTTP and storage: it names what
//! the auth gate needs from a session layer and from a user store, nothing
//! more. `glue-http` drives these contracts from request middleware.

pub mod directory;
pub mod lookup;
pub mod permissions;
pub mod session;

pub use directory::InMemoryUserDirectory;
pub use lookup::{LookupError, PermissionsChecker, PermissionsGetter, UserActiveChecker};
pub use permissions::has_all_permissions;
pub use session::{
    InMemorySession, SESSION_USER_ID_KEY, Session, SessionDestroyer, SessionError, SessionReader,
};
