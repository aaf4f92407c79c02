//! HTTP glue: session-backed authentication and authorization middleware.
//!
//! The middleware here read collaborator contracts from `glue-auth` and keep
//! all per-request state in the request's extensions (see [`context`]).

pub mod context;
pub mod errors;
pub mod logout;
pub mod middleware;
pub mod server;

pub use context::{
    AuthenticatedUser, CurrentPermissions, CurrentUser, GrantedPermissions, SessionHandle,
    permissions, user_id,
};
pub use logout::{logout, logout_routes};
pub use middleware::{
    AuthenticateState, AuthorizeState, RedirectIfAuthenticated, SavePermissionsState,
    authenticate, authorize, redirect_if_authenticated, save_permissions_in_context,
};
pub use server::{ServerConfig, run, serve, shutdown_signal};
