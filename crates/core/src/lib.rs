//! `glue-core` — primitives shared by the auth gate and the SQL runner.
//!
//! Domain types (identifiers, permissions, business errors) plus the small
//! environment helpers every crate's configuration is read with. No
//! infrastructure concerns live here.

pub mod env;
pub mod error;
pub mod id;
pub mod permission;

pub use env::ConfigError;
pub use error::ModelError;
pub use id::UserId;
pub use permission::Permission;
