//! Business-domain error kinds.

use thiserror::Error;

/// Domain-level error.
///
/// Keep this focused on deterministic, business failures. Storage and
/// transport failures belong to the crates that own those concerns.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ModelError {
    /// The user referenced by an identifier does not exist (anymore).
    #[error("user not found")]
    UserNotFound,
}
