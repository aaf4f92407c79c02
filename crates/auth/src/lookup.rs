//! User lookup contracts used by the auth gate.

use async_trait::async_trait;
use thiserror::Error;

use glue_core::{ModelError, Permission, UserId};

/// Failure of a user or permission lookup.
///
/// `UserNotFound` is a business outcome (the session points at a user that no
/// longer exists) and is handled differently from every other failure.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LookupError {
    pub fn is_user_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound)
    }
}

impl From<ModelError> for LookupError {
    fn from(value: ModelError) -> Self {
        match value {
            ModelError::UserNotFound => Self::UserNotFound,
        }
    }
}

#[async_trait]
pub trait UserActiveChecker: Send + Sync {
    async fn is_user_active(&self, id: &UserId) -> Result<bool, LookupError>;
}

/// Checks that a user holds **all** of the given permissions.
#[async_trait]
pub trait PermissionsChecker: Send + Sync {
    async fn has_permissions(
        &self,
        id: &UserId,
        required: &[Permission],
    ) -> Result<bool, LookupError>;
}

#[async_trait]
pub trait PermissionsGetter: Send + Sync {
    async fn get_permissions(&self, id: &UserId) -> Result<Vec<Permission>, LookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_user_not_found_maps_to_its_own_kind() {
        assert!(LookupError::from(ModelError::UserNotFound).is_user_not_found());
    }

    #[test]
    fn generic_failures_are_not_user_not_found() {
        let err = LookupError::from(anyhow::anyhow!("connection reset"));
        assert!(!err.is_user_not_found());
        assert_eq!(err.to_string(), "connection reset");
    }
}
