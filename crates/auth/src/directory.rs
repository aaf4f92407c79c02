//! In-memory user directory for tests/dev.
//!
//! Answers the three lookups the auth gate performs. Real deployments back
//! these contracts with their own user tables.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use glue_core::{ModelError, Permission, UserId};

use crate::lookup::{LookupError, PermissionsChecker, PermissionsGetter, UserActiveChecker};
use crate::permissions::has_all_permissions;

#[derive(Debug, Clone)]
struct UserRecord {
    active: bool,
    permissions: Vec<Permission>,
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, UserRecord>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user.
    pub fn upsert(&self, id: impl Into<UserId>, active: bool, permissions: Vec<Permission>) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into(), UserRecord { active, permissions });
    }

    pub fn remove(&self, id: &UserId) {
        self.users.write().unwrap_or_else(|e| e.into_inner()).remove(id);
    }

    /// Make every following lookup fail with a generic (non "not found") error.
    pub fn fail_lookups_with(&self, message: impl Into<String>) {
        *self.failure.write().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    fn find(&self, id: &UserId) -> Result<UserRecord, LookupError> {
        if let Some(message) = self.failure.read().unwrap_or_else(|e| e.into_inner()).clone() {
            return Err(LookupError::Other(anyhow::anyhow!(message)));
        }

        let record = self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned();

        match record {
            Some(record) => Ok(record),
            None => {
                tracing::debug!(user_id = %id, "user not in directory");
                Err(ModelError::UserNotFound.into())
            }
        }
    }
}

#[async_trait]
impl UserActiveChecker for InMemoryUserDirectory {
    async fn is_user_active(&self, id: &UserId) -> Result<bool, LookupError> {
        Ok(self.find(id)?.active)
    }
}

#[async_trait]
impl PermissionsChecker for InMemoryUserDirectory {
    async fn has_permissions(
        &self,
        id: &UserId,
        required: &[Permission],
    ) -> Result<bool, LookupError> {
        let record = self.find(id)?;
        Ok(has_all_permissions(&record.permissions, required))
    }
}

#[async_trait]
impl PermissionsGetter for InMemoryUserDirectory {
    async fn get_permissions(&self, id: &UserId) -> Result<Vec<Permission>, LookupError> {
        Ok(self.find(id)?.permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryUserDirectory {
        let dir = InMemoryUserDirectory::new();
        dir.upsert(
            "u_active",
            true,
            vec![Permission::new("read"), Permission::new("write")],
        );
        dir.upsert("u_inactive", false, vec![]);
        dir
    }

    #[tokio::test]
    async fn reports_active_flag() {
        let dir = directory();
        assert!(dir.is_user_active(&UserId::new("u_active")).await.unwrap());
        assert!(!dir.is_user_active(&UserId::new("u_inactive")).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let dir = directory();
        let err = dir.is_user_active(&UserId::new("u_ghost")).await.unwrap_err();
        assert!(err.is_user_not_found());

        dir.remove(&UserId::new("u_active"));
        let err = dir.get_permissions(&UserId::new("u_active")).await.unwrap_err();
        assert!(err.is_user_not_found());
    }

    #[tokio::test]
    async fn permission_check_requires_all() {
        let dir = directory();
        let id = UserId::new("u_active");

        let read_write = [Permission::new("read"), Permission::new("write")];
        assert!(dir.has_permissions(&id, &read_write).await.unwrap());

        let with_admin = [Permission::new("read"), Permission::new("admin")];
        assert!(!dir.has_permissions(&id, &with_admin).await.unwrap());
    }

    #[tokio::test]
    async fn injected_failure_is_not_a_not_found() {
        let dir = directory();
        dir.fail_lookups_with("connection reset");

        let err = dir.is_user_active(&UserId::new("u_active")).await.unwrap_err();
        assert!(!err.is_user_not_found());
        assert_eq!(err.to_string(), "connection reset");
    }
}
