//! Session contracts.
//!
//! A session is scoped to one client. The session layer owning storage,
//! cookies and expiry is an external collaborator; the auth gate only reads a
//! key and, on some failures, destroys the whole session.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

/// Session key holding the authenticated user's identifier.
pub const SESSION_USER_ID_KEY: &str = "userID";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Store(String),
}

/// Read access to the current client's session.
#[async_trait]
pub trait SessionReader: Send + Sync {
    async fn exists(&self, key: &str) -> bool;

    async fn get_string(&self, key: &str) -> Option<String>;
}

/// Invalidation of the current client's session.
#[async_trait]
pub trait SessionDestroyer: Send + Sync {
    async fn destroy(&self) -> Result<(), SessionError>;
}

/// A session that can be both read and destroyed.
pub trait Session: SessionReader + SessionDestroyer {}

impl<T: SessionReader + SessionDestroyer + ?Sized> Session for T {}

/// In-memory session for tests/dev.
///
/// Counts destroy calls and can be told to fail them, so gate behaviour on
/// store failures can be exercised without a real backend.
#[derive(Debug, Default)]
pub struct InMemorySession {
    values: RwLock<HashMap<String, String>>,
    destroy_calls: AtomicUsize,
    destroyed: AtomicBool,
    destroy_failure: RwLock<Option<String>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already carrying an authenticated user.
    pub fn with_user(user_id: impl Into<String>) -> Self {
        let session = Self::new();
        session.put(SESSION_USER_ID_KEY, user_id);
        session
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    /// Make every following `destroy` fail with the given message.
    pub fn fail_destroy_with(&self, message: impl Into<String>) {
        *self.destroy_failure.write().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionReader for InMemorySession {
    async fn exists(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    async fn get_string(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl SessionDestroyer for InMemorySession {
    async fn destroy(&self) -> Result<(), SessionError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self
            .destroy_failure
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(SessionError::Store(message));
        }

        self.values.write().unwrap_or_else(|e| e.into_inner()).clear();
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
