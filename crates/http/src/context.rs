//! Per-request context carried in the request's extensions.
//!
//! Absence is meaningful: no [`AuthenticatedUser`] means the request is
//! anonymous, no [`GrantedPermissions`] means permissions were never loaded.

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::Extensions;
use axum::http::request::Parts;

use glue_auth::Session;
use glue_core::{Permission, UserId};

/// The client's session, inserted by the host's session layer.
#[derive(Clone)]
pub struct SessionHandle(pub Arc<dyn Session>);

impl SessionHandle {
    pub fn new(session: Arc<dyn Session>) -> Self {
        Self(session)
    }

    pub fn session(&self) -> &dyn Session {
        self.0.as_ref()
    }
}

impl core::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionHandle(..)")
    }
}

/// Identity of a validated, active user. At most one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

/// Permission set loaded for the authenticated user of this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedPermissions(pub Vec<Permission>);

/// The authenticated user's ID, if any.
pub fn user_id(extensions: &Extensions) -> Option<&UserId> {
    extensions.get::<AuthenticatedUser>().map(|u| &u.0)
}

/// Permissions loaded by `save_permissions_in_context`, if any.
pub fn permissions(extensions: &Extensions) -> Option<&[Permission]> {
    extensions
        .get::<GrantedPermissions>()
        .map(|p| p.0.as_slice())
}

/// Extractor for the (optional) authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub Option<UserId>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(user_id(&parts.extensions).cloned()))
    }
}

/// Extractor for the (optional) permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentPermissions(pub Option<Vec<Permission>>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPermissions
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(permissions(&parts.extensions).map(<[Permission]>::to_vec)))
    }
}
