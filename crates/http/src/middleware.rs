//! Authentication and authorization middleware.
//!
//! Each middleware is an `async fn` taking its state, meant for
//! `axum::middleware::from_fn_with_state`:
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/admin", get(admin))
//!     .route_layer(from_fn_with_state(AuthorizeState::new(users.clone(), ["admin"]), authorize))
//!     .layer(from_fn_with_state(AuthenticateState::new(users), authenticate));
//! ```
//!
//! `authenticate` must run before the others: they read the identity it
//! attaches.
//!
//! ## Authenticate outcomes
//!
//! | Session / lookup | Session destroyed | Identity | Response |
//! |------------------|-------------------|----------|----------|
//! | no user key | no | none | next handler |
//! | user not found | yes | none | next handler |
//! | user inactive | yes | none | next handler |
//! | user active | no | attached | next handler |
//! | lookup error | no | none | 500 |
//! | destroy error | attempted | none | 500 |

use std::sync::Arc;

use axum::extract::{OriginalUri, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Span, instrument};

use glue_auth::{
    LookupError, PermissionsChecker, PermissionsGetter, SESSION_USER_ID_KEY, SessionDestroyer,
    SessionReader, UserActiveChecker,
};
use glue_core::{Permission, UserId};

use crate::context::{AuthenticatedUser, GrantedPermissions, SessionHandle, user_id};
use crate::errors::{forbidden, internal_error, login_redirect, redirect};

#[derive(Clone)]
pub struct AuthenticateState {
    pub users: Arc<dyn UserActiveChecker>,
}

impl AuthenticateState {
    pub fn new(users: Arc<dyn UserActiveChecker>) -> Self {
        Self { users }
    }
}

/// Authenticate the request from its session.
///
/// A session pointing at a missing or inactive user is destroyed and the
/// request continues as anonymous.
#[instrument(name = "authenticate", skip_all, fields(user_id = tracing::field::Empty))]
pub async fn authenticate(
    State(state): State<AuthenticateState>,
    mut req: Request,
    next: Next,
) -> Response {
    // Only this middleware may attach an identity.
    req.extensions_mut().remove::<AuthenticatedUser>();

    let Some(session) = req.extensions().get::<SessionHandle>().cloned() else {
        return next.run(req).await;
    };

    if !session.session().exists(SESSION_USER_ID_KEY).await {
        return next.run(req).await;
    }

    let user_id = UserId::new(
        session
            .session()
            .get_string(SESSION_USER_ID_KEY)
            .await
            .unwrap_or_default(),
    );
    Span::current().record("user_id", tracing::field::display(&user_id));

    match state.users.is_user_active(&user_id).await {
        Ok(true) => {
            req.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(req).await
        }
        Ok(false) => {
            if let Err(e) = session.session().destroy().await {
                tracing::info!(error = %e, %user_id, "error destroying session for inactive user");
                return internal_error("error destroying session after authentication");
            }
            next.run(req).await
        }
        Err(LookupError::UserNotFound) => {
            if let Err(e) = session.session().destroy().await {
                tracing::info!(error = %e, %user_id, "error destroying session for nonexistent user");
                return internal_error("error destroying session after authentication");
            }
            next.run(req).await
        }
        Err(e) => {
            tracing::info!(error = %e, %user_id, "error getting user after authentication");
            internal_error("error getting user after authentication")
        }
    }
}

#[derive(Clone)]
pub struct AuthorizeState {
    pub checker: Arc<dyn PermissionsChecker>,
    pub required: Arc<[Permission]>,
}

impl AuthorizeState {
    pub fn new<I, P>(checker: Arc<dyn PermissionsChecker>, required: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        Self {
            checker,
            required: required.into_iter().map(Into::into).collect(),
        }
    }
}

/// Require an authenticated user holding every permission in the state.
///
/// Anonymous requests are redirected to `/login` with the requested path.
#[instrument(name = "authorize", skip_all, fields(user_id = tracing::field::Empty))]
pub async fn authorize(State(state): State<AuthorizeState>, req: Request, next: Next) -> Response {
    let Some(user_id) = user_id(req.extensions()).cloned() else {
        // Nested routers strip their prefix from `req.uri()`.
        let path = req
            .extensions()
            .get::<OriginalUri>()
            .map_or_else(|| req.uri().path(), |uri| uri.0.path());
        return login_redirect(path);
    };
    Span::current().record("user_id", tracing::field::display(&user_id));

    match state.checker.has_permissions(&user_id, &state.required).await {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::debug!(%user_id, "missing required permissions");
            forbidden()
        }
        Err(e) => {
            tracing::info!(error = %e, %user_id, "error checking permissions");
            internal_error("error checking permissions")
        }
    }
}

#[derive(Clone)]
pub struct SavePermissionsState {
    pub getter: Arc<dyn PermissionsGetter>,
}

impl SavePermissionsState {
    pub fn new(getter: Arc<dyn PermissionsGetter>) -> Self {
        Self { getter }
    }
}

/// Load the authenticated user's permissions into the request context.
///
/// Permissions are fetched fresh on every request.
#[instrument(name = "save_permissions_in_context", skip_all)]
pub async fn save_permissions_in_context(
    State(state): State<SavePermissionsState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(user_id) = user_id(req.extensions()).cloned() else {
        return next.run(req).await;
    };

    match state.getter.get_permissions(&user_id).await {
        Ok(permissions) => {
            req.extensions_mut().insert(GrantedPermissions(permissions));
            next.run(req).await
        }
        Err(e) => {
            tracing::error!(error = %e, %user_id, "error getting permissions");
            internal_error("error getting permissions")
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedirectIfAuthenticated {
    pub target: Arc<str>,
}

impl RedirectIfAuthenticated {
    pub fn new(target: impl Into<Arc<str>>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

/// Send authenticated users elsewhere (e.g. away from the login page).
pub async fn redirect_if_authenticated(
    State(state): State<RedirectIfAuthenticated>,
    req: Request,
    next: Next,
) -> Response {
    if user_id(req.extensions()).is_some() {
        return redirect(StatusCode::TEMPORARY_REDIRECT, &state.target);
    }

    next.run(req).await
}
