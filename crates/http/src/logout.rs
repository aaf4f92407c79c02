//! Logout endpoint.

use axum::Router;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use tracing::instrument;
use url::form_urlencoded;

use glue_auth::SessionDestroyer;

use crate::context::{SessionHandle, user_id};
use crate::errors::{internal_error, redirect};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogoutQuery {
    pub redirect: Option<String>,
}

impl LogoutQuery {
    /// Parse a raw query string. A repeated `redirect` keeps its first value.
    pub fn parse(query: Option<&str>) -> Self {
        let redirect = query.and_then(|q| {
            form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "redirect")
                .map(|(_, value)| value.into_owned())
        });
        Self { redirect }
    }

    /// Where to send the client afterwards; `/` when unset or empty.
    pub fn target(&self) -> &str {
        match self.redirect.as_deref() {
            Some(target) if !target.is_empty() => target,
            _ => "/",
        }
    }
}

/// `POST /logout`
pub fn logout_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/logout", post(logout))
}

/// Destroy the session of an authenticated user and redirect.
///
/// Anonymous requests are redirected without touching the session.
#[instrument(name = "logout", skip_all, fields(user_id = tracing::field::Empty))]
pub async fn logout(req: Request) -> Response {
    let query = LogoutQuery::parse(req.uri().query());
    let target = query.target();

    let Some(user_id) = user_id(req.extensions()).cloned() else {
        return redirect(StatusCode::FOUND, target);
    };
    tracing::Span::current().record("user_id", tracing::field::display(&user_id));

    let Some(session) = req.extensions().get::<SessionHandle>().cloned() else {
        tracing::error!(%user_id, "no session handle on authenticated request");
        return internal_error("error logging out");
    };

    if let Err(e) = session.session().destroy().await {
        tracing::info!(error = %e, %user_id, "error destroying session on logout");
        return internal_error("error logging out");
    }

    redirect(StatusCode::FOUND, target)
}
