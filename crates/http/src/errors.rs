//! Response helpers.
//!
//! Error bodies are generic on purpose: collaborator errors are logged, never
//! sent to the client.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn internal_error(message: &'static str) -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
}

pub fn forbidden() -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden")
}

/// Redirect with an explicit status (302, 307, ...).
pub fn redirect(status: StatusCode, location: &str) -> Response {
    match header::HeaderValue::from_str(location) {
        Ok(value) => (status, [(header::LOCATION, value)]).into_response(),
        Err(_) => json_error(StatusCode::BAD_REQUEST, "bad_request", "invalid redirect target"),
    }
}

/// Login redirect carrying the originally requested path.
pub fn login_redirect(path: &str) -> Response {
    let location = format!("/login?redirect={}", urlencoding::encode(path));
    redirect(StatusCode::TEMPORARY_REDIRECT, &location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_escapes_the_path() {
        let res = login_redirect("/reports/2024 q1");
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            res.headers()[header::LOCATION],
            "/login?redirect=%2Freports%2F2024%20q1"
        );
    }

    #[test]
    fn unusable_redirect_target_is_a_bad_request() {
        let res = redirect(StatusCode::FOUND, "/next\r\nSet-Cookie: x=y");
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get(header::LOCATION).is_none());
    }
}
