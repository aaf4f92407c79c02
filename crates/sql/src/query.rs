//! Query tracing and connection-string helpers.

use tracing::Span;
use url::Url;

const MAX_QUERY_TEXT: usize = 1000;

/// Collapse whitespace and truncate long statements for span attributes.
pub fn normalize_query(query: &str) -> String {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.len() <= MAX_QUERY_TEXT {
        return normalized;
    }

    let mut end = MAX_QUERY_TEXT;
    while !normalized.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &normalized[..end])
}

/// Replace the password of a connection URL, for logging.
pub fn scrub_url(connection_url: &str) -> String {
    match Url::parse(connection_url) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("xxx"));
            }
            url.to_string()
        }
        Err(_) => "<invalid connection url>".to_string(),
    }
}

/// `true` when a query expecting exactly one row found none.
pub fn is_no_rows(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::RowNotFound)
}

pub(crate) fn query_span(query: &str) -> Span {
    tracing::debug_span!(
        "query",
        db.system = "postgresql",
        db.query.text = %normalize_query(query),
    )
}
