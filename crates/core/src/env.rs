//! Environment-backed configuration helpers.
//!
//! Configuration structs across the workspace read plain environment
//! variables; a variable that is unset or empty means "use the default".

use core::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for environment variable {key}")]
    Invalid { key: &'static str, value: String },
}

fn lookup(key: &'static str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Required string variable.
pub fn string(key: &'static str) -> Result<String, ConfigError> {
    lookup(key).ok_or(ConfigError::Missing(key))
}

pub fn string_or(key: &'static str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable with `FromStr`, falling back to `default` when unset.
pub fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Accepts the usual spellings: 1/0, t/f, true/false (any case).
pub fn bool_or(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid { key, value }),
    }
}

/// Duration given in whole seconds.
pub fn secs_or(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(key, default.as_secs()).map(Duration::from_secs)
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}
