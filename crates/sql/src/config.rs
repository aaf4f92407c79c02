use std::time::Duration;

use glue_core::{ConfigError, env};

/// Connection pool settings for [`crate::Helper::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 0,
            max_lifetime: None,
            idle_timeout: None,
        }
    }

    /// Read settings from the environment.
    ///
    /// `DATABASE_URL` is required. Lifetimes are in seconds; `0` disables them.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::new(env::string("DATABASE_URL")?);

        Ok(Self {
            max_connections: env::parse_or("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env::parse_or("DATABASE_MIN_CONNECTIONS", defaults.min_connections)?,
            max_lifetime: non_zero(env::secs_or(
                "DATABASE_CONNECTION_MAX_LIFETIME",
                Duration::ZERO,
            )?),
            idle_timeout: non_zero(env::secs_or(
                "DATABASE_CONNECTION_MAX_IDLE_TIME",
                Duration::ZERO,
            )?),
            ..defaults
        })
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    (!d.is_zero()).then_some(d)
}
