//! Tracing/logging initialization.
//!
//! Logs go to stderr, as JSON by default. `RUST_LOG` still wins over the
//! configured level when set.

use glue_core::{ConfigError, env};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub json: bool,
    pub level: Level,
    /// Drop timestamps, e.g. when the log collector adds its own.
    pub no_time: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: true,
            level: Level::INFO,
            no_time: false,
        }
    }
}

impl LogConfig {
    /// Reads `LOG_JSON`, `LOG_LEVEL` and `LOG_NO_TIME`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let level = env::string_or("LOG_LEVEL", "info");

        Ok(Self {
            json: env::bool_or("LOG_JSON", defaults.json)?,
            level: parse_level(&level).ok_or_else(|| ConfigError::Invalid {
                key: "LOG_LEVEL",
                value: level.clone(),
            })?,
            no_time: env::bool_or("LOG_NO_TIME", defaults.no_time)?,
        })
    }
}

/// `debug`, `info`, `warn` or `error`, any case.
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Install the process-wide subscriber.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match (config.json, config.no_time) {
        (true, false) => builder.json().try_init(),
        (true, true) => builder.json().without_time().try_init(),
        (false, false) => builder.try_init(),
        (false, true) => builder.without_time().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("INFO"), Some(Level::INFO));
        assert_eq!(parse_level("Warn"), Some(Level::WARN));
        assert_eq!(parse_level("error"), Some(Level::ERROR));
        assert_eq!(parse_level("trace"), None);
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn defaults_match_production_setup() {
        let config = LogConfig::default();
        assert!(config.json);
        assert_eq!(config.level, Level::INFO);
        assert!(!config.no_time);
    }

    #[test]
    fn init_twice_is_harmless() {
        let config = LogConfig {
            json: false,
            level: Level::DEBUG,
            no_time: true,
        };
        init(&config);
        init(&config);
        tracing::debug!("still alive");
    }
}
