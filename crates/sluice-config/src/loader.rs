//! Environment-backed configuration loading.
//!
//! # Design
//! - `from_lookup` takes a closure so tests can inject variables without
//!   mutating the process environment.
//! - Unset or empty variables fall back to defaults; set but unparsable ones
//!   are rejected rather than silently ignored.

use std::env;

use crate::error::ConfigResult;
use crate::model::ServerConfig;
use crate::validate::{
    parse_count, parse_dir, parse_ip, parse_level, parse_log_output, parse_port, parse_secs,
    validate,
};

/// Bind address variable.
pub const ENV_BIND_ADDR: &str = "SLUICE_BIND_ADDR";
/// Listener port variable.
pub const ENV_HTTP_PORT: &str = "SLUICE_HTTP_PORT";
/// Served root variable.
pub const ENV_ROOT_DIR: &str = "SLUICE_ROOT_DIR";
/// Admission queue capacity variable.
pub const ENV_QUEUE_CAPACITY: &str = "SLUICE_QUEUE_CAPACITY";
/// Worker slot count variable.
pub const ENV_WORKER_SLOTS: &str = "SLUICE_WORKER_SLOTS";
/// Request deadline variable, in seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SLUICE_REQUEST_TIMEOUT_SECS";
/// Log level variable; `RUST_LOG` still takes precedence at runtime.
pub const ENV_LOG_LEVEL: &str = "SLUICE_LOG_LEVEL";
/// Log format variable (`json` or `pretty`).
pub const ENV_LOG_FORMAT: &str = "SLUICE_LOG_FORMAT";

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] for any set variable that
    /// fails to parse or validate.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] for any set variable that
    /// fails to parse or validate.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = read(ENV_BIND_ADDR) {
            config.bind_addr = parse_ip("bind_addr", &raw)?;
        }
        if let Some(raw) = read(ENV_HTTP_PORT) {
            config.http_port = parse_port("http_port", &raw)?;
        }
        if let Some(raw) = read(ENV_ROOT_DIR) {
            config.root_dir = parse_dir("root_dir", &raw)?;
        }
        if let Some(raw) = read(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = parse_count("queue_capacity", &raw)?;
        }
        if let Some(raw) = read(ENV_WORKER_SLOTS) {
            config.worker_slots = parse_count("worker_slots", &raw)?;
        }
        if let Some(raw) = read(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = parse_secs("request_timeout", &raw)?;
        }
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            config.log_level = parse_level("log_level", &raw)?;
        }
        if let Some(raw) = read(ENV_LOG_FORMAT) {
            config.log_format = Some(parse_log_output("log_format", &raw)?);
        }

        validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::model::LogOutput;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() -> ConfigResult<()> {
        let config = ServerConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config, ServerConfig::default());
        Ok(())
    }

    #[test]
    fn every_variable_overrides_its_field() -> ConfigResult<()> {
        let config = ServerConfig::from_lookup(lookup(&[
            (ENV_BIND_ADDR, "127.0.0.1"),
            (ENV_HTTP_PORT, "9090"),
            (ENV_ROOT_DIR, "/srv/downloads"),
            (ENV_QUEUE_CAPACITY, "2"),
            (ENV_WORKER_SLOTS, "4"),
            (ENV_REQUEST_TIMEOUT_SECS, "30"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "json"),
        ]))?;
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9090");
        assert_eq!(config.root_dir, PathBuf::from("/srv/downloads"));
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.worker_slots, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, Some(LogOutput::Json));
        Ok(())
    }

    #[test]
    fn blank_values_fall_back_to_defaults() -> ConfigResult<()> {
        let config = ServerConfig::from_lookup(lookup(&[(ENV_HTTP_PORT, "  ")]))?;
        assert_eq!(config.http_port, 8080);
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_field() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_WORKER_SLOTS, "many")])).err();
        match err {
            Some(ConfigError::InvalidField {
                field,
                reason,
                value,
            }) => {
                assert_eq!(field, "worker_slots");
                assert_eq!(reason, "not_an_integer");
                assert_eq!(value.as_deref(), Some("many"));
            }
            None => panic!("invalid worker slot count accepted"),
        }
    }

    #[test]
    fn unbounded_sizes_from_the_environment_are_refused() {
        let timeout = ServerConfig::from_lookup(lookup(&[(
            ENV_REQUEST_TIMEOUT_SECS,
            "18446744073709551615",
        )]))
        .err();
        assert!(matches!(
            timeout,
            Some(ConfigError::InvalidField {
                field: "request_timeout",
                reason: "exceeds_maximum",
                ..
            })
        ));

        let capacity = ServerConfig::from_lookup(lookup(&[(
            ENV_QUEUE_CAPACITY,
            "18446744073709551615",
        )]))
        .err();
        assert!(matches!(
            capacity,
            Some(ConfigError::InvalidField {
                field: "queue_capacity",
                reason: "exceeds_maximum",
                ..
            })
        ));
    }

    #[test]
    fn validation_runs_after_parsing() {
        let err = ServerConfig::from_lookup(lookup(&[(ENV_WORKER_SLOTS, "20000")])).err();
        assert!(matches!(
            err,
            Some(ConfigError::InvalidField {
                field: "worker_slots",
                reason: "exceeds_maximum",
                ..
            })
        ));
    }
}
