//! Parsing and range checks for configuration values.
//!
//! # Design
//! - Parsers take the raw string and the field name so every failure carries
//!   the same machine-readable context.
//! - `validate` re-checks ranges on a fully built config, so programmatic
//!   construction gets the same guarantees as environment loading.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{LogOutput, ServerConfig};

/// Upper bound on concurrently running transfers.
pub const MAX_WORKER_SLOTS: usize = 10_000;
/// Upper bound on requests waiting for a worker slot.
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;
/// Upper bound on the per-request deadline (one week).
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Parse an IP address.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is not an address.
pub fn parse_ip(field: &'static str, raw: &str) -> ConfigResult<IpAddr> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_an_ip_address", raw))
}

/// Parse a non-zero TCP port.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or zero ports.
pub fn parse_port(field: &'static str, raw: &str) -> ConfigResult<u16> {
    let port: u16 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_a_port", raw))?;
    if port == 0 {
        return Err(ConfigError::invalid(field, "must_be_non_zero", raw));
    }
    Ok(port)
}

/// Parse a count that must be at least one.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or zero counts.
pub fn parse_count(field: &'static str, raw: &str) -> ConfigResult<usize> {
    let count: usize = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_an_integer", raw))?;
    if count == 0 {
        return Err(ConfigError::invalid(field, "must_be_positive", raw));
    }
    Ok(count)
}

/// Parse a whole number of seconds, at least one.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for non-numeric or zero durations.
pub fn parse_secs(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "not_an_integer", raw))?;
    if secs == 0 {
        return Err(ConfigError::invalid(field, "must_be_positive", raw));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse a non-empty directory path.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is blank.
pub fn parse_dir(field: &'static str, raw: &str) -> ConfigResult<PathBuf> {
    if raw.trim().is_empty() {
        return Err(ConfigError::invalid(field, "must_not_be_empty", raw));
    }
    Ok(PathBuf::from(raw))
}

/// Parse a non-empty log level directive.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when `raw` is blank.
pub fn parse_level(field: &'static str, raw: &str) -> ConfigResult<String> {
    let level = raw.trim();
    if level.is_empty() {
        return Err(ConfigError::invalid(field, "must_not_be_empty", raw));
    }
    Ok(level.to_string())
}

/// Parse `json` or `pretty`, case-insensitively.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other value.
pub fn parse_log_output(field: &'static str, raw: &str) -> ConfigResult<LogOutput> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogOutput::Json),
        "pretty" | "text" => Ok(LogOutput::Pretty),
        _ => Err(ConfigError::invalid(field, "unknown_log_format", raw)),
    }
}

/// Check the ranges of an already built configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate(config: &ServerConfig) -> ConfigResult<()> {
    if config.http_port == 0 {
        return Err(ConfigError::invalid("http_port", "must_be_non_zero", 0));
    }
    if config.queue_capacity == 0 {
        return Err(ConfigError::invalid("queue_capacity", "must_be_positive", 0));
    }
    if config.queue_capacity > MAX_QUEUE_CAPACITY {
        return Err(ConfigError::invalid(
            "queue_capacity",
            "exceeds_maximum",
            config.queue_capacity,
        ));
    }
    if config.worker_slots == 0 {
        return Err(ConfigError::invalid("worker_slots", "must_be_positive", 0));
    }
    if config.worker_slots > MAX_WORKER_SLOTS {
        return Err(ConfigError::invalid(
            "worker_slots",
            "exceeds_maximum",
            config.worker_slots,
        ));
    }
    if config.request_timeout < Duration::from_secs(1) {
        return Err(ConfigError::invalid(
            "request_timeout",
            "must_be_at_least_one_second",
            format!("{}ms", config.request_timeout.as_millis()),
        ));
    }
    if config.request_timeout > MAX_REQUEST_TIMEOUT {
        return Err(ConfigError::invalid(
            "request_timeout",
            "exceeds_maximum",
            format!("{}s", config.request_timeout.as_secs()),
        ));
    }
    if config.root_dir.as_os_str().is_empty() {
        return Err(ConfigError::InvalidField {
            field: "root_dir",
            reason: "must_not_be_empty",
            value: None,
        });
    }
    Ok(())
}
