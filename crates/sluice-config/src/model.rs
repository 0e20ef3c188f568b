//! Typed configuration model.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Output format requested for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Structured JSON lines.
    Json,
    /// Human-readable lines.
    Pretty,
}

/// Effective configuration for one server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: IpAddr,
    /// Port the HTTP listener binds to.
    pub http_port: u16,
    /// Directory whose files may be downloaded; created at startup if absent.
    pub root_dir: PathBuf,
    /// Maximum number of requests waiting for a worker slot.
    pub queue_capacity: usize,
    /// Maximum number of transfers running concurrently.
    pub worker_slots: usize,
    /// Deadline for a request from admission to completion.
    #[serde(with = "secs")]
    pub request_timeout: Duration,
    /// Log level directive.
    pub log_level: String,
    /// Log format; `None` picks one from the build profile.
    pub log_format: Option<LogOutput>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::BIND_ADDR,
            http_port: defaults::HTTP_PORT,
            root_dir: PathBuf::from(defaults::ROOT_DIR),
            queue_capacity: defaults::QUEUE_CAPACITY,
            worker_slots: defaults::WORKER_SLOTS,
            request_timeout: defaults::REQUEST_TIMEOUT,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: None,
        }
    }
}

impl ServerConfig {
    /// Socket address the HTTP listener binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.root_dir, PathBuf::from("files"));
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.worker_slots, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(1200));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, None);
    }

    #[test]
    fn serialises_timeout_as_seconds() -> anyhow::Result<()> {
        let value = serde_json::to_value(ServerConfig::default())?;
        assert_eq!(value["request_timeout"], json!(1200));
        assert_eq!(value["log_format"], json!(null));

        let config = ServerConfig {
            log_format: Some(LogOutput::Json),
            ..ServerConfig::default()
        };
        let value = serde_json::to_value(&config)?;
        assert_eq!(value["log_format"], json!("json"));
        let back: ServerConfig = serde_json::from_value(value)?;
        assert_eq!(back, config);
        Ok(())
    }
}
