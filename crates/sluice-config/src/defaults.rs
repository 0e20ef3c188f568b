//! Fallback values applied when a variable is not set.
//!
//! # Design
//! - Keep every default in one place so docs and tests agree.
//! - Values match the long-standing behaviour of the download service.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Listen on every interface.
pub const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
/// HTTP listener port.
pub const HTTP_PORT: u16 = 8080;
/// Served root, relative to the working directory.
pub const ROOT_DIR: &str = "files";
/// Requests allowed to wait for a worker slot.
pub const QUEUE_CAPACITY: usize = 1000;
/// Transfers allowed to run at once.
pub const WORKER_SLOTS: usize = 100;
/// Per-request deadline. Large files legitimately take a long time.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20 * 60);
/// Log level used when neither `RUST_LOG` nor the config override it.
pub const LOG_LEVEL: &str = "info";
