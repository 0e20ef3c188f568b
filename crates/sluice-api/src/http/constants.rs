//! Shared HTTP constants (headers, problem URIs, streaming and listener limits).

use std::time::Duration;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://sluice.dev/problems/bad-request";
pub(crate) const PROBLEM_PATH_ESCAPE: &str = "https://sluice.dev/problems/path-escape";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://sluice.dev/problems/not-found";
pub(crate) const PROBLEM_INTERNAL: &str = "https://sluice.dev/problems/internal";
pub(crate) const PROBLEM_REQUEST_TIMEOUT: &str = "https://sluice.dev/problems/request-timeout";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://sluice.dev/problems/service-unavailable";

/// Chunks buffered between the transfer task and the response body.
pub(crate) const BODY_CHANNEL_DEPTH: usize = 4;
pub(crate) const CACHE_CONTROL_NO_CACHE: &str = "no-cache";
pub(crate) const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

pub(crate) const DEFAULT_HEADER_READ_TIMEOUT: Duration = Duration::from_secs(60);
pub(crate) const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);
pub(crate) const DEFAULT_MAX_HEADER_BYTES: usize = 1 << 20;
/// Smallest read buffer hyper accepts.
pub(crate) const MIN_HEADER_BUFFER: usize = 8 * 1024;
/// Pause after a failed `accept` (for example when out of descriptors).
pub(crate) const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);
