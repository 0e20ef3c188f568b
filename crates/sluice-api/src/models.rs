//! Wire payloads returned by the HTTP surface.

use serde::{Deserialize, Serialize};

/// RFC9457 problem document returned for every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Configured number of worker slots.
    pub workers: usize,
    /// Requests currently waiting for a slot.
    pub queue_size: usize,
    /// Maximum number of waiting requests.
    pub queue_capacity: usize,
    /// Build identifier recorded at startup.
    pub build: String,
}
