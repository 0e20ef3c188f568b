//! # Design
//!
//! - Provide structured, constant-message errors for the admission and transfer pipeline.
//! - Capture operation context (paths, fields, inputs) as fields rather than in messages.
//! - Collapse the variants onto a small [`ErrorKind`] taxonomy that outer layers map to
//!   status codes.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for pipeline operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors produced while admitting, resolving, or streaming a download.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The requested name was empty or malformed.
    #[error("invalid download request")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// The requested name resolves outside the served root.
    #[error("requested path escapes the served root")]
    PathEscape {
        /// Raw name supplied by the caller.
        requested: String,
    },
    /// The resolved file does not exist.
    #[error("requested file not found")]
    NotFound {
        /// Resolved path that was looked up.
        path: PathBuf,
    },
    /// IO failures while opening, inspecting, or reading the file.
    #[error("transfer io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The transfer task faulted outside the normal error paths.
    #[error("transfer task failed")]
    Internal {
        /// Description of the fault.
        detail: String,
    },
    /// The admission queue had no free capacity.
    #[error("admission queue is full")]
    QueueFull,
    /// The caller deadline elapsed before the transfer finished.
    #[error("request deadline exceeded")]
    Timeout {
        /// Time spent waiting before giving up.
        waited: Duration,
    },
    /// The pipeline is no longer accepting work.
    #[error("server is shutting down")]
    ShuttingDown,
}

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty or malformed file name.
    InvalidInput,
    /// Traversal outside the served root.
    PathEscape,
    /// File absent.
    NotFound,
    /// Open, stat, or read failure, including intercepted task faults.
    Io,
    /// Admission queue at capacity.
    QueueFull,
    /// Caller deadline exceeded.
    Timeout,
    /// Pipeline draining for shutdown.
    ShuttingDown,
}

impl TransferError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// Classify the error for status mapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::PathEscape { .. } => ErrorKind::PathEscape,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Io { .. } | Self::Internal { .. } => ErrorKind::Io,
            Self::QueueFull => ErrorKind::QueueFull,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ShuttingDown => ErrorKind::ShuttingDown,
        }
    }
}
