#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the Sluice workspace.
//!
//! This crate centralises logging and the queue-depth gauge so the core pipeline
//! and the HTTP surface report through one consistent story.
//!
//! Layout: `init.rs` (subscriber install), `context.rs` (process span),
//! `metrics.rs` (Prometheus registry).

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::GlobalContextGuard;
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
