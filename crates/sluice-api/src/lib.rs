#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! HTTP surface for the Sluice download server.
//!
//! Layout: `http/router.rs` (router and accept loop), `http/listener.rs`
//! (per-connection limits), `http/download.rs` (streamed
//! downloads), `http/health.rs` (status and metrics), `http/errors.rs` (problem
//! responses), `state.rs` (shared handler state), `models.rs` (wire payloads).

pub mod error;
pub mod http;
pub mod models;
pub mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::listener::ListenerLimits;
pub use http::router::ApiServer;
pub use models::{HealthResponse, ProblemDetails};
pub use state::ApiState;
