#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Typed server configuration loaded from `SLUICE_*` environment variables.
//!
//! Layout: `model.rs` (typed config), `defaults.rs` (fallback values),
//! `validate.rs` (parsing and range checks), `loader.rs` (environment lookup).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    ENV_BIND_ADDR, ENV_HTTP_PORT, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_QUEUE_CAPACITY,
    ENV_REQUEST_TIMEOUT_SECS, ENV_ROOT_DIR, ENV_WORKER_SLOTS,
};
pub use model::{LogOutput, ServerConfig};
