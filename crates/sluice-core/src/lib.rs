#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Admission control and streaming transfer pipeline for served files.
//!
//! Requests enter through [`RequestGate`], wait in the bounded [`AdmissionQueue`],
//! and are matched to a free worker slot by the [`Dispatcher`], which runs one
//! [`TransferEngine`] invocation per request behind a fault barrier.
//!
//! Layout: `path.rs` (root confinement), `sink.rs` (response sinks), `engine.rs`
//! (chunked transfer), `completion.rs` (single-use completion signal), `request.rs`
//! (pending request), `queue.rs` (admission queue), `dispatcher.rs` (worker slots),
//! `gate.rs` (caller-facing submit/wait).

pub mod completion;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gate;
pub mod path;
pub mod queue;
pub mod request;
pub mod sink;

pub use completion::{CompletionSignal, CompletionWaiter, completion_pair};
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use engine::{CHUNK_SIZE, TransferContext, TransferEngine, TransferOutcome};
pub use error::{ErrorKind, TransferError, TransferResult};
pub use gate::{Admission, RequestGate};
pub use path::{PathResolver, resolve};
pub use queue::{AdmissionQueue, AdmissionReceiver, EnqueueError, admission_queue};
pub use request::PendingRequest;
pub use sink::{
    ChannelReceiver, ChannelSink, OCTET_STREAM, ResponseHead, TransferSink, channel_sink,
};
