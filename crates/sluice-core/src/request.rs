//! A download request admitted to the queue but not yet dispatched.

use std::fmt;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::completion::{CompletionSignal, CompletionWaiter, completion_pair};
use crate::sink::TransferSink;

/// Everything a worker slot needs to run one transfer.
pub struct PendingRequest {
    /// Name exactly as the caller supplied it.
    pub file_name: String,
    /// Destination for the head and body.
    pub sink: Box<dyn TransferSink>,
    /// Fires on client disconnect, caller deadline, or shutdown.
    pub cancel: CancellationToken,
    /// Written exactly once with the transfer outcome.
    pub completion: CompletionSignal,
    /// Admission time, used to report queue wait.
    pub enqueued_at: Instant,
}

impl PendingRequest {
    /// Build a request and the waiter that observes its completion.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        sink: Box<dyn TransferSink>,
        cancel: CancellationToken,
    ) -> (Self, CompletionWaiter) {
        let (completion, waiter) = completion_pair();
        (
            Self {
                file_name: file_name.into(),
                sink,
                cancel,
                completion,
                enqueued_at: Instant::now(),
            },
            waiter,
        )
    }

    /// Requested name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("file_name", &self.file_name)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("enqueued_at", &self.enqueued_at)
            .finish_non_exhaustive()
    }
}
