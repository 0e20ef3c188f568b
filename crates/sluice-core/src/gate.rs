//! Caller-facing admission: submit a request, then wait with a deadline.
//!
//! # Design
//! - Submission never waits. A full queue is reported immediately.
//! - Each admitted request owns a child of the root cancellation token. The
//!   deadline, a client disconnect, and shutdown all cancel that one token, so
//!   a caller that gives up also stops the transfer.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::completion::CompletionWaiter;
use crate::engine::TransferOutcome;
use crate::error::{TransferError, TransferResult};
use crate::queue::{AdmissionQueue, EnqueueError};
use crate::request::PendingRequest;
use crate::sink::TransferSink;

/// Stand-in deadline when the configured one does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Admits download requests into the queue and hands back a waitable handle.
#[derive(Debug, Clone)]
pub struct RequestGate {
    queue: AdmissionQueue,
    root: CancellationToken,
    deadline: Duration,
}

/// An admitted request whose outcome has not been observed yet.
#[derive(Debug)]
pub struct Admission {
    file_name: String,
    waiter: CompletionWaiter,
    cancel: CancellationToken,
    admitted_at: Instant,
    deadline: Instant,
}

impl RequestGate {
    /// Gate admitting into `queue`, deriving request tokens from `root`.
    #[must_use]
    pub const fn new(queue: AdmissionQueue, root: CancellationToken, deadline: Duration) -> Self {
        Self {
            queue,
            root,
            deadline,
        }
    }

    /// Queue requests are admitted into.
    #[must_use]
    pub const fn queue(&self) -> &AdmissionQueue {
        &self.queue
    }

    /// Deadline applied to every admitted request.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Try to admit a request for `file_name` streaming into `sink`.
    ///
    /// # Errors
    ///
    /// - [`TransferError::QueueFull`] when the admission queue is at capacity.
    /// - [`TransferError::ShuttingDown`] once the pipeline stopped accepting work.
    pub fn submit(
        &self,
        file_name: &str,
        sink: Box<dyn TransferSink>,
    ) -> TransferResult<Admission> {
        if self.root.is_cancelled() {
            return Err(TransferError::ShuttingDown);
        }
        let cancel = self.root.child_token();
        let (request, waiter) = PendingRequest::new(file_name, sink, cancel.clone());
        let admitted_at = Instant::now();
        let deadline = deadline_after(admitted_at, self.deadline);
        match self.queue.try_enqueue(request) {
            Ok(()) => Ok(Admission {
                file_name: file_name.to_string(),
                waiter,
                cancel,
                admitted_at,
                deadline,
            }),
            Err(EnqueueError::Full(_)) => {
                debug!(file = file_name, capacity = self.queue.capacity(), "admission queue full");
                Err(TransferError::QueueFull)
            }
            Err(EnqueueError::Closed(_)) => Err(TransferError::ShuttingDown),
        }
    }

    /// Submit and wait for the outcome in one step.
    ///
    /// # Errors
    ///
    /// Returns the admission error from [`RequestGate::submit`] or
    /// [`TransferError::Timeout`] from [`Admission::wait`].
    pub async fn handle(
        &self,
        file_name: &str,
        sink: Box<dyn TransferSink>,
    ) -> TransferResult<TransferOutcome> {
        let mut admission = self.submit(file_name, sink)?;
        admission.wait().await
    }
}

fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

impl Admission {
    /// Name the request was admitted for.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Token shared with the transfer. Cancelling it stops the transfer.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Instant after which waiting gives up.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Wait for the transfer outcome until the deadline.
    ///
    /// Cancel safe: dropping the future leaves the admission waitable again.
    /// Once an outcome has been returned, further calls report an internal
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Timeout`] when the deadline passes first; the
    /// shared token is cancelled so the transfer stops at its next chunk.
    /// Callers that know the original request report the timeout themselves.
    pub async fn wait(&mut self) -> TransferResult<TransferOutcome> {
        tokio::select! {
            outcome = &mut self.waiter => Ok(outcome),
            () = sleep_until(self.deadline) => {
                self.cancel.cancel();
                let waited = self.deadline.saturating_duration_since(self.admitted_at);
                debug!(
                    file = %self.file_name,
                    waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    "request deadline reached"
                );
                Err(TransferError::Timeout { waited })
            }
        }
    }
}
