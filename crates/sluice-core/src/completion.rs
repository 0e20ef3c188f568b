//! Single-use completion signal between a transfer task and its waiter.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::engine::TransferOutcome;
use crate::error::TransferError;

/// Writer half; consumed by [`CompletionSignal::complete`].
///
/// Dropping an unwritten signal reports an internal failure so the waiter is
/// released even when the owning task never reaches its normal exit.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Option<oneshot::Sender<TransferOutcome>>,
}

/// Waiter half; resolves to the outcome written by the signal.
///
/// Polling again after the outcome was taken yields an internal failure
/// instead of panicking.
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: Option<oneshot::Receiver<TransferOutcome>>,
}

/// Create a connected signal/waiter pair.
#[must_use]
pub fn completion_pair() -> (CompletionSignal, CompletionWaiter) {
    let (tx, rx) = oneshot::channel();
    (
        CompletionSignal { tx: Some(tx) },
        CompletionWaiter { rx: Some(rx) },
    )
}

impl CompletionSignal {
    /// Deliver the outcome. The waiter may already have given up; that is fine.
    pub fn complete(mut self, outcome: TransferOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(TransferOutcome::Failed(TransferError::internal(
                "completion signal dropped before the transfer finished",
            )));
        }
    }
}

impl Future for CompletionWaiter {
    type Output = TransferOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Ready(TransferOutcome::Failed(TransferError::internal(
                "completion outcome already taken",
            )));
        };
        let received = std::task::ready!(Pin::new(rx).poll(cx));
        self.rx = None;
        Poll::Ready(received.unwrap_or_else(|_| {
            TransferOutcome::Failed(TransferError::internal("completion signal lost"))
        }))
    }
}
