//! Matches queued requests to a fixed number of worker slots.
//!
//! # Design
//! - A slot permit is acquired before dequeuing, so requests stay counted in
//!   the admission queue while every slot is busy.
//! - Each transfer runs in its own task behind a supervisor that inspects the
//!   join result; a panic becomes `Failed(Internal)` and the completion signal
//!   is always written.
//! - Shutdown closes the queue, completes still-queued requests as cancelled,
//!   and waits for in-flight transfers to observe cancellation.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::{TransferEngine, TransferOutcome};
use crate::error::{TransferError, TransferResult};
use crate::queue::AdmissionReceiver;
use crate::request::PendingRequest;

/// Long-running loop feeding queued requests to worker slots.
#[derive(Debug)]
pub struct Dispatcher {
    receiver: AdmissionReceiver,
    engine: TransferEngine,
    slots: Arc<Semaphore>,
    worker_slots: u32,
    shutdown: CancellationToken,
}

/// Handle to a spawned [`Dispatcher`].
#[derive(Debug)]
pub struct DispatcherHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl Dispatcher {
    /// Build a dispatcher running at most `worker_slots` transfers at once.
    ///
    /// Cancelling `shutdown` stops dispatching; request tokens derived from it
    /// observe the same cancellation.
    #[must_use]
    pub fn new(
        receiver: AdmissionReceiver,
        engine: TransferEngine,
        worker_slots: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let worker_slots = u32::try_from(worker_slots.max(1)).unwrap_or(u32::MAX);
        Self {
            receiver,
            engine,
            slots: Arc::new(Semaphore::new(worker_slots as usize)),
            worker_slots,
            shutdown,
        }
    }

    /// Configured number of worker slots.
    #[must_use]
    pub const fn worker_slots(&self) -> u32 {
        self.worker_slots
    }

    /// Run the dispatcher on the current runtime.
    #[must_use]
    pub fn spawn(self) -> DispatcherHandle {
        let shutdown = self.shutdown.clone();
        let join = tokio::spawn(self.run());
        DispatcherHandle { shutdown, join }
    }

    /// Dispatch until shutdown is requested or every producer is gone, then drain.
    pub async fn run(mut self) {
        info!(worker_slots = self.worker_slots, "dispatcher started");
        loop {
            let permit = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let request = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                request = self.receiver.dequeue() => match request {
                    Some(request) => request,
                    None => break,
                },
            };
            self.dispatch(request, permit);
        }
        self.drain().await;
    }

    fn dispatch(&self, request: PendingRequest, permit: OwnedSemaphorePermit) {
        let PendingRequest {
            file_name,
            mut sink,
            cancel,
            completion,
            enqueued_at,
        } = request;
        let queue_wait_ms = u64::try_from(enqueued_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(file = %file_name, queue_wait_ms, "dispatching download");

        let engine = self.engine.clone();
        let transfer_cancel = cancel.clone();
        let transfer_name = file_name.clone();
        tokio::spawn(async move {
            let transfer = tokio::spawn(async move {
                engine
                    .run(&transfer_name, sink.as_mut(), &transfer_cancel)
                    .await
            });
            let outcome = match transfer.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!(
                        file = %file_name,
                        panicked = join_err.is_panic(),
                        error = %join_err,
                        "transfer task faulted"
                    );
                    cancel.cancel();
                    TransferOutcome::Failed(TransferError::internal("transfer task faulted"))
                }
            };
            debug!(file = %file_name, outcome = outcome.label(), bytes = outcome.bytes(), "transfer finished");
            completion.complete(outcome);
            drop(permit);
        });
    }

    async fn drain(mut self) {
        self.receiver.close();
        let mut drained = 0_usize;
        while let Some(request) = self.receiver.dequeue().await {
            request.cancel.cancel();
            request
                .completion
                .complete(TransferOutcome::Cancelled { bytes: 0 });
            drained += 1;
        }
        // Every slot free means every in-flight transfer has completed.
        let idle = self.slots.acquire_many(self.worker_slots).await;
        drop(idle);
        info!(drained, "dispatcher stopped");
    }
}

impl DispatcherHandle {
    /// Token that stops the dispatcher when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Whether the dispatcher loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel dispatching and wait for the drain to finish.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Internal`] if the dispatcher task panicked.
    pub async fn shutdown(self) -> TransferResult<()> {
        self.shutdown.cancel();
        self.join().await
    }

    /// Wait for the dispatcher to exit without requesting shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Internal`] if the dispatcher task panicked.
    pub async fn join(self) -> TransferResult<()> {
        self.join
            .await
            .map_err(|err| TransferError::internal(format!("dispatcher task failed: {err}")))
    }
}
