//! Bounded FIFO buffer between the request gate and the dispatcher.
//!
//! # Design
//! - `try_enqueue` never waits: a full buffer hands the request straight back.
//! - Depth is tracked next to the channel so the health endpoint and the
//!   Prometheus gauge can read it without touching the receiver.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sluice_telemetry::Metrics;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::request::PendingRequest;

/// Why a request was not admitted. The request is returned to the caller.
pub enum EnqueueError {
    /// The buffer is at capacity.
    Full(PendingRequest),
    /// The receiving side is gone or closed for shutdown.
    Closed(PendingRequest),
}

impl EnqueueError {
    /// Recover the rejected request.
    #[must_use]
    pub fn into_inner(self) -> PendingRequest {
        match self {
            Self::Full(request) | Self::Closed(request) => request,
        }
    }
}

impl fmt::Debug for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(request) => f.debug_tuple("Full").field(request).finish(),
            Self::Closed(request) => f.debug_tuple("Closed").field(request).finish(),
        }
    }
}

struct Depth {
    current: AtomicUsize,
    metrics: Metrics,
}

impl Depth {
    // Gauge and counter move in the same unit steps.
    fn increment(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
        self.metrics.inc_queue_depth();
    }

    fn decrement(&self) {
        let dropped = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                depth.checked_sub(1)
            })
            .is_ok();
        if dropped {
            self.metrics.dec_queue_depth();
        }
    }

    fn get(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }
}

/// Producer handle; cheap to clone and shared by every request handler.
#[derive(Clone)]
pub struct AdmissionQueue {
    tx: mpsc::Sender<PendingRequest>,
    depth: Arc<Depth>,
    capacity: usize,
}

/// Consumer handle owned by the dispatcher.
pub struct AdmissionReceiver {
    rx: mpsc::Receiver<PendingRequest>,
    depth: Arc<Depth>,
}

/// Create a queue holding at most `capacity` waiting requests.
///
/// A capacity of zero is treated as one; capacities beyond what a tokio
/// channel can hold are clamped to [`Semaphore::MAX_PERMITS`].
#[must_use]
pub fn admission_queue(capacity: usize, metrics: Metrics) -> (AdmissionQueue, AdmissionReceiver) {
    let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
    let (tx, rx) = mpsc::channel(capacity);
    let depth = Arc::new(Depth {
        current: AtomicUsize::new(0),
        metrics,
    });
    depth.metrics.set_queue_depth(0);
    (
        AdmissionQueue {
            tx,
            depth: Arc::clone(&depth),
            capacity,
        },
        AdmissionReceiver { rx, depth },
    )
}

impl AdmissionQueue {
    /// Admit `request` if there is room, without waiting.
    ///
    /// # Errors
    ///
    /// Returns the request inside [`EnqueueError::Full`] when the buffer is at
    /// capacity, or [`EnqueueError::Closed`] once the receiver has shut down.
    pub fn try_enqueue(&self, request: PendingRequest) -> Result<(), EnqueueError> {
        self.depth.increment();
        match self.tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) => {
                self.depth.decrement();
                Err(EnqueueError::Full(request))
            }
            Err(TrySendError::Closed(request)) => {
                self.depth.decrement();
                Err(EnqueueError::Closed(request))
            }
        }
    }

    /// Approximate number of waiting requests.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Maximum number of waiting requests.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the receiver has closed the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for AdmissionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionQueue")
            .field("depth", &self.depth())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl AdmissionReceiver {
    /// Wait for the next request in FIFO order.
    ///
    /// Returns `None` once the queue is closed and drained, or every producer
    /// is gone.
    pub async fn dequeue(&mut self) -> Option<PendingRequest> {
        let request = self.rx.recv().await?;
        self.depth.decrement();
        Some(request)
    }

    /// Take the next request if one is already waiting.
    pub fn try_dequeue(&mut self) -> Option<PendingRequest> {
        let request = self.rx.try_recv().ok()?;
        self.depth.decrement();
        Some(request)
    }

    /// Stop admitting new requests. Already buffered requests stay readable.
    pub fn close(&mut self) {
        self.rx.close();
    }

    /// Approximate number of waiting requests.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }
}

impl fmt::Debug for AdmissionReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionReceiver")
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::channel_sink;
    use anyhow::{Result, anyhow};
    use tokio_util::sync::CancellationToken;

    fn request(name: &str) -> PendingRequest {
        let (sink, _receiver) = channel_sink(1, false);
        PendingRequest::new(name, Box::new(sink), CancellationToken::new()).0
    }

    #[tokio::test]
    async fn full_queue_rejects_without_waiting_and_keeps_fifo() -> Result<()> {
        let metrics = Metrics::new()?;
        let (queue, mut receiver) = admission_queue(2, metrics.clone());

        queue
            .try_enqueue(request("a"))
            .map_err(|_| anyhow!("first enqueue rejected"))?;
        queue
            .try_enqueue(request("b"))
            .map_err(|_| anyhow!("second enqueue rejected"))?;
        let rejected = queue.try_enqueue(request("c"));
        assert!(matches!(rejected, Err(EnqueueError::Full(_))));
        assert_eq!(
            rejected.err().map(|err| err.into_inner().file_name),
            Some("c".to_string())
        );
        assert_eq!(queue.depth(), 2);
        assert_eq!(metrics.snapshot().queue_depth, 2);

        let first = receiver.dequeue().await.ok_or_else(|| anyhow!("empty"))?;
        assert_eq!(first.file_name(), "a");
        assert_eq!(queue.depth(), 1);
        assert_eq!(metrics.snapshot().queue_depth, 1);

        queue
            .try_enqueue(request("d"))
            .map_err(|_| anyhow!("slot freed by dequeue should admit"))?;
        let names: Vec<String> = std::iter::from_fn(|| receiver.try_dequeue())
            .map(|request| request.file_name)
            .collect();
        assert_eq!(names, vec!["b".to_string(), "d".to_string()]);
        assert_eq!(queue.depth(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn closed_queue_refuses_but_drains() -> Result<()> {
        let (queue, mut receiver) = admission_queue(4, Metrics::new()?);
        queue
            .try_enqueue(request("queued"))
            .map_err(|_| anyhow!("enqueue rejected"))?;
        receiver.close();

        assert!(queue.is_closed());
        assert!(matches!(
            queue.try_enqueue(request("late")),
            Err(EnqueueError::Closed(_))
        ));
        let drained = receiver.dequeue().await.ok_or_else(|| anyhow!("empty"))?;
        assert_eq!(drained.file_name(), "queued");
        assert!(receiver.dequeue().await.is_none());
        assert_eq!(receiver.depth(), 0);
        Ok(())
    }

    #[test]
    fn capacity_is_clamped_to_the_channel_range() -> Result<()> {
        let (queue, _receiver) = admission_queue(0, Metrics::new()?);
        assert_eq!(queue.capacity(), 1);

        let (queue, _receiver) = admission_queue(usize::MAX, Metrics::new()?);
        assert_eq!(queue.capacity(), Semaphore::MAX_PERMITS);
        queue
            .try_enqueue(request("a"))
            .map_err(|_| anyhow!("huge queue rejected its first request"))?;
        assert_eq!(queue.depth(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gauge_settles_at_zero_after_concurrent_traffic() -> Result<()> {
        let metrics = Metrics::new()?;
        let (queue, mut receiver) = admission_queue(8, metrics.clone());

        let mut producers = Vec::new();
        for worker in 0..4 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                let mut admitted = 0_usize;
                for index in 0..200 {
                    match queue.try_enqueue(request(&format!("{worker}-{index}"))) {
                        Ok(()) => admitted += 1,
                        Err(_) => tokio::task::yield_now().await,
                    }
                }
                admitted
            }));
        }
        let consumer = tokio::spawn(async move {
            let mut taken = 0_usize;
            while let Some(_request) = receiver.dequeue().await {
                taken += 1;
            }
            taken
        });

        let mut admitted = 0;
        for producer in producers {
            admitted += producer.await?;
        }
        drop(queue);
        let taken = consumer.await?;

        assert_eq!(admitted, taken);
        assert_eq!(metrics.snapshot().queue_depth, 0);
        Ok(())
    }
}
