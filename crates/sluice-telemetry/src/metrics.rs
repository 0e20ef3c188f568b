//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the admission queue depth; transfers are observed through logs.

use std::fmt;
use std::sync::Arc;

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{Result, TelemetryError};

const QUEUE_DEPTH: &str = "sluice_queue_depth";

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    queue_depth: IntGauge,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("queue_depth", &self.inner.queue_depth.get())
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of the registered gauges for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Requests admitted but not yet picked up by a worker slot.
    pub queue_depth: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the queue-depth gauge registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the gauge cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let queue_depth = IntGauge::with_opts(Opts::new(
            QUEUE_DEPTH,
            "Download requests waiting in the admission queue",
        ))
        .map_err(|source| TelemetryError::MetricsCollector {
            name: QUEUE_DEPTH,
            source,
        })?;
        registry
            .register(Box::new(queue_depth.clone()))
            .map_err(|source| TelemetryError::MetricsRegister {
                name: QUEUE_DEPTH,
                source,
            })?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                queue_depth,
            }),
        })
    }

    /// Set the queue depth gauge.
    pub fn set_queue_depth(&self, depth: usize) {
        self.inner
            .queue_depth
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Count one more request waiting in the queue.
    pub fn inc_queue_depth(&self) {
        self.inner.queue_depth.inc();
    }

    /// Count one request leaving the queue.
    pub fn dec_queue_depth(&self) {
        self.inner.queue_depth.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the registered gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_depth: self.inner.queue_depth.get(),
        }
    }
}
