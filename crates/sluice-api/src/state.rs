//! Shared state handed to every handler.

use sluice_core::RequestGate;
use sluice_telemetry::Metrics;

/// Dependencies the HTTP handlers read from.
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Admission entry point for downloads.
    pub gate: RequestGate,
    /// Metrics registry rendered at `/metrics`.
    pub telemetry: Metrics,
    /// Configured worker slot count, reported by `/health`.
    pub worker_slots: usize,
}

impl ApiState {
    /// Bundle handler dependencies.
    #[must_use]
    pub const fn new(gate: RequestGate, telemetry: Metrics, worker_slots: usize) -> Self {
        Self {
            gate,
            telemetry,
            worker_slots,
        }
    }
}
