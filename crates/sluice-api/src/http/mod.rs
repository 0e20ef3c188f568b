//! HTTP surface modules (router, handlers, problem responses).

/// Shared constants and header names.
pub mod constants;
/// Streamed download handler.
pub mod download;
/// Problem response helpers and error types.
pub mod errors;
/// Health and metrics endpoints.
pub mod health;
/// Connection hosting and listener limits.
pub mod listener;
/// Router construction and server host.
pub mod router;
