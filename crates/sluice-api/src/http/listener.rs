//! Per-connection HTTP/1 hosting with read, idle, and header-size limits.
//!
//! # Design
//! - hyper enforces the header read timeout and the header size cap; an
//!   oversized head is answered with `431` before routing.
//! - The idle timer restarts on every request. When it fires the connection
//!   stops keeping alive: an idle connection closes at once, a busy one after
//!   its current response.
//! - Server shutdown uses the same graceful close, so streamed bodies are not
//!   cut by the listener itself.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Request};
use hyper::{body::Incoming, server::conn::http1};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tower::Service;
use tracing::debug;

use crate::http::constants::{
    DEFAULT_HEADER_READ_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_HEADER_BYTES,
    MIN_HEADER_BUFFER,
};

/// Limits applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerLimits {
    /// Time a client has to deliver a complete request head.
    pub header_read_timeout: Duration,
    /// Time a keep-alive connection may wait for its next request.
    pub idle_timeout: Duration,
    /// Largest request head accepted. hyper never goes below 8 KiB.
    pub max_header_bytes: usize,
}

impl Default for ListenerLimits {
    fn default() -> Self {
        Self {
            header_read_timeout: DEFAULT_HEADER_READ_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
        }
    }
}

impl ListenerLimits {
    pub(crate) fn http1_builder(&self) -> http1::Builder {
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read_timeout)
            .max_buf_size(self.max_header_bytes.max(MIN_HEADER_BUFFER))
            .keep_alive(true);
        builder
    }
}

pub(crate) async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    router: Router,
    builder: http1::Builder,
    idle_timeout: Duration,
    shutdown: CancellationToken,
) {
    let activity = Arc::new(Notify::new());
    let seen = Arc::clone(&activity);
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        seen.notify_one();
        router.clone().call(request)
    });

    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);
    let idle = sleep(idle_timeout);
    tokio::pin!(idle);
    let mut closing = false;

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(err) = result {
                    debug!(remote = %remote, error = %err, "connection ended with error");
                }
                break;
            }
            () = activity.notified() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);
            }
            () = &mut idle, if !closing => {
                debug!(remote = %remote, "closing idle connection");
                connection.as_mut().graceful_shutdown();
                closing = true;
            }
            () = shutdown.cancelled(), if !closing => {
                connection.as_mut().graceful_shutdown();
                closing = true;
            }
        }
    }
}
