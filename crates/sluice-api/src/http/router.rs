//! Router construction and server host for the download service.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Request, routing::get};
use sluice_core::RequestGate;
use sluice_telemetry::{Metrics, build_sha};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, warn};

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::{ACCEPT_BACKOFF, HEADER_REQUEST_ID};
use crate::http::download::download;
use crate::http::health::{health, metrics};
use crate::http::listener::{ListenerLimits, serve_connection};
use crate::state::ApiState;

/// Axum router wrapper that hosts the download endpoints.
pub struct ApiServer {
    router: Router,
    limits: ListenerLimits,
}

impl ApiServer {
    /// Build the router over the admission gate and metrics registry.
    #[must_use]
    pub fn new(gate: RequestGate, telemetry: Metrics, worker_slots: usize) -> Self {
        let state = Arc::new(ApiState::new(gate, telemetry, worker_slots));
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        // Outermost first: stamp the id, echo it on the way out, then trace.
        let layered = ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(trace_layer);

        let router = Router::new()
            .route("/download", get(download))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .layer(layered)
            .with_state(state);

        Self {
            router,
            limits: ListenerLimits::default(),
        }
    }

    /// Replace the per-connection limits used by [`ApiServer::serve`].
    #[must_use]
    pub fn with_listener_limits(mut self, limits: ListenerLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Consume the server and return the bare router.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    ///
    /// Every connection runs under the configured [`ListenerLimits`]. After
    /// `shutdown` the listener stops accepting and waits for open connections
    /// to finish their current response.
    ///
    /// # Errors
    ///
    /// Returns an error if the bound address cannot be read.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> ApiServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|source| ApiServerError::LocalAddr { source })?;
        info!(
            addr = %local,
            header_read_timeout_ms = millis(self.limits.header_read_timeout),
            idle_timeout_ms = millis(self.limits.idle_timeout),
            max_header_bytes = self.limits.max_header_bytes,
            "http listener bound"
        );

        let builder = self.limits.http1_builder();
        let stop = CancellationToken::new();
        let connections = TaskTracker::new();
        tokio::pin!(shutdown);
        loop {
            let (stream, remote) = tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(error = %err, "failed to accept connection");
                        sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };
            connections.spawn(serve_connection(
                stream,
                remote,
                self.router.clone(),
                builder.clone(),
                self.limits.idle_timeout,
                stop.clone(),
            ));
        }

        stop.cancel();
        connections.close();
        connections.wait().await;
        info!(addr = %local, "http listener stopped");
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
