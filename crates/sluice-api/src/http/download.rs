//! `GET /download?file=<name>`: admission, head hand-off, and streamed body.
//!
//! # Design
//! - The handler waits for whichever comes first: the committed head, the
//!   final outcome, or the deadline. Only a committed head produces `200`.
//! - After the head, the body is fed from the transfer's channel. The stream
//!   owns a drop guard on the request token, so a client that goes away
//!   cancels the transfer at its next chunk.
//! - A watcher task keeps enforcing the remaining deadline while the body
//!   streams and logs the final outcome.
//! - A body that stops short of `Content-Length` always ends with an error
//!   item, so the client sees a broken transfer rather than a clean EOF.

use std::io;
use std::sync::Arc;

use async_stream::stream;
use axum::{
    body::Body,
    extract::{Query, RawQuery, State},
    http::{StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use sluice_core::{
    Admission, ChannelReceiver, ResponseHead, TransferError, TransferOutcome, TransferResult,
    channel_sink,
};
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;
use tracing::{debug, error, info, warn};

use crate::http::constants::{BODY_CHANNEL_DEPTH, CACHE_CONTROL_NO_CACHE};
use crate::http::errors::ApiError;
use crate::state::ApiState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DownloadQuery {
    #[serde(default)]
    file: Option<String>,
}

enum Started {
    Head(ResponseHead),
    Finished(TransferResult<TransferOutcome>),
}

pub(crate) async fn download(
    State(state): State<Arc<ApiState>>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let raw_query = raw_query.unwrap_or_default();
    info!(query = %raw_query, "starting download request");

    let file = query.file.unwrap_or_default();
    if file.is_empty() {
        return Err(ApiError::bad_request("File name is required"));
    }

    let (sink, receiver) = channel_sink(BODY_CHANNEL_DEPTH, true);
    let mut admission = state
        .gate
        .submit(&file, Box::new(sink))
        .map_err(|err| ApiError::from_transfer(&err))?;
    // Dropping the handler before the head arrives (client gone while queued)
    // cancels the request as well.
    let guard = admission.cancel_token().clone().drop_guard();

    let ChannelReceiver {
        head: mut head_rx,
        body,
    } = receiver;
    let started = tokio::select! {
        biased;
        Ok(head) = &mut head_rx => Started::Head(head),
        result = admission.wait() => Started::Finished(result),
    };

    match started {
        Started::Head(head) => stream_response(&head, body, guard, admission, raw_query),
        Started::Finished(Ok(outcome)) => Err(ApiError::from_headless_outcome(&outcome)),
        Started::Finished(Err(err)) => {
            log_timeout(&raw_query, &err);
            Err(ApiError::from_transfer(&err))
        }
    }
}

fn log_timeout(raw_query: &str, err: &TransferError) {
    if let TransferError::Timeout { waited } = err {
        warn!(
            query = %raw_query,
            waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            "request timeout"
        );
    }
}

fn stream_response(
    head: &ResponseHead,
    mut body: mpsc::Receiver<io::Result<Vec<u8>>>,
    guard: DropGuard,
    mut admission: Admission,
    raw_query: String,
) -> Result<Response, ApiError> {
    let declared = head.content_length;
    let chunks = stream! {
        let _guard = guard;
        let mut sent: u64 = 0;
        let mut failed = false;
        while let Some(chunk) = body.recv().await {
            match &chunk {
                Ok(bytes) => {
                    sent = sent.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
                }
                Err(_) => failed = true,
            }
            yield chunk;
            if failed {
                break;
            }
        }
        // The transfer side may end without a marker when its channel was full.
        if !failed && sent < declared {
            yield Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {sent} of {declared} bytes"),
            ));
        }
    };

    tokio::spawn(async move {
        match admission.wait().await {
            Ok(outcome) => debug!(
                query = %raw_query,
                outcome = outcome.label(),
                bytes = outcome.bytes(),
                "download request finished"
            ),
            Err(err) => log_timeout(&raw_query, &err),
        }
    });

    let mut builder = Response::builder().status(StatusCode::OK);
    for (name, value) in head.headers() {
        builder = builder.header(name, value);
    }
    builder
        .header(header::CACHE_CONTROL, CACHE_CONTROL_NO_CACHE)
        .body(Body::from_stream(chunks))
        .map_err(|err| {
            error!(error = %err, "failed to build download response");
            ApiError::internal("Internal server error")
        })
}
