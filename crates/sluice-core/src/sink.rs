//! Response sinks that receive the head and body of a transfer.
//!
//! # Design
//! - The sink is transport neutral; the HTTP layer adapts a [`ChannelReceiver`]
//!   into a streamed response.
//! - A write failure means the far end is gone. It is reported, never retried.

use std::io;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Content type advertised for every served file.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Response metadata committed exactly once before the first body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Base name offered to the client as the attachment name.
    pub file_name: String,
    /// Exact number of body bytes that follow.
    pub content_length: u64,
    /// Whether `Accept-Ranges: bytes` is advertised.
    pub accept_ranges: bool,
}

impl ResponseHead {
    /// `Content-Disposition` value with the file name quoted.
    #[must_use]
    pub fn content_disposition(&self) -> String {
        let escaped = self.file_name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    }

    /// Header name/value pairs in the order they are emitted.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("content-disposition", self.content_disposition()),
            ("content-type", OCTET_STREAM.to_string()),
            ("content-length", self.content_length.to_string()),
        ];
        if self.accept_ranges {
            headers.push(("accept-ranges", "bytes".to_string()));
        }
        headers
    }
}

/// Destination for one transfer's head and body.
#[async_trait]
pub trait TransferSink: Send {
    /// Commit the response head. Called exactly once, before any chunk.
    async fn commit_head(&mut self, head: ResponseHead) -> io::Result<()>;

    /// Write one body chunk.
    async fn write_chunk(&mut self, chunk: Vec<u8>) -> io::Result<()>;

    /// Make written chunks visible to the receiver.
    async fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Signal that the body ends early and will never reach its declared length.
    async fn abort(&mut self, _reason: &'static str) {}

    /// Whether the sink can honour byte-range requests.
    fn supports_ranges(&self) -> bool {
        false
    }
}

/// Sink feeding a oneshot for the head and a bounded channel for the body.
#[derive(Debug)]
pub struct ChannelSink {
    head: Option<oneshot::Sender<ResponseHead>>,
    body: mpsc::Sender<io::Result<Vec<u8>>>,
    accept_ranges: bool,
}

/// Receiving half of a [`ChannelSink`].
#[derive(Debug)]
pub struct ChannelReceiver {
    /// Resolves once the head is committed; errors if the transfer ends first.
    pub head: oneshot::Receiver<ResponseHead>,
    /// Body chunks in file order; an `Err` item marks a truncated body.
    pub body: mpsc::Receiver<io::Result<Vec<u8>>>,
}

/// Create a channel-backed sink holding at most `depth` chunks in flight.
#[must_use]
pub fn channel_sink(depth: usize, accept_ranges: bool) -> (ChannelSink, ChannelReceiver) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(depth.max(1));
    (
        ChannelSink {
            head: Some(head_tx),
            body: body_tx,
            accept_ranges,
        },
        ChannelReceiver {
            head: head_rx,
            body: body_rx,
        },
    )
}

fn receiver_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response receiver dropped")
}

#[async_trait]
impl TransferSink for ChannelSink {
    async fn commit_head(&mut self, head: ResponseHead) -> io::Result<()> {
        let sender = self.head.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "response head already committed")
        })?;
        sender.send(head).map_err(|_| receiver_gone())
    }

    async fn write_chunk(&mut self, chunk: Vec<u8>) -> io::Result<()> {
        if self.head.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "body written before response head",
            ));
        }
        self.body.send(Ok(chunk)).await.map_err(|_| receiver_gone())
    }

    async fn abort(&mut self, reason: &'static str) {
        // Never wait here: a stalled receiver learns of the truncation when
        // the sender is dropped instead.
        let _ = self.body.try_send(Err(io::Error::other(reason)));
    }

    fn supports_ranges(&self) -> bool {
        self.accept_ranges
    }
}
