//! Chunked streaming of one resolved file into a [`TransferSink`].
//!
//! # Design
//! - The head is committed exactly once, after metadata is read and before
//!   the first body byte.
//! - Cancellation is checked before every read and raced against every write,
//!   so a cancelled transfer stops within one chunk.
//! - Sink write failures are the far end going away (`Aborted`), never a
//!   server fault; source read failures are `Failed` and are not retried.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{TransferError, TransferResult};
use crate::path::PathResolver;
use crate::sink::{ResponseHead, TransferSink};

/// Size of each body chunk read from disk.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Terminal result of a transfer.
#[derive(Debug)]
pub enum TransferOutcome {
    /// Every byte of the file reached the sink.
    Completed {
        /// Bytes written.
        bytes: u64,
    },
    /// The cancellation token fired; no further reads or writes happened.
    Cancelled {
        /// Bytes written before cancellation was observed.
        bytes: u64,
    },
    /// The sink refused a write, usually because the client disconnected.
    Aborted {
        /// Bytes written before the sink failed.
        bytes: u64,
    },
    /// The transfer could not start or the source could not be read.
    Failed(TransferError),
}

impl TransferOutcome {
    /// Whether the whole file was delivered.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Bytes delivered to the sink, zero for failures.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        match self {
            Self::Completed { bytes } | Self::Cancelled { bytes } | Self::Aborted { bytes } => {
                *bytes
            }
            Self::Failed(_) => 0,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Cancelled { .. } => "cancelled",
            Self::Aborted { .. } => "aborted",
            Self::Failed(_) => "failed",
        }
    }
}

/// Validated, in-progress state of one transfer.
#[derive(Debug)]
pub struct TransferContext {
    /// Resolved absolute path.
    pub path: PathBuf,
    /// Open handle on the source file.
    pub file: File,
    /// File size captured when the head was built.
    pub total: u64,
    /// Bytes handed to the sink so far.
    pub written: u64,
}

impl TransferContext {
    /// Open `path` and capture its size.
    ///
    /// # Errors
    ///
    /// - [`TransferError::NotFound`] when the file does not exist.
    /// - [`TransferError::InvalidInput`] when the path is not a regular file.
    /// - [`TransferError::Io`] for any other open or metadata failure.
    pub async fn open(path: &Path) -> TransferResult<Self> {
        let file = File::open(path).await.map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                TransferError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                TransferError::io("open", path, source)
            }
        })?;
        let metadata = file
            .metadata()
            .await
            .map_err(|source| TransferError::io("metadata", path, source))?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidInput {
                field: "file",
                reason: "not_a_file",
                value: Some(path.display().to_string()),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            total: metadata.len(),
            written: 0,
        })
    }

    fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.written)
    }

    fn head(&self, accept_ranges: bool) -> ResponseHead {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        ResponseHead {
            file_name,
            content_length: self.total,
            accept_ranges,
        }
    }
}

/// Streams files from a confined root into sinks.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    resolver: Arc<PathResolver>,
    chunk_size: usize,
}

impl TransferEngine {
    /// Engine reading [`CHUNK_SIZE`] bytes at a time.
    #[must_use]
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override the chunk size; zero is bumped to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Resolver confining requested names.
    #[must_use]
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Resolve `requested` and stream it into `sink`.
    pub async fn run(
        &self,
        requested: &str,
        sink: &mut dyn TransferSink,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        if cancel.is_cancelled() {
            return TransferOutcome::Cancelled { bytes: 0 };
        }
        match self.resolver.resolve(requested) {
            Ok(path) => self.transfer(&path, sink, cancel).await,
            Err(err) => {
                debug!(file = requested, error = %err, "download request rejected");
                TransferOutcome::Failed(err)
            }
        }
    }

    /// Stream an already resolved path into `sink`.
    pub async fn transfer(
        &self,
        path: &Path,
        sink: &mut dyn TransferSink,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return TransferOutcome::Cancelled { bytes: 0 };
        }

        let mut ctx = match TransferContext::open(path).await {
            Ok(ctx) => ctx,
            Err(err) => {
                if matches!(err, TransferError::Io { .. }) {
                    error!(path = %path.display(), error = %err, cause = ?err, "failed to open download");
                }
                return TransferOutcome::Failed(err);
            }
        };

        if let Err(err) = sink.commit_head(ctx.head(sink.supports_ranges())).await {
            debug!(path = %ctx.path.display(), error = %err, "sink refused response head");
            return TransferOutcome::Aborted { bytes: 0 };
        }

        let mut buffer = vec![0_u8; self.chunk_size];
        while ctx.remaining() > 0 {
            if cancel.is_cancelled() {
                return cancelled(&ctx, sink).await;
            }

            let want = usize::try_from(ctx.remaining())
                .map_or(buffer.len(), |remaining| remaining.min(buffer.len()));
            let read = match ctx.file.read(&mut buffer[..want]).await {
                Ok(0) => {
                    let err = TransferError::io(
                        "read",
                        ctx.path.clone(),
                        io::Error::new(io::ErrorKind::UnexpectedEof, "file shrank during transfer"),
                    );
                    return failed(&ctx, sink, err).await;
                }
                Ok(read) => read,
                Err(source) => {
                    let err = TransferError::io("read", ctx.path.clone(), source);
                    return failed(&ctx, sink, err).await;
                }
            };

            let chunk = buffer[..read].to_vec();
            let written = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = sink.write_chunk(chunk) => Some(result),
            };
            match written {
                None => return cancelled(&ctx, sink).await,
                Some(Err(err)) => return aborted(&ctx, &err),
                Some(Ok(())) => {}
            }
            ctx.written += read as u64;

            if let Err(err) = sink.flush().await {
                return aborted(&ctx, &err);
            }
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            path = %ctx.path.display(),
            bytes = ctx.written,
            elapsed_ms,
            "download completed"
        );
        TransferOutcome::Completed { bytes: ctx.written }
    }
}

async fn cancelled(ctx: &TransferContext, sink: &mut dyn TransferSink) -> TransferOutcome {
    info!(
        path = %ctx.path.display(),
        bytes = ctx.written,
        total = ctx.total,
        "download cancelled"
    );
    sink.abort("transfer cancelled").await;
    TransferOutcome::Cancelled { bytes: ctx.written }
}

fn aborted(ctx: &TransferContext, err: &io::Error) -> TransferOutcome {
    debug!(
        path = %ctx.path.display(),
        bytes = ctx.written,
        error = %err,
        "download aborted by sink"
    );
    TransferOutcome::Aborted { bytes: ctx.written }
}

async fn failed(
    ctx: &TransferContext,
    sink: &mut dyn TransferSink,
    err: TransferError,
) -> TransferOutcome {
    error!(
        path = %ctx.path.display(),
        bytes = ctx.written,
        error = %err,
        cause = ?err,
        "download read failed"
    );
    sink.abort("source read failed").await;
    TransferOutcome::Failed(err)
}
