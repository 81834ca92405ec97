//! Live Source
//!
//! Keeps a best-effort connection to the hardware source and feeds every
//! decoded line into the pipeline. Transport faults never escape: the handle
//! is dropped and the reader retries after a fixed delay, forever.

mod codec;
pub mod serial;

pub use codec::{TelemetryLineCodec, MAX_LINE_LENGTH};
pub use serial::{available_ports, suggest_port, PortInfo, SerialTransport};

use futures::StreamExt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use crate::mode::IngestionMode;
use crate::pipeline::Pipeline;
use crate::sample::RawRecord;

/// Delay between reconnect attempts
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest wait for input before checking back in
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Something the live reader can (re)open to get a byte stream
pub trait Transport: Send + Sync {
    /// Byte stream of newline-delimited records
    type Stream: AsyncRead + Unpin + Send;

    /// Open a fresh connection
    fn open(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    /// Human readable address for logs
    fn describe(&self) -> String;

    /// Called after the first failed open of an outage
    fn on_open_failure(&self) {}
}

/// What happened to one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line
    Empty,
    /// Not a JSON object
    Malformed,
    /// Decoded, but the simulation owns the pipeline
    Suppressed,
    /// Enriched, persisted and broadcast
    Ingested,
}

/// Why a connection ended
enum Disconnect {
    Shutdown,
    Eof,
    Fault(io::Error),
}

/// Reads the live source for the life of the process
pub struct SourceReader<T: Transport> {
    transport: T,
    pipeline: Pipeline,
    retry_delay: Duration,
    read_timeout: Duration,
}

impl<T: Transport> SourceReader<T> {
    /// Create a reader feeding `pipeline`
    pub fn new(transport: T, pipeline: Pipeline) -> Self {
        Self {
            transport,
            pipeline,
            retry_delay: RETRY_DELAY,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Override the reconnect delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Connect, read, reconnect until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        let address = self.transport.describe();
        let mut outage = false;

        loop {
            let opened = tokio::select! {
                _ = shutdown.cancelled() => break,
                opened = self.transport.open() => opened,
            };

            match opened {
                Ok(stream) => {
                    outage = false;
                    tracing::info!(source = %address, "Live source connected");
                    match self.read_lines(stream, &shutdown).await {
                        Disconnect::Shutdown => break,
                        Disconnect::Eof => {
                            tracing::warn!(source = %address, "Live source disconnected");
                        }
                        Disconnect::Fault(e) => {
                            tracing::warn!(source = %address, error = %e, "Live source read failed");
                        }
                    }
                }
                Err(e) if !outage => {
                    outage = true;
                    tracing::warn!(source = %address, error = %e, "Cannot open live source, retrying");
                    self.transport.on_open_failure();
                }
                Err(e) => {
                    tracing::debug!(source = %address, error = %e, "Live source still unavailable");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }

        tracing::info!(source = %address, "Live reader stopped");
    }

    async fn read_lines(&self, stream: T::Stream, shutdown: &CancellationToken) -> Disconnect {
        let mut frames = FramedRead::new(stream, TelemetryLineCodec::new());

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return Disconnect::Shutdown,
                next = tokio::time::timeout(self.read_timeout, frames.next()) => next,
            };

            match next {
                // Quiet line, keep listening
                Err(_elapsed) => continue,
                Ok(None) => return Disconnect::Eof,
                Ok(Some(Err(e))) => return Disconnect::Fault(e),
                Ok(Some(Ok(line))) => {
                    if self.handle_line(&line).await == LineOutcome::Empty {
                        tokio::task::yield_now().await;
                    }
                }
            }
        }
    }

    /// Decode one line and route it
    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        let line = line.trim();
        if line.is_empty() {
            return LineOutcome::Empty;
        }

        let Some(raw) = RawRecord::parse(line) else {
            tracing::trace!(line, "Discarding malformed line");
            return LineOutcome::Malformed;
        };

        match self.pipeline.offer(IngestionMode::Live, &raw).await {
            Some(_) => LineOutcome::Ingested,
            None => LineOutcome::Suppressed,
        }
    }
}
