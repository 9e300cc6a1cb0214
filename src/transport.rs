//! Length-prefixed frames over an async byte stream
//!
//! Each frame is an 8-byte little-endian `u64` length followed by exactly
//! that many payload bytes. Partial reads and writes are retried until the
//! frame is complete, so a receiver only ever sees whole frames. Every frame
//! operation runs under the configured deadline.

use std::future::Future;
use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::TransportError;

/// Largest frame accepted by default: 64 MiB.
pub const DEFAULT_MAX_FRAME_LEN: u64 = 64 * 1024 * 1024;

/// Buffer reserved up front for an incoming frame.
const INITIAL_FRAME_CAPACITY: u64 = 64 * 1024;

/// Default deadline for a single frame read or write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-connection transport limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportLimits {
    /// Frames longer than this are refused on send and receive.
    pub max_frame_len: u64,
    /// Deadline for one frame operation; `None` waits forever.
    pub io_timeout: Option<Duration>,
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

/// Frame codec bound to one stream
#[derive(Debug)]
pub struct FramedTransport<S> {
    stream: S,
    limits: TransportLimits,
}

impl<S> FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, limits: TransportLimits) -> Self {
        Self { stream, limits }
    }

    /// Write one frame and flush it
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let len = payload.len() as u64;
        if len > self.limits.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                len,
                max: self.limits.max_frame_len,
            });
        }

        let stream = &mut self.stream;
        with_deadline(self.limits.io_timeout, async move {
            stream.write_u64_le(len).await?;
            stream.write_all(payload).await?;
            stream.flush().await
        })
        .await?;

        trace!(len, "sent frame");
        Ok(())
    }

    /// Read one complete frame
    pub async fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let max = self.limits.max_frame_len;
        let stream = &mut self.stream;

        let payload = with_deadline(self.limits.io_timeout, async move {
            let len = stream.read_u64_le().await?;
            if len > max {
                return Ok::<_, io::Error>(Err(TransportError::FrameTooLarge { len, max }));
            }
            // Grow with the bytes that actually arrive, not the announced length
            let mut payload = Vec::with_capacity(len.min(INITIAL_FRAME_CAPACITY) as usize);
            let read = stream.take(len).read_to_end(&mut payload).await?;
            if (read as u64) < len {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            Ok::<_, io::Error>(Ok(payload))
        })
        .await??;

        trace!(len = payload.len(), "received frame");
        Ok(payload)
    }

    /// Flush and close the write half
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        let stream = &mut self.stream;
        with_deadline(self.limits.io_timeout, async move { stream.shutdown().await }).await
    }
}

async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = io::Result<T>>,
{
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::Timeout(limit))?,
        None => fut.await,
    };
    result.map_err(classify)
}

fn classify(err: io::Error) -> TransportError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TransportError::PeerClosed,
        _ => TransportError::Io(err),
    }
}
