//! Per-connection ingestion session.
//!
//! Each accepted connection gets its own `StreamSession` driven by exactly
//! one task. The session:
//! - Reads raw bytes from the peer into a `BytesMut` buffer
//! - Reassembles newline-delimited lines across read boundaries
//! - Appends each complete line to the shared log
//! - On end-of-stream (or read error, treated identically) flushes all of
//!   this stream's lines to the artifact sink and releases the socket
//!
//! The buffer is never touched from outside the owning task, so the session
//! needs no internal locking; all cross-session coordination happens inside
//! `SharedLog`.
//!
//! # Boundary behavior
//!
//! Trailing bytes that never reached a newline before the stream closed are
//! dropped, not flushed as a line. A line that is not valid UTF-8 is logged
//! and skipped without terminating the session (documented data-loss point).

use std::str::Utf8Error;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use spool_core::{SharedLog, StreamId};

use crate::sink::FileSink;

/// Initial capacity of the per-session read buffer.
const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Ingestion state for one connection.
///
/// Lifecycle: OPEN while the read loop runs, CLOSING once the stream ends
/// or errors (artifact flush happens here), CLOSED when `run` returns and
/// the socket is dropped by scope.
pub struct StreamSession {
    /// Stream identifier, assigned once by the listener.
    id: StreamId,

    /// Shared log all sessions append into.
    log: Arc<SharedLog>,

    /// Sink receiving this stream's lines at close.
    sink: Arc<FileSink>,

    /// Bytes received but not yet terminated by a newline.
    buf: BytesMut,

    /// Lines appended so far, for close-time logging.
    lines_ingested: u64,
}

impl StreamSession {
    /// Creates a session for an accepted connection.
    pub fn new(id: StreamId, log: Arc<SharedLog>, sink: Arc<FileSink>) -> Self {
        Self {
            id,
            log,
            sink,
            buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            lines_ingested: 0,
        }
    }

    /// Drives the session until the peer closes or the read fails.
    ///
    /// Takes the stream by value: when this function returns the socket is
    /// dropped and the connection resource released, even if the artifact
    /// flush failed. A read error is handled the same way as a clean EOF -
    /// the flush still proceeds best-effort.
    pub async fn run<S>(mut self, mut stream: S)
    where
        S: AsyncRead + Unpin,
    {
        debug!(stream = %self.id, "Session open");

        loop {
            match stream.read_buf(&mut self.buf).await {
                Ok(0) => {
                    debug!(stream = %self.id, "Peer closed stream");
                    break;
                }
                Ok(_) => self.drain_complete_lines(),
                Err(e) => {
                    // Peer resets and transport errors take the same close
                    // path as a clean end-of-stream.
                    warn!(stream = %self.id, error = %e, "Read failed, closing session");
                    break;
                }
            }
        }

        self.close().await;
    }

    /// Extracts and appends every complete line currently in the buffer.
    ///
    /// Bytes after the last delimiter stay buffered for the next read.
    fn drain_complete_lines(&mut self) {
        while let Some(framed) = split_line(&mut self.buf) {
            match framed {
                Ok(line) => {
                    self.log.append(self.id, line);
                    self.lines_ingested += 1;
                }
                Err(e) => {
                    warn!(stream = %self.id, error = %e, "Skipping undecodable line");
                }
            }
        }
    }

    /// CLOSING: drop any unterminated tail, flush this stream's lines to
    /// the sink, and report the outcome.
    async fn close(mut self) {
        if !self.buf.is_empty() {
            debug!(
                stream = %self.id,
                dropped_bytes = self.buf.len(),
                "Discarding partial final line without terminator"
            );
            self.buf.clear();
        }

        let lines = self.log.entries_for(self.id);
        if let Err(e) = self.sink.persist(self.id, &lines).await {
            // A failed artifact never takes down the daemon or other
            // sessions; the socket is still released by scope.
            warn!(stream = %self.id, error = %e, "Artifact flush failed");
        }

        info!(
            stream = %self.id,
            lines = self.lines_ingested,
            "Session closed"
        );
    }
}

/// Splits the longest prefix ending at a newline off the front of `buf`.
///
/// Returns `None` when no complete line remains. A complete line is decoded
/// as UTF-8 and trimmed of the delimiter and surrounding whitespace; the
/// consumed bytes are discarded either way, so one bad line cannot wedge
/// the buffer.
fn split_line(buf: &mut BytesMut) -> Option<Result<String, SessionError>> {
    let pos = buf.iter().position(|&b| b == b'\n')?;

    let mut frame = buf.split_to(pos + 1);
    // Drop the delimiter before decoding.
    frame.truncate(pos);

    let line = match std::str::from_utf8(&frame) {
        Ok(text) => Ok(text.trim().to_string()),
        Err(e) => Err(SessionError::Decode(e)),
    };

    Some(line)
}

/// Errors surfaced while framing a session's byte stream.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A framed line was not valid UTF-8. Recovered by skipping the line.
    #[error("Line is not valid UTF-8: {0}")]
    Decode(#[from] Utf8Error),
}
