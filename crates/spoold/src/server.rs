//! TCP accept loop for the ingestion daemon.
//!
//! The server:
//! - Binds a TCP listener on the configured endpoint
//! - Assigns each accepted connection the next stream id (strictly
//!   increasing from 1, never reused)
//! - Spawns a `StreamSession` task per connection
//! - Shuts down gracefully via CancellationToken
//!
//! Accept failures and session failures are logged and survived; nothing a
//! single peer does can terminate the server, another session, or the
//! analyzer.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use spool_core::{SharedLog, StreamId};

use crate::session::StreamSession;
use crate::sink::FileSink;

/// TCP server feeding the shared log.
pub struct IngestServer {
    /// Bound listener; created in [`IngestServer::bind`] so callers (and
    /// tests) can read the actual local address before the loop starts.
    listener: TcpListener,

    /// Shared log handed to every session.
    log: Arc<SharedLog>,

    /// Artifact sink handed to every session.
    sink: Arc<FileSink>,

    /// Cancellation token for graceful shutdown.
    cancel_token: CancellationToken,

    /// Next stream id to assign. Starts at 1; ids are never reused.
    stream_counter: AtomicU64,
}

impl IngestServer {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the endpoint cannot be bound. This is fatal
    /// at startup, before any connection is accepted.
    pub async fn bind(
        addr: SocketAddr,
        log: Arc<SharedLog>,
        sink: Arc<FileSink>,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            log,
            sink,
            cancel_token,
            stream_counter: AtomicU64::new(1),
        })
    }

    /// Returns the address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(ServerError::LocalAddr)
    }

    /// Accepts connections until the cancellation token fires.
    ///
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        match self.local_addr() {
            Ok(addr) => info!(%addr, "Ingest server listening"),
            Err(_) => info!("Ingest server listening"),
        }

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let id = self.next_stream_id();
                            info!(stream = %id, %peer, "Connection accepted");
                            self.handle_connection(stream, id);
                        }
                        Err(e) => {
                            // Keep accepting; a transient accept failure
                            // must not take the listener down.
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        info!(
            streams_served = self.stream_counter.load(Ordering::Relaxed) - 1,
            "Server stopped"
        );
        Ok(())
    }

    /// Spawns the session task for an accepted connection.
    ///
    /// Closing this connection (locally or by the peer) cancels only this
    /// session's task; the accept loop and all other tasks keep running.
    fn handle_connection(&self, stream: TcpStream, id: StreamId) {
        let session = StreamSession::new(id, Arc::clone(&self.log), Arc::clone(&self.sink));

        tokio::spawn(async move {
            session.run(stream).await;
            debug!(stream = %id, "Session task finished");
        });
    }

    /// Returns the next stream id, advancing the counter.
    fn next_stream_id(&self) -> StreamId {
        StreamId::new(self.stream_counter.fetch_add(1, Ordering::Relaxed))
    }
}

/// Errors from server setup and operation.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let log = Arc::new(SharedLog::new());
        let sink = Arc::new(FileSink::new("/tmp/spool-test"));
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("valid addr");

        let server = IngestServer::bind(addr, log, sink, CancellationToken::new())
            .await
            .expect("bind ephemeral port");

        let bound = server.local_addr().expect("local addr");
        assert_ne!(bound.port(), 0);
    }

    #[tokio::test]
    async fn test_stream_ids_start_at_one_and_increase() {
        let log = Arc::new(SharedLog::new());
        let sink = Arc::new(FileSink::new("/tmp/spool-test"));
        let addr: SocketAddr = "127.0.0.1:0".parse().expect("valid addr");

        let server = IngestServer::bind(addr, log, sink, CancellationToken::new())
            .await
            .expect("bind");

        assert_eq!(server.next_stream_id(), StreamId::new(1));
        assert_eq!(server.next_stream_id(), StreamId::new(2));
        assert_eq!(server.next_stream_id(), StreamId::new(3));
    }

    #[test]
    fn test_bind_error_display() {
        let addr: SocketAddr = "127.0.0.1:80".parse().expect("valid addr");
        let err = ServerError::Bind {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("127.0.0.1:80"));
    }
}
