//! spoold - TCP line-ingestion daemon.
//!
//! Accepts any number of concurrent TCP connections, appends every
//! newline-delimited line they send to one shared log, persists each
//! connection's lines as an artifact when it disconnects, and periodically
//! reports which connections mention a search pattern most often.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port, count occurrences of "error"
//! spoold --pattern error
//!
//! # Custom endpoint, 10s analyzer period, artifacts under ./captures
//! spoold --listen 0.0.0.0:7077 --pattern needle --interval 10 \
//!        --artifact-dir captures
//!
//! # Enable debug logging
//! RUST_LOG=spoold=debug spoold --pattern needle
//! ```
//!
//! # Signal Handling
//!
//! SIGTERM/SIGINT trigger a graceful shutdown of the accept loop and the
//! analyzer task.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spool_core::SharedLog;
use spoold::analyzer::spawn_analyzer_task;
use spoold::config::DaemonConfig;
use spoold::server::IngestServer;
use spoold::sink::FileSink;

/// Default listen endpoint.
const DEFAULT_LISTEN: &str = "127.0.0.1:1234";

/// spool daemon - shared-log line ingestion over TCP
#[derive(Parser, Debug)]
#[command(name = "spoold", version, about)]
struct Args {
    /// Endpoint to accept connections on
    #[arg(short, long, default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Search pattern the analyzer counts (must be non-empty)
    #[arg(short, long)]
    pattern: String,

    /// Analyzer report interval in seconds (must be positive)
    #[arg(short, long, default_value_t = 5)]
    interval: u64,

    /// Directory artifacts are written into at connection close
    #[arg(short, long, default_value = ".")]
    artifact_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("spoold=info".parse()?)
                .add_directive("spool_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Validate configuration before any connection is accepted.
    let config = DaemonConfig::new(
        args.listen,
        args.pattern,
        Duration::from_secs(args.interval),
        args.artifact_dir,
    )
    .context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen,
        pattern = %config.pattern,
        interval_secs = config.interval.as_secs(),
        artifact_dir = %config.artifact_dir.display(),
        "spoold starting"
    );

    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Setup signal handlers
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    // The shared log is constructed once and handed to every task.
    let log = Arc::new(SharedLog::new());
    let sink = Arc::new(FileSink::new(&config.artifact_dir));

    // Spawn the analyzer
    let _analyzer_handle = spawn_analyzer_task(
        Arc::clone(&log),
        config.pattern.clone(),
        config.interval,
        cancel_token.clone(),
    );

    // Bind and run the server
    let server = IngestServer::bind(config.listen, log, sink, cancel_token)
        .await
        .context("Failed to start server")?;

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("spoold stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
