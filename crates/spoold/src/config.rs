//! Validated runtime configuration for the daemon.
//!
//! The CLI surface lives in `main.rs`; this module owns the checked form.
//! All validation failures here are fatal at startup, before any connection
//! is accepted - nothing in the running daemon re-validates configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Checked daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Local endpoint the listener binds.
    pub listen: SocketAddr,

    /// Token counted by the analyzer. Never empty.
    pub pattern: String,

    /// Analyzer tick period. Never zero.
    pub interval: Duration,

    /// Directory artifacts are written into at session close.
    pub artifact_dir: PathBuf,
}

impl DaemonConfig {
    /// Builds a config, rejecting values the daemon cannot run with.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyPattern`] if the search pattern is empty
    ///   (an empty pattern would match everywhere and makes occurrence
    ///   counting meaningless)
    /// - [`ConfigError::ZeroInterval`] if the analyzer period is zero
    pub fn new(
        listen: SocketAddr,
        pattern: impl Into<String>,
        interval: Duration,
        artifact_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(Self {
            listen,
            pattern,
            interval,
            artifact_dir: artifact_dir.into(),
        })
    }
}

/// Startup-fatal configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Search pattern must not be empty")]
    EmptyPattern,

    #[error("Analyzer interval must be positive")]
    ZeroInterval,
}
