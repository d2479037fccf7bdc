//! Per-stream artifact writer.
//!
//! When a session closes, its complete line sequence is handed here and
//! written to one file per stream. This is a plain sink: deterministic name
//! derived from the stream id, overwrite-on-rewrite, one line per line.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use spool_core::StreamId;

/// Writes one artifact per stream into a configured directory.
///
/// The artifact name is `stream_NN.txt` with the numeric id zero-padded to
/// at least two digits. Writing the same stream twice overwrites the prior
/// artifact; the at-close write is authoritative.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates a sink rooted at `dir`. The directory is created on first
    /// write, not here.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the artifact path for a stream.
    pub fn artifact_path(&self, stream: StreamId) -> PathBuf {
        self.dir.join(format!("stream_{:02}.txt", stream.value()))
    }

    /// Returns the sink's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the stream's lines, one per line, to its artifact.
    ///
    /// An empty line sequence still produces an (empty) artifact, so a
    /// connection that sent nothing is observable on disk.
    ///
    /// # Errors
    ///
    /// [`SinkError::Write`] if the directory cannot be created or the file
    /// cannot be written. Callers log this and carry on; a failed artifact
    /// never takes down the session or the daemon.
    pub async fn persist(&self, stream: StreamId, lines: &[String]) -> Result<PathBuf, SinkError> {
        let path = self.artifact_path(stream);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Write {
                path: path.clone(),
                source,
            })?;

        let mut contents = String::new();
        for line in lines {
            contents.push_str(line);
            contents.push('\n');
        }

        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| SinkError::Write {
                path: path.clone(),
                source,
            })?;

        info!(%stream, path = %path.display(), lines = lines.len(), "Artifact written");
        debug!(%stream, "Artifact flush complete");
        Ok(path)
    }
}

/// Errors from artifact persistence.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_writes_one_line_per_line() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let sink = FileSink::new(dir.path());

        let lines = vec!["alpha".to_string(), "beta".to_string()];
        let path = sink
            .persist(StreamId::new(1), &lines)
            .await
            .expect("persist should succeed");

        let contents = std::fs::read_to_string(&path).expect("read artifact");
        assert_eq!(contents, "alpha\nbeta\n");
    }

    #[tokio::test]
    async fn test_artifact_name_is_zero_padded() {
        let sink = FileSink::new("/tmp/spool");
        assert_eq!(
            sink.artifact_path(StreamId::new(3)).file_name(),
            Some(std::ffi::OsStr::new("stream_03.txt"))
        );
        assert_eq!(
            sink.artifact_path(StreamId::new(120)).file_name(),
            Some(std::ffi::OsStr::new("stream_120.txt"))
        );
    }

    #[tokio::test]
    async fn test_persist_overwrites_prior_artifact() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let sink = FileSink::new(dir.path());
        let id = StreamId::new(2);

        sink.persist(id, &["old".to_string()])
            .await
            .expect("first persist");
        let path = sink
            .persist(id, &["new".to_string()])
            .await
            .expect("second persist");

        let contents = std::fs::read_to_string(&path).expect("read artifact");
        assert_eq!(contents, "new\n");
    }

    #[tokio::test]
    async fn test_persist_empty_stream_produces_empty_artifact() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let sink = FileSink::new(dir.path());

        let path = sink
            .persist(StreamId::new(9), &[])
            .await
            .expect("persist should succeed");

        let contents = std::fs::read_to_string(&path).expect("read artifact");
        assert!(contents.is_empty());
    }

    #[tokio::test]
    async fn test_persist_creates_missing_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let nested = dir.path().join("artifacts");
        let sink = FileSink::new(&nested);

        sink.persist(StreamId::new(1), &["line".to_string()])
            .await
            .expect("persist should create the directory");

        assert!(nested.is_dir());
    }
}
