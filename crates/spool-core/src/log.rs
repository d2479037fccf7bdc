//! The shared append-only log.
//!
//! Every session appends its decoded lines here; the analyzer and the
//! at-close artifact flush read from here. This is the single point of
//! synchronization in the whole system: session buffers and analyzer state
//! are task-local, so the mutex below is the only cross-task lock.
//!
//! # Ordering invariants
//!
//! - The global sequence is append-only: entries are never removed or
//!   reordered, and sequence indices are strictly increasing.
//! - Each stream's subsequence preserves that stream's arrival order.
//! - Concurrent appends from different streams interleave but can corrupt
//!   neither the global order nor any per-stream order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::stream::StreamId;

// ============================================================================
// Entry
// ============================================================================

/// One immutable record in the shared log.
///
/// Created only by [`SharedLog::append`]; never mutated or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Global sequence index, strictly increasing, process-unique.
    pub seq: u64,

    /// The stream this line arrived on.
    pub stream: StreamId,

    /// The line text, delimiter stripped.
    pub text: String,
}

// ============================================================================
// SharedLog
// ============================================================================

/// Interior state guarded by the log's mutex.
///
/// `by_stream` holds positions into `entries` rather than copies, so append
/// is amortized O(1) and `entries_for` walks only that stream's positions
/// instead of scanning the whole log.
#[derive(Debug, Default)]
struct LogInner {
    entries: Vec<Entry>,
    by_stream: HashMap<StreamId, Vec<usize>>,
}

/// Concurrent append-only store of all lines across all streams.
///
/// Constructed once at startup and shared via `Arc` with every session task
/// and the analyzer - there is no ambient global instance.
///
/// A single mutex guards both the append path and every read path, so
/// appends are linearizable: any reader that starts after an append
/// completes observes that entry. Lock hold times are short (one push plus
/// one index update, or one copy-out), so contention stays bounded.
#[derive(Debug, Default)]
pub struct SharedLog {
    inner: Mutex<LogInner>,
}

impl SharedLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the interior state, absorbing poisoning.
    ///
    /// No invariant spans a panic point inside the critical sections below
    /// (each mutation is a push followed by an index push), so a poisoned
    /// lock still holds structurally valid state and we continue with it.
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one line under the given stream and returns its sequence index.
    ///
    /// Safe to call from any number of tasks concurrently. Text is accepted
    /// verbatim, including the empty string.
    pub fn append(&self, stream: StreamId, text: impl Into<String>) -> u64 {
        let text = text.into();
        let mut inner = self.lock();

        let pos = inner.entries.len();
        let seq = pos as u64;

        inner.entries.push(Entry { seq, stream, text });
        inner.by_stream.entry(stream).or_default().push(pos);

        trace!(%stream, seq, "line appended");
        seq
    }

    /// Returns the lines appended under `stream`, in arrival order.
    ///
    /// A call may miss entries appended strictly after it begins, but never
    /// omits an entry appended before it, and never reorders or duplicates.
    /// Unknown streams yield an empty vector.
    pub fn entries_for(&self, stream: StreamId) -> Vec<String> {
        let inner = self.lock();
        match inner.by_stream.get(&stream) {
            Some(positions) => positions
                .iter()
                .map(|&pos| inner.entries[pos].text.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Returns a point-in-time view of every stream's lines.
    ///
    /// Taken under the same exclusion region as `append`, so no per-stream
    /// sequence is ever observed partially constructed.
    pub fn snapshot_all(&self) -> BTreeMap<StreamId, Vec<String>> {
        let inner = self.lock();
        inner
            .by_stream
            .iter()
            .map(|(&stream, positions)| {
                let lines = positions
                    .iter()
                    .map(|&pos| inner.entries[pos].text.clone())
                    .collect();
                (stream, lines)
            })
            .collect()
    }

    /// Total number of entries across all streams.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True if no line has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_append_assigns_increasing_seq() {
        let log = SharedLog::new();
        let a = log.append(StreamId::new(1), "first");
        let b = log.append(StreamId::new(2), "second");
        let c = log.append(StreamId::new(1), "third");
        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_entries_for_preserves_arrival_order() {
        let log = SharedLog::new();
        let id = StreamId::new(1);
        for line in ["one", "two", "three"] {
            log.append(id, line);
        }
        assert_eq!(log.entries_for(id), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_entries_for_unknown_stream_is_empty() {
        let log = SharedLog::new();
        log.append(StreamId::new(1), "line");
        assert!(log.entries_for(StreamId::new(99)).is_empty());
    }

    #[test]
    fn test_streams_are_isolated() {
        let log = SharedLog::new();
        let a = StreamId::new(1);
        let b = StreamId::new(2);
        log.append(a, "a1");
        log.append(b, "b1");
        log.append(a, "a2");
        log.append(b, "b2");

        assert_eq!(log.entries_for(a), vec!["a1", "a2"]);
        assert_eq!(log.entries_for(b), vec!["b1", "b2"]);
    }

    #[test]
    fn test_empty_text_accepted() {
        let log = SharedLog::new();
        let id = StreamId::new(1);
        log.append(id, "");
        log.append(id, "after");
        assert_eq!(log.entries_for(id), vec!["", "after"]);
    }

    #[test]
    fn test_snapshot_all_groups_by_stream() {
        let log = SharedLog::new();
        log.append(StreamId::new(2), "two");
        log.append(StreamId::new(1), "one");

        let snapshot = log.snapshot_all();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[&StreamId::new(1)], vec!["one"]);
        assert_eq!(snapshot[&StreamId::new(2)], vec!["two"]);

        // BTreeMap iteration is ordered by stream id.
        let ids: Vec<_> = snapshot.keys().copied().collect();
        assert_eq!(ids, vec![StreamId::new(1), StreamId::new(2)]);
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        const WRITERS: u64 = 8;
        const LINES_PER_WRITER: u64 = 500;

        let log = Arc::new(SharedLog::new());

        let handles: Vec<_> = (1..=WRITERS)
            .map(|w| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    let id = StreamId::new(w);
                    for n in 0..LINES_PER_WRITER {
                        log.append(id, format!("writer-{w}-line-{n}"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        assert_eq!(log.len() as u64, WRITERS * LINES_PER_WRITER);

        // Each writer's subsequence must match its submitted order exactly.
        for w in 1..=WRITERS {
            let lines = log.entries_for(StreamId::new(w));
            assert_eq!(lines.len() as u64, LINES_PER_WRITER);
            for (n, line) in lines.iter().enumerate() {
                assert_eq!(line, &format!("writer-{w}-line-{n}"));
            }
        }

        // The flattened snapshot agrees with the global count.
        let total: usize = log.snapshot_all().values().map(Vec::len).sum();
        assert_eq!(total as u64, WRITERS * LINES_PER_WRITER);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_appends_from_tasks() {
        const TASKS: u64 = 4;
        const LINES_PER_TASK: u64 = 200;

        let log = Arc::new(SharedLog::new());

        let mut handles = Vec::new();
        for t in 1..=TASKS {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let id = StreamId::new(t);
                for n in 0..LINES_PER_TASK {
                    log.append(id, format!("{n}"));
                    if n % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(log.len() as u64, TASKS * LINES_PER_TASK);
        for t in 1..=TASKS {
            let lines = log.entries_for(StreamId::new(t));
            let expected: Vec<String> = (0..LINES_PER_TASK).map(|n| n.to_string()).collect();
            assert_eq!(lines, expected);
        }
    }
}
