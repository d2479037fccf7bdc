//! Periodic pattern-frequency analysis over the shared log.
//!
//! The analyzer wakes on a fixed period, snapshots the shared log, counts
//! non-overlapping occurrences of the configured pattern per stream, ranks
//! streams by frequency, and reports each (stream, frequency) pair exactly
//! once. The dedup key is the exact pair, not the stream alone: a stream
//! whose frequency grows is reported again under the new frequency.
//!
//! One analyzer instance owns one reported-set. Spawning a second task via
//! [`spawn_analyzer_task`] creates a second independent set, so duplicate
//! output across instances is expected in that configuration; the daemon
//! starts exactly one.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use spool_core::{SharedLog, StreamId};

/// One newly-observed report entry from a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedHit {
    /// 1-based position in this tick's full ranking.
    pub rank: usize,

    /// Stream the frequency belongs to.
    pub stream: StreamId,

    /// Non-overlapping occurrences of the pattern across the stream's lines.
    pub count: usize,
}

/// Scan-rank-dedup state for one analyzer instance.
///
/// The pattern is fixed at construction; emptiness is rejected earlier, at
/// configuration time (`DaemonConfig::new`), never here.
pub struct Analyzer {
    pattern: String,
    reported: HashSet<(StreamId, usize)>,
}

impl Analyzer {
    /// Creates an analyzer for a configured (non-empty) search pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reported: HashSet::new(),
        }
    }

    /// Returns the configured search pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Ranks one snapshot and returns only the not-yet-reported pairs.
    ///
    /// Streams are sorted by frequency descending, ties broken by stream id
    /// ascending, so repeated ticks over identical input produce identical
    /// ranking. Every returned pair is recorded; an unchanged snapshot on
    /// the next tick yields nothing.
    pub fn tick(&mut self, snapshot: &BTreeMap<StreamId, Vec<String>>) -> Vec<RankedHit> {
        let mut ranking: Vec<(StreamId, usize)> = snapshot
            .iter()
            .map(|(&stream, lines)| (stream, count_occurrences(lines, &self.pattern)))
            .collect();

        ranking.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        ranking
            .into_iter()
            .enumerate()
            .filter_map(|(idx, (stream, count))| {
                if self.reported.insert((stream, count)) {
                    Some(RankedHit {
                        rank: idx + 1,
                        stream,
                        count,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Sums non-overlapping occurrences of `pattern` over all lines.
fn count_occurrences(lines: &[String], pattern: &str) -> usize {
    lines
        .iter()
        .map(|line| line.matches(pattern).count())
        .sum()
}

/// Spawns the periodic analyzer task.
///
/// Each tick snapshots the shared log, runs the analyzer, and logs every
/// newly-observed (stream, frequency) pair with its rank. The task runs for
/// the process lifetime in steady state; the cancellation token exists only
/// for graceful shutdown.
pub fn spawn_analyzer_task(
    log: Arc<SharedLog>,
    pattern: String,
    period: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut analyzer = Analyzer::new(pattern);
        let mut tick = interval(period);

        info!(
            pattern = %analyzer.pattern(),
            interval_secs = period.as_secs(),
            "Analyzer started"
        );

        loop {
            tokio::select! {
                biased;

                _ = cancel_token.cancelled() => {
                    info!("Analyzer shutting down");
                    break;
                }

                _ = tick.tick() => {
                    let snapshot = log.snapshot_all();
                    let hits = analyzer.tick(&snapshot);
                    report_hits(analyzer.pattern(), &hits);
                }
            }
        }

        debug!("Analyzer task completed");
    })
}

/// Logs one tick's newly-observed report entries.
fn report_hits(pattern: &str, hits: &[RankedHit]) {
    for hit in hits {
        info!(
            rank = hit.rank,
            stream = %hit.stream,
            count = hit.count,
            pattern = %pattern,
            "Pattern frequency report"
        );
    }
}
