//! spool daemon - TCP line-ingestion server.
//!
//! This crate provides the moving parts of the spool daemon:
//! - `config` - Validated runtime configuration
//! - `server` - TCP accept loop assigning stream ids
//! - `session` - Per-connection ingestion task (line framing + lifecycle)
//! - `analyzer` - Periodic pattern-frequency ranking over the shared log
//! - `sink` - Per-stream artifact writer invoked at session close
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   IngestServer  │
//! │  (TcpListener)  │
//! └───────┬─────────┘
//!         │ accept(), next StreamId
//!         ▼
//! ┌─────────────────┐  append  ┌─────────────────┐  snapshot  ┌──────────┐
//! │  StreamSession  │─────────▶│    SharedLog    │◀───────────│ Analyzer │
//! │ (per connection)│          │  (spool-core)   │            │ (1 task) │
//! └───────┬─────────┘          └─────────────────┘            └──────────┘
//!         │ at close: entries_for(id)
//!         ▼
//! ┌─────────────────┐
//! │    FileSink     │
//! │ (stream_NN.txt) │
//! └─────────────────┘
//! ```
//!
//! The `SharedLog` is the only shared mutable resource; sessions and the
//! analyzer otherwise own their state exclusively, so no error in one task
//! can corrupt or terminate another.
//!
//! # Panic-Free Guarantees
//!
//! Production code avoids `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()` and `todo!()`; fallible paths return `Result` or are
//! logged and survived.

pub mod analyzer;
pub mod config;
pub mod server;
pub mod session;
pub mod sink;
