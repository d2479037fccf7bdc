//! Core domain types for spool.
//!
//! This crate holds the pieces of spool that have no I/O:
//! - `stream` - Type-safe stream identifiers
//! - `log` - The shared append-only log all sessions write into
//!
//! Everything here is driven by the daemon crate (`spoold`), which owns the
//! TCP listener, the per-connection sessions, and the analyzer task.
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate avoids `.unwrap()`, `.expect()`, `panic!()`
//! and friends; all fallible operations use pattern matching or propagate
//! a `Result`. Lock poisoning is absorbed rather than propagated (see
//! `log::SharedLog`).

pub mod log;
pub mod stream;

pub use log::{Entry, SharedLog};
pub use stream::StreamId;
