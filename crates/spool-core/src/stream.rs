//! Type-safe stream identifiers.

use std::fmt;

/// Unique identifier for one client connection (a "stream").
///
/// Assigned by the listener when a connection is accepted: strictly
/// increasing starting at 1, unique for the process lifetime, never reused
/// even after the connection closes. Artifacts and analyzer reports are keyed
/// by this identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u64);

impl StreamId {
    /// Creates a StreamId from a raw counter value.
    ///
    /// Note: this does not enforce uniqueness. The server's atomic counter
    /// is the only producer of live ids; tests construct them directly.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying numeric value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StreamId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
