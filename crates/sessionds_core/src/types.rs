//! Core type definitions for sessionds.

use std::fmt;

/// Identifier of a remote session.
///
/// Assigned by the remote store when a session is opened. The identifier is
/// what an [`crate::ExecContext`] carries; the session handle itself never
/// leaves its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Options passed to the remote store when a transaction starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxnOptions {
    /// Hint that the transaction will not write.
    ///
    /// The remote store may use it to pick a cheaper read concern. The
    /// transaction wrapper itself behaves the same either way.
    pub read_only: bool,
}

impl TxnOptions {
    /// Options for a read-write transaction.
    #[must_use]
    pub const fn read_write() -> Self {
        Self { read_only: false }
    }

    /// Options for a read-only transaction.
    #[must_use]
    pub const fn read_only() -> Self {
        Self { read_only: true }
    }
}
