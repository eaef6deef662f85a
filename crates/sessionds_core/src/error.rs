//! Error types for sessionds.
//!
//! Two layers: [`RemoteError`] is what the remote store's collaborators
//! report, [`TxnError`] is what callers of a [`crate::Transaction`] or
//! [`crate::SessionStore`] see.

use crate::key::Key;
use crate::types::SessionId;
use std::fmt;
use thiserror::Error;

/// Result type for calls into the remote store.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Result type for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors reported by the remote store collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The requested key does not exist.
    #[error("key not found")]
    NotFound,

    /// The call did not finish before its deadline and was cancelled.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The remote store rejected the request.
    #[error("rejected by remote store: {0}")]
    Rejected(String),

    /// The connection to the remote store failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The session is no longer known to the remote store.
    #[error("session {0} expired")]
    SessionExpired(SessionId),
}

impl RemoteError {
    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Returns true if the call was cut off by a deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteError::DeadlineExceeded)
    }
}

/// A store operation forwarded by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `get`
    Get,
    /// `has`
    Has,
    /// `get_size`
    GetSize,
    /// `query` and `query_extended`
    Query,
    /// `put`
    Put,
    /// `delete`
    Delete,
}

impl StoreOp {
    /// Returns the operation name used in errors and log events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StoreOp::Get => "get",
            StoreOp::Has => "has",
            StoreOp::GetSize => "get_size",
            StoreOp::Query => "query",
            StoreOp::Put => "put",
            StoreOp::Delete => "delete",
        }
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by transactions and the transaction factory.
#[derive(Debug, Error)]
pub enum TxnError {
    /// The owning store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// A remote session could not be created.
    #[error("starting session: {0}")]
    SessionStart(#[source] RemoteError),

    /// The remote transaction could not be started on a fresh session.
    #[error("starting session transaction: {0}")]
    TransactionStart(#[source] RemoteError),

    /// The transaction was already committed or discarded.
    #[error("transaction was already finalized")]
    TxnFinalized,

    /// The remote commit failed or timed out. The transaction stays active.
    #[error("committing session transaction: {0}")]
    CommitFailed(#[source] RemoteError),

    /// The key does not exist in the transaction's view.
    #[error("key not found: {0}")]
    NotFound(Key),

    /// A forwarded store operation failed.
    #[error("{op} failed: {source}")]
    Store {
        /// The operation that failed.
        op: StoreOp,
        /// Underlying remote error.
        #[source]
        source: RemoteError,
    },

    /// The store configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl TxnError {
    /// Creates a store operation error.
    pub fn store(op: StoreOp, source: RemoteError) -> Self {
        Self::Store { op, source }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if the failure was a deadline rather than a remote rejection.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            TxnError::SessionStart(cause)
            | TxnError::TransactionStart(cause)
            | TxnError::CommitFailed(cause)
            | TxnError::Store { source: cause, .. } => cause.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if the transaction was already finalized.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self, TxnError::TxnFinalized)
    }
}
