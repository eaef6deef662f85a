//! Remote session capability.

use crate::context::ExecContext;
use crate::error::RemoteResult;
use crate::types::{SessionId, TxnOptions};
use async_trait::async_trait;

/// A stateful remote session hosting one transaction.
///
/// Session handles are **not** safe for concurrent use; every method takes
/// `&mut self`. A [`crate::Transaction`] owns its handle exclusively and
/// serializes all calls against it.
///
/// Every call is a remote round trip. Implementations should honor the
/// deadline carried by the [`ExecContext`], but the transaction enforces it
/// regardless by dropping the call's future once the deadline passes.
#[async_trait]
pub trait SessionHandle: Send {
    /// Returns the remote identifier of this session.
    fn id(&self) -> SessionId;

    /// Starts a transaction on the session.
    async fn start_transaction(&mut self, options: TxnOptions) -> RemoteResult<()>;

    /// Commits the session's transaction.
    async fn commit_transaction(&mut self, ctx: &ExecContext) -> RemoteResult<()>;

    /// Aborts the session's transaction.
    async fn abort_transaction(&mut self, ctx: &ExecContext) -> RemoteResult<()>;

    /// Ends the session, releasing it on the remote store.
    ///
    /// Callers treat failures as non-fatal: they are logged, never surfaced.
    async fn end_session(&mut self, ctx: &ExecContext) -> RemoteResult<()>;
}

/// Opens new remote sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The session handle type this provider opens.
    type Session: SessionHandle;

    /// Opens a new session on the remote store.
    async fn start_session(&self) -> RemoteResult<Self::Session>;
}
