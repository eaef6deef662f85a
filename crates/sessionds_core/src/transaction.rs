//! Transactions over a remote session.
//!
//! A [`Transaction`] is a monitor around one remote session: the session and
//! the transaction state live behind a single async mutex, and every
//! operation holds that mutex for its full duration, remote call included.
//! The finalization check and the remote call that follows it are therefore
//! atomic with respect to every other caller.

use crate::config::StoreConfig;
use crate::context::{bounded, Context, ExecContext};
use crate::delegate::StoreDelegate;
use crate::error::{RemoteError, StoreOp, TxnError, TxnResult};
use crate::key::Key;
use crate::query::{Query, QueryExt, QueryResults};
use crate::session::SessionHandle;
use crate::types::SessionId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been discarded.
    Discarded,
}

impl TransactionState {
    /// Returns true once the transaction was committed or discarded.
    #[must_use]
    pub fn is_finalized(self) -> bool {
        self != TransactionState::Active
    }
}

struct Inner<S> {
    state: TransactionState,
    session: S,
}

/// An interactive transaction bound to one remote session.
///
/// Share it between tasks with [`Arc`]; all operations take `&self` and are
/// serialized internally. Exactly one of [`commit`](Self::commit) (when it
/// succeeds) or [`discard`](Self::discard) finalizes the transaction; after
/// that every operation fails with [`TxnError::TxnFinalized`] without
/// touching the remote store.
///
/// There is no finalizer. A transaction dropped while still active leaves
/// its remote session to the remote store's session expiry.
pub struct Transaction<S, D> {
    inner: Mutex<Inner<S>>,
    delegate: Arc<D>,
    exec: ExecContext,
    read_only: bool,
    txn_timeout: Duration,
    op_timeout: Duration,
}

impl<S, D> Transaction<S, D>
where
    S: SessionHandle,
    D: StoreDelegate,
{
    /// Wraps a session whose remote transaction has already been started.
    pub(crate) fn new(session: S, delegate: Arc<D>, config: &StoreConfig, read_only: bool) -> Self {
        let exec = ExecContext::new(session.id());
        Self {
            inner: Mutex::new(Inner {
                state: TransactionState::Active,
                session,
            }),
            delegate,
            exec,
            read_only,
            txn_timeout: config.txn_timeout,
            op_timeout: config.op_timeout,
        }
    }

    /// Returns the ID of the underlying remote session.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.exec.session()
    }

    /// Returns true if the transaction was opened as read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the current state.
    ///
    /// Waits behind any operation in flight.
    pub async fn state(&self) -> TransactionState {
        self.inner.lock().await.state
    }

    /// Returns true once the transaction was committed or discarded.
    pub async fn is_finalized(&self) -> bool {
        self.state().await.is_finalized()
    }

    /// Commits the transaction.
    ///
    /// The remote commit is bounded by the transaction timeout, narrowed by
    /// the caller's deadline. On success the session is ended as well,
    /// bounded by the operation timeout; a failure to end it is logged and
    /// does not affect the result.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::CommitFailed`] if the remote commit failed or timed out;
    ///   the transaction stays active and may be committed again or discarded
    pub async fn commit(&self, ctx: &Context) -> TxnResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.state.is_finalized() {
            return Err(TxnError::TxnFinalized);
        }

        let call = self.exec.bind(&ctx.narrowed(self.txn_timeout));
        bounded(call.deadline(), inner.session.commit_transaction(&call))
            .await
            .map_err(TxnError::CommitFailed)?;

        inner.state = TransactionState::Committed;
        debug!(session = %self.id(), "transaction committed");

        self.end_session(&mut inner.session, ctx).await;
        Ok(())
    }

    /// Discards the transaction.
    ///
    /// Best effort: a failed or timed-out remote abort is logged, and the
    /// transaction is finalized either way. Discarding a finalized
    /// transaction does nothing.
    ///
    /// If the returned future is dropped before the abort attempt completes,
    /// the transaction stays active.
    pub async fn discard(&self, ctx: &Context) {
        let mut inner = self.inner.lock().await;
        if inner.state.is_finalized() {
            return;
        }

        let call = self.exec.bind(&ctx.narrowed(self.txn_timeout));
        if let Err(err) = bounded(call.deadline(), inner.session.abort_transaction(&call)).await {
            error!(session = %self.id(), error = %err, "aborting transaction");
        }

        inner.state = TransactionState::Discarded;
        debug!(session = %self.id(), "transaction discarded");

        self.end_session(&mut inner.session, ctx).await;
    }

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::NotFound`] if the key does not exist
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn get(&self, ctx: &Context, key: &Key) -> TxnResult<Vec<u8>> {
        let _guard = self.active().await?;
        let exec = self.exec.bind(ctx);
        bounded(exec.deadline(), self.delegate.get(&exec, key))
            .await
            .map_err(|err| keyed_error(StoreOp::Get, key, err))
    }

    /// Returns true if `key` exists.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn has(&self, ctx: &Context, key: &Key) -> TxnResult<bool> {
        let _guard = self.active().await?;
        let exec = self.exec.bind(ctx);
        bounded(exec.deadline(), self.delegate.has(&exec, key))
            .await
            .map_err(|err| TxnError::store(StoreOp::Has, err))
    }

    /// Returns the size in bytes of the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::NotFound`] if the key does not exist
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn get_size(&self, ctx: &Context, key: &Key) -> TxnResult<usize> {
        let _guard = self.active().await?;
        let exec = self.exec.bind(ctx);
        bounded(exec.deadline(), self.delegate.get_size(&exec, key))
            .await
            .map_err(|err| keyed_error(StoreOp::GetSize, key, err))
    }

    /// Runs a query within the transaction.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn query(&self, ctx: &Context, query: Query) -> TxnResult<QueryResults> {
        self.query_extended(ctx, QueryExt::from(query)).await
    }

    /// Runs an extended query within the transaction.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn query_extended(&self, ctx: &Context, query: QueryExt) -> TxnResult<QueryResults> {
        let _guard = self.active().await?;
        let exec = self.exec.bind(ctx);
        bounded(exec.deadline(), self.delegate.query(&exec, query))
            .await
            .map_err(|err| TxnError::store(StoreOp::Query, err))
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn put(&self, ctx: &Context, key: &Key, value: Vec<u8>) -> TxnResult<()> {
        let _guard = self.active().await?;
        let exec = self.exec.bind(ctx);
        bounded(exec.deadline(), self.delegate.put(&exec, key, value))
            .await
            .map_err(|err| TxnError::store(StoreOp::Put, err))
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// - [`TxnError::TxnFinalized`] if already committed or discarded
    /// - [`TxnError::Store`] if the remote call failed
    pub async fn delete(&self, ctx: &Context, key: &Key) -> TxnResult<()> {
        let _guard = self.active().await?;
        let exec = self.exec.bind(ctx);
        bounded(exec.deadline(), self.delegate.delete(&exec, key))
            .await
            .map_err(|err| TxnError::store(StoreOp::Delete, err))
    }

    /// Acquires the guard, failing if the transaction is finalized.
    async fn active(&self) -> TxnResult<MutexGuard<'_, Inner<S>>> {
        let inner = self.inner.lock().await;
        if inner.state.is_finalized() {
            return Err(TxnError::TxnFinalized);
        }
        Ok(inner)
    }

    async fn end_session(&self, session: &mut S, ctx: &Context) {
        let call = self.exec.bind(&ctx.narrowed(self.op_timeout));
        if let Err(err) = bounded(call.deadline(), session.end_session(&call)).await {
            warn!(session = %self.id(), error = %err, "ending session");
        }
    }
}

fn keyed_error(op: StoreOp, key: &Key, err: RemoteError) -> TxnError {
    match err {
        RemoteError::NotFound => TxnError::NotFound(key.clone()),
        other => TxnError::store(op, other),
    }
}

impl<S, D> fmt::Debug for Transaction<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("session", &self.exec.session())
            .field("read_only", &self.read_only)
            .field("txn_timeout", &self.txn_timeout)
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl<S, D> Drop for Transaction<S, D> {
    fn drop(&mut self) {
        if !self.inner.get_mut().state.is_finalized() {
            debug!(
                session = %self.exec.session(),
                "transaction dropped while active, session left to remote expiry"
            );
        }
    }
}
