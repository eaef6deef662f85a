//! The session store: owner of the remote collaborators and transaction factory.

use crate::config::StoreConfig;
use crate::context::{bounded, Context, ExecContext};
use crate::delegate::StoreDelegate;
use crate::error::{TxnError, TxnResult};
use crate::session::{SessionHandle, SessionProvider};
use crate::transaction::Transaction;
use crate::types::TxnOptions;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Transaction type produced by a [`SessionStore`].
pub type StoreTransaction<P, D> = Transaction<<P as SessionProvider>::Session, D>;

/// A remote document store accessed through serialized transactional sessions.
///
/// The store owns the session provider and the store delegate, and hands out
/// one [`Transaction`] per logical transaction.
///
/// # Example
///
/// ```rust,ignore
/// use sessionds_core::{Context, Key, SessionStore, StoreConfig};
///
/// let store = SessionStore::new(provider, delegate, StoreConfig::default())?;
/// let txn = store.new_transaction(false).await?;
/// txn.put(&Context::background(), &Key::new("/a"), b"1".to_vec()).await?;
/// txn.commit(&Context::background()).await?;
/// ```
pub struct SessionStore<P, D> {
    provider: P,
    delegate: Arc<D>,
    config: StoreConfig,
    /// Whether the store has been closed.
    closed: RwLock<bool>,
}

impl<P, D> SessionStore<P, D>
where
    P: SessionProvider,
    D: StoreDelegate,
{
    /// Creates a store over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::InvalidConfig`] if the configuration is unusable.
    pub fn new(provider: P, delegate: D, config: StoreConfig) -> TxnResult<Self> {
        Self::with_shared_delegate(provider, Arc::new(delegate), config)
    }

    /// Creates a store over a delegate shared with other owners.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::InvalidConfig`] if the configuration is unusable.
    pub fn with_shared_delegate(provider: P, delegate: Arc<D>, config: StoreConfig) -> TxnResult<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            delegate,
            config,
            closed: RwLock::new(false),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Begins a new transaction.
    ///
    /// Opens a remote session and starts a transaction on it, each step
    /// bounded by the operation timeout. `read_only` is passed to the remote
    /// store as a hint only.
    ///
    /// # Errors
    ///
    /// - [`TxnError::StoreClosed`] if the store was closed; no session is opened
    /// - [`TxnError::SessionStart`] if the session could not be opened
    /// - [`TxnError::TransactionStart`] if the transaction could not be
    ///   started; the session is ended before returning
    pub async fn new_transaction(&self, read_only: bool) -> TxnResult<StoreTransaction<P, D>> {
        // Held until the transaction exists so close() waits for us.
        let closed = self.closed.read().await;
        if *closed {
            return Err(TxnError::StoreClosed);
        }

        let deadline = Context::background().narrowed(self.config.op_timeout).deadline();
        let mut session = bounded(deadline, self.provider.start_session())
            .await
            .map_err(TxnError::SessionStart)?;

        let options = TxnOptions { read_only };
        let deadline = Context::background().narrowed(self.config.op_timeout).deadline();
        if let Err(cause) = bounded(deadline, session.start_transaction(options)).await {
            self.release(&mut session).await;
            return Err(TxnError::TransactionStart(cause));
        }

        debug!(session = %session.id(), read_only, "transaction started");
        Ok(Transaction::new(
            session,
            Arc::clone(&self.delegate),
            &self.config,
            read_only,
        ))
    }

    /// Begins a new transaction for callers of the extended API.
    ///
    /// Behaves exactly like [`new_transaction`](Self::new_transaction); the
    /// returned transaction supports [`Transaction::query_extended`].
    ///
    /// # Errors
    ///
    /// Same as [`new_transaction`](Self::new_transaction).
    pub async fn new_transaction_extended(
        &self,
        read_only: bool,
    ) -> TxnResult<StoreTransaction<P, D>> {
        self.new_transaction(read_only).await
    }

    /// Closes the store. New transactions fail with [`TxnError::StoreClosed`].
    ///
    /// Waits for transaction creations in flight. Transactions already
    /// handed out are unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::StoreClosed`] if the store was already closed.
    pub async fn close(&self) -> TxnResult<()> {
        let mut closed = self.closed.write().await;
        if *closed {
            return Err(TxnError::StoreClosed);
        }
        *closed = true;
        debug!("session store closed");
        Ok(())
    }

    /// Returns true if the store has been closed.
    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    async fn release(&self, session: &mut P::Session) {
        let ctx = Context::background().narrowed(self.config.op_timeout);
        let call = ExecContext::new(session.id()).bind(&ctx);
        if let Err(err) = bounded(call.deadline(), session.end_session(&call)).await {
            warn!(session = %session.id(), error = %err, "ending session after failed start");
        }
    }
}

impl<P, D> fmt::Debug for SessionStore<P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
