//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up stores over a
//! [`MemoryRemote`] and common test scenarios.

use crate::remote::MemoryRemote;
use sessionds_core::{Context, SessionStore, StoreConfig, StoreTransaction};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A session store backed by an in-memory remote.
pub type MemoryStore = SessionStore<MemoryRemote, MemoryRemote>;

/// A transaction produced by a [`MemoryStore`].
pub type MemoryTxn = StoreTransaction<MemoryRemote, MemoryRemote>;

/// A test store together with the remote it talks to.
#[derive(Debug)]
pub struct TestStore {
    /// The store instance.
    pub store: MemoryStore,
    /// The remote, for seeding data, injecting faults and assertions.
    pub remote: MemoryRemote,
}

impl TestStore {
    /// Creates a store with default timeouts.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with short timeouts, handy for timeout tests.
    pub fn short_timeouts() -> Self {
        Self::with_config(
            StoreConfig::new()
                .txn_timeout(Duration::from_millis(200))
                .op_timeout(Duration::from_millis(50)),
        )
    }

    /// Creates a store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let remote = MemoryRemote::new();
        let store = SessionStore::new(remote.clone(), remote.clone(), config)
            .expect("Failed to create session store");
        Self { store, remote }
    }

    /// Begins a read-write transaction, panicking on failure.
    pub async fn begin(&self) -> MemoryTxn {
        self.store
            .new_transaction(false)
            .await
            .expect("Failed to begin transaction")
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = MemoryStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Shorthand for a context without a deadline.
#[must_use]
pub fn bg() -> Context {
    Context::background()
}

/// Installs a `tracing` subscriber for test output.
///
/// Honors `RUST_LOG`; defaults to `sessionds_core=debug`. Safe to call from
/// every test, only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sessionds_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
