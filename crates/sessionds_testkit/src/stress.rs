//! Concurrency harness for transactions.
//!
//! Races many writers against a finalizer on one shared transaction and
//! reports what each side observed.

use crate::fixtures::{bg, TestStore};
use sessionds_core::{Key, TxnError};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How the racing finalizer ends the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalizer {
    /// Commit the transaction.
    Commit,
    /// Discard the transaction.
    Discard,
}

/// Configuration for a finalization race.
#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Number of concurrent writer tasks.
    pub writers: usize,
    /// How the transaction is finalized.
    pub finalizer: Finalizer,
    /// Writers spawned before the finalizer.
    pub writers_before_finalizer: usize,
    /// Latency injected into every store call.
    pub op_delay: Duration,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            writers: 32,
            finalizer: Finalizer::Commit,
            writers_before_finalizer: 16,
            op_delay: Duration::ZERO,
        }
    }
}

/// Outcome of a finalization race.
#[derive(Debug)]
pub struct RaceReport {
    /// The store and remote the race ran against.
    pub store: TestStore,
    /// Keys whose put completed.
    pub accepted: Vec<Key>,
    /// Keys whose put was rejected because the transaction was finalized.
    pub rejected: Vec<Key>,
    /// Puts that failed for any other reason.
    pub failed: Vec<(Key, String)>,
    /// Whether the finalizer reported success (always true for discard).
    pub finalized: bool,
    /// Total duration.
    pub duration: Duration,
}

impl RaceReport {
    /// Prints a summary of the race.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Accepted puts: {}", self.accepted.len());
        println!("Rejected puts: {}", self.rejected.len());
        println!("Failed puts: {}", self.failed.len());
        println!("Finalized: {}", self.finalized);
        println!("Duration: {:?}", self.duration);
    }
}

/// Key written by writer `i`.
#[must_use]
pub fn writer_key(i: usize) -> Key {
    Key::new(format!("/race/{i:04}"))
}

/// Runs `config.writers` puts concurrently with one commit or discard on a
/// single shared transaction.
///
/// Must run on a multi-threaded tokio runtime to exercise real parallelism.
pub async fn race_finalize(config: &RaceConfig) -> RaceReport {
    let store = TestStore::new();
    let delay = config.op_delay;
    store.remote.configure_faults(|f| f.op_delay = delay);
    let txn = Arc::new(store.begin().await);

    let start = Instant::now();
    let mut writers = Vec::with_capacity(config.writers);
    let mut finalizer = None;

    for i in 0..config.writers {
        if i == config.writers_before_finalizer {
            finalizer = Some(spawn_finalizer(Arc::clone(&txn), config.finalizer));
        }
        let txn = Arc::clone(&txn);
        writers.push(tokio::spawn(async move {
            let key = writer_key(i);
            let result = txn.put(&bg(), &key, i.to_le_bytes().to_vec()).await;
            (key, result)
        }));
    }
    let finalizer =
        finalizer.unwrap_or_else(|| spawn_finalizer(Arc::clone(&txn), config.finalizer));

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    let mut failed = Vec::new();
    for writer in writers {
        let (key, result) = writer.await.expect("writer task panicked");
        match result {
            Ok(()) => accepted.push(key),
            Err(TxnError::TxnFinalized) => rejected.push(key),
            Err(err) => failed.push((key, err.to_string())),
        }
    }
    let finalized = finalizer.await.expect("finalizer task panicked");
    accepted.sort();
    rejected.sort();

    RaceReport {
        store,
        accepted,
        rejected,
        failed,
        finalized,
        duration: start.elapsed(),
    }
}

fn spawn_finalizer(
    txn: Arc<crate::fixtures::MemoryTxn>,
    finalizer: Finalizer,
) -> tokio::task::JoinHandle<bool> {
    tokio::spawn(async move {
        match finalizer {
            Finalizer::Commit => txn.commit(&bg()).await.is_ok(),
            Finalizer::Discard => {
                txn.discard(&bg()).await;
                true
            }
        }
    })
}
