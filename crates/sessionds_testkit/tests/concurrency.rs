//! Concurrent callers sharing one transaction.

use sessionds_core::{Key, TransactionState};
use sessionds_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn assert_single_finalization(report: &RaceReport, finalizer: Finalizer) {
    let stats = report.store.remote.stats();
    match finalizer {
        Finalizer::Commit => {
            assert_eq!(stats.commits, 1);
            assert_eq!(stats.aborts, 0);
        }
        Finalizer::Discard => {
            assert_eq!(stats.commits, 0);
            assert_eq!(stats.aborts, 1);
        }
    }
    assert_eq!(stats.sessions_ended, 1);
    assert_eq!(stats.overlap_violations, 0);
    assert!(report.finalized);
    assert!(report.failed.is_empty(), "unexpected failures: {:?}", report.failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_commit_never_partially_applies_puts() {
    let config = RaceConfig {
        writers: 64,
        finalizer: Finalizer::Commit,
        writers_before_finalizer: 32,
        op_delay: Duration::from_micros(200),
    };
    let report = race_finalize(&config).await;
    report.print_summary("racing commit");

    assert_single_finalization(&report, Finalizer::Commit);
    assert_eq!(report.accepted.len() + report.rejected.len(), config.writers);
    // Every accepted put was committed, every rejected one never reached the store.
    assert_eq!(report.store.remote.committed_keys(), report.accepted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_discard_rejects_or_drops_every_put() {
    let config = RaceConfig {
        writers: 64,
        finalizer: Finalizer::Discard,
        writers_before_finalizer: 32,
        op_delay: Duration::from_micros(200),
    };
    let report = race_finalize(&config).await;
    report.print_summary("racing discard");

    assert_single_finalization(&report, Finalizer::Discard);
    assert_eq!(report.accepted.len() + report.rejected.len(), config.writers);
    assert!(report.store.remote.committed_keys().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_calls_before_finalization_all_reach_the_session() {
    let config = RaceConfig {
        writers: 16,
        finalizer: Finalizer::Commit,
        writers_before_finalizer: 16,
        op_delay: Duration::ZERO,
    };
    let report = race_finalize(&config).await;

    let journal = report.store.remote.journal(sessionds_core::SessionId::new(1));
    let puts = journal
        .iter()
        .filter(|call| matches!(call, RemoteCall::Put(_)))
        .count();
    assert_eq!(puts, report.accepted.len());
    // Commit is followed only by end of session.
    let tail: Vec<_> = journal
        .iter()
        .skip_while(|call| **call != RemoteCall::Commit)
        .cloned()
        .collect();
    assert_eq!(tail, vec![RemoteCall::Commit, RemoteCall::EndSession]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_finalizers_finalize_once() {
    let ts = TestStore::new();
    let txn = Arc::new(ts.begin().await);
    txn.put(&bg(), &Key::new("/a"), vec![1]).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let txn = Arc::clone(&txn);
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                txn.commit(&bg()).await.is_ok()
            } else {
                txn.discard(&bg()).await;
                false
            }
        }));
    }
    let mut commits = 0;
    for handle in handles {
        if handle.await.unwrap() {
            commits += 1;
        }
    }

    let stats = ts.remote.stats();
    assert_eq!(stats.commits + stats.aborts, 1);
    assert_eq!(stats.sessions_ended, 1);
    assert_eq!(stats.overlap_violations, 0);
    assert!(commits <= 1);
    let state = txn.state().await;
    assert!(state.is_finalized());
    assert_eq!(state == TransactionState::Committed, commits == 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_and_writes_are_serialized() {
    let ts = TestStore::new();
    ts.remote
        .configure_faults(|f| f.op_delay = Duration::from_micros(100));
    let txn = Arc::new(ts.begin().await);

    let mut handles = Vec::new();
    for i in 0..32u8 {
        let txn = Arc::clone(&txn);
        handles.push(tokio::spawn(async move {
            let key = Key::new(format!("/k/{}", i % 4));
            txn.put(&bg(), &key, vec![i]).await.unwrap();
            txn.has(&bg(), &key).await.unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    assert_eq!(ts.remote.stats().overlap_violations, 0);
    txn.commit(&bg()).await.unwrap();
    assert_eq!(ts.remote.committed_keys().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn independent_transactions_do_not_block_each_other() {
    let ts = TestStore::new();
    let a = Arc::new(ts.begin().await);
    let b = Arc::new(ts.begin().await);

    let ta = {
        let a = Arc::clone(&a);
        tokio::spawn(async move { a.put(&bg(), &Key::new("/a"), vec![1]).await })
    };
    let tb = {
        let b = Arc::clone(&b);
        tokio::spawn(async move { b.put(&bg(), &Key::new("/b"), vec![2]).await })
    };
    ta.await.unwrap().unwrap();
    tb.await.unwrap().unwrap();

    a.commit(&bg()).await.unwrap();
    b.commit(&bg()).await.unwrap();
    assert_eq!(
        ts.remote.committed_keys(),
        vec![Key::new("/a"), Key::new("/b")]
    );
}
