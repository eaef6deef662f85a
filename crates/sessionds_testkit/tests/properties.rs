//! Property tests: operation sequences inside one transaction.

use proptest::prelude::*;
use sessionds_core::Key;
use sessionds_testkit::prelude::*;
use std::collections::BTreeMap;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

fn expected_journal(ops: &[TxnOperation]) -> Vec<RemoteCall> {
    ops.iter()
        .map(|op| match op {
            TxnOperation::Put { key, .. } => RemoteCall::Put(key.clone()),
            TxnOperation::Delete { key } => RemoteCall::Delete(key.clone()),
            TxnOperation::Get { key } => RemoteCall::Get(key.clone()),
            TxnOperation::Has { key } => RemoteCall::Has(key.clone()),
            TxnOperation::GetSize { key } => RemoteCall::GetSize(key.clone()),
            TxnOperation::Query { prefix } => RemoteCall::Query(prefix.clone()),
        })
        .collect()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn operations_run_once_in_order_and_match_model(
        seed in prop::collection::btree_map(key_strategy(), value_strategy(), 0..8),
        ops in operation_sequence_strategy(1, 40),
        commit in any::<bool>(),
    ) {
        let (journal, observed, committed, expected) = runtime().block_on(async {
            let ts = TestStore::new();
            for (key, value) in &seed {
                ts.remote.seed(key.clone(), value.clone());
            }
            let mut model = TxnModel::new(seed.clone());
            let txn = ts.begin().await;

            let mut observed = Vec::new();
            let mut expected = Vec::new();
            for op in &ops {
                observed.push(apply_operation(&txn, &bg(), op).await.unwrap());
                expected.push(model.apply(op));
            }

            if commit {
                txn.commit(&bg()).await.unwrap();
            } else {
                txn.discard(&bg()).await;
            }

            let committed: BTreeMap<Key, Vec<u8>> = ts
                .remote
                .committed_keys()
                .into_iter()
                .filter_map(|k| ts.remote.committed(k.clone()).map(|v| (k, v)))
                .collect();
            let journal = ts.remote.journal(txn.id());
            let final_data = if commit { model.data().clone() } else { seed.clone() };
            (journal, (observed, expected), committed, final_data)
        });

        let (observed, model_observed) = observed;
        prop_assert_eq!(observed, model_observed);

        let store_calls: Vec<_> = journal.iter().filter(|c| c.is_store_call()).cloned().collect();
        prop_assert_eq!(store_calls, expected_journal(&ops));

        prop_assert_eq!(committed, expected);
    }

    #[test]
    fn finalized_transaction_rejects_every_operation(
        ops in operation_sequence_strategy(1, 10),
        commit in any::<bool>(),
    ) {
        let (before, after, all_rejected) = runtime().block_on(async {
            let ts = TestStore::new();
            let txn = ts.begin().await;
            if commit {
                txn.commit(&bg()).await.unwrap();
            } else {
                txn.discard(&bg()).await;
            }
            let before = ts.remote.journal(txn.id());

            let mut all_rejected = true;
            for op in &ops {
                let result = apply_operation(&txn, &bg(), op).await;
                all_rejected &= matches!(result, Err(TxnError::TxnFinalized));
            }
            (before, ts.remote.journal(txn.id()), all_rejected)
        });

        prop_assert!(all_rejected);
        prop_assert_eq!(before, after);
    }
}
