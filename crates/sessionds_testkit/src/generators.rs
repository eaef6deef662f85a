//! Property-based test generators using proptest.
//!
//! Provides strategies for transaction operation sequences and a reference
//! model that predicts what each operation should observe.

use crate::fixtures::MemoryTxn;
use proptest::prelude::*;
use sessionds_core::{Context, Key, Query, TxnError, TxnResult};
use std::collections::BTreeMap;

/// Strategy for keys drawn from a small space so operations collide.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    (
        prop::sample::select(vec!["users", "orders", "carts"]),
        0u8..6,
    )
        .prop_map(|(ns, id)| Key::new(format!("/{ns}/{id}")))
}

/// Strategy for values (arbitrary bytes).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// A transaction operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOperation {
    /// Put a value
    Put {
        /// Key
        key: Key,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key
    Delete {
        /// Key
        key: Key,
    },
    /// Get a value
    Get {
        /// Key
        key: Key,
    },
    /// Check existence
    Has {
        /// Key
        key: Key,
    },
    /// Get a value's size
    GetSize {
        /// Key
        key: Key,
    },
    /// Query a namespace
    Query {
        /// Prefix
        prefix: Key,
    },
}

/// What an operation observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    /// A write succeeded.
    Done,
    /// A value was read.
    Value(Vec<u8>),
    /// The key was missing.
    Missing,
    /// Existence check result.
    Exists(bool),
    /// Size of a value.
    Size(usize),
    /// Keys returned by a query.
    Keys(Vec<Key>),
}

/// Strategy for generating transaction operations.
pub fn txn_operation_strategy() -> impl Strategy<Value = TxnOperation> {
    prop_oneof![
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| TxnOperation::Put { key, value }),
        1 => key_strategy().prop_map(|key| TxnOperation::Delete { key }),
        2 => key_strategy().prop_map(|key| TxnOperation::Get { key }),
        1 => key_strategy().prop_map(|key| TxnOperation::Has { key }),
        1 => key_strategy().prop_map(|key| TxnOperation::GetSize { key }),
        1 => prop::sample::select(vec!["/users", "/orders", "/"])
            .prop_map(|prefix| TxnOperation::Query { prefix: Key::new(prefix) }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TxnOperation>> {
    prop::collection::vec(txn_operation_strategy(), min_ops..max_ops)
}

/// Runs one operation against a transaction.
pub async fn apply_operation(
    txn: &MemoryTxn,
    ctx: &Context,
    op: &TxnOperation,
) -> TxnResult<Observed> {
    let observed = match op {
        TxnOperation::Put { key, value } => {
            txn.put(ctx, key, value.clone()).await?;
            Observed::Done
        }
        TxnOperation::Delete { key } => {
            txn.delete(ctx, key).await?;
            Observed::Done
        }
        TxnOperation::Get { key } => match txn.get(ctx, key).await {
            Ok(value) => Observed::Value(value),
            Err(TxnError::NotFound(_)) => Observed::Missing,
            Err(err) => return Err(err),
        },
        TxnOperation::Has { key } => Observed::Exists(txn.has(ctx, key).await?),
        TxnOperation::GetSize { key } => match txn.get_size(ctx, key).await {
            Ok(size) => Observed::Size(size),
            Err(TxnError::NotFound(_)) => Observed::Missing,
            Err(err) => return Err(err),
        },
        TxnOperation::Query { prefix } => {
            let results = txn.query(ctx, Query::prefix(prefix.clone())).await?;
            Observed::Keys(results.keys().cloned().collect())
        }
    };
    Ok(observed)
}

/// Reference model of a single transaction's view.
#[derive(Debug, Clone, Default)]
pub struct TxnModel {
    data: BTreeMap<Key, Vec<u8>>,
}

impl TxnModel {
    /// Creates a model starting from committed data.
    #[must_use]
    pub fn new(committed: BTreeMap<Key, Vec<u8>>) -> Self {
        Self { data: committed }
    }

    /// Applies an operation and returns what it should observe.
    pub fn apply(&mut self, op: &TxnOperation) -> Observed {
        match op {
            TxnOperation::Put { key, value } => {
                self.data.insert(key.clone(), value.clone());
                Observed::Done
            }
            TxnOperation::Delete { key } => {
                self.data.remove(key);
                Observed::Done
            }
            TxnOperation::Get { key } => self
                .data
                .get(key)
                .map_or(Observed::Missing, |v| Observed::Value(v.clone())),
            TxnOperation::Has { key } => Observed::Exists(self.data.contains_key(key)),
            TxnOperation::GetSize { key } => self
                .data
                .get(key)
                .map_or(Observed::Missing, |v| Observed::Size(v.len())),
            TxnOperation::Query { prefix } => Observed::Keys(
                self.data
                    .keys()
                    .filter(|k| k.is_descendant_of(prefix))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// Returns the modeled data.
    #[must_use]
    pub fn data(&self) -> &BTreeMap<Key, Vec<u8>> {
        &self.data
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_are_two_segments(key in key_strategy()) {
            prop_assert_eq!(key.segments().count(), 2);
        }
    }

    #[test]
    fn model_tracks_read_your_writes() {
        let mut model = TxnModel::default();
        let key = Key::new("/users/1");

        assert_eq!(model.apply(&TxnOperation::Get { key: key.clone() }), Observed::Missing);
        model.apply(&TxnOperation::Put {
            key: key.clone(),
            value: vec![1, 2],
        });
        assert_eq!(
            model.apply(&TxnOperation::GetSize { key: key.clone() }),
            Observed::Size(2)
        );
        assert_eq!(
            model.apply(&TxnOperation::Query {
                prefix: Key::new("/users")
            }),
            Observed::Keys(vec![key.clone()])
        );
        model.apply(&TxnOperation::Delete { key: key.clone() });
        assert_eq!(model.apply(&TxnOperation::Has { key }), Observed::Exists(false));
    }
}
