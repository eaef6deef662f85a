//! # sessionds testkit
//!
//! Test utilities for sessionds.
//!
//! This crate provides:
//! - [`MemoryRemote`], an in-memory remote document store with session
//!   overlays, fault injection and call accounting
//! - Fixtures for stores and transactions over it
//! - Property-based test generators and a reference model using proptest
//! - A concurrent finalization race harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sessionds_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn commit_publishes_writes() {
//!     let ts = TestStore::new();
//!     let txn = ts.begin().await;
//!     txn.put(&bg(), &Key::new("/a"), b"1".to_vec()).await.unwrap();
//!     txn.commit(&bg()).await.unwrap();
//!     assert_eq!(ts.remote.committed("/a"), Some(b"1".to_vec()));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
    pub use crate::stress::*;
    pub use sessionds_core::{Context, Key, Query, QueryExt, TransactionState, TxnError};
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
pub use stress::*;
