//! # sessionds core
//!
//! Serialized transactional sessions over a remote document store.
//!
//! The remote store exposes sessions that host one transaction each and are
//! not safe for concurrent use. This crate wraps such a session in a
//! [`Transaction`] that:
//! - serializes every operation against the session behind one async mutex
//! - bounds commit and abort by a transaction timeout, and session shutdown
//!   by a shorter operation timeout
//! - finalizes exactly once, by a successful commit or by discard
//! - rejects every operation after finalization without a remote call
//!
//! ## Collaborators
//!
//! The remote store is consumed through two seams:
//! - [`SessionProvider`] / [`SessionHandle`] open sessions and start, commit,
//!   abort and end their transactions
//! - [`StoreDelegate`] runs get/has/get_size/query/put/delete inside the
//!   session named by an [`ExecContext`]
//!
//! ## Error policy
//!
//! Failures that change transaction state (session start, transaction start,
//! commit, store operations) are returned. Failures on cleanup paths (abort,
//! end-session) are logged with `tracing` and swallowed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(not(test), warn(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod config;
mod context;
mod delegate;
mod error;
mod key;
mod query;
mod session;
mod store;
mod transaction;
mod types;

pub use config::{StoreConfig, DEFAULT_OP_TIMEOUT, DEFAULT_TXN_TIMEOUT};
pub use context::{Context, ExecContext};
pub use delegate::StoreDelegate;
pub use error::{RemoteError, RemoteResult, StoreOp, TxnError, TxnResult};
pub use key::Key;
pub use query::{Entry, Query, QueryExt, QueryResults};
pub use session::{SessionHandle, SessionProvider};
pub use store::{SessionStore, StoreTransaction};
pub use transaction::{Transaction, TransactionState};
pub use types::{SessionId, TxnOptions};
