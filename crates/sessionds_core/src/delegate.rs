//! Store delegate trait definition.

use crate::context::ExecContext;
use crate::error::RemoteResult;
use crate::key::Key;
use crate::query::{QueryExt, QueryResults};
use async_trait::async_trait;

/// Key-value and query operations of the remote store.
///
/// Every operation runs "inside" the session named by its [`ExecContext`]:
/// reads see that session's uncommitted writes, writes stay invisible to
/// other sessions until commit. Byte-level encoding, network calls and query
/// planning are the implementor's concern.
///
/// # Invariants
///
/// - `get` and `get_size` report a missing key as [`crate::RemoteError::NotFound`]
/// - `delete` of a missing key is not an error
/// - delegates must be `Send + Sync`; one delegate serves every transaction
#[async_trait]
pub trait StoreDelegate: Send + Sync {
    /// Reads the value stored under `key`.
    async fn get(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<Vec<u8>>;

    /// Returns true if `key` exists.
    async fn has(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<bool>;

    /// Returns the size in bytes of the value stored under `key`.
    async fn get_size(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<usize>;

    /// Runs a query.
    async fn query(&self, ctx: &ExecContext, query: QueryExt) -> RemoteResult<QueryResults>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn put(&self, ctx: &ExecContext, key: &Key, value: Vec<u8>) -> RemoteResult<()>;

    /// Removes `key`.
    async fn delete(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<()>;
}
