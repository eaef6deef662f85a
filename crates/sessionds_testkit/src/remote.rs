//! In-memory remote document store.
//!
//! [`MemoryRemote`] plays both collaborator roles for a
//! [`sessionds_core::SessionStore`]: it opens sessions and it serves store
//! operations scoped to them. Each session keeps an overlay of uncommitted
//! writes, so reads inside a transaction see its own writes while other
//! sessions keep seeing committed data.
//!
//! It also records what happened, for assertions:
//! - [`CallStats`] counters
//! - a per-session journal of [`RemoteCall`]s, in arrival order
//! - overlapping calls on one session, which a real remote session would
//!   not tolerate

use async_trait::async_trait;
use parking_lot::Mutex;
use sessionds_core::{
    Entry, ExecContext, Key, QueryExt, QueryResults, RemoteError, RemoteResult, SessionHandle,
    SessionId, SessionProvider, StoreDelegate, TxnOptions,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A call received by the remote store, as recorded in a session journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// Transaction start.
    StartTransaction,
    /// `get` of a key.
    Get(Key),
    /// `has` of a key.
    Has(Key),
    /// `get_size` of a key.
    GetSize(Key),
    /// Query under a prefix.
    Query(Key),
    /// `put` of a key.
    Put(Key),
    /// `delete` of a key.
    Delete(Key),
    /// Commit.
    Commit,
    /// Abort.
    Abort,
    /// End of session.
    EndSession,
}

impl RemoteCall {
    /// Returns true for key-value and query calls.
    #[must_use]
    pub fn is_store_call(&self) -> bool {
        matches!(
            self,
            RemoteCall::Get(_)
                | RemoteCall::Has(_)
                | RemoteCall::GetSize(_)
                | RemoteCall::Query(_)
                | RemoteCall::Put(_)
                | RemoteCall::Delete(_)
        )
    }
}

/// Faults and latencies to inject.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Fail every session start.
    pub fail_session_start: bool,
    /// Fail every transaction start.
    pub fail_txn_start: bool,
    /// Fail the next N commits.
    pub fail_commits: u32,
    /// Fail every abort (after discarding the overlay).
    pub fail_aborts: bool,
    /// Fail every end-session (after ending the session).
    pub fail_end_session: bool,
    /// Latency of commit calls.
    pub commit_delay: Duration,
    /// Latency of abort calls.
    pub abort_delay: Duration,
    /// Latency of end-session calls.
    pub end_session_delay: Duration,
    /// Latency of store calls.
    pub op_delay: Duration,
}

/// Counters of calls received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStats {
    /// Sessions opened.
    pub sessions_started: u64,
    /// Transactions started.
    pub txns_started: u64,
    /// Commit calls received.
    pub commit_attempts: u64,
    /// Commits applied.
    pub commits: u64,
    /// Abort calls received.
    pub aborts: u64,
    /// End-session calls received.
    pub sessions_ended: u64,
    /// Store calls received.
    pub store_calls: u64,
    /// Calls that arrived while another call on the same session was running.
    pub overlap_violations: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    in_txn: bool,
    read_only: bool,
    ended: bool,
    in_flight: u32,
    overlay: BTreeMap<Key, Option<Vec<u8>>>,
    journal: Vec<RemoteCall>,
}

impl SessionState {
    fn ensure_txn(&self) -> RemoteResult<()> {
        if self.in_txn {
            Ok(())
        } else {
            Err(RemoteError::rejected("no transaction in progress"))
        }
    }

    fn ensure_writable(&self) -> RemoteResult<()> {
        self.ensure_txn()?;
        if self.read_only {
            return Err(RemoteError::rejected("write in read-only transaction"));
        }
        Ok(())
    }

    fn read<'a>(&'a self, committed: &'a BTreeMap<Key, Vec<u8>>, key: &Key) -> Option<&'a Vec<u8>> {
        match self.overlay.get(key) {
            Some(staged) => staged.as_ref(),
            None => committed.get(key),
        }
    }

    /// Committed data with this session's writes applied.
    fn view(&self, committed: &BTreeMap<Key, Vec<u8>>) -> BTreeMap<Key, Vec<u8>> {
        let mut view = committed.clone();
        for (key, staged) in &self.overlay {
            match staged {
                Some(value) => view.insert(key.clone(), value.clone()),
                None => view.remove(key),
            };
        }
        view
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    committed: BTreeMap<Key, Vec<u8>>,
    sessions: HashMap<SessionId, SessionState>,
    stats: CallStats,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<RemoteState>,
    faults: Mutex<FaultPlan>,
    next_session: AtomicU64,
}

impl Shared {
    /// Records one call on the session and tracks it as in flight.
    fn enter(self: &Arc<Self>, id: SessionId, call: RemoteCall) -> RemoteResult<Busy> {
        let mut state = self.state.lock();
        let is_store_call = call.is_store_call();
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or(RemoteError::SessionExpired(id))?;
        if session.ended {
            return Err(RemoteError::SessionExpired(id));
        }
        let overlapped = session.in_flight > 0;
        session.in_flight += 1;
        session.journal.push(call);
        if overlapped {
            state.stats.overlap_violations += 1;
            warn!(session = %id, "overlapping call on session");
        }
        if is_store_call {
            state.stats.store_calls += 1;
        }
        Ok(Busy {
            shared: Arc::clone(self),
            id,
        })
    }

    fn with_session<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut SessionState, &mut BTreeMap<Key, Vec<u8>>) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let mut state = self.state.lock();
        let RemoteState {
            committed,
            sessions,
            ..
        } = &mut *state;
        let session = sessions
            .get_mut(&id)
            .filter(|s| !s.ended)
            .ok_or(RemoteError::SessionExpired(id))?;
        f(session, committed)
    }

    fn faults(&self) -> FaultPlan {
        self.faults.lock().clone()
    }

    async fn latency(delay: Duration) {
        // Always yield so racing callers get a chance to interleave.
        tokio::task::yield_now().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Marks one call on a session as finished when dropped, even if cancelled.
struct Busy {
    shared: Arc<Shared>,
    id: SessionId,
}

impl Drop for Busy {
    fn drop(&mut self) {
        if let Some(session) = self.shared.state.lock().sessions.get_mut(&self.id) {
            session.in_flight = session.in_flight.saturating_sub(1);
        }
    }
}

/// An in-memory remote document store.
///
/// Cloning is cheap; clones share the same data.
///
/// # Example
///
/// ```rust,ignore
/// use sessionds_core::{SessionStore, StoreConfig};
/// use sessionds_testkit::MemoryRemote;
///
/// let remote = MemoryRemote::new();
/// let store = SessionStore::new(remote.clone(), remote.clone(), StoreConfig::default())?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    shared: Arc<Shared>,
}

impl MemoryRemote {
    /// Creates an empty remote store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes committed data directly, outside any session.
    pub fn seed(&self, key: impl Into<Key>, value: impl Into<Vec<u8>>) {
        self.shared
            .state
            .lock()
            .committed
            .insert(key.into(), value.into());
    }

    /// Reads committed data directly, outside any session.
    #[must_use]
    pub fn committed(&self, key: impl Into<Key>) -> Option<Vec<u8>> {
        self.shared.state.lock().committed.get(&key.into()).cloned()
    }

    /// Returns all committed keys in order.
    #[must_use]
    pub fn committed_keys(&self) -> Vec<Key> {
        self.shared.state.lock().committed.keys().cloned().collect()
    }

    /// Changes the fault plan.
    pub fn configure_faults(&self, f: impl FnOnce(&mut FaultPlan)) {
        f(&mut self.shared.faults.lock());
    }

    /// Returns a snapshot of the call counters.
    #[must_use]
    pub fn stats(&self) -> CallStats {
        self.shared.state.lock().stats.clone()
    }

    /// Returns the calls received by a session, in arrival order.
    #[must_use]
    pub fn journal(&self, id: SessionId) -> Vec<RemoteCall> {
        self.shared
            .state
            .lock()
            .sessions
            .get(&id)
            .map(|s| s.journal.clone())
            .unwrap_or_default()
    }

    /// Returns true if the session has been ended.
    #[must_use]
    pub fn is_session_ended(&self, id: SessionId) -> bool {
        self.shared
            .state
            .lock()
            .sessions
            .get(&id)
            .is_some_and(|s| s.ended)
    }

    /// Returns the number of sessions opened and not yet ended.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.shared
            .state
            .lock()
            .sessions
            .values()
            .filter(|s| !s.ended)
            .count()
    }
}

#[async_trait]
impl SessionProvider for MemoryRemote {
    type Session = MemorySession;

    async fn start_session(&self) -> RemoteResult<MemorySession> {
        Shared::latency(Duration::ZERO).await;
        if self.shared.faults().fail_session_start {
            debug!("injected session start failure");
            return Err(RemoteError::connection("server selection timeout"));
        }

        let id = SessionId::new(self.shared.next_session.fetch_add(1, Ordering::SeqCst) + 1);
        let mut state = self.shared.state.lock();
        state.sessions.insert(id, SessionState::default());
        state.stats.sessions_started += 1;

        Ok(MemorySession {
            id,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// A session opened on a [`MemoryRemote`].
#[derive(Debug)]
pub struct MemorySession {
    id: SessionId,
    shared: Arc<Shared>,
}

#[async_trait]
impl SessionHandle for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    async fn start_transaction(&mut self, options: TxnOptions) -> RemoteResult<()> {
        let _busy = self.shared.enter(self.id, RemoteCall::StartTransaction)?;
        Shared::latency(Duration::ZERO).await;
        if self.shared.faults().fail_txn_start {
            debug!(session = %self.id, "injected transaction start failure");
            return Err(RemoteError::rejected("transaction already in progress"));
        }

        self.shared.with_session(self.id, |session, _| {
            if session.in_txn {
                return Err(RemoteError::rejected("transaction already in progress"));
            }
            session.in_txn = true;
            session.read_only = options.read_only;
            session.overlay.clear();
            Ok(())
        })?;
        self.shared.state.lock().stats.txns_started += 1;
        Ok(())
    }

    async fn commit_transaction(&mut self, _ctx: &ExecContext) -> RemoteResult<()> {
        let _busy = self.shared.enter(self.id, RemoteCall::Commit)?;
        self.shared.state.lock().stats.commit_attempts += 1;
        Shared::latency(self.shared.faults().commit_delay).await;

        {
            let mut faults = self.shared.faults.lock();
            if faults.fail_commits > 0 {
                faults.fail_commits -= 1;
                let remaining = faults.fail_commits;
                debug!(session = %self.id, remaining, "injected commit failure");
                return Err(RemoteError::rejected("write conflict"));
            }
        }

        self.shared.with_session(self.id, |session, committed| {
            session.ensure_txn()?;
            for (key, staged) in std::mem::take(&mut session.overlay) {
                match staged {
                    Some(value) => committed.insert(key, value),
                    None => committed.remove(&key),
                };
            }
            session.in_txn = false;
            Ok(())
        })?;
        self.shared.state.lock().stats.commits += 1;
        Ok(())
    }

    async fn abort_transaction(&mut self, _ctx: &ExecContext) -> RemoteResult<()> {
        let _busy = self.shared.enter(self.id, RemoteCall::Abort)?;
        self.shared.state.lock().stats.aborts += 1;
        Shared::latency(self.shared.faults().abort_delay).await;

        self.shared.with_session(self.id, |session, _| {
            session.ensure_txn()?;
            session.overlay.clear();
            session.in_txn = false;
            Ok(())
        })?;
        if self.shared.faults().fail_aborts {
            debug!(session = %self.id, "injected abort failure");
            return Err(RemoteError::connection("connection reset during abort"));
        }
        Ok(())
    }

    async fn end_session(&mut self, _ctx: &ExecContext) -> RemoteResult<()> {
        let _busy = self.shared.enter(self.id, RemoteCall::EndSession)?;
        self.shared.state.lock().stats.sessions_ended += 1;
        Shared::latency(self.shared.faults().end_session_delay).await;

        self.shared.with_session(self.id, |session, _| {
            // Ending a session aborts whatever it still holds.
            session.overlay.clear();
            session.in_txn = false;
            session.ended = true;
            Ok(())
        })?;
        if self.shared.faults().fail_end_session {
            debug!(session = %self.id, "injected end-session failure");
            return Err(RemoteError::connection("connection reset during endSessions"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreDelegate for MemoryRemote {
    async fn get(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<Vec<u8>> {
        let _busy = self.shared.enter(ctx.session(), RemoteCall::Get(key.clone()))?;
        Shared::latency(self.shared.faults().op_delay).await;
        self.shared.with_session(ctx.session(), |session, committed| {
            session.ensure_txn()?;
            session
                .read(committed, key)
                .cloned()
                .ok_or(RemoteError::NotFound)
        })
    }

    async fn has(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<bool> {
        let _busy = self.shared.enter(ctx.session(), RemoteCall::Has(key.clone()))?;
        Shared::latency(self.shared.faults().op_delay).await;
        self.shared.with_session(ctx.session(), |session, committed| {
            session.ensure_txn()?;
            Ok(session.read(committed, key).is_some())
        })
    }

    async fn get_size(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<usize> {
        let _busy = self
            .shared
            .enter(ctx.session(), RemoteCall::GetSize(key.clone()))?;
        Shared::latency(self.shared.faults().op_delay).await;
        self.shared.with_session(ctx.session(), |session, committed| {
            session.ensure_txn()?;
            session
                .read(committed, key)
                .map(Vec::len)
                .ok_or(RemoteError::NotFound)
        })
    }

    async fn query(&self, ctx: &ExecContext, query: QueryExt) -> RemoteResult<QueryResults> {
        let _busy = self
            .shared
            .enter(ctx.session(), RemoteCall::Query(query.query.prefix.clone()))?;
        Shared::latency(self.shared.faults().op_delay).await;
        self.shared.with_session(ctx.session(), |session, committed| {
            session.ensure_txn()?;
            let q = &query.query;
            let entries = session
                .view(committed)
                .into_iter()
                .filter(|(key, _)| q.matches(key))
                .filter(|(key, _)| query.seek_prefix.as_ref().map_or(true, |seek| key >= seek))
                .skip(q.offset)
                .take(q.limit.unwrap_or(usize::MAX))
                .map(|(key, value)| Entry {
                    size: value.len(),
                    value: (!q.keys_only).then_some(value),
                    key,
                })
                .collect();
            Ok(QueryResults::new(entries))
        })
    }

    async fn put(&self, ctx: &ExecContext, key: &Key, value: Vec<u8>) -> RemoteResult<()> {
        let _busy = self.shared.enter(ctx.session(), RemoteCall::Put(key.clone()))?;
        Shared::latency(self.shared.faults().op_delay).await;
        self.shared.with_session(ctx.session(), |session, _| {
            session.ensure_writable()?;
            session.overlay.insert(key.clone(), Some(value));
            Ok(())
        })
    }

    async fn delete(&self, ctx: &ExecContext, key: &Key) -> RemoteResult<()> {
        let _busy = self
            .shared
            .enter(ctx.session(), RemoteCall::Delete(key.clone()))?;
        Shared::latency(self.shared.faults().op_delay).await;
        self.shared.with_session(ctx.session(), |session, _| {
            session.ensure_writable()?;
            session.overlay.insert(key.clone(), None);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open(remote: &MemoryRemote) -> (MemorySession, ExecContext) {
        let mut session = remote.start_session().await.unwrap();
        session
            .start_transaction(TxnOptions::read_write())
            .await
            .unwrap();
        let exec = ExecContext::new(session.id());
        (session, exec)
    }

    #[tokio::test]
    async fn sessions_are_isolated_until_commit() {
        let remote = MemoryRemote::new();
        let (mut writer, w) = open(&remote).await;
        let (_reader, r) = open(&remote).await;
        let key = Key::new("/a");

        remote.put(&w, &key, b"1".to_vec()).await.unwrap();
        assert_eq!(remote.get(&w, &key).await.unwrap(), b"1");
        assert_eq!(remote.get(&r, &key).await, Err(RemoteError::NotFound));
        assert_eq!(remote.committed("/a"), None);

        writer.commit_transaction(&w).await.unwrap();
        assert_eq!(remote.committed("/a"), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn abort_drops_overlay() {
        let remote = MemoryRemote::new();
        remote.seed("/a", b"old".to_vec());
        let (mut session, exec) = open(&remote).await;

        remote.delete(&exec, &Key::new("/a")).await.unwrap();
        assert!(!remote.has(&exec, &Key::new("/a")).await.unwrap());
        session.abort_transaction(&exec).await.unwrap();

        assert_eq!(remote.committed("/a"), Some(b"old".to_vec()));
    }

    #[tokio::test]
    async fn ended_session_is_expired() {
        let remote = MemoryRemote::new();
        let (mut session, exec) = open(&remote).await;

        session.end_session(&exec).await.unwrap();
        assert!(remote.is_session_ended(session.id()));
        assert_eq!(remote.live_sessions(), 0);
        assert_eq!(
            remote.get(&exec, &Key::new("/a")).await,
            Err(RemoteError::SessionExpired(session.id()))
        );
    }

    #[tokio::test]
    async fn query_applies_prefix_seek_offset_and_limit() {
        let remote = MemoryRemote::new();
        for name in ["a", "b", "c", "d"] {
            remote.seed(format!("/items/{name}"), name.as_bytes().to_vec());
        }
        remote.seed("/other/x", b"x".to_vec());
        let (_session, exec) = open(&remote).await;
        remote.delete(&exec, &Key::new("/items/c")).await.unwrap();

        let query = sessionds_core::Query::prefix("/items").with_offset(1).with_limit(2);
        let results = remote.query(&exec, query.into()).await.unwrap();
        let keys: Vec<_> = results.keys().map(Key::to_string).collect();
        assert_eq!(keys, vec!["/items/b", "/items/d"]);

        let query = QueryExt::from(sessionds_core::Query::prefix("/items").keys_only()).seek("/items/b");
        let results = remote.query(&exec, query).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|e| e.value.is_none() && e.size == 1));
    }

    #[tokio::test]
    async fn read_only_transaction_rejects_writes() {
        let remote = MemoryRemote::new();
        let mut session = remote.start_session().await.unwrap();
        session
            .start_transaction(TxnOptions::read_only())
            .await
            .unwrap();
        let exec = ExecContext::new(session.id());

        let result = remote.put(&exec, &Key::new("/a"), vec![1]).await;
        assert!(matches!(result, Err(RemoteError::Rejected(_))));
    }

    #[tokio::test]
    async fn injected_commit_failures_are_consumed() {
        crate::fixtures::init_tracing();
        let remote = MemoryRemote::new();
        remote.configure_faults(|f| f.fail_commits = 1);
        let (mut session, exec) = open(&remote).await;

        assert!(session.commit_transaction(&exec).await.is_err());
        session.commit_transaction(&exec).await.unwrap();

        let stats = remote.stats();
        assert_eq!(stats.commit_attempts, 2);
        assert_eq!(stats.commits, 1);
        assert_eq!(
            remote.journal(session.id()),
            vec![RemoteCall::StartTransaction, RemoteCall::Commit, RemoteCall::Commit]
        );
    }

    #[tokio::test]
    async fn detects_overlapping_calls() {
        let remote = MemoryRemote::new();
        remote.configure_faults(|f| f.op_delay = Duration::from_millis(20));
        let (_session, exec) = open(&remote).await;
        let key = Key::new("/a");

        let (a, b) = tokio::join!(remote.has(&exec, &key), remote.has(&exec, &key));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(remote.stats().overlap_violations, 1);
    }

    #[tokio::test]
    async fn counts_every_call_overlapping_a_running_one() {
        let remote = MemoryRemote::new();
        let (session, _exec) = open(&remote).await;
        let key = Key::new("/a");

        let first = remote.shared.enter(session.id(), RemoteCall::Get(key.clone())).unwrap();
        let second = remote.shared.enter(session.id(), RemoteCall::Has(key.clone())).unwrap();
        drop(second);
        let third = remote.shared.enter(session.id(), RemoteCall::Put(key.clone())).unwrap();
        assert_eq!(remote.stats().overlap_violations, 2);

        drop(third);
        drop(first);
        let fourth = remote.shared.enter(session.id(), RemoteCall::Delete(key)).unwrap();
        drop(fourth);
        assert_eq!(remote.stats().overlap_violations, 2);
    }
}
