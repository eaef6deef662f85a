//! Caller and execution contexts.
//!
//! A [`Context`] is what a caller hands to a transaction operation: an
//! optional deadline. An [`ExecContext`] is what the transaction hands to the
//! remote store: its own session plus the deadline in force for that call.

use crate::error::{RemoteError, RemoteResult};
use crate::types::SessionId;
use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Caller-supplied context for a single operation.
///
/// Cancellation beyond the deadline is expressed the usual async way: drop
/// the operation's future.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    deadline: Option<Instant>,
}

impl Context {
    /// A context without a deadline.
    #[must_use]
    pub const fn background() -> Self {
        Self { deadline: None }
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// A context that expires at `deadline`.
    #[must_use]
    pub const fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true if the deadline has already passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Derives a context bounded by both this context and `timeout` from now.
    #[must_use]
    pub fn narrowed(&self, timeout: Duration) -> Self {
        let local = Instant::now().checked_add(timeout);
        let deadline = match (self.deadline, local) {
            (Some(outer), Some(inner)) => Some(outer.min(inner)),
            (outer, inner) => outer.or(inner),
        };
        Self { deadline }
    }
}

/// Context bound into every call a transaction makes against the remote store.
///
/// Scopes the call to the transaction's session so the store applies its
/// transactional view (read-your-writes, isolation from outside writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecContext {
    session: SessionId,
    deadline: Option<Instant>,
}

impl ExecContext {
    /// Creates an execution context for `session` without a deadline.
    #[must_use]
    pub const fn new(session: SessionId) -> Self {
        Self {
            session,
            deadline: None,
        }
    }

    /// Returns the session this context is bound to.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Returns the deadline in force for the call.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Binds the deadline of a caller context.
    #[must_use]
    pub const fn bind(&self, ctx: &Context) -> Self {
        Self {
            session: self.session,
            deadline: ctx.deadline,
        }
    }
}

/// Runs a remote call, cancelling it once `deadline` passes.
pub(crate) async fn bounded<T, F>(deadline: Option<Instant>, call: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>>,
{
    match deadline {
        Some(deadline) => timeout_at(deadline, call)
            .await
            .unwrap_or(Err(RemoteError::DeadlineExceeded)),
        None => call.await,
    }
}
