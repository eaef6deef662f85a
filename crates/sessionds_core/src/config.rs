//! Store configuration.

use crate::error::{TxnError, TxnResult};
use std::time::Duration;

/// Default bound on commit and abort calls.
pub const DEFAULT_TXN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on session bookkeeping calls.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`crate::SessionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Bound on remote commit and abort calls.
    pub txn_timeout: Duration,

    /// Bound on remote end-session calls. Must not exceed `txn_timeout`.
    pub op_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            txn_timeout: DEFAULT_TXN_TIMEOUT,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transaction timeout.
    #[must_use]
    pub const fn txn_timeout(mut self, timeout: Duration) -> Self {
        self.txn_timeout = timeout;
        self
    }

    /// Sets the operation timeout.
    #[must_use]
    pub const fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    /// Checks that the timeouts are usable.
    ///
    /// # Errors
    ///
    /// Returns [`TxnError::InvalidConfig`] if either timeout is zero or the
    /// operation timeout is longer than the transaction timeout.
    pub fn validate(&self) -> TxnResult<()> {
        if self.txn_timeout.is_zero() {
            return Err(TxnError::invalid_config("txn_timeout must be non-zero"));
        }
        if self.op_timeout.is_zero() {
            return Err(TxnError::invalid_config("op_timeout must be non-zero"));
        }
        if self.op_timeout > self.txn_timeout {
            return Err(TxnError::invalid_config(format!(
                "op_timeout ({:?}) exceeds txn_timeout ({:?})",
                self.op_timeout, self.txn_timeout
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.txn_timeout, DEFAULT_TXN_TIMEOUT);
        assert_eq!(config.op_timeout, DEFAULT_OP_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .txn_timeout(Duration::from_secs(30))
            .op_timeout(Duration::from_secs(1));

        assert_eq!(config.txn_timeout, Duration::from_secs(30));
        assert_eq!(config.op_timeout, Duration::from_secs(1));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let config = StoreConfig::new().txn_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(TxnError::InvalidConfig(_))));

        let config = StoreConfig::new().op_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(TxnError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_op_timeout_longer_than_txn_timeout() {
        let config = StoreConfig::new()
            .txn_timeout(Duration::from_secs(1))
            .op_timeout(Duration::from_secs(2));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
