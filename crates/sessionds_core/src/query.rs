//! Query value types.
//!
//! The core forwards queries untouched; how they are planned and evaluated
//! is the remote store's business.

use crate::key::Key;

/// A key-range query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Only keys below this prefix are returned. The root matches everything.
    pub prefix: Key,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
    /// Number of matching entries to skip.
    pub offset: usize,
    /// Return keys and sizes without values.
    pub keys_only: bool,
}

impl Query {
    /// Creates a query matching every key.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Creates a query for keys below `prefix`.
    pub fn prefix(prefix: impl Into<Key>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Sets the result limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the result offset.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Requests keys only.
    #[must_use]
    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Returns true if `key` falls under this query's prefix.
    #[must_use]
    pub fn matches(&self, key: &Key) -> bool {
        key.is_descendant_of(&self.prefix)
    }
}

/// A query with store-specific extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryExt {
    /// The base query.
    pub query: Query,
    /// Start iteration at the first key greater than or equal to this one.
    pub seek_prefix: Option<Key>,
}

impl QueryExt {
    /// Sets the seek position.
    pub fn seek(mut self, key: impl Into<Key>) -> Self {
        self.seek_prefix = Some(key.into());
        self
    }
}

impl From<Query> for QueryExt {
    fn from(query: Query) -> Self {
        Self {
            query,
            seek_prefix: None,
        }
    }
}

/// A single query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry's key.
    pub key: Key,
    /// The value, absent for keys-only queries.
    pub value: Option<Vec<u8>>,
    /// Size of the stored value in bytes.
    pub size: usize,
}

/// Ordered results of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResults {
    entries: Vec<Entry>,
}

impl QueryResults {
    /// Wraps already ordered entries.
    #[must_use]
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Returns the keys in result order.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Consumes the results.
    #[must_use]
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl IntoIterator for QueryResults {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
