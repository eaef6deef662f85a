//! Hierarchical datastore keys.

use std::fmt;

/// A hierarchical key such as `/users/alice/profile`.
///
/// Keys are normalized on construction: always rooted, no empty segments
/// and no trailing slash. The root key is `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    /// Creates a normalized key from a path-like string.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut key = String::with_capacity(raw.as_ref().len() + 1);
        for segment in raw.as_ref().split('/').filter(|s| !s.is_empty()) {
            key.push('/');
            key.push_str(segment);
        }
        if key.is_empty() {
            key.push('/');
        }
        Self(key)
    }

    /// Returns the root key `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the root key.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Appends a child segment (or path) to this key.
    #[must_use]
    pub fn child(&self, name: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.0, name.as_ref()))
    }

    /// Returns the parent key. The parent of the root is the root.
    #[must_use]
    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(idx) => Self(self.0[..idx].to_string()),
        }
    }

    /// Returns the last segment, or an empty string for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Returns the segments of the key.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Returns true if `self` lies strictly below `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Key) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }
}

impl Default for Key {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_slashes() {
        assert_eq!(Key::new("a/b").as_str(), "/a/b");
        assert_eq!(Key::new("//a//b/").as_str(), "/a/b");
        assert_eq!(Key::new("").as_str(), "/");
        assert!(Key::new("///").is_root());
    }

    #[test]
    fn parent_child_and_name() {
        let key = Key::new("/users/alice");
        assert_eq!(key.name(), "alice");
        assert_eq!(key.parent(), Key::new("/users"));
        assert_eq!(key.parent().parent(), Key::root());
        assert_eq!(Key::root().parent(), Key::root());
        assert_eq!(Key::new("/users").child("bob/settings"), Key::new("/users/bob/settings"));
        assert_eq!(Key::root().name(), "");
    }

    #[test]
    fn descendants() {
        let users = Key::new("/users");
        assert!(Key::new("/users/alice").is_descendant_of(&users));
        assert!(!Key::new("/users").is_descendant_of(&users));
        assert!(!Key::new("/usersx/alice").is_descendant_of(&users));
        assert!(Key::new("/a").is_descendant_of(&Key::root()));
        assert!(!Key::root().is_descendant_of(&Key::root()));
    }

    #[test]
    fn segments() {
        let key = Key::new("/a/b/c");
        let segments: Vec<_> = key.segments().collect();
        assert_eq!(segments, vec!["a", "b", "c"]);
        assert_eq!(Key::root().segments().count(), 0);
    }
}
