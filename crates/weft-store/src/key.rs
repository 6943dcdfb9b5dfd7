//! Hierarchical datastore keys
//!
//! Keys are `/`-separated paths such as `/db/<id>/doc/<collection>/<doc>`.
//! Ordering is plain string ordering, so all descendants of a key form one
//! contiguous range.

use crate::{Result, StoreError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A normalized `/a/b/c` path
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Build a key from a path, dropping empty segments.
    ///
    /// `"a//b/"` and `"/a/b"` both become `/a/b`.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut out = String::new();
        for segment in path.as_ref().split('/').filter(|s| !s.is_empty()) {
            out.push('/');
            out.push_str(segment);
        }
        if out.is_empty() {
            out.push('/');
        }
        Self(out)
    }

    /// The root key `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Build a key from individual segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        segments
            .into_iter()
            .fold(Self::root(), |key, segment| key.child(segment))
    }

    /// Append a path below this key
    pub fn child(&self, path: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.0, path.as_ref()))
    }

    /// Whether this is the root key
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last segment (empty for the root)
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Parent key (the root is its own parent)
    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self::root(),
            Some(pos) => Self(self.0[..pos].to_string()),
        }
    }

    /// Path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Whether `other` lies strictly below this key
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.descendant_prefix())
    }

    /// Wrap a string that is known to be a valid range bound
    pub(crate) fn unchecked(raw: String) -> Self {
        Self(raw)
    }

    /// String every descendant starts with
    pub(crate) fn descendant_prefix(&self) -> String {
        if self.is_root() {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    /// Get the path string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0)
    }
}

/// Strict parse: the string must already be in normalized form
impl FromStr for Key {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        let key = Key::new(s);
        if key.0 != s {
            return Err(StoreError::InvalidKey(s.to_string()));
        }
        Ok(key)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::new(s)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/a/b", "/a/b")]
    #[case("a/b", "/a/b")]
    #[case("//a//b/", "/a/b")]
    #[case("", "/")]
    #[case("/", "/")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Key::new(input).as_str(), expected);
    }

    #[test]
    fn test_child_and_parent() {
        let db = Key::new("/db/abc");
        let meta = db.child("meta");

        assert_eq!(meta.as_str(), "/db/abc/meta");
        assert_eq!(meta.name(), "meta");
        assert_eq!(meta.parent(), db);
        assert_eq!(Key::new("/db").parent(), Key::root());
        assert_eq!(Key::root().parent(), Key::root());
        assert_eq!(Key::root().name(), "");
    }

    #[test]
    fn test_from_segments() {
        let key = Key::from_segments(["db", "x", "doc"]);
        assert_eq!(key.as_str(), "/db/x/doc");
        assert_eq!(key.segments().collect::<Vec<_>>(), vec!["db", "x", "doc"]);
    }

    #[test]
    fn test_ancestry() {
        let db = Key::new("/db/a");

        assert!(db.is_ancestor_of(&Key::new("/db/a/meta")));
        assert!(!db.is_ancestor_of(&db));
        assert!(!db.is_ancestor_of(&Key::new("/db/ab")));
        assert!(Key::root().is_ancestor_of(&db));
    }

    #[test]
    fn test_strict_parse() {
        assert_eq!("/a/b".parse::<Key>().unwrap(), Key::new("/a/b"));
        assert!(matches!("a/b".parse::<Key>(), Err(StoreError::InvalidKey(_))));
        assert!("/a//b".parse::<Key>().is_err());
    }
}
