//! Record identifiers.
//!
//! A [`Guid`] is the opaque, globally-unique identifier of one bookmark
//! record. It is stable across replicas and is the join key used to line up
//! the mirror, local, and remote views of the same record during a merge.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// An opaque bookmark record identifier.
///
/// Cheap to clone, hashable, and ordered so GUID sets render
/// deterministically in errors and logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Wrap a string as a GUID.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Guid {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Guid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl Borrow<str> for Guid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_display_matches_raw() {
        let guid = Guid::from("bookmarkAAAA");
        assert_eq!(guid.to_string(), "bookmarkAAAA");
        assert_eq!(guid.as_str(), "bookmarkAAAA");
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let mut set = BTreeSet::new();
        set.insert(Guid::from("b"));
        set.insert(Guid::from("a"));
        set.insert(Guid::from("c"));
        let ordered: Vec<&str> = set.iter().map(Guid::as_str).collect();
        assert_eq!(ordered, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_serde_transparent() {
        let guid = Guid::from("menu________");
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"menu________\"");
        let parsed: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, guid);
    }

    #[test]
    fn test_borrow_str_lookup() {
        let mut set = std::collections::HashSet::new();
        set.insert(Guid::from("toolbar_____"));
        assert!(set.contains("toolbar_____"));
    }
}
