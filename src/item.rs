//! Bookmark value records.
//!
//! A [`BookmarkItem`] is the *value* half of a record: the content a replica
//! holds for a GUID, independent of where the record sits in the tree. The
//! merge algorithm compares items content-wise (via
//! [`BookmarkItem::same_contents`]) to decide whether a replica changed a
//! record relative to the mirror, and uses the `modified` timestamp to order
//! an edit against a competing deletion.

use crate::guid::Guid;
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch, as reported by the server or the
/// local clock. Coarse, but sufficient to order an edit against a deletion.
pub type Timestamp = u64;

/// What kind of record a value describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkKind {
    Bookmark,
    Folder,
    Separator,
    Query,
    Livemark,
}

/// One replica's value for a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkItem {
    pub guid: Guid,
    pub kind: BookmarkKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// When this replica last changed the record.
    pub modified: Timestamp,
}

impl BookmarkItem {
    /// A bookmark pointing at a URL.
    pub fn bookmark(
        guid: impl Into<Guid>,
        title: impl Into<String>,
        url: impl Into<String>,
        modified: Timestamp,
    ) -> Self {
        Self {
            guid: guid.into(),
            kind: BookmarkKind::Bookmark,
            title: title.into(),
            url: Some(url.into()),
            modified,
        }
    }

    /// A folder value. Child ordering lives in the tree, not here.
    pub fn folder(guid: impl Into<Guid>, title: impl Into<String>, modified: Timestamp) -> Self {
        Self {
            guid: guid.into(),
            kind: BookmarkKind::Folder,
            title: title.into(),
            url: None,
            modified,
        }
    }

    /// A separator. No content beyond its existence.
    pub fn separator(guid: impl Into<Guid>, modified: Timestamp) -> Self {
        Self {
            guid: guid.into(),
            kind: BookmarkKind::Separator,
            title: String::new(),
            url: None,
            modified,
        }
    }

    /// Content equality, ignoring `modified`.
    ///
    /// Two items with identical kind/title/url are the same edit even if the
    /// replicas stamped them at different times; a bare timestamp bump is not
    /// a change worth uploading.
    pub fn same_contents(&self, other: &BookmarkItem) -> bool {
        self.kind == other.kind && self.title == other.title && self.url == other.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_contents_ignores_modified() {
        let a = BookmarkItem::bookmark("guidA", "Rust", "https://rust-lang.org", 100);
        let b = BookmarkItem::bookmark("guidA", "Rust", "https://rust-lang.org", 900);
        assert!(a.same_contents(&b));
        assert_ne!(a, b); // full equality still sees the timestamp
    }

    #[test]
    fn test_same_contents_detects_title_edit() {
        let a = BookmarkItem::bookmark("guidA", "Rust", "https://rust-lang.org", 100);
        let b = BookmarkItem::bookmark("guidA", "The Rust Language", "https://rust-lang.org", 100);
        assert!(!a.same_contents(&b));
    }

    #[test]
    fn test_same_contents_detects_kind_change() {
        let folder = BookmarkItem::folder("guidF", "Stuff", 5);
        let separator = BookmarkItem::separator("guidF", 5);
        assert!(!folder.same_contents(&separator));
    }

    #[test]
    fn test_serde_round_trip() {
        let item = BookmarkItem::bookmark("guidA", "Docs", "https://docs.rs", 42);
        let json = serde_json::to_string(&item).unwrap();
        let parsed: BookmarkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_separator_has_no_url() {
        let sep = BookmarkItem::separator("sep1", 1);
        assert_eq!(sep.url, None);
        let json = serde_json::to_string(&sep).unwrap();
        assert!(!json.contains("url"));
    }
}
