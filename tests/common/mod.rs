//! Shared test utilities for the integration tests.
//!
//! This module provides:
//! - Mock collaborator stores that record every call
//! - A shared call log for asserting cross-collaborator ordering
//! - Small tree-building helpers

pub mod mock_stores;

pub use mock_stores::*;

use bookmark_merge::guid::Guid;
use bookmark_merge::tree::BookmarkTree;

pub fn guid(s: &str) -> Guid {
    Guid::from(s)
}

/// The shared starting shape: root holding folderA (with bmk2) and bmk1.
#[allow(dead_code)]
pub fn base_tree() -> BookmarkTree {
    BookmarkTree::builder("root")
        .folder("root", ["folderA", "bmk1"])
        .folder("folderA", ["bmk2"])
        .leaf("bmk1")
        .leaf("bmk2")
        .build()
        .unwrap()
}
