// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Three-way bookmark tree merging.
//!
//! Reconciles three independently-evolving replicas of a bookmark tree —
//! the last-common-ancestor **mirror**, the device's own **local** edits,
//! and the incoming **remote** batch — into a single consistent tree, then
//! writes the outcome back through three collaborator stores:
//!
//! ```text
//!            mirror ──┐
//!            local  ──┼──▶ ThreeWayMerger ──▶ MergedTree
//!            remote ──┘         │                  │
//!                               │ verify()         │ from_merged()
//!                               ▼                  ▼
//!                        ConsistencyError   BookmarksMergeResult
//!                        (abort, no output)        │ apply()
//!                                   ┌──────────────┼──────────────┐
//!                                   ▼              ▼              ▼
//!                             BookmarkStorer  LocalBookmark   BufferStore
//!                             (upload)        Store (override) (cleanup)
//! ```
//!
//! The merge itself is pure, synchronous computation over already-fetched
//! trees; the only suspension points are the optional `Unknown`-record
//! prefetch before the merge and the sequential collaborator calls after
//! it. Every value and every placement is decided independently per GUID,
//! no edit is ever silently dropped (losing edits surface as
//! [`ValueConflict`]s, lost deletions as undeletes), and a merged tree that
//! violates any structural invariant aborts the whole cycle rather than
//! producing partial output.
//!
//! # Quick start
//!
//! ```no_run
//! use bookmark_merge::config::MergeConfig;
//! use bookmark_merge::completion::BookmarksMergeResult;
//! use bookmark_merge::merge::ThreeWayMerger;
//! use bookmark_merge::store::{NoOpBufferStore, NoOpLocalStore, NoOpStorer};
//! use bookmark_merge::tree::BookmarkTree;
//!
//! # async fn run() -> bookmark_merge::error::Result<()> {
//! let mirror = BookmarkTree::builder("root").folder("root", ["a"]).leaf("a").build()?;
//! let local = mirror.clone();
//! let remote = mirror.clone();
//!
//! let merged = ThreeWayMerger::new(&mirror, &local, &remote, MergeConfig::default()).merge()?;
//! let result = BookmarksMergeResult::from_merged(&merged, &local, Some(1234));
//! result.apply(&NoOpStorer, &NoOpLocalStore, &NoOpBufferStore).await?;
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod completion;
pub mod config;
pub mod error;
pub mod frontier;
pub mod guid;
pub mod item;
pub mod merge;
pub mod metrics;
pub mod store;
pub mod tree;

pub use apply::ApplyOutcome;
pub use completion::{BookmarksMergeResult, PerhapsNoOp};
pub use config::{MergeConfig, TieBreak};
pub use error::{ConsistencyError, MergeError, Result};
pub use guid::Guid;
pub use item::{BookmarkItem, BookmarkKind, Timestamp};
pub use merge::{MergeState, MergedTree, ThreeWayMerger, ValueConflict};
pub use tree::{BookmarkTree, BookmarkTreeNode, TreeBuilder};
