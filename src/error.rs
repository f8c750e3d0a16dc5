// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the merge engine.
//!
//! Two layers:
//!
//! | Error | Fatal to the merge | Description |
//! |-------|--------------------|-------------|
//! | `Consistency` | Yes | A structural invariant was violated; the merge aborts, no partial output |
//! | `Upstream` | Yes (this cycle) | The remote-write collaborator failed, including precondition conflicts |
//! | `LocalStore` | Yes (this cycle) | The local overlay store failed |
//! | `Buffer` | Yes (this cycle) | The buffer store failed |
//! | `ItemFetch` | Yes (this cycle) | Fetching buffered records for Unknown nodes failed |
//!
//! Collaborator failures are opaque: the core never retries them.
//! Retry/backoff belongs to the transport layer. A failed merge leaves the
//! replicas as they were, except for collaborator steps that had already
//! committed; the next sync cycle's mirror comparison re-derives whatever is
//! still needed.

use crate::guid::Guid;
use crate::store::StoreError;
use std::collections::BTreeSet;
use thiserror::Error;

/// Result type alias for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Errors surfaced by a merge invocation.
#[derive(Error, Debug)]
pub enum MergeError {
    /// A structural invariant of the trees was violated.
    ///
    /// The algorithm does not attempt partial or best-effort merges once an
    /// invariant is broken; it aborts and reports upward.
    #[error("merge consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    /// The remote-write collaborator rejected or failed the upload.
    ///
    /// Includes optimistic-concurrency conflicts: the server state moved
    /// past `if_unmodified_since`.
    #[error("upstream write failed: {0}")]
    Upstream(StoreError),

    /// The local overlay store failed to persist the merge outcome.
    #[error("local override failed: {0}")]
    LocalStore(StoreError),

    /// The buffer store failed to mark records consumed.
    #[error("buffer completion failed: {0}")]
    Buffer(StoreError),

    /// Fetching buffered records for `Unknown` nodes failed.
    #[error("buffer item fetch failed: {0}")]
    ItemFetch(StoreError),
}

impl MergeError {
    /// Whether this error is a violation of a structural invariant, as
    /// opposed to an opaque collaborator failure.
    pub fn is_consistency(&self) -> bool {
        matches!(self, Self::Consistency(_))
    }
}

impl ConsistencyError {
    /// Stable short tag for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TreeIsUnrooted { .. } => "unrooted",
            Self::DuplicateGuid { .. } => "duplicate_guid",
            Self::CycleDetected { .. } => "cycle",
            Self::MissingValue { .. } => "missing_value",
            Self::Undecided { .. } => "undecided",
            Self::DeletedAndReachable { .. } => "deleted_and_reachable",
        }
    }
}

/// Violations of the structural invariants the merge relies on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    /// The reachable set has a number of parentless candidates other than
    /// exactly one. Carries every offending candidate GUID.
    #[error("tree is unrooted: root candidates are {roots:?}")]
    TreeIsUnrooted { roots: BTreeSet<Guid> },

    /// A GUID was described twice, or claimed as a child by two folders.
    #[error("duplicate GUID {guid}")]
    DuplicateGuid { guid: Guid },

    /// Following parent links revisited a node.
    #[error("cycle detected through {guid}")]
    CycleDetected { guid: Guid },

    /// A reachable node has no value in any replica and could not be
    /// fetched.
    #[error("no value available for reachable node {guid}")]
    MissingValue { guid: Guid },

    /// A node surfaced from the merge with an undecided value or structure
    /// state. This is a defect in the walk, never a valid output.
    #[error("node {guid} left undecided after merge")]
    Undecided { guid: Guid },

    /// A GUID is simultaneously reachable from the merged root and present
    /// in the tombstone set.
    #[error("GUID {guid} is both reachable and tombstoned")]
    DeletedAndReachable { guid: Guid },
}
