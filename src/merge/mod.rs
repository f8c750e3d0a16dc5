// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The three-way merge core.
//!
//! [`ThreeWayMerger`] reconciles three independently-evolving replicas of a
//! bookmark tree — the last-common-ancestor mirror, the device's own local
//! edits, and the incoming remote batch — into one [`MergedTree`]:
//!
//! 1. **Prefetch** (optional, [`materialize_unknown`]): walk all three trees
//!    once through the node frontier, batch-fetch `Unknown` records from the
//!    buffer. The only I/O near the merge; everything after is pure.
//! 2. **Value walk** ([`value`]): per-GUID value and deletion decisions,
//!    each GUID resolved exactly once.
//! 3. **Structure walk** ([`structure`]): child lists, placements, orphan
//!    reparenting.
//! 4. **Verification**: every reachable node fully decided, tombstone
//!    exclusivity, single-rootedness. Violations abort the merge; no
//!    partial output is ever returned.
//!
//! The merger and its [`MergedTree`] are exclusively owned by one merge
//! invocation; no two merges for the same collection may run concurrently.

mod state;
mod structure;
mod value;

pub use state::{MergeState, MergedTree, MergedTreeNode, ValueConflict};

use crate::config::MergeConfig;
use crate::error::{ConsistencyError, MergeError, Result};
use crate::frontier;
use crate::guid::Guid;
use crate::metrics;
use crate::store::ItemSource;
use crate::tree::{BookmarkTree, BookmarkTreeNode};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

/// A single merge invocation over three replica trees.
pub struct ThreeWayMerger<'t> {
    mirror: &'t BookmarkTree,
    local: &'t BookmarkTree,
    remote: &'t BookmarkTree,
    config: MergeConfig,
}

impl<'t> ThreeWayMerger<'t> {
    pub fn new(
        mirror: &'t BookmarkTree,
        local: &'t BookmarkTree,
        remote: &'t BookmarkTree,
        config: MergeConfig,
    ) -> Self {
        Self {
            mirror,
            local,
            remote,
            config,
        }
    }

    /// Run the merge: pure computation over already-fetched trees, no I/O,
    /// no suspension.
    pub fn merge(&self) -> Result<MergedTree> {
        let started = Instant::now();
        match self.merge_inner(started) {
            Ok(tree) => Ok(tree),
            Err(err) => {
                metrics::record_merge_failure(err.kind());
                Err(err.into())
            }
        }
    }

    fn merge_inner(
        &self,
        started: Instant,
    ) -> std::result::Result<MergedTree, ConsistencyError> {
        let root_guid = self.mirror.root();
        let mirror_root =
            self.mirror
                .node(root_guid)
                .ok_or_else(|| ConsistencyError::MissingValue {
                    guid: root_guid.clone(),
                })?;
        let mut tree = MergedTree::new(mirror_root, self.mirror.value(root_guid).cloned());

        self.walk_values(&mut tree)?;
        let orphans = self.collect_orphans(&tree);
        self.walk_structure(&mut tree, &orphans)?;
        tree.verify()?;

        let elapsed = started.elapsed();
        info!(
            nodes = tree.len(),
            deleted = tree.deleted().len(),
            conflicts = tree.conflicts().len(),
            examined = tree.examined_buffer().len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "merge complete"
        );
        metrics::record_merge(
            elapsed,
            tree.len(),
            tree.deleted().len(),
            tree.conflicts().len(),
        );
        Ok(tree)
    }
}

/// Batch-fetch the records behind `Unknown` nodes and materialize them into
/// their trees. Returns how many nodes were upgraded.
///
/// The node frontier dedupes visitation across all three trees, so a GUID
/// present in several replicas is considered once. GUIDs the buffer has no
/// record for stay `Unknown`; the merge then treats that replica as having
/// no value opinion.
pub async fn materialize_unknown(
    mirror: &mut BookmarkTree,
    local: &mut BookmarkTree,
    remote: &mut BookmarkTree,
    source: &dyn ItemSource,
) -> Result<usize> {
    let pending: Vec<Guid> = {
        let trees = [&*mirror, &*local, &*remote];
        let mut frontier = frontier::node_frontier();
        for tree in trees {
            if let Some(root) = tree.node(tree.root()) {
                frontier.push(root);
            }
        }
        let mut unknown: BTreeSet<Guid> = BTreeSet::new();
        while let Some(node) = frontier.pop() {
            let guid = node.guid();
            let unfetched = trees
                .iter()
                .any(|t| t.node(guid).is_some_and(BookmarkTreeNode::is_unknown));
            let valueless = trees.iter().all(|t| t.value(guid).is_none());
            if unfetched && valueless {
                unknown.insert(guid.clone());
            }
            for tree in trees {
                if let Some(children) = tree.children_of(guid) {
                    for child in children {
                        if let Some(n) = tree.node(child) {
                            frontier.push(n);
                        }
                    }
                }
            }
        }
        unknown.into_iter().collect()
    };

    if pending.is_empty() {
        return Ok(0);
    }
    let fetched = source
        .get_buffer_items(&pending)
        .await
        .map_err(MergeError::ItemFetch)?;
    debug!(
        requested = pending.len(),
        fetched = fetched.len(),
        "materialized unknown nodes from buffer"
    );
    let mut upgraded = 0;
    for item in fetched.into_values() {
        for tree in [&mut *mirror, &mut *local, &mut *remote] {
            if tree.materialize(item.clone()) {
                upgraded += 1;
            }
        }
    }
    Ok(upgraded)
}

/// Prefetch unknown records, then merge.
pub async fn merge_with_source(
    mirror: &mut BookmarkTree,
    local: &mut BookmarkTree,
    remote: &mut BookmarkTree,
    config: MergeConfig,
    source: &dyn ItemSource,
) -> Result<MergedTree> {
    materialize_unknown(mirror, local, remote, source).await?;
    ThreeWayMerger::new(mirror, local, remote, config).merge()
}
