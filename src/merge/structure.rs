//! Structure resolution (phase 2 of the merge walk).
//!
//! Runs after every GUID has a value/deletion decision, so child lists can
//! be resolved with full knowledge of what survived. Walks the merged tree
//! top-down from the root; a `placed` set guarantees each node is attached
//! by exactly one path even if several replicas claim it.
//!
//! Per folder: compare mirror-vs-local and mirror-vs-remote child lists.
//! One side changed: that side wins. Both changed identically: remote. Both
//! changed differently: the configured tie-break (default: the replica that
//! also won the folder's value, else remote). Deleted children are dropped
//! from the winning list and their surviving children reparented to the
//! nearest surviving ancestor; any such amendment makes the folder's
//! structure `New` (synthesized), as does having no mirror counterpart at
//! all. Leaves inherit the placement decision of the folder that placed
//! them.

use super::state::{MergeState, MergedTree};
use super::ThreeWayMerger;
use crate::config::TieBreak;
use crate::error::ConsistencyError;
use crate::guid::Guid;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Which replica's child list won, before any synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Unchanged,
    Local,
    Remote,
}

impl<'t> ThreeWayMerger<'t> {
    /// Surviving children of each deleted folder, keyed by the nearest
    /// surviving ancestor they must be reparented under.
    pub(super) fn collect_orphans(&self, tree: &MergedTree) -> HashMap<Guid, Vec<Guid>> {
        let mut map: HashMap<Guid, Vec<Guid>> = HashMap::new();
        for deleted in tree.deleted() {
            let mut survivors: Vec<Guid> = Vec::new();
            for replica in [self.mirror, self.local, self.remote] {
                if let Some(children) = replica.children_of(deleted) {
                    for child in children {
                        if !tree.deleted().contains(child) && !survivors.contains(child) {
                            survivors.push(child.clone());
                        }
                    }
                }
            }
            if survivors.is_empty() {
                continue;
            }
            let ancestor = self.nearest_surviving_ancestor(tree, deleted);
            debug!(
                folder = %deleted,
                ancestor = %ancestor,
                orphans = survivors.len(),
                "reparenting orphans of deleted folder"
            );
            map.entry(ancestor).or_default().extend(survivors);
        }
        map
    }

    pub(super) fn walk_structure(
        &self,
        tree: &mut MergedTree,
        orphans: &HashMap<Guid, Vec<Guid>>,
    ) -> Result<(), ConsistencyError> {
        let root = tree.root().clone();
        let mut placed: HashSet<Guid> = HashSet::new();
        placed.insert(root.clone());
        self.resolve_children(tree, &root, &mut placed, orphans)?;
        self.rescue_unplaced(tree, &mut placed);
        Ok(())
    }

    /// Re-attach kept nodes no winning child list claimed.
    ///
    /// Happens when a record survives a lost deletion (the deleting
    /// replica's structure won, minus the record) or when both sides
    /// removed a child without tombstoning it. The record is appended under
    /// its nearest placed ancestor as a synthesized structural change;
    /// anything still unplaced afterwards is a genuine root candidate and
    /// fails verification.
    fn rescue_unplaced(&self, tree: &mut MergedTree, placed: &mut HashSet<Guid>) {
        loop {
            let unplaced: Vec<Guid> = tree
                .guids()
                .filter(|g| !placed.contains(*g))
                .cloned()
                .collect();
            let mut progressed = false;
            for guid in unplaced {
                let Some(ancestor) = self.nearest_placed_ancestor(tree, placed, &guid) else {
                    continue;
                };
                warn!(guid = %guid, ancestor = %ancestor, "re-attaching unplaced surviving node");
                if let Some(node) = tree.node_mut(&ancestor) {
                    node.children.push(guid.clone());
                    node.structure_state = MergeState::New(node.children.clone());
                }
                if let Some(node) = tree.node_mut(&guid) {
                    if !node.structure_state.is_decided() {
                        node.structure_state = MergeState::New(Vec::new());
                    }
                }
                placed.insert(guid);
                progressed = true;
            }
            if !progressed {
                return;
            }
        }
    }

    /// First ancestor of `guid` that survived deletion, following parent
    /// links across all three replicas. Falls back to the merged root when
    /// every ancestor is gone or unknown.
    fn nearest_surviving_ancestor(&self, tree: &MergedTree, guid: &Guid) -> Guid {
        let mut current = guid.clone();
        // Hop budget guards against pathological cross-replica chains.
        for _ in 0..=tree.len() + tree.deleted().len() {
            let Some(parent) = self
                .mirror
                .parent_of(&current)
                .or_else(|| self.local.parent_of(&current))
                .or_else(|| self.remote.parent_of(&current))
            else {
                break;
            };
            if !tree.deleted().contains(parent) {
                return parent.clone();
            }
            current = parent.clone();
        }
        tree.root().clone()
    }

    fn nearest_placed_ancestor(
        &self,
        tree: &MergedTree,
        placed: &HashSet<Guid>,
        guid: &Guid,
    ) -> Option<Guid> {
        let mut current = guid.clone();
        // Hop budget guards against pathological cross-replica chains.
        for _ in 0..=tree.len() + tree.deleted().len() {
            let parent = self
                .mirror
                .parent_of(&current)
                .or_else(|| self.local.parent_of(&current))
                .or_else(|| self.remote.parent_of(&current))?;
            if tree.deleted().contains(parent) {
                current = parent.clone();
                continue;
            }
            // An unplaced parent may get placed by a later rescue round.
            return placed.contains(parent).then(|| parent.clone());
        }
        None
    }

    fn resolve_children(
        &self,
        tree: &mut MergedTree,
        guid: &Guid,
        placed: &mut HashSet<Guid>,
        orphans: &HashMap<Guid, Vec<Guid>>,
    ) -> Result<(), ConsistencyError> {
        let (side, raw, augmented) = self.winning_children(tree, guid);
        let novel = !self.mirror.contains(guid);
        let mut resolved: Vec<Guid> = Vec::new();
        let mut amended = augmented;

        for child in raw {
            if tree.deleted().contains(&child) {
                amended = true;
                continue;
            }
            if placed.contains(&child) {
                warn!(guid = %child, "node reachable by more than one path; keeping first placement");
                amended = true;
                continue;
            }
            let Some(node) = tree.node_mut(&child) else {
                // The value walk covers the union of all replicas' children,
                // so a miss here is a stray reference.
                return Err(ConsistencyError::MissingValue { guid: child });
            };
            node.structure_state = match side {
                Side::Unchanged => MergeState::Unchanged,
                Side::Local => MergeState::Local,
                Side::Remote => MergeState::Remote,
            };
            placed.insert(child.clone());
            resolved.push(child);
        }

        if let Some(extra) = orphans.get(guid) {
            for child in extra {
                if placed.contains(child) || tree.deleted().contains(child) {
                    continue;
                }
                let Some(node) = tree.node_mut(child) else {
                    continue;
                };
                // Synthesized placement: no replica put the orphan here.
                node.structure_state = MergeState::New(Vec::new());
                placed.insert(child.clone());
                resolved.push(child.clone());
                amended = true;
            }
        }

        {
            let Some(node) = tree.node_mut(guid) else {
                return Err(ConsistencyError::MissingValue { guid: guid.clone() });
            };
            node.children = resolved.clone();
            if amended || novel {
                node.structure_state = MergeState::New(resolved.clone());
            } else {
                match side {
                    Side::Local => node.structure_state = MergeState::Local,
                    Side::Remote => node.structure_state = MergeState::Remote,
                    Side::Unchanged => {
                        // Keep the placement decision the parent assigned;
                        // the root starts out unchanged.
                        if !node.structure_state.is_decided() {
                            node.structure_state = MergeState::Unchanged;
                        }
                    }
                }
            }
        }

        for child in &resolved {
            self.resolve_children(tree, child, placed, orphans)?;
        }
        Ok(())
    }

    /// Returns the winning side, its child list, and whether the list was
    /// augmented with the losing side's novel children.
    fn winning_children(&self, tree: &MergedTree, guid: &Guid) -> (Side, Vec<Guid>, bool) {
        let mirror_c = self.mirror.children_of(guid);
        let local_c = if self.local.is_deleted(guid) {
            None
        } else {
            self.local.children_of(guid)
        };
        let remote_c = if self.remote.is_deleted(guid) {
            None
        } else {
            self.remote.children_of(guid)
        };

        let local_changed = match (local_c, mirror_c) {
            (Some(l), Some(m)) => l != m,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let remote_changed = match (remote_c, mirror_c) {
            (Some(r), Some(m)) => r != m,
            (Some(_), None) => true,
            (None, _) => false,
        };

        let to_vec = |c: Option<&[Guid]>| c.map(<[Guid]>::to_vec).unwrap_or_default();

        match (local_changed, remote_changed) {
            (false, false) => (
                Side::Unchanged,
                to_vec(mirror_c.or(local_c).or(remote_c)),
                false,
            ),
            (true, false) => (Side::Local, to_vec(local_c), false),
            (false, true) => (Side::Remote, to_vec(remote_c), false),
            (true, true) => {
                let local_list = to_vec(local_c);
                let remote_list = to_vec(remote_c);
                if local_list == remote_list {
                    // Same change on both sides; remote by convention.
                    return (Side::Remote, remote_list, false);
                }
                let prefer_local = match self.config.structure_tie_break {
                    TieBreak::Local => true,
                    TieBreak::Remote => false,
                    TieBreak::ValueWinner => matches!(
                        tree.node(guid).map(|n| &n.value_state),
                        Some(MergeState::Local)
                    ),
                };
                debug!(
                    guid = %guid,
                    policy = ?self.config.structure_tie_break,
                    winner = if prefer_local { "local" } else { "remote" },
                    "structural conflict tie-break"
                );
                let (mut winner, loser) = if prefer_local {
                    (local_list, remote_list)
                } else {
                    (remote_list, local_list)
                };
                // The loser keeps its ordering opinion but never its novel
                // children: anything it added that the mirror has never seen
                // is appended so no record is dropped.
                let mut augmented = false;
                for child in loser {
                    if !self.mirror.contains(&child) && !winner.contains(&child) {
                        winner.push(child);
                        augmented = true;
                    }
                }
                let side = if prefer_local { Side::Local } else { Side::Remote };
                (side, winner, augmented)
            }
        }
    }
}
