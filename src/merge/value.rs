// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Value and deletion resolution (phase 1 of the merge walk).
//!
//! Driven by the once-only GUID frontier, so each GUID is resolved exactly
//! once even when it is reachable through more than one replica. The frontier
//! is seeded with all three roots and fed the *union* of every replica's
//! children for each popped GUID: a node that one replica deleted must still
//! be value-resolved, because its children may survive as orphans.
//!
//! Per GUID:
//!
//! 1. Deletion rule. A tombstone wins unless the other replica's edit is
//!    causally newer (and the undelete policy allows it). Tombstones for the
//!    root are ignored.
//! 2. Value rule. One replica changed relative to mirror: that replica wins.
//!    Neither: unchanged. Both, identically: remote. Both, differently:
//!    remote wins by policy and the losing local edit is recorded as a
//!    [`ValueConflict`] — never silently dropped. A record with no mirror
//!    counterpart is synthesized (`New`).

use super::state::{MergeState, MergedTree, MergedTreeNode, ValueConflict};
use super::ThreeWayMerger;
use crate::error::ConsistencyError;
use crate::frontier;
use crate::guid::Guid;
use crate::item::Timestamp;
use crate::tree::BookmarkTree;
use tracing::{debug, warn};

/// Outcome of resolving one GUID.
pub(super) enum NodeDecision {
    Keep {
        node: MergedTreeNode,
        conflict: Option<ValueConflict>,
    },
    Delete {
        locally: bool,
        remotely: bool,
    },
}

impl<'t> ThreeWayMerger<'t> {
    pub(super) fn walk_values(&self, tree: &mut MergedTree) -> Result<(), ConsistencyError> {
        let mut frontier = frontier::guid_frontier();
        frontier.push(self.mirror.root().clone());
        frontier.push(self.local.root().clone());
        frontier.push(self.remote.root().clone());

        while let Some(guid) = frontier.pop() {
            if self.remote_contributed(&guid) {
                tree.note_examined(guid.clone());
            }
            match self.resolve_node(&guid)? {
                NodeDecision::Delete { locally, remotely } => {
                    debug!(guid = %guid, locally, remotely, "deletion wins");
                    tree.mark_deleted(guid.clone(), locally, remotely);
                }
                NodeDecision::Keep { node, conflict } => {
                    if let Some(conflict) = conflict {
                        warn!(
                            guid = %guid,
                            local_title = %conflict.local.title,
                            remote_title = %conflict.remote.title,
                            "value conflict: remote wins, local edit retained"
                        );
                        tree.push_conflict(conflict);
                    }
                    tree.insert(node);
                }
            }
            // Union of children across all replicas; the frontier refuses
            // anything already scheduled or processed.
            for replica in [self.mirror, self.local, self.remote] {
                if let Some(children) = replica.children_of(&guid) {
                    for child in children {
                        frontier.push(child.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_node(&self, guid: &Guid) -> Result<NodeDecision, ConsistencyError> {
        let mirror_node = self.mirror.node(guid).cloned();
        let local_node = self.local.node(guid).cloned();
        let remote_node = self.remote.node(guid).cloned();

        let is_root = guid == self.mirror.root();
        let local_del = self.local.deleted_at(guid);
        let remote_del = self.remote.deleted_at(guid);

        let (mut local_deleted, mut remote_deleted) = (local_del.is_some(), remote_del.is_some());
        if is_root && (local_deleted || remote_deleted) {
            warn!(guid = %guid, "ignoring tombstone for the root");
            local_deleted = false;
            remote_deleted = false;
        }

        match (local_deleted, remote_deleted) {
            (true, true) => {
                return Ok(NodeDecision::Delete {
                    locally: true,
                    remotely: true,
                })
            }
            (true, false) => {
                if !self.undeletes(self.remote, guid, local_del.unwrap_or(0)) {
                    return Ok(NodeDecision::Delete {
                        locally: true,
                        remotely: false,
                    });
                }
                debug!(guid = %guid, "remote edit is newer than local deletion; undeleting");
            }
            (false, true) => {
                if !self.undeletes(self.local, guid, remote_del.unwrap_or(0)) {
                    return Ok(NodeDecision::Delete {
                        locally: false,
                        remotely: true,
                    });
                }
                debug!(guid = %guid, "local edit is newer than remote deletion; undeleting");
            }
            (false, false) => {}
        }

        // A replica that tombstoned the record has no value opinion; its
        // tombstone already lost above.
        let mirror_value = self.mirror.value(guid);
        let local_value = if local_del.is_some() {
            None
        } else {
            self.local.value(guid)
        };
        let remote_value = if remote_del.is_some() {
            None
        } else {
            self.remote.value(guid)
        };

        let local_changed = match (local_value, mirror_value) {
            (Some(l), Some(m)) => !l.same_contents(m),
            (Some(_), None) => true,
            (None, _) => false,
        };
        let remote_changed = match (remote_value, mirror_value) {
            (Some(r), Some(m)) => !r.same_contents(m),
            (Some(_), None) => true,
            (None, _) => false,
        };

        let (value_state, item, conflict) = match (local_changed, remote_changed) {
            (false, false) => match mirror_value {
                Some(m) => (MergeState::Unchanged, Some(m.clone()), None),
                // Existence known somewhere, content available nowhere.
                None => return Err(ConsistencyError::MissingValue { guid: guid.clone() }),
            },
            (true, false) => match (local_value, mirror_value) {
                (Some(l), Some(_)) => (MergeState::Local, Some(l.clone()), None),
                (Some(l), None) => (MergeState::New(l.clone()), Some(l.clone()), None),
                (None, _) => return Err(ConsistencyError::MissingValue { guid: guid.clone() }),
            },
            (false, true) => match (remote_value, mirror_value) {
                (Some(r), Some(_)) => (MergeState::Remote, Some(r.clone()), None),
                (Some(r), None) => (MergeState::New(r.clone()), Some(r.clone()), None),
                (None, _) => return Err(ConsistencyError::MissingValue { guid: guid.clone() }),
            },
            (true, true) => match (local_value, remote_value) {
                (Some(l), Some(r)) => {
                    let conflict = if l.same_contents(r) {
                        None
                    } else {
                        Some(ValueConflict {
                            guid: guid.clone(),
                            mirror: mirror_value.cloned(),
                            local: l.clone(),
                            remote: r.clone(),
                        })
                    };
                    let state = if mirror_value.is_some() {
                        MergeState::Remote
                    } else {
                        MergeState::New(r.clone())
                    };
                    (state, Some(r.clone()), conflict)
                }
                _ => return Err(ConsistencyError::MissingValue { guid: guid.clone() }),
            },
        };

        let mut node = MergedTreeNode::new(guid.clone(), mirror_node);
        node.local = local_node;
        node.remote = remote_node;
        node.value_state = value_state;
        node.item = item;
        Ok(NodeDecision::Keep { node, conflict })
    }

    /// Did the incoming batch contribute a record for `guid`?
    ///
    /// The remote tree is the mirror overlaid with the buffered batch, so a
    /// record counts as contributed only when the remote view differs from
    /// the mirror's: a tombstone, a GUID the mirror has never seen, a
    /// changed child list, or a changed value. An unchanged remote
    /// contributes nothing, and the buffer completion op stays empty.
    fn remote_contributed(&self, guid: &Guid) -> bool {
        if self.remote.is_deleted(guid) {
            return true;
        }
        let Some(remote_node) = self.remote.node(guid) else {
            return false;
        };
        let Some(mirror_node) = self.mirror.node(guid) else {
            return true;
        };
        if remote_node.children() != mirror_node.children() {
            return true;
        }
        match (self.remote.value(guid), self.mirror.value(guid)) {
            (Some(r), Some(m)) => !r.same_contents(m),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Does `editor`'s version of `guid` revive it against a deletion
    /// stamped at `deleted_at`?
    fn undeletes(&self, editor: &BookmarkTree, guid: &Guid, deleted_at: Timestamp) -> bool {
        if !self.config.undelete_on_newer_edit {
            return false;
        }
        let Some(value) = editor.value(guid) else {
            return false;
        };
        let changed = match self.mirror.value(guid) {
            Some(mirror) => !value.same_contents(mirror),
            None => true, // re-created from scratch
        };
        changed && value.modified > deleted_at
    }
}
