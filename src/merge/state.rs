//! Merge decision state and the merged-tree container.
//!
//! Every merged node carries two independent [`MergeState`]s: one for its
//! *value* (content) and one for its *structure* (parent and position among
//! siblings). A node's content and its placement can be won by different
//! replicas, which is why the decision is tracked twice.
//!
//! A [`MergedTree`] is constructed once per sync cycle, mutated only during
//! the single merge pass, consumed immediately by completion-op synthesis,
//! and never retained across cycles.

use crate::error::ConsistencyError;
use crate::guid::Guid;
use crate::item::BookmarkItem;
use crate::tree::BookmarkTreeNode;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A tagged merge decision.
///
/// The closed sum keeps resolution logic exhaustive: adding a new source of
/// truth forces every `match` in the merger to account for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeState<T> {
    /// Not resolved yet. Surfacing in a returned tree is a defect.
    Undecided,
    /// Identical to the mirror; nothing to write anywhere.
    Unchanged,
    /// The remote replica's version wins.
    Remote,
    /// The local replica's version wins.
    Local,
    /// A value no single replica held: a brand-new record, or a synthesized
    /// amendment (spliced child list, reparented orphan).
    New(T),
}

impl<T> MergeState<T> {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Undecided)
    }

    /// Short tag for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Undecided => "undecided",
            Self::Unchanged => "unchanged",
            Self::Remote => "remote",
            Self::Local => "local",
            Self::New(_) => "new",
        }
    }
}

/// A value conflict where remote won by policy. Retained so the losing local
/// edit is never silently forgotten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueConflict {
    pub guid: Guid,
    pub mirror: Option<BookmarkItem>,
    pub local: BookmarkItem,
    pub remote: BookmarkItem,
}

/// One node of the merged tree, with provenance.
///
/// Children are referenced by GUID and resolved through the owning
/// [`MergedTree`], never embedded, so the structure stays a tree.
#[derive(Debug, Clone)]
pub struct MergedTreeNode {
    pub guid: Guid,
    /// Source nodes this decision was derived from, for explainability.
    pub mirror: Option<BookmarkTreeNode>,
    pub local: Option<BookmarkTreeNode>,
    pub remote: Option<BookmarkTreeNode>,
    /// Which replica's content wins.
    pub value_state: MergeState<BookmarkItem>,
    /// Which replica's placement/ordering wins. The `New` payload is the
    /// synthesized child list.
    pub structure_state: MergeState<Vec<Guid>>,
    /// The winning value payload.
    pub item: Option<BookmarkItem>,
    /// Resolved, ordered children in the merged tree.
    pub children: Vec<Guid>,
}

impl MergedTreeNode {
    pub fn new(guid: Guid, mirror: Option<BookmarkTreeNode>) -> Self {
        Self {
            guid,
            mirror,
            local: None,
            remote: None,
            value_state: MergeState::Undecided,
            structure_state: MergeState::Undecided,
            item: None,
            children: Vec::new(),
        }
    }

    pub fn is_fully_decided(&self) -> bool {
        self.value_state.is_decided() && self.structure_state.is_decided()
    }

    /// Whether any replica sees this node as a folder, or the merge gave it
    /// children.
    pub fn is_folder(&self) -> bool {
        !self.children.is_empty()
            || [&self.mirror, &self.local, &self.remote]
                .into_iter()
                .flatten()
                .any(BookmarkTreeNode::is_folder)
    }
}

/// The single output tree of a merge pass.
#[derive(Debug)]
pub struct MergedTree {
    root: Guid,
    nodes: HashMap<Guid, MergedTreeNode>,
    deleted: BTreeSet<Guid>,
    deleted_locally: BTreeSet<Guid>,
    deleted_remotely: BTreeSet<Guid>,
    conflicts: Vec<ValueConflict>,
    examined_buffer: BTreeSet<Guid>,
}

impl MergedTree {
    /// Start a merged tree from the mirror's root. The root begins unchanged
    /// and is re-resolved like any other node during the walk.
    pub fn new(mirror_root: &BookmarkTreeNode, root_item: Option<BookmarkItem>) -> Self {
        let guid = mirror_root.guid().clone();
        let mut root_node = MergedTreeNode::new(guid.clone(), Some(mirror_root.clone()));
        root_node.value_state = MergeState::Unchanged;
        root_node.structure_state = MergeState::Unchanged;
        root_node.item = root_item;
        let mut nodes = HashMap::new();
        nodes.insert(guid.clone(), root_node);
        Self {
            root: guid,
            nodes,
            deleted: BTreeSet::new(),
            deleted_locally: BTreeSet::new(),
            deleted_remotely: BTreeSet::new(),
            conflicts: Vec::new(),
            examined_buffer: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Guid {
        &self.root
    }

    pub fn node(&self, guid: &Guid) -> Option<&MergedTreeNode> {
        self.nodes.get(guid)
    }

    pub fn node_mut(&mut self, guid: &Guid) -> Option<&mut MergedTreeNode> {
        self.nodes.get_mut(guid)
    }

    pub fn insert(&mut self, node: MergedTreeNode) {
        self.nodes.insert(node.guid.clone(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// GUIDs of every kept node, placed or not.
    pub fn guids(&self) -> impl Iterator<Item = &Guid> {
        self.nodes.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tombstoned GUIDs.
    pub fn deleted(&self) -> &BTreeSet<Guid> {
        &self.deleted
    }

    /// Deletions the local replica originated (the remote peer must learn
    /// these as uploaded tombstones).
    pub fn deleted_locally(&self) -> &BTreeSet<Guid> {
        &self.deleted_locally
    }

    /// Deletions the remote replica originated (the local store must apply
    /// these).
    pub fn deleted_remotely(&self) -> &BTreeSet<Guid> {
        &self.deleted_remotely
    }

    /// Value conflicts where remote won.
    pub fn conflicts(&self) -> &[ValueConflict] {
        &self.conflicts
    }

    /// Every GUID the incoming batch contributed a record for (new,
    /// changed, or tombstoned relative to the mirror), regardless of
    /// merge outcome. Empty when the remote view matches the mirror.
    pub fn examined_buffer(&self) -> &BTreeSet<Guid> {
        &self.examined_buffer
    }

    pub fn mark_deleted(&mut self, guid: Guid, locally: bool, remotely: bool) {
        if locally {
            self.deleted_locally.insert(guid.clone());
        }
        if remotely {
            self.deleted_remotely.insert(guid.clone());
        }
        self.nodes.remove(&guid);
        self.deleted.insert(guid);
    }

    pub fn push_conflict(&mut self, conflict: ValueConflict) {
        self.conflicts.push(conflict);
    }

    pub fn note_examined(&mut self, guid: Guid) {
        self.examined_buffer.insert(guid);
    }

    /// Preorder walk of the reachable nodes, duplicate-safe.
    pub fn reachable(&self) -> Vec<&MergedTreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut seen: HashSet<&Guid> = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(guid) = stack.pop() {
            if !seen.insert(guid) {
                continue;
            }
            if let Some(node) = self.nodes.get(guid) {
                out.push(node);
                for child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// Check every invariant a finished merge must satisfy:
    ///
    /// - no reachable node is undecided or valueless
    /// - no GUID is both reachable and tombstoned
    /// - every reachable GUID is reachable by exactly one path
    /// - exactly one parentless node exists, and it is the root
    pub fn verify(&self) -> Result<(), ConsistencyError> {
        let mut seen: HashSet<&Guid> = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(guid) = stack.pop() {
            if !seen.insert(guid) {
                return Err(ConsistencyError::DuplicateGuid { guid: guid.clone() });
            }
            if self.deleted.contains(guid) {
                return Err(ConsistencyError::DeletedAndReachable { guid: guid.clone() });
            }
            let node = match self.nodes.get(guid) {
                Some(node) => node,
                None => return Err(ConsistencyError::MissingValue { guid: guid.clone() }),
            };
            if !node.is_fully_decided() {
                return Err(ConsistencyError::Undecided { guid: guid.clone() });
            }
            if node.item.is_none() {
                return Err(ConsistencyError::MissingValue { guid: guid.clone() });
            }
            for child in &node.children {
                stack.push(child);
            }
        }

        // Rootedness over the whole arena: anything the walk inserted but
        // never placed under a parent is a competing root candidate.
        let mut parented: HashSet<&Guid> = HashSet::new();
        for node in self.nodes.values() {
            parented.extend(node.children.iter());
        }
        let candidates: BTreeSet<Guid> = self
            .nodes
            .keys()
            .filter(|g| !parented.contains(*g))
            .cloned()
            .collect();
        if candidates.len() != 1 || !candidates.contains(&self.root) {
            return Err(ConsistencyError::TreeIsUnrooted { roots: candidates });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_node() -> BookmarkTreeNode {
        BookmarkTreeNode::Folder {
            guid: Guid::from("root"),
            children: vec![Guid::from("a")],
        }
    }

    fn decided_leaf(guid: &str) -> MergedTreeNode {
        let mut node = MergedTreeNode::new(
            Guid::from(guid),
            Some(BookmarkTreeNode::NonFolder {
                guid: Guid::from(guid),
            }),
        );
        node.value_state = MergeState::Unchanged;
        node.structure_state = MergeState::Unchanged;
        node.item = Some(BookmarkItem::bookmark(guid, guid, "https://example.com", 0));
        node
    }

    fn tree_with_leaf() -> MergedTree {
        let mut tree = MergedTree::new(&root_node(), Some(BookmarkItem::folder("root", "root", 0)));
        tree.node_mut(&Guid::from("root")).unwrap().children = vec![Guid::from("a")];
        tree.insert(decided_leaf("a"));
        tree
    }

    #[test]
    fn test_verify_accepts_decided_tree() {
        let tree = tree_with_leaf();
        assert!(tree.verify().is_ok());
        assert_eq!(tree.reachable().len(), 2);
    }

    #[test]
    fn test_verify_rejects_undecided() {
        let mut tree = tree_with_leaf();
        tree.node_mut(&Guid::from("a")).unwrap().value_state = MergeState::Undecided;
        assert_eq!(
            tree.verify(),
            Err(ConsistencyError::Undecided {
                guid: Guid::from("a")
            })
        );
    }

    #[test]
    fn test_verify_rejects_deleted_and_reachable() {
        let mut tree = tree_with_leaf();
        // Tombstone "a" without amending the root's child list.
        tree.deleted.insert(Guid::from("a"));
        assert_eq!(
            tree.verify(),
            Err(ConsistencyError::DeletedAndReachable {
                guid: Guid::from("a")
            })
        );
    }

    #[test]
    fn test_verify_rejects_second_path() {
        let mut tree = tree_with_leaf();
        tree.insert({
            let mut folder = decided_leaf("f");
            folder.children = vec![Guid::from("a")];
            folder
        });
        tree.node_mut(&Guid::from("root")).unwrap().children =
            vec![Guid::from("f"), Guid::from("a")];
        assert_eq!(
            tree.verify(),
            Err(ConsistencyError::DuplicateGuid {
                guid: Guid::from("a")
            })
        );
    }

    #[test]
    fn test_verify_rejects_unplaced_node() {
        let mut tree = tree_with_leaf();
        tree.insert(decided_leaf("stray"));
        match tree.verify() {
            Err(ConsistencyError::TreeIsUnrooted { roots }) => {
                assert!(roots.contains(&Guid::from("root")));
                assert!(roots.contains(&Guid::from("stray")));
            }
            other => panic!("expected TreeIsUnrooted, got {other:?}"),
        }
    }

    #[test]
    fn test_mark_deleted_tracks_origin() {
        let mut tree = tree_with_leaf();
        tree.node_mut(&Guid::from("root")).unwrap().children.clear();
        tree.mark_deleted(Guid::from("a"), true, false);
        assert!(tree.deleted().contains(&Guid::from("a")));
        assert!(tree.deleted_locally().contains(&Guid::from("a")));
        assert!(!tree.deleted_remotely().contains(&Guid::from("a")));
        assert!(tree.verify().is_ok());
    }

    #[test]
    fn test_merge_state_labels() {
        assert_eq!(MergeState::<()>::Undecided.label(), "undecided");
        assert_eq!(MergeState::<()>::Unchanged.label(), "unchanged");
        assert_eq!(MergeState::<()>::Remote.label(), "remote");
        assert_eq!(MergeState::<()>::Local.label(), "local");
        assert_eq!(MergeState::New(7u32).label(), "new");
        assert!(!MergeState::<()>::Undecided.is_decided());
        assert!(MergeState::<()>::Local.is_decided());
    }
}
