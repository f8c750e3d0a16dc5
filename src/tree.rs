// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-replica bookmark trees.
//!
//! Each of the three replicas involved in a merge — mirror, local, remote —
//! is represented as one [`BookmarkTree`]: a single rooted tree of
//! [`BookmarkTreeNode`]s plus the value each node carries and the tombstones
//! the replica holds. Folders own their children's *order*, never the
//! children's content.
//!
//! Trees are built through [`TreeBuilder`], which validates the structural
//! invariants up front so the merge algorithm can assume well-formed input:
//!
//! | Invariant | Violation |
//! |-----------|-----------|
//! | No GUID appears twice | [`ConsistencyError::DuplicateGuid`] |
//! | Exactly one parentless node, the declared root | [`ConsistencyError::TreeIsUnrooted`] |
//! | The root is nobody's child | [`ConsistencyError::CycleDetected`] |
//!
//! A child referenced by a folder but never described becomes an
//! [`Unknown`](BookmarkTreeNode::Unknown) leaf: its existence is known, its
//! content has not been fetched yet. [`BookmarkTree::materialize`] upgrades
//! such a node once its record arrives from the buffer.

use crate::error::ConsistencyError;
use crate::guid::Guid;
use crate::item::{BookmarkItem, BookmarkKind, Timestamp};
use std::collections::{BTreeSet, HashMap};

/// A node in exactly one replica's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookmarkTreeNode {
    /// A folder and the order of its children. The folder owns the order,
    /// not the children's content.
    Folder { guid: Guid, children: Vec<Guid> },
    /// A leaf record (bookmark, separator, query, ...).
    NonFolder { guid: Guid },
    /// A tombstone: the replica knows this record was deleted.
    Deleted { guid: Guid },
    /// Existence known, content not yet fetched.
    Unknown { guid: Guid },
}

impl BookmarkTreeNode {
    pub fn guid(&self) -> &Guid {
        match self {
            Self::Folder { guid, .. }
            | Self::NonFolder { guid }
            | Self::Deleted { guid }
            | Self::Unknown { guid } => guid,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// The ordered children, for folders.
    pub fn children(&self) -> Option<&[Guid]> {
        match self {
            Self::Folder { children, .. } => Some(children),
            _ => None,
        }
    }
}

/// One replica's complete view: a rooted tree, values, and tombstones.
#[derive(Debug, Clone)]
pub struct BookmarkTree {
    root: Guid,
    nodes: HashMap<Guid, BookmarkTreeNode>,
    values: HashMap<Guid, BookmarkItem>,
    deletions: HashMap<Guid, Timestamp>,
    parents: HashMap<Guid, Guid>,
}

impl BookmarkTree {
    /// Start building a tree rooted at `root`.
    pub fn builder(root: impl Into<Guid>) -> TreeBuilder {
        TreeBuilder::new(root.into())
    }

    pub fn root(&self) -> &Guid {
        &self.root
    }

    pub fn node(&self, guid: &Guid) -> Option<&BookmarkTreeNode> {
        self.nodes.get(guid)
    }

    pub fn contains(&self, guid: &Guid) -> bool {
        self.nodes.contains_key(guid)
    }

    /// The value this replica holds for `guid`, if fetched.
    pub fn value(&self, guid: &Guid) -> Option<&BookmarkItem> {
        self.values.get(guid)
    }

    /// When this replica deleted `guid`, if it did.
    pub fn deleted_at(&self, guid: &Guid) -> Option<Timestamp> {
        self.deletions.get(guid).copied()
    }

    pub fn is_deleted(&self, guid: &Guid) -> bool {
        self.deletions.contains_key(guid)
    }

    /// The folder this replica places `guid` under.
    pub fn parent_of(&self, guid: &Guid) -> Option<&Guid> {
        self.parents.get(guid)
    }

    /// The ordered children of `guid`, if this replica sees it as a folder.
    pub fn children_of(&self, guid: &Guid) -> Option<&[Guid]> {
        self.nodes.get(guid).and_then(BookmarkTreeNode::children)
    }

    /// All GUIDs this replica has a node for (tombstones excluded).
    pub fn guids(&self) -> impl Iterator<Item = &Guid> {
        self.nodes.keys()
    }

    /// GUIDs whose content has not been fetched yet.
    pub fn unknown_guids(&self) -> BTreeSet<Guid> {
        self.nodes
            .values()
            .filter(|n| n.is_unknown())
            .map(|n| n.guid().clone())
            .collect()
    }

    /// Number of nodes (tombstones excluded).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Upgrade an [`Unknown`](BookmarkTreeNode::Unknown) node with its
    /// fetched record. Returns `false` if the GUID is not an unknown node
    /// in this tree.
    pub fn materialize(&mut self, item: BookmarkItem) -> bool {
        let guid = item.guid.clone();
        match self.nodes.get(&guid) {
            Some(node) if node.is_unknown() => {}
            _ => return false,
        }
        let node = if item.kind == BookmarkKind::Folder {
            // A fetched folder whose children we were never told about keeps
            // an empty ordering; the replica has no opinion on its children.
            BookmarkTreeNode::Folder {
                guid: guid.clone(),
                children: Vec::new(),
            }
        } else {
            BookmarkTreeNode::NonFolder { guid: guid.clone() }
        };
        self.nodes.insert(guid.clone(), node);
        self.values.insert(guid, item);
        true
    }
}

/// Builder for a single replica's tree.
///
/// Nodes are described with [`folder`](TreeBuilder::folder),
/// [`leaf`](TreeBuilder::leaf), [`unknown`](TreeBuilder::unknown), and
/// [`tombstone`](TreeBuilder::tombstone); values with
/// [`value`](TreeBuilder::value). Any described node without an explicit
/// value receives a default one (title = GUID, stamped with the builder's
/// [`modified_at`](TreeBuilder::modified_at) time), so trees built from the
/// same shape compare as unchanged.
#[derive(Debug)]
pub struct TreeBuilder {
    root: Guid,
    order: Vec<Guid>,
    nodes: HashMap<Guid, BookmarkTreeNode>,
    values: HashMap<Guid, BookmarkItem>,
    deletions: HashMap<Guid, Timestamp>,
    default_modified: Timestamp,
    duplicate: Option<Guid>,
}

impl TreeBuilder {
    fn new(root: Guid) -> Self {
        Self {
            root,
            order: Vec::new(),
            nodes: HashMap::new(),
            values: HashMap::new(),
            deletions: HashMap::new(),
            default_modified: 0,
            duplicate: None,
        }
    }

    /// Timestamp used for auto-filled values.
    pub fn modified_at(mut self, modified: Timestamp) -> Self {
        self.default_modified = modified;
        self
    }

    /// Describe a folder and its ordered children.
    pub fn folder<G: Into<Guid>>(
        mut self,
        guid: impl Into<Guid>,
        children: impl IntoIterator<Item = G>,
    ) -> Self {
        let guid = guid.into();
        let children = children.into_iter().map(Into::into).collect();
        self.insert(BookmarkTreeNode::Folder {
            guid: guid.clone(),
            children,
        });
        self
    }

    /// Describe a leaf record.
    pub fn leaf(mut self, guid: impl Into<Guid>) -> Self {
        let guid = guid.into();
        self.insert(BookmarkTreeNode::NonFolder { guid });
        self
    }

    /// Describe a record whose existence is known but whose content has not
    /// been fetched.
    pub fn unknown(mut self, guid: impl Into<Guid>) -> Self {
        let guid = guid.into();
        self.insert(BookmarkTreeNode::Unknown { guid });
        self
    }

    /// Record a deletion this replica performed at `at`.
    pub fn tombstone(mut self, guid: impl Into<Guid>, at: Timestamp) -> Self {
        self.deletions.insert(guid.into(), at);
        self
    }

    /// Attach an explicit value to a described node.
    pub fn value(mut self, item: BookmarkItem) -> Self {
        self.values.insert(item.guid.clone(), item);
        self
    }

    fn insert(&mut self, node: BookmarkTreeNode) {
        let guid = node.guid().clone();
        // Re-describing an implicit Unknown child is fine; re-describing a
        // real node is a duplicate.
        match self.nodes.get(&guid) {
            Some(existing) if !existing.is_unknown() && self.duplicate.is_none() => {
                self.duplicate = Some(guid.clone());
            }
            _ => {}
        }
        if !self.nodes.contains_key(&guid) {
            self.order.push(guid.clone());
        }
        self.nodes.insert(guid, node);
    }

    /// Validate and finish the tree.
    pub fn build(mut self) -> Result<BookmarkTree, ConsistencyError> {
        if let Some(guid) = self.duplicate {
            return Err(ConsistencyError::DuplicateGuid { guid });
        }

        // Children referenced but never described become Unknown leaves.
        let mut referenced: Vec<Guid> = Vec::new();
        for node in self.nodes.values() {
            if let Some(children) = node.children() {
                referenced.extend(children.iter().cloned());
            }
        }
        for guid in referenced {
            self.nodes
                .entry(guid.clone())
                .or_insert(BookmarkTreeNode::Unknown { guid });
        }

        // Each GUID has at most one parent; a second claim is a duplicate.
        let mut parents: HashMap<Guid, Guid> = HashMap::new();
        for node in self.nodes.values() {
            if let Some(children) = node.children() {
                for child in children {
                    if parents.insert(child.clone(), node.guid().clone()).is_some() {
                        return Err(ConsistencyError::DuplicateGuid {
                            guid: child.clone(),
                        });
                    }
                }
            }
        }

        if parents.contains_key(&self.root) {
            return Err(ConsistencyError::CycleDetected {
                guid: self.root.clone(),
            });
        }

        // Exactly one parentless node, and it must be the declared root.
        let candidates: BTreeSet<Guid> = self
            .nodes
            .keys()
            .filter(|g| !parents.contains_key(*g))
            .cloned()
            .collect();
        if candidates.len() != 1 || !candidates.contains(&self.root) {
            return Err(ConsistencyError::TreeIsUnrooted { roots: candidates });
        }

        // Auto-fill values for described nodes so identically-shaped trees
        // compare as unchanged. Unknown nodes stay valueless until fetched.
        for node in self.nodes.values() {
            let guid = node.guid().clone();
            if self.values.contains_key(&guid) {
                continue;
            }
            let item = match node {
                BookmarkTreeNode::Folder { .. } => {
                    BookmarkItem::folder(guid.clone(), guid.as_str(), self.default_modified)
                }
                BookmarkTreeNode::NonFolder { .. } => BookmarkItem {
                    guid: guid.clone(),
                    kind: BookmarkKind::Bookmark,
                    title: guid.as_str().to_string(),
                    url: None,
                    modified: self.default_modified,
                },
                BookmarkTreeNode::Deleted { .. } | BookmarkTreeNode::Unknown { .. } => continue,
            };
            self.values.insert(guid, item);
        }

        Ok(BookmarkTree {
            root: self.root,
            nodes: self.nodes,
            values: self.values,
            deletions: self.deletions,
            parents,
        })
    }
}
