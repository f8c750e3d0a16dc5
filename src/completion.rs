//! Completion ops: the write-back half of a merge.
//!
//! A finished [`MergedTree`] is walked once and partitioned into three
//! disjoint batches, one per collaborator:
//!
//! ```text
//! MergedTree ──┬──▶ UpstreamCompletionOp       (push to the remote peer)
//!              ├──▶ LocalOverrideCompletionOp  (rewrite the local baseline)
//!              └──▶ BufferCompletionOp         (clear consumed buffer records)
//! ```
//!
//! - Full-record uploads are nodes whose merged *value* is `Local` or `New`,
//!   plus tombstones for locally-originated deletions. Records carry no
//!   child ordering, so every folder whose merged children differ from the
//!   mirror also gets an amended-children entry, whether or not its own
//!   value record is uploaded.
//! - The local override carries everything the merge decided differently
//!   from the local replica's current state, so future syncs see a clean
//!   baseline.
//! - The buffer op names every record the incoming batch contributed,
//!   regardless of merge outcome; an unchanged remote contributes nothing.
//!
//! A merge that changed nothing synthesizes the canonical no-op result, and
//! applying a no-op performs zero collaborator calls.

use crate::guid::Guid;
use crate::item::{BookmarkItem, Timestamp};
use crate::merge::{MergeState, MergedTree};
use crate::metrics;
use crate::tree::BookmarkTree;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Anything that may turn out to be a no-op.
pub trait PerhapsNoOp {
    fn is_no_op(&self) -> bool;
}

/// One record to push upstream as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRecord {
    Item(BookmarkItem),
    Tombstone(Guid),
}

impl UploadRecord {
    pub fn guid(&self) -> &Guid {
        match self {
            Self::Item(item) => &item.guid,
            Self::Tombstone(guid) => guid,
        }
    }
}

/// Records to push to the remote peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamCompletionOp {
    /// Upload these records as-is.
    pub records: Vec<UploadRecord>,

    /// Folders whose children changed without the folder's own value
    /// changing: GUID to fully-resolved child ordering.
    pub amend_children: BTreeMap<Guid, Vec<Guid>>,

    /// Optimistic-concurrency precondition: the mirror's last-known server
    /// timestamp. The peer must reject the write if its state has moved.
    pub if_unmodified_since: Option<Timestamp>,
}

impl UpstreamCompletionOp {
    pub fn new(if_unmodified_since: Option<Timestamp>) -> Self {
        Self {
            if_unmodified_since,
            ..Self::default()
        }
    }
}

impl PerhapsNoOp for UpstreamCompletionOp {
    fn is_no_op(&self) -> bool {
        self.records.is_empty()
    }
}

/// Rewrites the local overlay store must apply so future syncs see a clean
/// baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalOverrideCompletionOp {
    /// Merged values that differ from the local replica's current values.
    pub items: BTreeMap<Guid, BookmarkItem>,
    /// Merged child orderings that differ from the local replica's.
    pub structure: BTreeMap<Guid, Vec<Guid>>,
    /// Deletions the local replica has not applied yet.
    pub deletions: BTreeSet<Guid>,
}

impl PerhapsNoOp for LocalOverrideCompletionOp {
    fn is_no_op(&self) -> bool {
        self.items.is_empty() && self.structure.is_empty() && self.deletions.is_empty()
    }
}

/// Incoming-buffer records to mark consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferCompletionOp {
    pub processed: BTreeSet<Guid>,
}

impl PerhapsNoOp for BufferCompletionOp {
    fn is_no_op(&self) -> bool {
        self.processed.is_empty()
    }
}

/// The sole output of the merge core offered to the rest of the system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarksMergeResult {
    pub upload: UpstreamCompletionOp,
    pub local_override: LocalOverrideCompletionOp,
    pub buffer: BufferCompletionOp,
}

impl PerhapsNoOp for BookmarksMergeResult {
    fn is_no_op(&self) -> bool {
        self.upload.is_no_op() && self.local_override.is_no_op() && self.buffer.is_no_op()
    }
}

impl BookmarksMergeResult {
    /// The canonical nothing-to-do result.
    pub fn no_op() -> Self {
        Self::default()
    }

    /// Partition a finished merge into its three completion ops.
    ///
    /// `local` is the local replica the merge ran against, needed to diff
    /// the merged outcome against the local store's current state.
    pub fn from_merged(
        merged: &MergedTree,
        local: &BookmarkTree,
        if_unmodified_since: Option<Timestamp>,
    ) -> Self {
        let mut upload = UpstreamCompletionOp::new(if_unmodified_since);
        let mut overrides = LocalOverrideCompletionOp::default();

        for node in merged.reachable() {
            let guid = &node.guid;
            let uploads_record = matches!(node.value_state, MergeState::Local | MergeState::New(_));
            if uploads_record {
                if let Some(item) = &node.item {
                    upload.records.push(UploadRecord::Item(item.clone()));
                }
            }
            if node.is_folder() {
                // Records carry no child ordering, so a changed list always
                // goes up as an amendment, value-changed or not.
                let mirror_children = node
                    .mirror
                    .as_ref()
                    .and_then(|n| n.children())
                    .unwrap_or(&[]);
                if mirror_children != node.children.as_slice() {
                    upload
                        .amend_children
                        .insert(guid.clone(), node.children.clone());
                }
            }

            if let Some(item) = &node.item {
                let differs = match local.value(guid) {
                    Some(current) => !current.same_contents(item),
                    None => true,
                };
                if differs {
                    overrides.items.insert(guid.clone(), item.clone());
                }
            }
            if node.is_folder() {
                let differs = match local.children_of(guid) {
                    Some(current) => current != node.children.as_slice(),
                    None => true,
                };
                if differs {
                    overrides
                        .structure
                        .insert(guid.clone(), node.children.clone());
                }
            }
        }

        // The remote peer must learn deletions it did not originate.
        for guid in merged.deleted_locally() {
            if !merged.deleted_remotely().contains(guid) {
                upload.records.push(UploadRecord::Tombstone(guid.clone()));
            }
        }
        // The local store must apply deletions it has not seen yet.
        for guid in merged.deleted() {
            if local.contains(guid) && !local.is_deleted(guid) {
                overrides.deletions.insert(guid.clone());
            }
        }

        let buffer = BufferCompletionOp {
            processed: merged.examined_buffer().clone(),
        };

        debug!(
            upload_records = upload.records.len(),
            amended = upload.amend_children.len(),
            override_items = overrides.items.len(),
            override_structure = overrides.structure.len(),
            override_deletions = overrides.deletions.len(),
            buffer_processed = buffer.processed.len(),
            "completion ops synthesized"
        );
        metrics::record_completion(
            upload.records.len(),
            upload.amend_children.len(),
            overrides.items.len() + overrides.structure.len() + overrides.deletions.len(),
            buffer.processed.len(),
        );

        Self {
            upload,
            local_override: overrides,
            buffer,
        }
    }
}
