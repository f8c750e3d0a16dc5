//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for all inputs,
//! helping catch edge cases that unit tests might miss: merging is total
//! over well-formed replicas, no edit or deletion is silently dropped, and
//! an edit-free merge is a no-op.

use bookmark_merge::completion::{BookmarksMergeResult, PerhapsNoOp, UploadRecord};
use bookmark_merge::config::MergeConfig;
use bookmark_merge::frontier;
use bookmark_merge::guid::Guid;
use bookmark_merge::item::BookmarkItem;
use bookmark_merge::merge::{MergeState, ThreeWayMerger};
use bookmark_merge::tree::BookmarkTree;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn leaf_name(i: usize) -> String {
    format!("b{i}")
}

/// Build a replica: root holds folderA plus leaves `k..n`, folderA holds
/// leaves `0..k`. Leaves whose index is in `deleted` are dropped and
/// tombstoned; `retitled` attaches explicit values.
fn build_replica(
    n: usize,
    k: usize,
    retitled: &[(usize, BookmarkItem)],
    deleted: &BTreeSet<usize>,
) -> BookmarkTree {
    let folder_children: Vec<String> = (0..k)
        .filter(|i| !deleted.contains(i))
        .map(leaf_name)
        .collect();
    let mut root_children: Vec<String> = vec!["folderA".to_string()];
    root_children.extend((k..n).filter(|i| !deleted.contains(i)).map(leaf_name));

    let mut builder = BookmarkTree::builder("root")
        .folder("root", root_children)
        .folder("folderA", folder_children);
    for i in (0..n).filter(|i| !deleted.contains(i)) {
        builder = builder.leaf(leaf_name(i));
    }
    for (_, item) in retitled {
        builder = builder.value(item.clone());
    }
    for i in deleted {
        builder = builder.tombstone(leaf_name(*i), 100);
    }
    builder.build().unwrap()
}

fn retitles(mask: u8, n: usize, prefix: &str) -> Vec<(usize, BookmarkItem)> {
    (0..n)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| {
            let item = BookmarkItem::bookmark(
                leaf_name(i),
                format!("{prefix}{i}"),
                format!("https://{prefix}/{i}"),
                10,
            );
            (i, item)
        })
        .collect()
}

fn shape() -> impl Strategy<Value = (usize, usize)> {
    (1usize..8).prop_flat_map(|n| (Just(n), 0..=n))
}

proptest! {
    /// Merging three identical replicas decides everything as unchanged and
    /// synthesizes nothing to upload or override.
    #[test]
    fn identical_replicas_merge_to_no_op((n, k) in shape()) {
        let none = BTreeSet::new();
        let mirror = build_replica(n, k, &[], &none);
        let local = build_replica(n, k, &[], &none);
        let remote = build_replica(n, k, &[], &none);

        let merged = ThreeWayMerger::new(&mirror, &local, &remote, MergeConfig::testing())
            .merge()
            .unwrap();
        for node in merged.reachable() {
            prop_assert_eq!(&node.value_state, &MergeState::Unchanged);
            prop_assert_eq!(&node.structure_state, &MergeState::Unchanged);
        }
        let result = BookmarksMergeResult::from_merged(&merged, &local, None);
        // All three op sets, buffer included: an unchanged remote
        // contributes nothing to consume.
        prop_assert!(result.is_no_op());
    }

    /// One-sided retitles merge without conflicts, and every retitled record
    /// is uploaded exactly once.
    #[test]
    fn one_sided_retitles_upload_cleanly((n, k) in shape(), mask in any::<u8>()) {
        let none = BTreeSet::new();
        let edits = retitles(mask, n, "L");
        let mirror = build_replica(n, k, &[], &none);
        let local = build_replica(n, k, &edits, &none);
        let remote = build_replica(n, k, &[], &none);

        let merged = ThreeWayMerger::new(&mirror, &local, &remote, MergeConfig::testing())
            .merge()
            .unwrap();
        prop_assert!(merged.conflicts().is_empty());
        for (i, item) in &edits {
            let node = merged.node(&Guid::from(leaf_name(*i))).unwrap();
            prop_assert_eq!(&node.value_state, &MergeState::Local);
            prop_assert_eq!(&node.item.as_ref().unwrap().title, &item.title);
        }

        let result = BookmarksMergeResult::from_merged(&merged, &local, None);
        prop_assert_eq!(result.upload.records.len(), edits.len());
    }

    /// Overlapping retitles conflict exactly on the overlap; remote wins but
    /// every losing local edit is retained on the audit trail.
    #[test]
    fn conflicting_retitles_never_lose_edits(
        (n, k) in shape(),
        local_mask in any::<u8>(),
        remote_mask in any::<u8>(),
    ) {
        let none = BTreeSet::new();
        let local_edits = retitles(local_mask, n, "L");
        let remote_edits = retitles(remote_mask, n, "R");
        let mirror = build_replica(n, k, &[], &none);
        let local = build_replica(n, k, &local_edits, &none);
        let remote = build_replica(n, k, &remote_edits, &none);

        let merged = ThreeWayMerger::new(&mirror, &local, &remote, MergeConfig::testing())
            .merge()
            .unwrap();

        let valid = (1u16 << n) - 1;
        let overlap = (local_mask as u16 & remote_mask as u16 & valid).count_ones() as usize;
        prop_assert_eq!(merged.conflicts().len(), overlap);
        for conflict in merged.conflicts() {
            prop_assert!(conflict.local.title.starts_with('L'));
            prop_assert!(conflict.remote.title.starts_with('R'));
            // Remote won the record itself.
            let node = merged.node(&conflict.guid).unwrap();
            prop_assert_eq!(&node.item.as_ref().unwrap().title, &conflict.remote.title);
        }
    }

    /// Uncontested local deletions all propagate: tombstoned in the merged
    /// tree, uploaded as tombstones, and gone from the reachable set.
    #[test]
    fn local_deletions_propagate((n, k) in shape(), mask in any::<u8>()) {
        let none = BTreeSet::new();
        let deleted: BTreeSet<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
        let mirror = build_replica(n, k, &[], &none);
        let local = build_replica(n, k, &[], &deleted);
        let remote = build_replica(n, k, &[], &none);

        let merged = ThreeWayMerger::new(&mirror, &local, &remote, MergeConfig::testing())
            .merge()
            .unwrap();
        prop_assert_eq!(merged.deleted().len(), deleted.len());
        prop_assert_eq!(merged.len(), n - deleted.len() + 2);
        for i in &deleted {
            let g = Guid::from(leaf_name(*i));
            prop_assert!(merged.deleted_locally().contains(&g));
            prop_assert!(!merged.deleted_remotely().contains(&g));
            prop_assert!(merged.node(&g).is_none());
        }

        let result = BookmarksMergeResult::from_merged(&merged, &local, None);
        let tombstones = result
            .upload
            .records
            .iter()
            .filter(|r| matches!(r, UploadRecord::Tombstone(_)))
            .count();
        prop_assert_eq!(tombstones, deleted.len());
    }

    /// The frontier accepts each key exactly once over its lifetime, no
    /// matter how the pushes and pops interleave.
    #[test]
    fn frontier_schedules_each_key_once(keys in proptest::collection::vec("[a-d]{1,2}", 0..32)) {
        let mut frontier = frontier::guid_frontier();
        let mut accepted = 0usize;
        for key in &keys {
            if frontier.push(Guid::from(key.as_str())) {
                accepted += 1;
            }
        }
        let unique: BTreeSet<&String> = keys.iter().collect();
        prop_assert_eq!(accepted, unique.len());

        let mut popped = BTreeSet::new();
        while let Some(guid) = frontier.pop() {
            prop_assert!(popped.insert(guid.clone()));
            // A popped key can never be rescheduled.
            prop_assert!(!frontier.push(guid));
        }
        prop_assert_eq!(popped.len(), unique.len());
    }
}
