//! Fuzz target for tree building.
//!
//! This tests that `TreeBuilder::build` never panics on arbitrary node
//! descriptions: duplicate GUIDs, cycles, disconnected islands, and folders
//! referencing undescribed children must all surface as errors, never
//! panics.

#![no_main]

use bookmark_merge::tree::BookmarkTree;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (Vec<(u8, Vec<u8>)>, Vec<u8>, Vec<u8>)| {
    let (folders, leaves, tombstones) = data;

    let mut builder = BookmarkTree::builder("n0");
    for (guid, children) in folders {
        let children: Vec<String> = children.iter().map(|c| format!("n{c}")).collect();
        builder = builder.folder(format!("n{guid}"), children);
    }
    for guid in leaves {
        builder = builder.leaf(format!("n{guid}"));
    }
    for guid in tombstones {
        builder = builder.tombstone(format!("n{guid}"), u64::from(guid));
    }

    // Malformed input must come back as Err, never a panic.
    if let Ok(tree) = builder.build() {
        assert_eq!(tree.root().as_str(), "n0");
        for guid in tree.guids() {
            assert!(!tree.is_deleted(guid));
        }
    }
});
