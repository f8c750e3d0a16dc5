//! Fuzz target for the once-only frontier.
//!
//! This tests that arbitrary push/pop interleavings never panic and never
//! let a key through twice over the frontier's lifetime.

#![no_main]

use bookmark_merge::frontier;
use bookmark_merge::guid::Guid;
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;

fuzz_target!(|ops: Vec<(bool, u8)>| {
    let mut frontier = frontier::guid_frontier();
    let mut delivered: HashSet<Guid> = HashSet::new();

    for (is_push, key) in ops {
        if is_push {
            let guid = Guid::from(format!("g{key}"));
            let accepted = frontier.push(guid.clone());
            // A key already delivered must never be accepted again.
            if delivered.contains(&guid) {
                assert!(!accepted);
            }
            if accepted {
                assert!(frontier.seen(&guid));
            }
        } else if let Some(guid) = frontier.pop() {
            // Each key is delivered at most once, ever.
            assert!(delivered.insert(guid.clone()));
            assert!(!frontier.push(guid));
        }
    }
});
