//! Once-only traversal frontier.
//!
//! [`OnceOnlyStack`] is the guard that makes the merge walk terminate and
//! stay correct when a GUID is reachable from more than one replica's
//! traversal order, or when malformed input would otherwise cause
//! reprocessing: each key is accepted at most once over the *lifetime* of the
//! stack, not just while it sits in the pending list. Popping an element does
//! not make its key pushable again.
//!
//! One frontier instance belongs to exactly one traversal; never reuse it
//! across merges.

use crate::guid::Guid;
use crate::tree::BookmarkTreeNode;
use std::collections::HashSet;
use std::hash::Hash;

/// A LIFO work list that schedules each key at most once, ever.
pub struct OnceOnlyStack<T, K, F = fn(&T) -> K>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    key: F,
    seen: HashSet<K>,
    stack: Vec<T>,
}

impl<T, K, F> OnceOnlyStack<T, K, F>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    /// Create a frontier with the given key-extraction function.
    pub fn with_key(key: F) -> Self {
        Self {
            key,
            seen: HashSet::new(),
            stack: Vec::new(),
        }
    }

    /// Schedule `value` unless its key has ever been seen by this instance.
    /// Returns whether the element was accepted.
    pub fn push(&mut self, value: T) -> bool {
        let key = (self.key)(&value);
        if !self.seen.insert(key) {
            return false;
        }
        self.stack.push(value);
        true
    }

    /// Remove and return the most recently pushed element.
    pub fn pop(&mut self) -> Option<T> {
        self.stack.pop()
    }

    /// Whether this instance has ever accepted `key`.
    pub fn seen(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    /// Elements currently pending (not the lifetime count).
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Frontier over bare GUIDs, keyed by themselves.
pub fn guid_frontier() -> OnceOnlyStack<Guid, Guid> {
    OnceOnlyStack::with_key(|g: &Guid| g.clone())
}

/// Frontier over borrowed tree nodes, keyed by their GUID. Used to walk all
/// three replica trees' nodes without visiting a GUID twice.
pub fn node_frontier<'a>() -> OnceOnlyStack<&'a BookmarkTreeNode, Guid> {
    OnceOnlyStack::with_key(|n: &&BookmarkTreeNode| n.guid().clone())
}
