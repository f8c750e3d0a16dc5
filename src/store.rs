// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collaborator traits.
//!
//! The merge core never talks to a network or a database directly. It
//! depends on four capabilities, provided by the hosting sync layer:
//!
//! 1. Push upload records to the remote peer ([`BookmarkStorer`])
//! 2. Persist the merge outcome as the new local baseline ([`LocalBookmarkStore`])
//! 3. Mark consumed buffer records ([`BufferStore`])
//! 4. Fetch buffered records for `Unknown` nodes ([`ItemSource`])
//!
//! These traits allow testing with mocks and decouple the core from concrete
//! store types. All methods return boxed futures; the collaborator calls are
//! the only suspension points in the whole engine — the merge algorithm
//! itself is synchronous, pure computation over already-fetched trees.

use crate::completion::{BufferCompletionOp, LocalOverrideCompletionOp, UpstreamCompletionOp};
use crate::guid::Guid;
use crate::item::{BookmarkItem, Timestamp};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Result type for collaborator operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Opaque collaborator failure. The core propagates it without retrying.
#[derive(Debug, Clone)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// What a successful upload reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    /// The new authoritative server-side modification timestamp. Stamped
    /// onto the local override so future syncs see a clean baseline.
    pub modified: Timestamp,
}

/// Remote-write collaborator.
pub trait BookmarkStorer: Send + Sync + 'static {
    /// Push the op's records to the remote peer.
    ///
    /// Must fail when the op's `if_unmodified_since` no longer matches the
    /// server state (optimistic-concurrency conflict). Callers skip the call
    /// entirely for a no-op op, so implementations may assume there is
    /// something to write.
    fn apply_upstream_op<'a>(&'a self, op: &'a UpstreamCompletionOp)
        -> BoxFuture<'a, UploadOutcome>;
}

/// Local overlay store collaborator.
pub trait LocalBookmarkStore: Send + Sync + 'static {
    /// Persist the merge outcome as the new local baseline.
    ///
    /// `modified` is the server timestamp obtained from the upload step, or
    /// the last-known server time when the upload was skipped. `None` means
    /// no server time is known at all; implementations keep their existing
    /// baseline stamp rather than regressing it.
    fn apply_local_override_op<'a>(
        &'a self,
        op: &'a LocalOverrideCompletionOp,
        modified: Option<Timestamp>,
    ) -> BoxFuture<'a, ()>;
}

/// Incoming-buffer store collaborator.
pub trait BufferStore: Send + Sync + 'static {
    /// Mark the op's records consumed so the buffer does not retain records
    /// already folded into the mirror.
    fn apply_buffer_op<'a>(&'a self, op: &'a BufferCompletionOp) -> BoxFuture<'a, ()>;
}

/// Record-fetch collaborator, used to materialize `Unknown` nodes.
pub trait ItemSource: Send + Sync + 'static {
    /// Fetch one buffered record.
    fn get_buffer_item<'a>(&'a self, guid: &'a Guid) -> BoxFuture<'a, Option<BookmarkItem>>;

    /// Fetch a batch of buffered records, keyed by GUID. GUIDs the store has
    /// no record for are simply absent from the result.
    fn get_buffer_items<'a>(
        &'a self,
        guids: &'a [Guid],
    ) -> BoxFuture<'a, HashMap<Guid, BookmarkItem>>;
}

/// A no-op remote writer for testing/standalone mode. Logs the op and
/// reports a zero timestamp.
#[derive(Clone)]
pub struct NoOpStorer;

impl BookmarkStorer for NoOpStorer {
    fn apply_upstream_op<'a>(
        &'a self,
        op: &'a UpstreamCompletionOp,
    ) -> BoxFuture<'a, UploadOutcome> {
        Box::pin(async move {
            tracing::debug!(
                records = op.records.len(),
                amended = op.amend_children.len(),
                "NoOp: would upload records"
            );
            Ok(UploadOutcome { modified: 0 })
        })
    }
}

/// A no-op local store for testing/standalone mode.
#[derive(Clone)]
pub struct NoOpLocalStore;

impl LocalBookmarkStore for NoOpLocalStore {
    fn apply_local_override_op<'a>(
        &'a self,
        op: &'a LocalOverrideCompletionOp,
        modified: Option<Timestamp>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::debug!(
                items = op.items.len(),
                structure = op.structure.len(),
                deletions = op.deletions.len(),
                modified = ?modified,
                "NoOp: would apply local override"
            );
            Ok(())
        })
    }
}

/// A no-op buffer store for testing/standalone mode.
#[derive(Clone)]
pub struct NoOpBufferStore;

impl BufferStore for NoOpBufferStore {
    fn apply_buffer_op<'a>(&'a self, op: &'a BufferCompletionOp) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tracing::debug!(processed = op.processed.len(), "NoOp: would clear buffer records");
            Ok(())
        })
    }
}

/// An item source with nothing in it.
#[derive(Clone)]
pub struct EmptyItemSource;

impl ItemSource for EmptyItemSource {
    fn get_buffer_item<'a>(&'a self, guid: &'a Guid) -> BoxFuture<'a, Option<BookmarkItem>> {
        Box::pin(async move {
            tracing::trace!(guid = %guid, "empty source: no buffered record");
            Ok(None)
        })
    }

    fn get_buffer_items<'a>(
        &'a self,
        _guids: &'a [Guid],
    ) -> BoxFuture<'a, HashMap<Guid, BookmarkItem>> {
        Box::pin(async { Ok(HashMap::new()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_storer_reports_zero_timestamp() {
        let storer = NoOpStorer;
        let op = UpstreamCompletionOp::new(Some(100));
        let outcome = storer.apply_upstream_op(&op).await.unwrap();
        assert_eq!(outcome, UploadOutcome { modified: 0 });
    }

    #[tokio::test]
    async fn test_noop_local_store_succeeds() {
        let store = NoOpLocalStore;
        let op = LocalOverrideCompletionOp::default();
        assert!(store.apply_local_override_op(&op, Some(42)).await.is_ok());
    }

    #[tokio::test]
    async fn test_noop_buffer_store_succeeds() {
        let store = NoOpBufferStore;
        let op = BufferCompletionOp::default();
        assert!(store.apply_buffer_op(&op).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_item_source() {
        let source = EmptyItemSource;
        let guid = Guid::from("anything");
        assert!(source.get_buffer_item(&guid).await.unwrap().is_none());
        let batch = source.get_buffer_items(&[guid]).await.unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError("server said no".to_string());
        assert_eq!(err.to_string(), "server said no");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_traits_are_object_safe() {
        let _: &dyn BookmarkStorer = &NoOpStorer;
        let _: &dyn LocalBookmarkStore = &NoOpLocalStore;
        let _: &dyn BufferStore = &NoOpBufferStore;
        let _: &dyn ItemSource = &EmptyItemSource;
    }
}
