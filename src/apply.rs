// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Applying a merge result to its collaborators.
//!
//! Strictly sequential: upstream upload, then local override, then buffer
//! cleanup. Each step runs only if the previous one succeeded, and each
//! no-op step is skipped without calling its collaborator. The ordering
//! matters twice over:
//!
//! - the upload's optimistic-concurrency precondition must be checked
//!   *before* the local baseline is rewritten, and
//! - the local override is stamped with the server timestamp the upload
//!   reports, so the next sync's mirror comparison starts clean.
//!
//! A failed step aborts the chain. Steps that already committed stay
//! committed; the next sync cycle re-derives whatever is still pending from
//! the mirror comparison.

use crate::completion::{BookmarksMergeResult, PerhapsNoOp};
use crate::error::{MergeError, Result};
use crate::item::Timestamp;
use crate::metrics;
use crate::store::{BookmarkStorer, BufferStore, LocalBookmarkStore};
use tracing::{debug, info};

/// What a completed (or short-circuited) apply chain did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Server timestamp reported by the upload, when one happened.
    pub uploaded_at: Option<Timestamp>,
    pub upload_applied: bool,
    pub local_applied: bool,
    pub buffer_applied: bool,
}

impl BookmarksMergeResult {
    /// Apply the three completion ops in order.
    ///
    /// A fully no-op result returns immediately with zero collaborator
    /// calls. Any collaborator failure aborts the remaining steps and maps
    /// to the [`MergeError`] variant naming the step that failed.
    pub async fn apply(
        &self,
        client: &dyn BookmarkStorer,
        storage: &dyn LocalBookmarkStore,
        buffer: &dyn BufferStore,
    ) -> Result<ApplyOutcome> {
        let mut outcome = ApplyOutcome::default();
        if self.is_no_op() {
            debug!("merge result is a no-op; nothing to apply");
            return Ok(outcome);
        }

        let modified = if self.upload.is_no_op() {
            // No upload means the server state did not move, so the mirror's
            // last-known timestamp is still the authoritative stamp. When no
            // time is known either, the absence is passed through; the local
            // store keeps its existing stamp.
            debug!("upload op is a no-op; skipping upstream write");
            self.upload.if_unmodified_since
        } else {
            let uploaded = client
                .apply_upstream_op(&self.upload)
                .await
                .map_err(MergeError::Upstream)?;
            metrics::record_apply_step("upstream");
            outcome.upload_applied = true;
            outcome.uploaded_at = Some(uploaded.modified);
            Some(uploaded.modified)
        };

        if self.local_override.is_no_op() {
            debug!("local override op is a no-op; skipping");
        } else {
            storage
                .apply_local_override_op(&self.local_override, modified)
                .await
                .map_err(MergeError::LocalStore)?;
            metrics::record_apply_step("local");
            outcome.local_applied = true;
        }

        if self.buffer.is_no_op() {
            debug!("buffer op is a no-op; skipping");
        } else {
            buffer
                .apply_buffer_op(&self.buffer)
                .await
                .map_err(MergeError::Buffer)?;
            metrics::record_apply_step("buffer");
            outcome.buffer_applied = true;
        }

        info!(
            upload = outcome.upload_applied,
            local = outcome.local_applied,
            buffer = outcome.buffer_applied,
            uploaded_at = ?outcome.uploaded_at,
            "merge result applied"
        );
        Ok(outcome)
    }
}
