//! Metrics facade for the merge engine.
//!
//! Thin wrappers over the `metrics` crate so call sites stay one-liners and
//! metric names live in one place. All names carry the `merge_` prefix.
//!
//! | Metric | Type | Meaning |
//! |--------|------|---------|
//! | `merge_runs_total` | counter | Completed merge passes |
//! | `merge_failures_total{kind}` | counter | Aborted merges, by invariant |
//! | `merge_nodes_total` | counter | Nodes in finished merged trees |
//! | `merge_deletions_total` | counter | Tombstones in finished merges |
//! | `merge_value_conflicts_total` | counter | Remote-wins value conflicts |
//! | `merge_duration_seconds` | histogram | Wall time of the pure merge |
//! | `merge_upload_records_total` | counter | Full records synthesized for upload |
//! | `merge_amended_children_total` | counter | Amended-children entries synthesized |
//! | `merge_local_overrides_total` | counter | Local override entries synthesized |
//! | `merge_buffer_processed_total` | counter | Buffer records consumed |
//! | `merge_apply_steps_total{step}` | counter | Collaborator steps applied |

use metrics::{counter, histogram};
use std::time::Duration;

pub fn record_merge(duration: Duration, nodes: usize, deleted: usize, conflicts: usize) {
    counter!("merge_runs_total").increment(1);
    counter!("merge_nodes_total").increment(nodes as u64);
    counter!("merge_deletions_total").increment(deleted as u64);
    counter!("merge_value_conflicts_total").increment(conflicts as u64);
    histogram!("merge_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_merge_failure(kind: &'static str) {
    counter!("merge_failures_total", "kind" => kind).increment(1);
}

pub fn record_completion(records: usize, amended: usize, overrides: usize, processed: usize) {
    counter!("merge_upload_records_total").increment(records as u64);
    counter!("merge_amended_children_total").increment(amended as u64);
    counter!("merge_local_overrides_total").increment(overrides as u64);
    counter!("merge_buffer_processed_total").increment(processed as u64);
}

/// `step` is one of `upstream`, `local`, `buffer`.
pub fn record_apply_step(step: &'static str) {
    counter!("merge_apply_steps_total", "step" => step).increment(1);
}
