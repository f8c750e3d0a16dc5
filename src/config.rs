//! Merge policy configuration.
//!
//! The merge core hard-codes only one conflict policy: when local and remote
//! both change a record's *value* differently, remote wins (last writer wins
//! at replica granularity). The remaining policies are configurable here:
//!
//! - `structure_tie_break`: which replica wins when both changed the same
//!   folder's children differently. The default prefers the replica that
//!   also won the folder's value, falling back to remote; this keeps a
//!   folder's content and ordering coming from one place when possible.
//! - `undelete_on_newer_edit`: whether an edit that is causally newer than a
//!   competing deletion revives the record. Disabled, deletion always wins.
//!
//! ```rust
//! use bookmark_merge::config::{MergeConfig, TieBreak};
//!
//! let config = MergeConfig {
//!     structure_tie_break: TieBreak::Remote,
//!     ..Default::default()
//! };
//! assert!(config.undelete_on_newer_edit);
//! ```

use serde::{Deserialize, Serialize};

/// Who wins when local and remote both reordered the same folder's children
/// differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Prefer the replica that also holds the authoritative value for the
    /// folder; remote when neither does.
    ValueWinner,
    /// Always remote.
    Remote,
    /// Always local.
    Local,
}

impl Default for TieBreak {
    fn default() -> Self {
        Self::ValueWinner
    }
}

/// Tunable merge policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Structural conflict tie-break for folders both sides reordered.
    pub structure_tie_break: TieBreak,

    /// An edit stamped after a competing deletion revives the record.
    pub undelete_on_newer_edit: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            structure_tie_break: TieBreak::ValueWinner,
            undelete_on_newer_edit: true,
        }
    }
}

impl MergeConfig {
    /// Defaults, named for use in tests.
    pub fn testing() -> Self {
        Self::default()
    }
}
