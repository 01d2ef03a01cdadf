//! Structural diff of two document trees.
//!
//! This module ties the matcher and the edit-script generator together:
//! the trees are matched, the matching is turned into an ordered edit script,
//! and the script is summarized into statistics.
//!
//! # Examples
//!
//! ```
//! use domdiff_rs::{build, compute_diff, DiffConfig};
//!
//! let before = build(r#"<div><button id="submit">Save</button></div>"#).unwrap();
//! let after = build(r#"<div><button id="submit" class="primary">Save Now</button></div>"#).unwrap();
//!
//! let diff = compute_diff(&before, &after, &DiffConfig::default());
//!
//! assert_eq!(diff.stats.attributes_changed, 1);
//! assert_eq!(diff.stats.texts_changed, 1);
//! ```

use crate::config::DiffConfig;
use crate::matching::{compute_matching, MatchAmbiguity};
use crate::script::{generate, EditOperation};
use crate::tree::Tree;
use serde::Serialize;
use tracing::debug;

/// Statistics about the diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    /// Number of inserted nodes
    pub inserted: usize,
    /// Number of deleted nodes
    pub deleted: usize,
    /// Number of moved nodes
    pub moved: usize,
    /// Number of attribute-level changes
    pub attributes_changed: usize,
    /// Number of text changes
    pub texts_changed: usize,
    /// Number of matched node pairs
    pub matched: usize,
}

impl DiffStats {
    /// Creates a new DiffStats with all counts at zero.
    pub fn new() -> Self {
        Self {
            inserted: 0,
            deleted: 0,
            moved: 0,
            attributes_changed: 0,
            texts_changed: 0,
            matched: 0,
        }
    }

    /// Returns the total number of edit operations.
    pub fn total_changes(&self) -> usize {
        self.inserted + self.deleted + self.moved + self.attributes_changed + self.texts_changed
    }

    /// Returns true if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }
}

impl Default for DiffStats {
    fn default() -> Self {
        Self::new()
    }
}

/// The complete diff result.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    /// Ordered edit script
    pub operations: Vec<EditOperation>,
    /// Summary statistics
    pub stats: DiffStats,
    /// Ambiguous matches resolved by document order
    pub warnings: Vec<MatchAmbiguity>,
}

impl Diff {
    /// Creates a new empty Diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Computes the structural diff between two trees.
///
/// This is the main entry point for the diff algorithm. The result's edit
/// script, replayed against `before`, yields a tree structurally equal to
/// `after`.
pub fn compute_diff(before: &Tree, after: &Tree, config: &DiffConfig) -> Diff {
    let matching = compute_matching(before, after, &config.matching);
    let operations = generate(before, after, &matching);

    let mut stats = DiffStats::new();
    stats.matched = matching.len();
    for op in &operations {
        match op {
            EditOperation::Insert { .. } => stats.inserted += 1,
            EditOperation::Delete { .. } => stats.deleted += 1,
            EditOperation::Move { .. } => stats.moved += 1,
            EditOperation::AttributeChange { .. } => stats.attributes_changed += 1,
            EditOperation::TextChange { .. } => stats.texts_changed += 1,
        }
    }

    debug!(
        operations = operations.len(),
        matched = stats.matched,
        "computed edit script"
    );

    Diff {
        operations,
        stats,
        warnings: matching.warnings,
    }
}
