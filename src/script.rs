//! Edit-script generation.
//!
//! Turns a [`Matching`] into an ordered list of [`EditOperation`]s. The order
//! is fixed: deletions deepest-first, then moves, then insertions
//! shallowest-first, then attribute and text changes in after-document order.
//! Replaying the script against the before-tree (see [`crate::apply`])
//! reconstructs a tree structurally equal to the after-tree.

use crate::matching::Matching;
use crate::tree::{Node, NodePath, NodeSnapshot, Tree};
use serde::Serialize;

/// A single edit.
///
/// Insert and change paths address the after-tree, Delete paths address the
/// before-tree, and a Move carries both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    Insert {
        node: NodeSnapshot,
        path: NodePath,
        parent: NodePath,
        index: usize,
    },
    Delete {
        node: NodeSnapshot,
        path: NodePath,
        parent: NodePath,
    },
    Move {
        node: NodeSnapshot,
        path: NodePath,
        new_path: NodePath,
        old_parent: NodePath,
        new_parent: NodePath,
        new_index: usize,
    },
    AttributeChange {
        path: NodePath,
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
    TextChange {
        path: NodePath,
        old_text: String,
        new_text: String,
    },
}

impl EditOperation {
    pub fn kind(&self) -> &'static str {
        match self {
            EditOperation::Insert { .. } => "insert",
            EditOperation::Delete { .. } => "delete",
            EditOperation::Move { .. } => "move",
            EditOperation::AttributeChange { .. } => "attribute_change",
            EditOperation::TextChange { .. } => "text_change",
        }
    }

    /// The path the operation is reported under.
    pub fn path(&self) -> &NodePath {
        match self {
            EditOperation::Insert { path, .. }
            | EditOperation::Delete { path, .. }
            | EditOperation::Move { path, .. }
            | EditOperation::AttributeChange { path, .. }
            | EditOperation::TextChange { path, .. } => path,
        }
    }

    /// Where the affected node sits in the before-tree, if it exists there.
    pub fn before_path(&self) -> Option<&NodePath> {
        match self {
            EditOperation::Delete { path, .. } | EditOperation::Move { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Where the affected node sits in the after-tree, if it exists there.
    pub fn after_path(&self) -> Option<&NodePath> {
        match self {
            EditOperation::Insert { path, .. }
            | EditOperation::AttributeChange { path, .. }
            | EditOperation::TextChange { path, .. } => Some(path),
            EditOperation::Move { new_path, .. } => Some(new_path),
            EditOperation::Delete { .. } => None,
        }
    }

    /// Snapshot carried by structural operations.
    pub fn node(&self) -> Option<&NodeSnapshot> {
        match self {
            EditOperation::Insert { node, .. }
            | EditOperation::Delete { node, .. }
            | EditOperation::Move { node, .. } => Some(node),
            _ => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.node().is_some()
    }
}

/// Derives the edit script for a matching of `before` against `after`.
pub fn generate(before: &Tree, after: &Tree, matching: &Matching) -> Vec<EditOperation> {
    let mut script = Vec::new();

    let mut deleted: Vec<&Node> = matching
        .unmatched_before
        .iter()
        .map(|&id| before.get(id))
        .collect();
    deleted.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| b.path.cmp(&a.path)));
    script.extend(deleted.into_iter().map(|node| EditOperation::Delete {
        node: node.snapshot(),
        path: node.path.clone(),
        parent: parent_path(node),
    }));

    let mut moved: Vec<(&Node, &Node)> = matching
        .pairs()
        .iter()
        .filter(|pair| {
            let parent_changed = match (before.parent(pair.before_id), after.parent(pair.after_id)) {
                (Some(bp), Some(ap)) => matching.partner_of_before(bp) != Some(ap),
                (None, None) => false,
                _ => true,
            };
            parent_changed || matching.reordered.contains(&pair.before_id)
        })
        .map(|pair| (before.get(pair.before_id), after.get(pair.after_id)))
        .collect();
    moved.sort_by(|(_, a), (_, b)| a.path.cmp(&b.path));
    script.extend(moved.into_iter().map(|(old, new)| EditOperation::Move {
        node: old.snapshot(),
        path: old.path.clone(),
        new_path: new.path.clone(),
        old_parent: parent_path(old),
        new_parent: parent_path(new),
        new_index: new.index,
    }));

    let mut inserted: Vec<&Node> = matching
        .unmatched_after
        .iter()
        .map(|&id| after.get(id))
        .collect();
    inserted.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.path.cmp(&b.path)));
    script.extend(inserted.into_iter().map(|node| EditOperation::Insert {
        node: node.snapshot(),
        path: node.path.clone(),
        parent: parent_path(node),
        index: node.index,
    }));

    for after_id in after.ids() {
        if let Some(before_id) = matching.partner_of_after(after_id) {
            content_changes(before.get(before_id), after.get(after_id), &mut script);
        }
    }

    script
}

fn parent_path(node: &Node) -> NodePath {
    node.path.parent().unwrap_or_default()
}

/// Attribute changes (after order, removals last) followed by a text change.
fn content_changes(old: &Node, new: &Node, script: &mut Vec<EditOperation>) {
    for (name, value) in &new.attrs {
        let previous = old.attrs.get(name);
        if previous != Some(value) {
            script.push(EditOperation::AttributeChange {
                path: new.path.clone(),
                name: name.clone(),
                old_value: previous.cloned(),
                new_value: Some(value.clone()),
            });
        }
    }
    for (name, value) in &old.attrs {
        if !new.attrs.contains_key(name) {
            script.push(EditOperation::AttributeChange {
                path: new.path.clone(),
                name: name.clone(),
                old_value: Some(value.clone()),
                new_value: None,
            });
        }
    }

    if old.text != new.text {
        script.push(EditOperation::TextChange {
            path: new.path.clone(),
            old_text: old.text.clone().unwrap_or_default(),
            new_text: new.text.clone().unwrap_or_default(),
        });
    }
}
