//! Replays an edit script against a before-tree.
//!
//! Trees are immutable, so replay runs on a private mutable copy. Deletes and
//! moves detach nodes, inserts create detached nodes, and every node that
//! needs a new position is placed once the structural operations are done.
//! Placements are sorted by after-tree path, which guarantees each parent and
//! all earlier siblings are already in position when a node is placed. The
//! attribute and text changes then apply at after-tree paths.

use crate::error::ApplyError;
use crate::script::EditOperation;
use crate::tree::{Attributes, DomNode, NodeId, NodePath, NodeSnapshot, Tree};

/// Applies `script` to a copy of `before` and returns the resulting tree.
pub fn apply(before: &Tree, script: &[EditOperation]) -> Result<Tree, ApplyError> {
    let mut work = WorkTree::from_tree(before);

    for op in script {
        match op {
            EditOperation::Delete { path, .. } => {
                let id = work.original(before, path)?;
                work.detach(id)?;
            }
            EditOperation::Move { path, new_path, .. } => {
                let id = work.original(before, path)?;
                work.detach(id)?;
                work.pending.push((new_path.clone(), id));
            }
            EditOperation::Insert { node, path, .. } => {
                let id = work.create(node);
                work.pending.push((path.clone(), id));
            }
            EditOperation::AttributeChange {
                path,
                name,
                new_value,
                ..
            } => {
                work.settle()?;
                let id = work.navigate(path)?;
                let attrs = &mut work.nodes[id].attrs;
                match new_value {
                    Some(value) => {
                        attrs.insert(name.clone(), value.clone());
                    }
                    None => {
                        attrs.shift_remove(name);
                    }
                }
            }
            EditOperation::TextChange { path, new_text, .. } => {
                work.settle()?;
                let id = work.navigate(path)?;
                work.nodes[id].text = Some(new_text.clone());
            }
        }
    }
    work.settle()?;

    Ok(Tree::from_dom(work.to_dom(0)))
}

struct WorkNode {
    tag: String,
    attrs: Attributes,
    text: Option<String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

struct WorkTree {
    nodes: Vec<WorkNode>,
    /// Nodes waiting to be placed at an after-tree path.
    pending: Vec<(NodePath, NodeId)>,
}

impl WorkTree {
    fn from_tree(tree: &Tree) -> Self {
        let nodes = tree
            .nodes()
            .map(|node| WorkNode {
                tag: node.tag.clone(),
                attrs: node.attrs.clone(),
                text: node.text.clone(),
                children: node.children.clone(),
                parent: node.parent,
            })
            .collect();
        Self {
            nodes,
            pending: Vec::new(),
        }
    }

    /// Work ids of before-tree nodes coincide with their arena ids.
    fn original(&self, before: &Tree, path: &NodePath) -> Result<NodeId, ApplyError> {
        before.lookup(path).ok_or_else(|| ApplyError::UnknownPath {
            path: path.to_string(),
        })
    }

    fn create(&mut self, snapshot: &NodeSnapshot) -> NodeId {
        self.nodes.push(WorkNode {
            tag: snapshot.tag.clone(),
            attrs: snapshot.attributes.clone(),
            text: snapshot.text.clone(),
            children: Vec::new(),
            parent: None,
        });
        self.nodes.len() - 1
    }

    fn detach(&mut self, id: NodeId) -> Result<(), ApplyError> {
        if id == 0 {
            return Err(ApplyError::RootDetached);
        }
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|&child| child != id);
        }
        Ok(())
    }

    fn navigate(&self, path: &NodePath) -> Result<NodeId, ApplyError> {
        let mut current = 0;
        for &index in path.indices() {
            current = *self.nodes[current]
                .children
                .get(index)
                .ok_or_else(|| ApplyError::UnknownPath {
                    path: path.to_string(),
                })?;
        }
        Ok(current)
    }

    fn settle(&mut self) -> Result<(), ApplyError> {
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, id) in pending {
            let (Some(parent_path), Some(index)) = (path.parent(), path.last_index()) else {
                return Err(ApplyError::RootDetached);
            };
            let parent = self.navigate(&parent_path)?;
            let len = self.nodes[parent].children.len();
            if index > len {
                return Err(ApplyError::IndexOutOfBounds {
                    parent: parent_path.to_string(),
                    index,
                    len,
                });
            }
            self.nodes[parent].children.insert(index, id);
            self.nodes[id].parent = Some(parent);
        }
        Ok(())
    }

    fn to_dom(&self, id: NodeId) -> DomNode {
        let node = &self.nodes[id];
        DomNode {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: node.text.clone(),
            children: node.children.iter().map(|&c| self.to_dom(c)).collect(),
        }
    }
}
