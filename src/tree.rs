//! Arena-backed representation of a parsed HTML document.
//!
//! A [`Tree`] stores its nodes in a flat vector in depth-first pre-order, with
//! the root at id `0`. Parent and child relations are plain indices into that
//! vector, and every node carries a [`NodePath`] (the child indices leading to
//! it from the root). Trees are immutable once built, so they can be shared
//! freely between threads and compared without any interior bookkeeping.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Tag name used for text nodes.
pub const TEXT_TAG: &str = "#text";

/// Index of a node inside its tree's arena.
pub type NodeId = usize;

/// Ordered attribute map, preserving the order attributes were authored in.
pub type Attributes = IndexMap<String, String>;

/// Stable address of a node: the child indices from the root.
///
/// Paths order lexicographically, so sorting paths yields document order and
/// an ancestor always sorts before its descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, index: usize) -> NodePath {
        let mut indices = self.0.clone();
        indices.push(index);
        NodePath(indices)
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            return None;
        }
        Some(NodePath(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn last_index(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Returns true if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Parses the `/1/0/2` form produced by `Display`.
    pub fn parse(s: &str) -> Option<NodePath> {
        let rest = s.strip_prefix('/')?;
        if rest.is_empty() {
            return Some(NodePath::root());
        }
        rest.split('/')
            .map(|segment| segment.parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()
            .map(NodePath)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single element or text node.
#[derive(Debug, Clone)]
pub struct Node {
    pub path: NodePath,
    /// Lowercase tag name, or [`TEXT_TAG`] for text nodes.
    pub tag: String,
    pub attrs: Attributes,
    pub text: Option<String>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    pub depth: usize,
    /// Position among the parent's children.
    pub index: usize,
    /// Whitespace-only text node.
    pub low_significance: bool,
}

impl Node {
    pub fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            tag: self.tag.clone(),
            attributes: self.attrs.clone(),
            text: self.text.clone(),
        }
    }
}

/// The content of one node without its children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSnapshot {
    pub tag: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl NodeSnapshot {
    pub fn is_text(&self) -> bool {
        self.tag == TEXT_TAG
    }

    /// Returns a short preview of the node, truncated to max_len characters.
    pub fn preview(&self, max_len: usize) -> String {
        let preview = if self.is_text() {
            format!("\"{}\"", self.text.as_deref().unwrap_or("").trim())
        } else {
            let mut out = format!("<{}", self.tag);
            for (name, value) in &self.attributes {
                out.push_str(&format!(" {}=\"{}\"", name, value));
            }
            out.push('>');
            out
        };
        truncate(&preview, max_len)
    }
}

pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        s.to_string()
    }
}

/// Owned, recursive form of a document used to build a [`Tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct DomNode {
    pub tag: String,
    pub attrs: Attributes,
    pub text: Option<String>,
    pub children: Vec<DomNode>,
}

impl DomNode {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Attributes::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            tag: TEXT_TAG.to_string(),
            attrs: Attributes::new(),
            text: Some(text.into()),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: DomNode) -> Self {
        self.children.push(child);
        self
    }
}

/// An immutable document tree.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    index: HashMap<NodePath, NodeId>,
}

impl Tree {
    /// Flattens a [`DomNode`] into an arena, assigning paths depth-first.
    pub fn from_dom(root: DomNode) -> Tree {
        let mut tree = Tree {
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        tree.push(root, NodePath::root(), None, 0);
        tree
    }

    fn push(&mut self, dom: DomNode, path: NodePath, parent: Option<NodeId>, index: usize) -> NodeId {
        let DomNode {
            tag,
            attrs,
            text,
            children,
        } = dom;

        let id = self.nodes.len();
        let low_significance =
            tag == TEXT_TAG && text.as_deref().is_some_and(|t| t.trim().is_empty());

        self.index.insert(path.clone(), id);
        self.nodes.push(Node {
            depth: path.depth(),
            path: path.clone(),
            tag,
            attrs,
            text,
            children: Vec::new(),
            parent,
            index,
            low_significance,
        });

        let child_ids = children
            .into_iter()
            .enumerate()
            .map(|(i, child)| self.push(child, path.child(i), Some(id), i))
            .collect();
        self.nodes[id].children = child_ids;
        id
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn lookup(&self, path: &NodePath) -> Option<NodeId> {
        self.index.get(path).copied()
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&Node> {
        self.lookup(path).map(|id| &self.nodes[id])
    }

    /// Node ids in document (pre-)order.
    pub fn ids(&self) -> std::ops::Range<NodeId> {
        0..self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Iterates over the ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.nodes[id].parent,
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Text of a text node, or the whitespace-normalized concatenation of an
    /// element's direct text children.
    pub fn direct_text(&self, id: NodeId) -> String {
        let node = &self.nodes[id];
        if node.is_text() {
            return normalize_whitespace(node.text.as_deref().unwrap_or(""));
        }
        let joined = node
            .children
            .iter()
            .filter_map(|&child| self.nodes[child].text.as_deref())
            .collect::<Vec<_>>()
            .join(" ");
        normalize_whitespace(&joined)
    }

    /// Rebuilds the owned form of this tree.
    pub fn to_dom(&self) -> DomNode {
        self.dom_at(self.root())
    }

    fn dom_at(&self, id: NodeId) -> DomNode {
        let node = &self.nodes[id];
        DomNode {
            tag: node.tag.clone(),
            attrs: node.attrs.clone(),
            text: node.text.clone(),
            children: node.children.iter().map(|&c| self.dom_at(c)).collect(),
        }
    }

    /// Checks whether two trees have the same tags, attributes, text and
    /// child order. Attribute order is not significant.
    pub fn structurally_equal(&self, other: &Tree) -> bool {
        self.subtree_equal(self.root(), other, other.root())
    }

    fn subtree_equal(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let left = &self.nodes[a];
        let right = &other.nodes[b];

        left.tag == right.tag
            && left.text == right.text
            && attributes_equal(&left.attrs, &right.attrs)
            && left.children.len() == right.children.len()
            && left
                .children
                .iter()
                .zip(right.children.iter())
                .all(|(&ca, &cb)| self.subtree_equal(ca, other, cb))
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.nodes[current].parent;
        Some(current)
    }
}

/// Order-insensitive attribute comparison.
pub fn attributes_equal(a: &Attributes, b: &Attributes) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
}

/// Trims and collapses runs of whitespace into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
