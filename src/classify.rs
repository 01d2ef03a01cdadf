//! Change classification.
//!
//! Every edit operation is mapped to a non-empty set of [`Category`] labels,
//! a [`Severity`] and a human-readable description. The mapping is
//! table-driven from [`ClassifyConfig`]:
//!
//! | Operation | Categories |
//! |---|---|
//! | attribute change on a style attribute | style, plus layout for layout declarations |
//! | attribute change on an identity attribute | identity |
//! | attribute change on a layout attribute | attribute, layout |
//! | other attribute change | attribute |
//! | text change | text |
//! | text change, insert or delete inside `<style>` | style, plus layout for layout declarations |
//! | insert, delete, move | structural, plus layout and identity by context |

use crate::config::ClassifyConfig;
use crate::script::EditOperation;
use crate::selector::selector_for;
use crate::tree::{normalize_whitespace, truncate, Attributes, Node, NodeId, NodePath, Tree};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

const DESCRIPTION_TEXT_LEN: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Layout,
    Style,
    Text,
    Attribute,
    Structural,
    Identity,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Layout,
        Category::Style,
        Category::Text,
        Category::Attribute,
        Category::Structural,
        Category::Identity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Layout => "layout",
            Category::Style => "style",
            Category::Text => "text",
            Category::Attribute => "attribute",
            Category::Structural => "structural",
            Category::Identity => "identity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Low, Severity::Medium, Severity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!(
                "unknown severity '{}' (expected low, medium or high)",
                other
            )),
        }
    }
}

/// One classified edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub id: usize,
    #[serde(flatten)]
    pub operation: EditOperation,
    pub categories: BTreeSet<Category>,
    pub severity: Severity,
    pub selector: String,
    pub description: String,
    /// Whitespace-only change.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub low_significance: bool,
}

/// Classifies operations produced for one pair of trees.
pub struct Classifier<'a> {
    before: &'a Tree,
    after: &'a Tree,
    config: &'a ClassifyConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(before: &'a Tree, after: &'a Tree, config: &'a ClassifyConfig) -> Self {
        Self {
            before,
            after,
            config,
        }
    }

    /// Classifies a whole script, numbering records in script order.
    pub fn classify_all(&self, operations: Vec<EditOperation>) -> Vec<ChangeRecord> {
        operations
            .into_iter()
            .enumerate()
            .map(|(id, op)| self.record(id, op))
            .collect()
    }

    pub fn record(&self, id: usize, operation: EditOperation) -> ChangeRecord {
        let categories = self.classify(&operation);
        let severity = self.severity(&operation, &categories);
        ChangeRecord {
            id,
            selector: self.selector(&operation),
            description: self.describe(&operation),
            low_significance: self.low_significance(&operation),
            categories,
            severity,
            operation,
        }
    }

    /// Category labels for one operation. Never empty.
    pub fn classify(&self, op: &EditOperation) -> BTreeSet<Category> {
        let mut categories = BTreeSet::new();

        if let Some((old, new)) = self.stylesheet_text(op) {
            categories.insert(Category::Style);
            if self.stylesheet_layout_changed(old, new) {
                categories.insert(Category::Layout);
            }
            return categories;
        }

        match op {
            EditOperation::AttributeChange {
                name,
                old_value,
                new_value,
                ..
            } => {
                let name = name.to_ascii_lowercase();
                if contains(&self.config.style_attributes, &name) {
                    categories.insert(Category::Style);
                    if name == "style"
                        && self.layout_declaration_changed(old_value.as_deref(), new_value.as_deref())
                    {
                        categories.insert(Category::Layout);
                    }
                } else if contains(&self.config.identity_attributes, &name) {
                    categories.insert(Category::Identity);
                } else if contains(&self.config.layout_attributes, &name) {
                    categories.insert(Category::Attribute);
                    categories.insert(Category::Layout);
                } else {
                    categories.insert(Category::Attribute);
                }
            }
            EditOperation::TextChange { .. } => {
                categories.insert(Category::Text);
            }
            EditOperation::Insert { node, .. }
            | EditOperation::Delete { node, .. }
            | EditOperation::Move { node, .. } => {
                categories.insert(Category::Structural);
                if self.in_layout_context(op) {
                    categories.insert(Category::Layout);
                }
                if self.has_identity(&node.attributes) {
                    categories.insert(Category::Identity);
                }
            }
        }

        categories
    }

    pub fn severity(&self, op: &EditOperation, categories: &BTreeSet<Category>) -> Severity {
        if self.low_significance(op) {
            return Severity::Low;
        }

        let interactive = self.is_interactive(op);
        let mut severity = Severity::Low;

        if categories.contains(&Category::Structural) {
            severity = match op.node() {
                Some(node) if node.is_text() => Severity::Low,
                _ if interactive => Severity::High,
                _ => Severity::Medium,
            };
        }
        if categories.contains(&Category::Identity) {
            severity = severity.max(if interactive {
                Severity::High
            } else {
                Severity::Medium
            });
        }
        if categories.contains(&Category::Layout) {
            severity = severity.max(Severity::Medium);
        }
        if let EditOperation::AttributeChange { name, .. } = op {
            if name.eq_ignore_ascii_case("class") {
                severity = severity.max(Severity::Medium);
            }
        }

        severity
    }

    /// Whitespace-only changes.
    pub fn low_significance(&self, op: &EditOperation) -> bool {
        match op {
            EditOperation::TextChange {
                old_text, new_text, ..
            } => normalize_whitespace(old_text) == normalize_whitespace(new_text),
            EditOperation::Insert { node, .. }
            | EditOperation::Delete { node, .. }
            | EditOperation::Move { node, .. } => {
                node.is_text() && node.text.as_deref().is_some_and(|t| t.trim().is_empty())
            }
            EditOperation::AttributeChange { .. } => false,
        }
    }

    /// The node an operation touches, preferring the after-tree.
    pub fn resolve(&self, op: &EditOperation) -> Option<(&'a Tree, NodeId)> {
        if let Some(id) = op.after_path().and_then(|path| self.after.lookup(path)) {
            return Some((self.after, id));
        }
        op.before_path()
            .and_then(|path| self.before.lookup(path))
            .map(|id| (self.before, id))
    }

    fn selector(&self, op: &EditOperation) -> String {
        match self.resolve(op) {
            Some((tree, id)) => selector_for(tree, id),
            None => op.path().to_string(),
        }
    }

    fn has_identity(&self, attrs: &Attributes) -> bool {
        self.config
            .identity_attributes
            .iter()
            .any(|name| attrs.contains_key(name))
    }

    fn is_interactive(&self, op: &EditOperation) -> bool {
        if let EditOperation::AttributeChange { name, .. } = op {
            if name == "data-testid" {
                return true;
            }
        }
        let interactive_in = |tree: &Tree, path: Option<&NodePath>| {
            path.and_then(|p| tree.node_at(p))
                .is_some_and(|node| self.is_interactive_node(node))
        };
        interactive_in(self.after, op.after_path()) || interactive_in(self.before, op.before_path())
    }

    fn is_interactive_node(&self, node: &Node) -> bool {
        if node.is_text() {
            return false;
        }
        contains(&self.config.interactive_tags, &node.tag)
            || node.attrs.contains_key("data-testid")
            || node
                .attr("role")
                .is_some_and(|role| contains(&self.config.interactive_roles, &role.to_lowercase()))
    }

    /// True if the node or an ancestor declares a layout property inline.
    fn in_layout_context(&self, op: &EditOperation) -> bool {
        let check = |tree: &Tree, path: Option<&NodePath>| {
            let Some(id) = path.and_then(|p| tree.lookup(p)) else {
                return false;
            };
            std::iter::once(id)
                .chain(tree.ancestors(id))
                .any(|node| self.declares_layout(tree.get(node)))
        };
        check(self.after, op.after_path()) || check(self.before, op.before_path())
    }

    fn declares_layout(&self, node: &Node) -> bool {
        node.attr("style").is_some_and(|style| {
            parse_declarations(style)
                .keys()
                .any(|property| self.is_layout_property(property))
        })
    }

    fn layout_declaration_changed(&self, old: Option<&str>, new: Option<&str>) -> bool {
        let old = parse_declarations(old.unwrap_or(""));
        let new = parse_declarations(new.unwrap_or(""));
        old.keys()
            .chain(new.keys())
            .filter(|property| old.get(*property) != new.get(*property))
            .any(|property| self.is_layout_property(property))
    }

    /// Old and new stylesheet text when `op` edits the content of a `<style>`.
    fn stylesheet_text<'o>(&self, op: &'o EditOperation) -> Option<(&'o str, &'o str)> {
        let in_style = |tree: &Tree, parent: Option<NodeId>| {
            parent.is_some_and(|parent| tree.get(parent).tag == "style")
        };
        match op {
            EditOperation::TextChange {
                path,
                old_text,
                new_text,
            } => {
                let id = self.after.lookup(path)?;
                in_style(self.after, self.after.get(id).parent)
                    .then_some((old_text.as_str(), new_text.as_str()))
            }
            EditOperation::Insert { node, parent, .. } if node.is_text() => {
                in_style(self.after, self.after.lookup(parent))
                    .then_some(("", node.text.as_deref().unwrap_or("")))
            }
            EditOperation::Delete { node, parent, .. } if node.is_text() => {
                in_style(self.before, self.before.lookup(parent))
                    .then_some((node.text.as_deref().unwrap_or(""), ""))
            }
            _ => None,
        }
    }

    fn stylesheet_layout_changed(&self, old: &str, new: &str) -> bool {
        let old = parse_stylesheet(old);
        let new = parse_stylesheet(new);
        old.keys()
            .chain(new.keys())
            .filter(|key| old.get(*key) != new.get(*key))
            .any(|(_, property)| self.is_layout_property(property))
    }

    fn is_layout_property(&self, property: &str) -> bool {
        self.config.layout_properties.iter().any(|layout| {
            property == layout
                || property
                    .strip_prefix(layout.as_str())
                    .is_some_and(|rest| rest.starts_with('-'))
        })
    }

    fn describe(&self, op: &EditOperation) -> String {
        match op {
            EditOperation::TextChange {
                path,
                old_text,
                new_text,
                ..
            } => {
                let label = self.owner_label(self.after, path);
                format!(
                    "{} text changed from '{}' to '{}'.",
                    label,
                    clip(old_text),
                    clip(new_text)
                )
            }
            EditOperation::AttributeChange {
                path,
                name,
                old_value,
                new_value,
            } => {
                let label = self
                    .after
                    .node_at(path)
                    .map(|node| element_label(&node.tag))
                    .unwrap_or_else(|| "Element".to_string());
                match (old_value, new_value) {
                    (None, Some(value)) => {
                        format!("{} gained attribute {}='{}'.", label, name, clip(value))
                    }
                    (Some(value), None) => format!(
                        "{} attribute {} was removed (was '{}').",
                        label,
                        name,
                        clip(value)
                    ),
                    (Some(old), Some(new)) if name == "id" => {
                        format!("{} ID changed from '{}' to '{}'.", label, old, new)
                    }
                    (old, new) => format!(
                        "{} attribute {} changed from '{}' to '{}'.",
                        label,
                        name,
                        clip(old.as_deref().unwrap_or("")),
                        clip(new.as_deref().unwrap_or(""))
                    ),
                }
            }
            EditOperation::Insert { node, parent, .. } => {
                if node.is_text() {
                    let label = self.element_at(self.after, parent);
                    format!(
                        "Text '{}' added to {}.",
                        clip(node.text.as_deref().unwrap_or("").trim()),
                        lowercase_first(&label)
                    )
                } else {
                    let text = self.after.lookup(op.path()).map(|id| self.after.direct_text(id));
                    format!(
                        "New {} added{}.",
                        lowercase_first(&element_label(&node.tag)),
                        qualifier(&node.attributes, text.as_deref())
                    )
                }
            }
            EditOperation::Delete { node, parent, .. } => {
                if node.is_text() {
                    let label = self.element_at(self.before, parent);
                    format!(
                        "Text '{}' removed from {}.",
                        clip(node.text.as_deref().unwrap_or("").trim()),
                        lowercase_first(&label)
                    )
                } else {
                    let text = self.before.lookup(op.path()).map(|id| self.before.direct_text(id));
                    format!(
                        "{}{} was removed.",
                        element_label(&node.tag),
                        qualifier(&node.attributes, text.as_deref())
                    )
                }
            }
            EditOperation::Move {
                node,
                old_parent,
                new_parent,
                new_index,
                ..
            } => {
                let label = if node.is_text() {
                    format!("Text '{}'", clip(node.text.as_deref().unwrap_or("").trim()))
                } else {
                    element_label(&node.tag)
                };
                let from = self.element_at(self.before, old_parent);
                let to = self.element_at(self.after, new_parent);
                if old_parent == new_parent {
                    format!(
                        "{} reordered to position {} within {}.",
                        label,
                        new_index + 1,
                        lowercase_first(&to)
                    )
                } else {
                    format!(
                        "{} moved from {} to {}.",
                        label,
                        lowercase_first(&from),
                        lowercase_first(&to)
                    )
                }
            }
        }
    }

    /// Label of the element holding `path` (the parent for text nodes).
    fn owner_label(&self, tree: &Tree, path: &NodePath) -> String {
        match tree.node_at(path) {
            Some(node) if node.is_text() => node
                .parent
                .map(|parent| element_label(&tree.get(parent).tag))
                .unwrap_or_else(|| "Element".to_string()),
            Some(node) => element_label(&node.tag),
            None => "Element".to_string(),
        }
    }

    fn element_at(&self, tree: &Tree, path: &NodePath) -> String {
        tree.node_at(path)
            .map(|node| element_label(&node.tag))
            .unwrap_or_else(|| "Element".to_string())
    }
}

/// Counts records per category; categories with no records are omitted.
pub fn count_by_category(records: &[ChangeRecord]) -> BTreeMap<Category, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        for category in &record.categories {
            *counts.entry(*category).or_insert(0) += 1;
        }
    }
    counts
}

/// Counts records per severity, always listing all three levels.
pub fn count_by_severity(records: &[ChangeRecord]) -> BTreeMap<Severity, usize> {
    let mut counts: BTreeMap<Severity, usize> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
    for record in records {
        *counts.entry(record.severity).or_insert(0) += 1;
    }
    counts
}

/// Splits an inline style into lowercase property → value pairs.
pub fn parse_declarations(style: &str) -> BTreeMap<String, String> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            if property.is_empty() {
                return None;
            }
            Some((property, normalize_whitespace(value)))
        })
        .collect()
}

/// Declarations of a stylesheet keyed by (rule selector, property). Nested
/// at-rule blocks keep their prelude in the selector.
pub fn parse_stylesheet(css: &str) -> BTreeMap<(String, String), String> {
    let mut declarations = BTreeMap::new();
    for block in css.split('}') {
        let Some((selector, body)) = block.rsplit_once('{') else {
            continue;
        };
        let selector = normalize_whitespace(selector);
        for (property, value) in parse_declarations(body) {
            declarations.insert((selector.clone(), property), value);
        }
    }
    declarations
}

fn contains(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

fn clip(text: &str) -> String {
    truncate(text, DESCRIPTION_TEXT_LEN)
}

fn element_label(tag: &str) -> String {
    match tag {
        "a" => "Link".to_string(),
        "button" => "Button".to_string(),
        "input" => "Input".to_string(),
        "label" => "Label".to_string(),
        "img" => "Image".to_string(),
        "p" => "Paragraph".to_string(),
        "li" => "List item".to_string(),
        "ul" | "ol" => "List".to_string(),
        "nav" => "Navigation".to_string(),
        "title" => "Page title".to_string(),
        "textarea" => "Text area".to_string(),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "Header".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => format!("{}{} element", first.to_uppercase(), chars.as_str()),
                None => "Element".to_string(),
            }
        }
    }
}

fn lowercase_first(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
        None => String::new(),
    }
}

/// " with id 'x'", " with data-testid 'y'" or " with text 'z'".
fn qualifier(attrs: &Attributes, text: Option<&str>) -> String {
    for name in ["data-testid", "id"] {
        if let Some(value) = attrs.get(name) {
            return format!(" with {} '{}'", name, value);
        }
    }
    match text {
        Some(text) if !text.is_empty() => format!(" with text '{}'", clip(text)),
        _ => String::new(),
    }
}
