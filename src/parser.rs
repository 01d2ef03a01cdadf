//! Markup parsing into our tree representation.
//!
//! HTML is parsed with `scraper` (html5ever underneath), which applies the
//! standard HTML recovery rules: unclosed tags are closed, misnested markup is
//! repaired, and stray end tags are dropped. Recovered problems are logged at
//! debug level. Only input that cannot become a document at all is rejected:
//! bytes that are not UTF-8, markup carrying NUL characters, and documents
//! nested beyond the configured depth.
//!
//! This module also loads the external test-selector map, detecting JSON or
//! YAML by file extension.
//!
//! # Examples
//!
//! ```
//! use domdiff_rs::parser::build;
//!
//! let tree = build(r#"<div><button id="submit">Save</button></div>"#).unwrap();
//! assert_eq!(tree.get(tree.root()).tag, "html");
//! ```

use crate::config::{BuildOptions, DocumentMode};
use crate::error::ParseError;
use crate::impact::TestSelectorMap;
use crate::tree::{DomNode, Tree};
use scraper::{ElementRef, Html};
use std::fs;
use std::path::Path;
use tracing::debug;

const INLINE_SOURCE: &str = "<input>";

/// Parses markup with the default [`BuildOptions`].
pub fn build(markup: &str) -> Result<Tree, ParseError> {
    build_with(markup, &BuildOptions::default())
}

/// Parses markup into a [`Tree`].
///
/// # Errors
///
/// - `ParseError::BinaryContent` if the markup contains a NUL character
/// - `ParseError::TooDeep` if elements nest deeper than `options.max_depth`
pub fn build_with(markup: &str, options: &BuildOptions) -> Result<Tree, ParseError> {
    build_named(markup, INLINE_SOURCE, options)
}

/// Parses raw bytes, rejecting anything that is not UTF-8.
pub fn build_bytes(bytes: &[u8], options: &BuildOptions) -> Result<Tree, ParseError> {
    let markup =
        std::str::from_utf8(bytes).map_err(|e| ParseError::invalid_encoding(INLINE_SOURCE, e))?;
    build_named(markup, INLINE_SOURCE, options)
}

/// Reads and parses an HTML file.
pub fn build_file(path: &Path, options: &BuildOptions) -> Result<Tree, ParseError> {
    let name = path.to_string_lossy().to_string();
    if !path.exists() {
        return Err(ParseError::file_not_found(name));
    }

    let bytes = fs::read(path).map_err(|e| ParseError::read_error(&name, e))?;
    let markup = std::str::from_utf8(&bytes).map_err(|e| ParseError::invalid_encoding(&name, e))?;
    build_named(markup, &name, options)
}

fn build_named(markup: &str, source: &str, options: &BuildOptions) -> Result<Tree, ParseError> {
    if let Some(offset) = markup.find('\0') {
        return Err(ParseError::BinaryContent {
            path: source.to_string(),
            offset,
        });
    }

    let document = match options.mode {
        DocumentMode::Document => Html::parse_document(markup),
        DocumentMode::Fragment => Html::parse_fragment(markup),
    };
    if !document.errors.is_empty() {
        debug!(
            source,
            recovered = document.errors.len(),
            "parser recovered from malformed markup"
        );
    }

    let root = convert(document.root_element(), 1, source, options)?;
    let tree = Tree::from_dom(root);
    debug!(source, nodes = tree.len(), "built tree");
    Ok(tree)
}

/// Converts a scraper element and its subtree into a [`DomNode`].
///
/// Comments, doctypes and processing instructions are dropped.
fn convert(
    element: ElementRef<'_>,
    depth: usize,
    source: &str,
    options: &BuildOptions,
) -> Result<DomNode, ParseError> {
    if depth > options.max_depth {
        return Err(ParseError::TooDeep {
            path: source.to_string(),
            limit: options.max_depth,
        });
    }

    let value = element.value();
    let mut node = DomNode::element(value.name());
    for (name, attr_value) in value.attrs() {
        node.attrs.insert(name.to_string(), attr_value.to_string());
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            node.children
                .push(convert(child_element, depth + 1, source, options)?);
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            if options.keep_whitespace || !text.trim().is_empty() {
                node.children.push(DomNode::text(text));
            }
        }
    }

    Ok(node)
}

/// Loads a test-selector map (selector → test ids) from a JSON or YAML file.
///
/// The format is detected by extension (.json, .yaml, .yml). Unknown
/// extensions are tried as JSON first, then YAML.
pub fn load_selector_map(path: &Path) -> Result<TestSelectorMap, ParseError> {
    let name = path.to_string_lossy().to_string();
    if !path.exists() {
        return Err(ParseError::file_not_found(name));
    }

    let content = fs::read_to_string(path).map_err(|e| ParseError::read_error(&name, e))?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase());

    match extension.as_deref() {
        Some("json") => {
            parse_selector_map_json(&content).map_err(|e| ParseError::json_error(&name, e))
        }
        Some("yaml") | Some("yml") => {
            parse_selector_map_yaml(&content).map_err(|e| ParseError::yaml_error(&name, e))
        }
        _ => parse_selector_map_json(&content)
            .map_err(|_| ())
            .or_else(|_| parse_selector_map_yaml(&content).map_err(|_| ()))
            .map_err(|_| ParseError::unknown_format(name)),
    }
}

pub fn parse_selector_map_json(content: &str) -> Result<TestSelectorMap, serde_json::Error> {
    serde_json::from_str(content)
}

pub fn parse_selector_map_yaml(content: &str) -> Result<TestSelectorMap, serde_yaml::Error> {
    serde_yaml::from_str(content)
}
