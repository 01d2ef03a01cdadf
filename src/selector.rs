//! Selector parsing and matching against document trees.
//!
//! Test-selector maps are keyed by selectors, so the impact analyzer needs to
//! evaluate them against our trees. Two syntaxes are understood:
//!
//! - CSS, parsed by scraper's selector grammar and matched through a
//!   [`selectors::Element`] view of a [`Tree`] node.
//! - XPath-like paths: `//button[@id='x']`, `/html/body/div[2]`,
//!   `//form//input[@required]`. These are rewritten into the equivalent CSS
//!   before parsing. A leading `/` anchors the first step at the document
//!   root, `[n]` is a 1-based position among same-tag siblings.
//!
//! # Examples
//!
//! ```
//! use domdiff_rs::parser::build;
//! use domdiff_rs::selector::Selector;
//!
//! let tree = build(r#"<form><button id="go" class="btn primary">Go</button></form>"#).unwrap();
//! let selector = Selector::parse("form > button.primary").unwrap();
//! assert_eq!(selector.select(&tree).len(), 1);
//! ```

use crate::error::SelectorError;
use crate::script::EditOperation;
use crate::tree::{NodeId, Tree};
use scraper::error::SelectorErrorKind;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
    NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorImpl, SelectorList};
use selectors::{Element, NthIndexCache, OpaqueElement};
use std::fmt;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    selectors: SelectorList<Simple>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Selector, SelectorError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }
        let css = if source.starts_with('/') {
            XPath::new(source).to_css()?
        } else {
            source.to_string()
        };

        let mut parser_input = cssparser::ParserInput::new(&css);
        let mut parser = cssparser::Parser::new(&mut parser_input);
        let selectors =
            SelectorList::parse(&scraper::selector::Parser, &mut parser, ParseRelative::No)
                .map_err(|e| SelectorError::Invalid {
                    selector: source.to_string(),
                    message: SelectorErrorKind::from(e).to_string(),
                })?;

        Ok(Selector {
            source: source.to_string(),
            selectors,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the element `id` matches this selector.
    pub fn matches(&self, tree: &Tree, id: NodeId) -> bool {
        if tree.get(id).is_text() {
            return false;
        }
        let element = TreeElement { tree, id };
        let mut cache = NthIndexCache::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        self.selectors
            .0
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, &element, &mut context))
    }

    /// Returns true if the node an operation touches, or one of its
    /// ancestors, matches. Moves are checked in both trees.
    pub fn matches_operation(&self, op: &EditOperation, before: &Tree, after: &Tree) -> bool {
        let touches = |tree: &Tree, id: NodeId| {
            std::iter::once(id)
                .chain(tree.ancestors(id))
                .any(|node| self.matches(tree, node))
        };
        let in_before = op
            .before_path()
            .and_then(|path| before.lookup(path))
            .is_some_and(|id| touches(before, id));
        in_before
            || op
                .after_path()
                .and_then(|path| after.lookup(path))
                .is_some_and(|id| touches(after, id))
    }

    /// All matching nodes, in document order.
    pub fn select(&self, tree: &Tree) -> Vec<NodeId> {
        tree.ids().filter(|&id| self.matches(tree, id)).collect()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// An element node of a [`Tree`], as seen by the selector engine.
#[derive(Debug, Clone, Copy)]
struct TreeElement<'a> {
    tree: &'a Tree,
    id: NodeId,
}

impl<'a> TreeElement<'a> {
    fn wrap(tree: &'a Tree, id: NodeId) -> Option<Self> {
        (!tree.get(id).is_text()).then_some(Self { tree, id })
    }

    fn tag(&self) -> &'a str {
        &self.tree.get(self.id).tag
    }

    fn siblings(&self) -> &'a [NodeId] {
        match self.tree.parent(self.id) {
            Some(parent) => self.tree.children(parent),
            None => &[],
        }
    }
}

impl<'a> Element for TreeElement<'a> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.tree.get(self.id))
    }

    fn parent_element(&self) -> Option<Self> {
        self.tree
            .parent(self.id)
            .and_then(|parent| Self::wrap(self.tree, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let index = self.tree.get(self.id).index;
        self.siblings()
            .get(..index)?
            .iter()
            .rev()
            .find_map(|&sibling| Self::wrap(self.tree, sibling))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let index = self.tree.get(self.id).index;
        self.siblings()
            .get(index + 1..)?
            .iter()
            .find_map(|&sibling| Self::wrap(self.tree, sibling))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.tree
            .children(self.id)
            .iter()
            .find_map(|&child| Self::wrap(self.tree, child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &<Simple as SelectorImpl>::BorrowedLocalName) -> bool {
        &*name.0 == self.tag()
    }

    fn has_namespace(&self, ns: &<Simple as SelectorImpl>::BorrowedNamespaceUrl) -> bool {
        &**ns == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.tag() == other.tag()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&<Simple as SelectorImpl>::NamespaceUrl>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if matches!(ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        self.tree
            .get(self.id)
            .attr(&local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Simple>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.tag(), "a" | "area" | "link") && self.tree.get(self.id).attr("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        self.tag() == "slot"
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.tree
            .get(self.id)
            .attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.tree.get(self.id).attr("class").is_some_and(|classes| {
            classes
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.tree.children(self.id).iter().all(|&child| {
            let node = self.tree.get(child);
            node.is_text() && node.text.as_deref().map_or(true, str::is_empty)
        })
    }

    fn is_root(&self) -> bool {
        self.tree.parent(self.id).is_none()
    }
}

/// 1-based position of `id` among its siblings with the same tag.
pub fn nth_of_type(tree: &Tree, id: NodeId) -> usize {
    let node = tree.get(id);
    let Some(parent) = node.parent else {
        return 1;
    };
    tree.children(parent)
        .iter()
        .take_while(|&&sibling| sibling != id)
        .filter(|&&sibling| tree.get(sibling).tag == node.tag)
        .count()
        + 1
}

/// Synthesizes a selector that addresses the element holding `id`.
///
/// Text nodes resolve to their parent element. Elements with a
/// `data-testid` or an `id` are addressed directly; anything else gets a
/// child chain of `:nth-of-type` steps below the nearest such anchor (or the
/// root).
pub fn selector_for(tree: &Tree, id: NodeId) -> String {
    let mut target = id;
    if tree.get(target).is_text() {
        if let Some(parent) = tree.parent(target) {
            target = parent;
        }
    }

    let mut chain = Vec::new();
    let mut current = target;
    loop {
        if let Some(anchor) = anchor_selector(tree, current) {
            chain.push(anchor);
            break;
        }
        match tree.parent(current) {
            Some(parent) => {
                let node = tree.get(current);
                chain.push(format!("{}:nth-of-type({})", node.tag, nth_of_type(tree, current)));
                current = parent;
            }
            None => {
                chain.push(tree.get(current).tag.clone());
                break;
            }
        }
    }

    chain.reverse();
    chain.join(" > ")
}

fn anchor_selector(tree: &Tree, id: NodeId) -> Option<String> {
    let node = tree.get(id);
    if let Some(test_id) = node.attr("data-testid") {
        let mut anchor = String::from("[data-testid=");
        cssparser::serialize_string(test_id, &mut anchor).ok()?;
        anchor.push(']');
        return Some(anchor);
    }
    let element_id = node.attr("id").filter(|value| !value.is_empty())?;
    let mut anchor = format!("{}#", node.tag);
    cssparser::serialize_identifier(element_id, &mut anchor).ok()?;
    Some(anchor)
}

/// Rewrites an XPath-like path into CSS.
struct XPath<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> XPath<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> SelectorError {
        match self.peek() {
            Some(found) => SelectorError::Unexpected {
                selector: self.source.to_string(),
                position: self.pos,
                found,
            },
            None => self.unterminated("path"),
        }
    }

    fn unterminated(&self, what: &'static str) -> SelectorError {
        SelectorError::Unterminated {
            selector: self.source.to_string(),
            what,
        }
    }

    fn name(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.unexpected());
        }
        Ok(self.chars[start..self.pos].iter().collect::<String>().to_lowercase())
    }

    fn until(&mut self, closing: char, what: &'static str) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c != closing) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.unterminated(what));
        }
        let raw = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(raw)
    }

    fn to_css(mut self) -> Result<String, SelectorError> {
        let mut css = String::new();
        let mut first = true;

        while self.peek().is_some() {
            if !self.eat('/') {
                return Err(self.unexpected());
            }
            let descendant = self.eat('/');
            if !first {
                css.push_str(if descendant { " " } else { " > " });
            }

            if self.eat('*') {
                css.push('*');
            } else {
                css.push_str(&self.name()?);
            }
            if first && !descendant {
                css.push_str(":root");
            }
            first = false;

            while self.eat('[') {
                self.predicate(&mut css)?;
            }
        }

        if first {
            return Err(self.unterminated("path"));
        }
        Ok(css)
    }

    fn predicate(&mut self, css: &mut String) -> Result<(), SelectorError> {
        self.skip_whitespace();
        if !self.eat('@') {
            let raw = self.until(']', "position")?;
            return match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => {
                    css.push_str(&format!(":nth-of-type({})", n));
                    Ok(())
                }
                _ => Err(SelectorError::InvalidPosition {
                    selector: self.source.to_string(),
                    value: raw.trim().to_string(),
                }),
            };
        }

        let name = self.name()?;
        self.skip_whitespace();
        if self.eat(']') {
            css.push_str(&format!("[{}]", name));
            return Ok(());
        }
        if !self.eat('=') {
            return Err(self.unexpected());
        }
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                self.until(quote, "string")?
            }
            _ => self.name()?,
        };
        self.skip_whitespace();
        if !self.eat(']') {
            return Err(match self.peek() {
                None => self.unterminated("predicate"),
                Some(_) => self.unexpected(),
            });
        }

        css.push_str(&format!("[{}=", name));
        cssparser::serialize_string(&value, css).map_err(|_| self.unterminated("string"))?;
        css.push(']');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::build;
    use crate::tree::NodePath;

    const PAGE: &str = r#"
        <header><nav><a href="/" class="brand">Home</a><a href="/docs">Docs</a></nav></header>
        <main>
          <form id="login">
            <input name="email" type="email" required>
            <button data-testid="login-btn" class="btn btn-primary">Log in</button>
          </form>
          <div class="card"><p>One</p><p>Two</p></div>
        </main>
    "#;

    fn select(selector: &str) -> Vec<String> {
        let tree = build(PAGE).unwrap();
        Selector::parse(selector)
            .unwrap()
            .select(&tree)
            .into_iter()
            .map(|id| tree.get(id).tag.clone())
            .collect()
    }

    #[test]
    fn test_css_simple_forms() {
        assert_eq!(select("button"), vec!["button"]);
        assert_eq!(select("#login"), vec!["form"]);
        assert_eq!(select(".btn-primary"), vec!["button"]);
        assert_eq!(select("[required]"), vec!["input"]);
        assert_eq!(select(r#"[data-testid="login-btn"]"#), vec!["button"]);
        assert_eq!(select("a[href^='/d']").len(), 1);
        assert_eq!(select("a[href$=docs]").len(), 1);
        assert_eq!(select("a[href*=o]").len(), 1);
        assert_eq!(select("p:nth-of-type(2)").len(), 1);
    }

    #[test]
    fn test_css_combinators() {
        assert_eq!(select("nav a").len(), 2);
        assert_eq!(select("header > a").len(), 0);
        assert_eq!(select("header > nav > a.brand").len(), 1);
        assert_eq!(select("main p").len(), 2);
        assert_eq!(select("form > *").len(), 2);
        assert_eq!(select("input, button").len(), 2);
        assert_eq!(select("a + a").len(), 1);
    }

    #[test]
    fn test_xpath_forms() {
        assert_eq!(select("//button[@data-testid='login-btn']"), vec!["button"]);
        assert_eq!(select("//form//input[@required]"), vec!["input"]);
        assert_eq!(select("/html/body/main/div/p[2]").len(), 1);
        assert_eq!(select("/body").len(), 0);
        assert_eq!(select("//nav/*").len(), 2);
    }

    #[test]
    fn test_xpath_rewrites_to_css() {
        assert_eq!(
            XPath::new("/html/body//a[@href='/docs'][1]").to_css().unwrap(),
            r#"html:root > body a[href="/docs"]:nth-of-type(1)"#
        );
    }

    #[test]
    fn test_text_nodes_never_match() {
        let tree = build("<p>text</p>").unwrap();
        let selector = Selector::parse("*").unwrap();
        let text = tree.lookup(&NodePath::from_indices(vec![1, 0, 0])).unwrap();
        assert!(!selector.matches(&tree, text));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("div > "),
            Err(SelectorError::Invalid { .. })
        ));
        assert!(matches!(
            Selector::parse("> div"),
            Err(SelectorError::Invalid { .. })
        ));
        assert!(matches!(
            Selector::parse("li:hover"),
            Err(SelectorError::Invalid { .. })
        ));
        assert!(matches!(
            Selector::parse("//div[last()]"),
            Err(SelectorError::InvalidPosition { .. })
        ));
        assert!(matches!(
            Selector::parse("//div[@id='x'"),
            Err(SelectorError::Unterminated { .. })
        ));
        assert!(matches!(
            Selector::parse("//div/"),
            Err(SelectorError::Unterminated { .. })
        ));
    }

    #[test]
    fn test_selector_for_prefers_testid_and_id() {
        let tree = build(PAGE).unwrap();
        let button = Selector::parse("button").unwrap().select(&tree)[0];
        assert_eq!(selector_for(&tree, button), r#"[data-testid="login-btn"]"#);

        let input = Selector::parse("input").unwrap().select(&tree)[0];
        assert_eq!(
            selector_for(&tree, input),
            "form#login > input:nth-of-type(1)"
        );
    }

    #[test]
    fn test_selector_for_escapes_odd_ids() {
        let tree = build(r#"<div id="1st item"><p>x</p></div>"#).unwrap();
        let p = Selector::parse("p").unwrap().select(&tree)[0];
        let source = selector_for(&tree, p);
        assert!(source.starts_with("div#"));
        assert!(Selector::parse(&source).unwrap().matches(&tree, p));
    }

    #[test]
    fn test_selector_for_text_uses_parent() {
        let tree = build(PAGE).unwrap();
        let button = Selector::parse("button").unwrap().select(&tree)[0];
        let text = tree.children(button)[0];
        assert_eq!(selector_for(&tree, text), selector_for(&tree, button));
    }

    #[test]
    fn test_synthesized_selectors_resolve_to_their_node() {
        let tree = build(PAGE).unwrap();
        for id in tree.ids() {
            if tree.get(id).is_text() {
                continue;
            }
            let source = selector_for(&tree, id);
            let selector = Selector::parse(&source).unwrap();
            assert!(
                selector.matches(&tree, id),
                "{} does not match its node",
                source
            );
        }
    }
}
