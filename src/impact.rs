//! Test-impact analysis.
//!
//! Given classified change records and an externally supplied map from
//! selectors to test ids, works out which existing tests touch the changed
//! nodes and which high-severity changes are not covered by any test.

use crate::classify::{ChangeRecord, Severity};
use crate::script::EditOperation;
use crate::selector::Selector;
use crate::tree::Tree;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Selector → test ids, in authored order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestSelectorMap {
    entries: IndexMap<String, Vec<String>>,
}

impl TestSelectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, selector: impl Into<String>, tests: Vec<String>) {
        self.entries.insert(selector.into(), tests);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.entries.iter()
    }
}

/// Existing tests to re-run, or new tests to write, for a set of changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactSuggestion {
    pub existing_tests: Vec<String>,
    pub new_tests: Vec<String>,
    pub change_ids: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_selectors: Vec<String>,
}

impl ImpactSuggestion {
    pub fn is_new_test(&self) -> bool {
        !self.new_tests.is_empty()
    }
}

pub struct ImpactAnalyzer<'a> {
    before: &'a Tree,
    after: &'a Tree,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(before: &'a Tree, after: &'a Tree) -> Self {
        Self { before, after }
    }

    /// Suggestions for existing tests first (in order of first impact), then
    /// new-test recommendations in record order.
    pub fn analyze(
        &self,
        records: &[ChangeRecord],
        selectors: &TestSelectorMap,
    ) -> Vec<ImpactSuggestion> {
        let compiled: Vec<(&String, Selector, &Vec<String>)> = selectors
            .iter()
            .filter_map(|(source, tests)| match Selector::parse(source) {
                Ok(selector) => Some((source, selector, tests)),
                Err(e) => {
                    warn!(selector = %source, error = %e, "skipping unparseable test selector");
                    None
                }
            })
            .collect();

        let mut by_test: IndexMap<String, ImpactSuggestion> = IndexMap::new();
        let mut uncovered = Vec::new();

        for record in records {
            let mut covered = false;

            for (source, selector, tests) in &compiled {
                let hit = selector.matches_operation(&record.operation, self.before, self.after);
                if !hit || tests.is_empty() {
                    continue;
                }
                covered = true;
                for test in tests.iter() {
                    let suggestion =
                        by_test
                            .entry(test.clone())
                            .or_insert_with(|| ImpactSuggestion {
                                existing_tests: vec![test.clone()],
                                new_tests: Vec::new(),
                                change_ids: Vec::new(),
                                matched_selectors: Vec::new(),
                            });
                    if !suggestion.change_ids.contains(&record.id) {
                        suggestion.change_ids.push(record.id);
                    }
                    if !suggestion.matched_selectors.contains(*source) {
                        suggestion.matched_selectors.push((*source).clone());
                    }
                }
            }

            if !covered && record.severity == Severity::High {
                uncovered.push(ImpactSuggestion {
                    existing_tests: Vec::new(),
                    new_tests: vec![recommend(record)],
                    change_ids: vec![record.id],
                    matched_selectors: Vec::new(),
                });
            }
        }

        debug!(
            impacted_tests = by_test.len(),
            new_tests = uncovered.len(),
            "impact analysis done"
        );

        by_test.into_values().chain(uncovered).collect()
    }
}

/// Synthesizes a new-test description for an uncovered change.
fn recommend(record: &ChangeRecord) -> String {
    let categories = record
        .categories
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let target = &record.selector;
    let action = match &record.operation {
        EditOperation::Insert { .. } => {
            format!("Add a test that exercises the new element '{}'", target)
        }
        EditOperation::Delete { .. } => format!(
            "Add a test that verifies the flow still works without '{}'",
            target
        ),
        EditOperation::Move { .. } => {
            format!("Add a test that checks '{}' in its new position", target)
        }
        EditOperation::AttributeChange { name, .. } => {
            format!("Add a test that checks the {} attribute of '{}'", name, target)
        }
        EditOperation::TextChange { .. } => {
            format!("Add a test that asserts the text of '{}'", target)
        }
    };
    format!("{} ({} change).", action, categories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::config::DiffConfig;
    use crate::diff::compute_diff;
    use crate::parser::build;

    fn analyze(before: &str, after: &str, map: &TestSelectorMap) -> Vec<ImpactSuggestion> {
        let before = build(before).unwrap();
        let after = build(after).unwrap();
        let config = DiffConfig::default();
        let diff = compute_diff(&before, &after, &config);
        let records = Classifier::new(&before, &after, &config.classify).classify_all(diff.operations);
        ImpactAnalyzer::new(&before, &after).analyze(&records, map)
    }

    const LOGIN_BEFORE: &str = r#"<form id="login"><input id="user"><button data-testid="login-btn">Log in</button></form>"#;
    const LOGIN_AFTER: &str = r#"<form id="login"><input id="user"></form>"#;

    #[test]
    fn test_uncovered_high_change_recommends_new_test() {
        let suggestions = analyze(LOGIN_BEFORE, LOGIN_AFTER, &TestSelectorMap::new());
        assert_eq!(suggestions.len(), 1);
        let suggestion = &suggestions[0];
        assert!(suggestion.is_new_test());
        assert!(suggestion.existing_tests.is_empty());
        assert_eq!(
            suggestion.new_tests[0],
            "Add a test that verifies the flow still works without '[data-testid=\"login-btn\"]' (structural, identity change)."
        );
    }

    #[test]
    fn test_matching_selector_coalesces_records() {
        let mut map = TestSelectorMap::new();
        map.insert("#login", vec!["auth::login_flow".to_string()]);
        map.insert(
            "[data-testid='login-btn']",
            vec!["auth::login_flow".to_string(), "auth::button".to_string()],
        );
        let suggestions = analyze(LOGIN_BEFORE, LOGIN_AFTER, &map);

        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].existing_tests, vec!["auth::login_flow"]);
        assert_eq!(suggestions[0].change_ids, vec![0, 1]);
        assert_eq!(
            suggestions[0].matched_selectors,
            vec!["#login", "[data-testid='login-btn']"]
        );
        assert_eq!(suggestions[1].existing_tests, vec!["auth::button"]);
        assert!(suggestions.iter().all(|s| !s.is_new_test()));
    }

    #[test]
    fn test_ancestor_selector_matches() {
        let mut map = TestSelectorMap::new();
        map.insert("form", vec!["forms::smoke".to_string()]);
        let suggestions = analyze(
            r#"<form><label>Name</label></form>"#,
            r#"<form><label>Full name</label></form>"#,
            &map,
        );
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].existing_tests, vec!["forms::smoke"]);
    }

    #[test]
    fn test_unparseable_selector_is_skipped() {
        let mut map = TestSelectorMap::new();
        map.insert("button:hover", vec!["ui::hover".to_string()]);
        map.insert("form", vec!["forms::smoke".to_string()]);
        let suggestions = analyze(LOGIN_BEFORE, LOGIN_AFTER, &map);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].existing_tests, vec!["forms::smoke"]);
    }

    #[test]
    fn test_low_severity_uncovered_changes_are_ignored() {
        let suggestions = analyze(
            r#"<p id="intro">Hello</p>"#,
            r#"<p id="intro">Hello there</p>"#,
            &TestSelectorMap::new(),
        );
        assert!(suggestions.is_empty());
    }
}
