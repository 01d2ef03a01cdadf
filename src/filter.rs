//! Filtering of change records.
//!
//! Records can be dropped by selector (`ignore`), restricted to a set of
//! selectors (`only`), cut below a minimum severity, or stripped of
//! whitespace-only noise. A selector applies to a record when it matches the
//! touched node or any of its ancestors.
//!
//! # Examples
//!
//! ```
//! use domdiff_rs::classify::Severity;
//! use domdiff_rs::filter::FilterConfig;
//!
//! let config = FilterConfig::new()
//!     .ignore("footer")
//!     .unwrap()
//!     .min_severity(Severity::Medium);
//! assert!(config.has_filters());
//! ```

use crate::classify::{ChangeRecord, Severity};
use crate::error::SelectorError;
use crate::selector::Selector;
use crate::tree::Tree;

/// Configuration for filtering change records.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Selectors for regions to ignore
    pub ignore: Vec<Selector>,
    /// Selectors for regions to include (if non-empty, only these are kept)
    pub only: Vec<Selector>,
    pub min_severity: Option<Severity>,
    /// Keep whitespace-only records
    pub include_insignificant: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            only: Vec::new(),
            min_severity: None,
            include_insignificant: true,
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, selector: &str) -> Result<Self, SelectorError> {
        self.ignore.push(Selector::parse(selector)?);
        Ok(self)
    }

    pub fn only(mut self, selector: &str) -> Result<Self, SelectorError> {
        self.only.push(Selector::parse(selector)?);
        Ok(self)
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn exclude_insignificant(mut self) -> Self {
        self.include_insignificant = false;
        self
    }

    pub fn has_filters(&self) -> bool {
        !self.ignore.is_empty()
            || !self.only.is_empty()
            || self.min_severity.is_some()
            || !self.include_insignificant
    }

    pub fn should_include(&self, record: &ChangeRecord, before: &Tree, after: &Tree) -> bool {
        if !self.include_insignificant && record.low_significance {
            return false;
        }
        if let Some(min) = self.min_severity {
            if record.severity < min {
                return false;
            }
        }

        let op = &record.operation;
        if self
            .ignore
            .iter()
            .any(|selector| selector.matches_operation(op, before, after))
        {
            return false;
        }

        // If only selectors are given, at least one must match
        self.only.is_empty()
            || self
                .only
                .iter()
                .any(|selector| selector.matches_operation(op, before, after))
    }
}

/// Filters records, renumbering the survivors so ids stay contiguous.
pub fn filter_records(
    records: Vec<ChangeRecord>,
    config: &FilterConfig,
    before: &Tree,
    after: &Tree,
) -> Vec<ChangeRecord> {
    if !config.has_filters() {
        return records;
    }

    records
        .into_iter()
        .filter(|record| config.should_include(record, before, after))
        .enumerate()
        .map(|(id, mut record)| {
            record.id = id;
            record
        })
        .collect()
}
