//! Report assembly.
//!
//! Merges classified records and impact suggestions into a [`DiffReport`]
//! and validates the sample metadata at this boundary. The report renders
//! into the two dataset artifacts: the annotation and the metadata record.

use crate::classify::{count_by_category, count_by_severity, Category, ChangeRecord, Severity};
use crate::error::SchemaError;
use crate::impact::ImpactSuggestion;
use crate::matching::MatchAmbiguity;
use crate::screenshot::Screenshots;
use crate::script::EditOperation;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive fields of a sample, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleMetadata {
    pub sample_id: Option<String>,
    pub page_type: String,
    pub source: String,
    pub created_by: String,
    /// RFC 3339 timestamp.
    pub created_at_utc: Option<String>,
    pub dom_version_before: String,
    pub dom_version_after: String,
}

impl Default for SampleMetadata {
    fn default() -> Self {
        Self {
            sample_id: None,
            page_type: "unknown".to_string(),
            source: "custom_demo_app".to_string(),
            created_by: "domdiff".to_string(),
            created_at_utc: None,
            dom_version_before: "v1".to_string(),
            dom_version_after: "v2".to_string(),
        }
    }
}

impl SampleMetadata {
    pub fn new(sample_id: impl Into<String>, created_at_utc: impl Into<String>) -> Self {
        Self {
            sample_id: Some(sample_id.into()),
            created_at_utc: Some(created_at_utc.into()),
            ..Default::default()
        }
    }
}

/// Validated sample information carried by a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleInfo {
    pub sample_id: String,
    pub page_type: String,
    pub source: String,
    pub created_by: String,
    pub created_at_utc: String,
    pub dom_version_before: String,
    pub dom_version_after: String,
}

/// Counts in the shape of the dataset's `change_summary`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub text_changes: usize,
    pub style_changes: usize,
    pub layout_changes: usize,
    pub elements_added: usize,
    pub elements_removed: usize,
    pub attribute_changes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub change_summary: ChangeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffReport {
    pub sample: SampleInfo,
    pub changes: Vec<ChangeRecord>,
    pub suggestions: Vec<ImpactSuggestion>,
    pub summary: ReportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Screenshots>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<MatchAmbiguity>,
}

/// The annotation artifact.
#[derive(Debug, Serialize)]
pub struct Annotation<'a> {
    pub sample_id: &'a str,
    pub page_type: &'a str,
    pub dom_changes: &'a [ChangeRecord],
    pub change_categories: &'a BTreeMap<Category, usize>,
    pub severity_counts: &'a BTreeMap<Severity, usize>,
    pub test_impact_analysis: Vec<&'a ImpactSuggestion>,
    pub new_tests_recommended: Vec<&'a ImpactSuggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<&'a Screenshots>,
    #[serde(skip_serializing_if = "<[MatchAmbiguity]>::is_empty")]
    pub warnings: &'a [MatchAmbiguity],
}

/// The metadata artifact.
#[derive(Debug, Serialize)]
pub struct Metadata<'a> {
    pub sample_id: &'a str,
    pub page_type: &'a str,
    pub source: &'a str,
    pub created_by: &'a str,
    pub created_at_utc: &'a str,
    pub dom_version_before: &'a str,
    pub dom_version_after: &'a str,
    pub change_categories: &'a BTreeMap<Category, usize>,
    pub change_summary: &'a ChangeSummary,
}

/// Builds a report, validating the metadata.
///
/// # Errors
///
/// - `SchemaError::MissingField` if the sample id or timestamp is absent or blank
/// - `SchemaError::InvalidTimestamp` if the timestamp is not RFC 3339
pub fn assemble(
    records: Vec<ChangeRecord>,
    suggestions: Vec<ImpactSuggestion>,
    metadata: &SampleMetadata,
) -> Result<DiffReport, SchemaError> {
    let sample_id = required(&metadata.sample_id, "sample_id")?;
    let created_at = required(&metadata.created_at_utc, "created_at_utc")?;
    DateTime::parse_from_rfc3339(&created_at).map_err(|source| {
        SchemaError::InvalidTimestamp {
            value: created_at.clone(),
            source,
        }
    })?;

    let summary = ReportSummary {
        total: records.len(),
        by_category: count_by_category(&records),
        by_severity: count_by_severity(&records),
        change_summary: change_summary(&records),
    };

    Ok(DiffReport {
        sample: SampleInfo {
            sample_id,
            page_type: metadata.page_type.clone(),
            source: metadata.source.clone(),
            created_by: metadata.created_by.clone(),
            created_at_utc: created_at,
            dom_version_before: metadata.dom_version_before.clone(),
            dom_version_after: metadata.dom_version_after.clone(),
        },
        changes: records,
        suggestions,
        summary,
        screenshots: None,
        warnings: Vec::new(),
    })
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, SchemaError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(SchemaError::MissingField { field }),
    }
}

fn change_summary(records: &[ChangeRecord]) -> ChangeSummary {
    let mut summary = ChangeSummary::default();
    for record in records {
        let has = |category| record.categories.contains(&category);
        if has(Category::Text) {
            summary.text_changes += 1;
        }
        if has(Category::Style) {
            summary.style_changes += 1;
        }
        if has(Category::Layout) {
            summary.layout_changes += 1;
        }
        match &record.operation {
            EditOperation::Insert { node, .. } if !node.is_text() => summary.elements_added += 1,
            EditOperation::Delete { node, .. } if !node.is_text() => summary.elements_removed += 1,
            EditOperation::AttributeChange { .. } => summary.attribute_changes += 1,
            _ => {}
        }
    }
    summary
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn with_screenshots(mut self, screenshots: Screenshots) -> Self {
        self.screenshots = Some(screenshots);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<MatchAmbiguity>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn annotation(&self) -> Annotation<'_> {
        let (new_tests, existing): (Vec<_>, Vec<_>) =
            self.suggestions.iter().partition(|s| s.is_new_test());
        Annotation {
            sample_id: &self.sample.sample_id,
            page_type: &self.sample.page_type,
            dom_changes: &self.changes,
            change_categories: &self.summary.by_category,
            severity_counts: &self.summary.by_severity,
            test_impact_analysis: existing,
            new_tests_recommended: new_tests,
            screenshots: self.screenshots.as_ref(),
            warnings: &self.warnings,
        }
    }

    pub fn metadata(&self) -> Metadata<'_> {
        Metadata {
            sample_id: &self.sample.sample_id,
            page_type: &self.sample.page_type,
            source: &self.sample.source,
            created_by: &self.sample.created_by,
            created_at_utc: &self.sample.created_at_utc,
            dom_version_before: &self.sample.dom_version_before,
            dom_version_after: &self.sample.dom_version_after,
            change_categories: &self.summary.by_category,
            change_summary: &self.summary.change_summary,
        }
    }
}
