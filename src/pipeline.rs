//! End-to-end diff pipeline.
//!
//! Build both trees, match, generate the script, classify, filter, analyze
//! impact and assemble the report. Stateless: a [`DiffEngine`] can be shared
//! across threads and reused for any number of document pairs.

use crate::classify::Classifier;
use crate::config::DiffConfig;
use crate::diff::compute_diff;
use crate::error::DomDiffError;
use crate::filter::{filter_records, FilterConfig};
use crate::impact::{ImpactAnalyzer, TestSelectorMap};
use crate::parser::{build_file, build_with};
use crate::report::{assemble, DiffReport, SampleMetadata};
use crate::screenshot::{capture_pair, ScreenshotProvider};
use crate::tree::Tree;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where one side's markup comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Markup(String),
    File(PathBuf),
}

impl Source {
    fn load(&self, config: &DiffConfig) -> Result<Tree, DomDiffError> {
        let tree = match self {
            Source::Markup(markup) => build_with(markup, &config.build)?,
            Source::File(path) => build_file(path, &config.build)?,
        };
        Ok(tree)
    }

    fn path(&self) -> Option<&PathBuf> {
        match self {
            Source::File(path) => Some(path),
            Source::Markup(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiffInput {
    pub before: Source,
    pub after: Source,
    pub metadata: SampleMetadata,
}

#[derive(Clone, Default)]
pub struct DiffEngine {
    pub config: DiffConfig,
    pub filter: FilterConfig,
    screenshots: Option<Arc<dyn ScreenshotProvider>>,
}

impl DiffEngine {
    pub fn new(config: DiffConfig) -> Self {
        Self {
            config,
            filter: FilterConfig::default(),
            screenshots: None,
        }
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    /// Screenshots are only requested for file inputs.
    pub fn with_screenshots(mut self, provider: Arc<dyn ScreenshotProvider>) -> Self {
        self.screenshots = Some(provider);
        self
    }

    /// Runs the full pipeline for one document pair.
    ///
    /// # Errors
    ///
    /// Parse failures on either side and metadata schema violations.
    pub fn run(
        &self,
        input: &DiffInput,
        selectors: &TestSelectorMap,
    ) -> Result<DiffReport, DomDiffError> {
        let before = input.before.load(&self.config)?;
        let after = input.after.load(&self.config)?;
        debug!(
            before_nodes = before.len(),
            after_nodes = after.len(),
            "built trees"
        );

        let diff = compute_diff(&before, &after, &self.config);
        let records = Classifier::new(&before, &after, &self.config.classify)
            .classify_all(diff.operations);
        let records = filter_records(records, &self.filter, &before, &after);
        let suggestions = ImpactAnalyzer::new(&before, &after).analyze(&records, selectors);

        let mut report =
            assemble(records, suggestions, &input.metadata)?.with_warnings(diff.warnings);

        if let (Some(provider), Some(before_path), Some(after_path)) = (
            self.screenshots.as_deref(),
            input.before.path(),
            input.after.path(),
        ) {
            report = report.with_screenshots(capture_pair(provider, before_path, after_path));
        }

        debug!(
            sample = %report.sample.sample_id,
            changes = report.changes.len(),
            suggestions = report.suggestions.len(),
            "report assembled"
        );
        Ok(report)
    }
}
