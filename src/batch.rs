//! Batch diffing of a dataset directory.
//!
//! A dataset directory holds one subdirectory per sample, each with a
//! `before.html` and an `after.html` and optionally a `metadata.json`
//! carrying the sample's descriptive fields. Samples are independent, so
//! they are diffed on the rayon pool and each gets its own result.

use crate::error::{DomDiffError, ParseError};
use crate::impact::TestSelectorMap;
use crate::pipeline::{DiffEngine, DiffInput, Source};
use crate::report::{DiffReport, SampleMetadata};
use chrono::{SecondsFormat, Utc};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const BEFORE_FILE: &str = "before.html";
pub const AFTER_FILE: &str = "after.html";
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: String,
    pub dir: PathBuf,
}

impl Sample {
    pub fn before(&self) -> PathBuf {
        self.dir.join(BEFORE_FILE)
    }

    pub fn after(&self) -> PathBuf {
        self.dir.join(AFTER_FILE)
    }

    /// Metadata for this sample: `metadata.json` when present, layered over
    /// `defaults`, with the directory name as sample id and the current time
    /// as timestamp when neither supplies one.
    pub fn metadata(&self, defaults: &SampleMetadata) -> Result<SampleMetadata, ParseError> {
        let path = self.dir.join(METADATA_FILE);
        let mut metadata = if path.is_file() {
            let name = path.to_string_lossy().to_string();
            let content = fs::read_to_string(&path).map_err(|e| ParseError::read_error(&name, e))?;
            let own: MetadataOverlay =
                serde_json::from_str(&content).map_err(|e| ParseError::json_error(&name, e))?;
            own.over(defaults)
        } else {
            defaults.clone()
        };

        if metadata.sample_id.is_none() {
            metadata.sample_id = Some(self.id.clone());
        }
        if metadata.created_at_utc.is_none() {
            metadata.created_at_utc = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        Ok(metadata)
    }
}

/// A sample's own `metadata.json`. Only the fields it names override the
/// batch defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MetadataOverlay {
    sample_id: Option<String>,
    page_type: Option<String>,
    source: Option<String>,
    created_by: Option<String>,
    created_at_utc: Option<String>,
    dom_version_before: Option<String>,
    dom_version_after: Option<String>,
}

impl MetadataOverlay {
    fn over(self, defaults: &SampleMetadata) -> SampleMetadata {
        let defaults = defaults.clone();
        SampleMetadata {
            sample_id: self.sample_id.or(defaults.sample_id),
            page_type: self.page_type.unwrap_or(defaults.page_type),
            source: self.source.unwrap_or(defaults.source),
            created_by: self.created_by.unwrap_or(defaults.created_by),
            created_at_utc: self.created_at_utc.or(defaults.created_at_utc),
            dom_version_before: self.dom_version_before.unwrap_or(defaults.dom_version_before),
            dom_version_after: self.dom_version_after.unwrap_or(defaults.dom_version_after),
        }
    }
}

/// Subdirectories of `dir` holding both markup files, sorted by name.
pub fn discover_samples(dir: &Path) -> Result<Vec<Sample>, ParseError> {
    let name = dir.to_string_lossy().to_string();
    if !dir.is_dir() {
        return Err(ParseError::file_not_found(name));
    }

    let entries = fs::read_dir(dir).map_err(|e| ParseError::read_error(&name, e))?;
    let mut samples = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ParseError::read_error(&name, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join(BEFORE_FILE).is_file() && path.join(AFTER_FILE).is_file() {
            samples.push(Sample {
                id: entry.file_name().to_string_lossy().to_string(),
                dir: path,
            });
        } else {
            debug!(dir = %path.display(), "skipping directory without before/after markup");
        }
    }

    samples.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(samples)
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub sample: Sample,
    pub result: Result<DiffReport, DomDiffError>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Diffs every sample in parallel. Outcomes keep the order of `samples`.
pub fn run_batch(
    engine: &DiffEngine,
    samples: &[Sample],
    selectors: &TestSelectorMap,
    defaults: &SampleMetadata,
) -> Vec<BatchOutcome> {
    samples
        .par_iter()
        .map(|sample| {
            let result = sample
                .metadata(defaults)
                .map_err(DomDiffError::from)
                .and_then(|metadata| {
                    let input = DiffInput {
                        before: Source::File(sample.before()),
                        after: Source::File(sample.after()),
                        metadata,
                    };
                    engine.run(&input, selectors)
                });
            if let Err(e) = &result {
                warn!(sample = %sample.id, error = %e, "sample failed");
            }
            BatchOutcome {
                sample: sample.clone(),
                result,
            }
        })
        .collect()
}
