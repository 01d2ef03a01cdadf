//! Tunable configuration for the diff pipeline.
//!
//! Every knob has a default, so an empty TOML file (or none at all) yields the
//! stock behaviour. A config file only needs the keys it overrides:
//!
//! ```toml
//! [matching]
//! min_confidence = 0.6
//!
//! [matching.weights]
//! text = 0.5
//! ```

use crate::error::{DomDiffError, ParseError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffConfig {
    pub build: BuildOptions,
    pub matching: MatchConfig,
    pub classify: ClassifyConfig,
}

/// How markup is turned into a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    /// Full document; the root is `<html>` with `<head>` and `<body>`.
    Document,
    /// Body fragment placed directly under an `<html>` root.
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    pub mode: DocumentMode,
    /// Keep whitespace-only text nodes (flagged as low significance).
    pub keep_whitespace: bool,
    /// Deepest element nesting accepted before the input is rejected.
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: DocumentMode::Document,
            keep_whitespace: true,
            max_depth: 512,
        }
    }
}

/// Relative weights of the structural similarity score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchWeights {
    pub attributes: f64,
    pub text: f64,
    pub position: f64,
    pub parent: f64,
}

impl MatchWeights {
    pub fn total(&self) -> f64 {
        self.attributes + self.text + self.position + self.parent
    }
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            attributes: 0.3,
            text: 0.3,
            position: 0.1,
            parent: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchConfig {
    pub weights: MatchWeights,
    /// A structural candidate must score strictly above this to be paired.
    pub min_confidence: f64,
    /// Attributes whose unique values pin two elements together.
    pub identity_attributes: Vec<String>,
    /// Text longer than this many characters is truncated before comparison.
    pub max_text_compare: usize,
    /// After-nodes scored per before-node in each structural pass.
    pub max_candidates: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            min_confidence: 0.5,
            identity_attributes: strings(&["id", "data-testid"]),
            max_text_compare: 256,
            max_candidates: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifyConfig {
    pub style_attributes: Vec<String>,
    pub identity_attributes: Vec<String>,
    /// Non-style attributes that change rendering geometry on their own.
    pub layout_attributes: Vec<String>,
    /// CSS properties considered layout-relevant. A declaration matches when
    /// its name equals an entry or starts with the entry followed by `-`.
    pub layout_properties: Vec<String>,
    pub interactive_tags: Vec<String>,
    pub interactive_roles: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            style_attributes: strings(&["style", "class"]),
            identity_attributes: strings(&["id", "data-testid", "name"]),
            layout_attributes: strings(&["hidden"]),
            layout_properties: strings(&[
                "position",
                "display",
                "visibility",
                "float",
                "top",
                "right",
                "bottom",
                "left",
                "z-index",
                "width",
                "height",
                "margin",
                "padding",
                "flex",
                "grid",
                "order",
                "overflow",
            ]),
            interactive_tags: strings(&[
                "button", "a", "input", "select", "textarea", "option", "form",
            ]),
            interactive_roles: strings(&[
                "button", "link", "checkbox", "radio", "textbox", "combobox", "menuitem", "tab",
                "switch",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl DiffConfig {
    /// Parses and validates a TOML config. `source` names the input in errors.
    pub fn from_toml_str(content: &str, source: &str) -> Result<Self, DomDiffError> {
        let config: DiffConfig =
            toml::from_str(content).map_err(|e| ParseError::toml_error(source, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML config file.
    pub fn load(path: &Path) -> Result<Self, DomDiffError> {
        let name = path.to_string_lossy().to_string();
        if !path.exists() {
            return Err(ParseError::file_not_found(name).into());
        }
        let content = fs::read_to_string(path).map_err(|e| ParseError::read_error(&name, e))?;
        Self::from_toml_str(&content, &name)
    }

    pub fn validate(&self) -> Result<(), DomDiffError> {
        let weights = &self.matching.weights;
        let all = [
            ("attributes", weights.attributes),
            ("text", weights.text),
            ("position", weights.position),
            ("parent", weights.parent),
        ];
        for (name, value) in all {
            if !value.is_finite() || value < 0.0 {
                return Err(DomDiffError::config(format!(
                    "matching.weights.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if weights.total() <= 0.0 {
            return Err(DomDiffError::config(
                "matching.weights must not all be zero",
            ));
        }
        let threshold = self.matching.min_confidence;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DomDiffError::config(format!(
                "matching.min_confidence must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.matching.max_candidates == 0 {
            return Err(DomDiffError::config(
                "matching.max_candidates must be positive",
            ));
        }
        if self.build.max_depth == 0 {
            return Err(DomDiffError::config("build.max_depth must be positive"));
        }
        Ok(())
    }
}
