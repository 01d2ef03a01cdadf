//! DOMDIFF - Structural diff engine for HTML documents.
//!
//! This library compares two versions of a document as trees rather than as
//! text: nodes are matched across versions by identity attributes and by
//! structural similarity, the matching is turned into an ordered edit
//! script, and every edit is classified by category and severity and mapped
//! onto the tests whose selectors touch it.
//!
//! # Example
//!
//! ```
//! use domdiff_rs::classify::Classifier;
//! use domdiff_rs::{apply, build, compute_diff, DiffConfig};
//!
//! let before = build(r#"<div><button id="submit">Save</button></div>"#).unwrap();
//! let after = build(r#"<div><button id="submit" class="primary">Save Now</button></div>"#).unwrap();
//!
//! let config = DiffConfig::default();
//! let diff = compute_diff(&before, &after, &config);
//!
//! // Replaying the script reproduces the after-tree
//! let replayed = apply(&before, &diff.operations).unwrap();
//! assert!(replayed.structurally_equal(&after));
//!
//! let records = Classifier::new(&before, &after, &config.classify).classify_all(diff.operations);
//! assert_eq!(records[1].description, "Button text changed from 'Save' to 'Save Now'.");
//! ```

pub mod apply;
pub mod batch;
pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod impact;
pub mod matching;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod screenshot;
pub mod script;
pub mod selector;
pub mod tree;

// Re-export commonly used types for convenience
pub use apply::apply;
pub use classify::{Category, ChangeRecord, Severity};
pub use config::DiffConfig;
pub use diff::{compute_diff, Diff, DiffStats};
pub use error::{ApplyError, DomDiffError, OutputError, ParseError, SchemaError, SelectorError};
pub use output::{format_report, OutputFormat, OutputOptions};
pub use parser::{build, build_file, build_with};
pub use pipeline::{DiffEngine, DiffInput, Source};
pub use report::{assemble, DiffReport, SampleMetadata};
pub use script::EditOperation;
pub use selector::Selector;
pub use tree::{NodePath, Tree};
