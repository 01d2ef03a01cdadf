//! Output formatting for diff reports.
//!
//! Reports render as colored terminal text, plain text (for piping), or the
//! JSON annotation artifact.
//!
//! # Examples
//!
//! ```
//! use domdiff_rs::{build, format_report, DiffEngine, OutputFormat, OutputOptions};
//! use domdiff_rs::impact::TestSelectorMap;
//! use domdiff_rs::pipeline::{DiffInput, Source};
//! use domdiff_rs::report::SampleMetadata;
//!
//! let input = DiffInput {
//!     before: Source::Markup("<p>Hello</p>".to_string()),
//!     after: Source::Markup("<p>Hello there</p>".to_string()),
//!     metadata: SampleMetadata::new("sample_001", "2025-01-15T10:30:00Z"),
//! };
//! let report = DiffEngine::default().run(&input, &TestSelectorMap::new()).unwrap();
//!
//! let output = format_report(&report, OutputFormat::Plain, &OutputOptions::default()).unwrap();
//! assert!(output.contains("Hello there"));
//! ```

use crate::classify::{ChangeRecord, Severity};
use crate::error::OutputError;
use crate::impact::ImpactSuggestion;
use crate::report::DiffReport;
use crate::script::EditOperation;
use crate::tree::truncate;
use colored::*;
use std::str::FromStr;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Colored terminal output with ANSI escape codes
    Terminal,
    /// The annotation artifact as pretty-printed JSON
    Json,
    /// Plain text, no colors (suitable for piping)
    Plain,
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(OutputFormat::Terminal),
            "json" => Ok(OutputFormat::Json),
            "plain" => Ok(OutputFormat::Plain),
            _ => Err(OutputError::UnknownFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Options for controlling text output.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Show the category labels of each change
    pub show_categories: bool,
    /// Show test-impact suggestions after the changes
    pub show_suggestions: bool,
    /// Maximum length of a displayed description
    pub max_value_length: usize,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            show_categories: false,
            show_suggestions: true,
            max_value_length: 120,
        }
    }
}

/// Formats a report according to the specified format and options.
pub fn format_report(
    report: &DiffReport,
    format: OutputFormat,
    options: &OutputOptions,
) -> Result<String, OutputError> {
    match format {
        OutputFormat::Terminal => Ok(format_text(report, options, true)),
        OutputFormat::Json => format_json(report),
        OutputFormat::Plain => Ok(format_text(report, options, false)),
    }
}

fn format_json(report: &DiffReport) -> Result<String, OutputError> {
    serde_json::to_string_pretty(&report.annotation())
        .map_err(|e| OutputError::JsonSerializationError { source: e })
}

fn format_text(report: &DiffReport, options: &OutputOptions, color: bool) -> String {
    if !report.has_changes() {
        let line = "No changes detected.";
        return if color {
            line.dimmed().to_string()
        } else {
            line.to_string()
        };
    }

    let mut output = String::new();
    for record in &report.changes {
        output.push_str(&format_record(record, options, color));
        output.push('\n');
    }

    if options.show_suggestions && !report.suggestions.is_empty() {
        output.push('\n');
        let heading = "Test impact:";
        if color {
            output.push_str(&heading.bold().to_string());
        } else {
            output.push_str(heading);
        }
        output.push('\n');
        for suggestion in &report.suggestions {
            output.push_str(&format_suggestion(suggestion, color));
            output.push('\n');
        }
    }

    if !report.warnings.is_empty() {
        output.push('\n');
        let line = format!("{} ambiguous match(es)", report.warnings.len());
        if color {
            output.push_str(&line.yellow().to_string());
        } else {
            output.push_str(&line);
        }
        output.push('\n');
    }

    output.push('\n');
    output.push_str(&format_summary(report));
    output
}

/// One line per record: symbol, severity, selector, description.
fn format_record(record: &ChangeRecord, options: &OutputOptions, color: bool) -> String {
    let symbol = symbol(&record.operation);
    let severity = format!("[{}]", record.severity);
    let description = truncate(&record.description, options.max_value_length);
    let categories = if options.show_categories {
        let labels: Vec<&str> = record.categories.iter().map(|c| c.as_str()).collect();
        format!(" ({})", labels.join(", "))
    } else {
        String::new()
    };

    if !color {
        return format!(
            "{} {} {}: {}{}",
            symbol, severity, record.selector, description, categories
        );
    }

    let symbol = match &record.operation {
        EditOperation::Insert { .. } => symbol.bright_green(),
        EditOperation::Delete { .. } => symbol.bright_red(),
        EditOperation::Move { .. } => symbol.bright_cyan(),
        _ => symbol.bright_yellow(),
    };
    let severity = match record.severity {
        Severity::High => severity.bright_red().bold(),
        Severity::Medium => severity.yellow(),
        Severity::Low => severity.dimmed(),
    };
    let description = if record.low_significance {
        description.dimmed()
    } else {
        description.normal()
    };
    format!(
        "{} {} {}: {}{}",
        symbol,
        severity,
        record.selector.cyan(),
        description,
        categories.dimmed()
    )
}

fn symbol(op: &EditOperation) -> &'static str {
    match op {
        EditOperation::Insert { .. } => "+",
        EditOperation::Delete { .. } => "-",
        EditOperation::Move { .. } => "~",
        EditOperation::AttributeChange { .. } | EditOperation::TextChange { .. } => "•",
    }
}

fn format_suggestion(suggestion: &ImpactSuggestion, color: bool) -> String {
    let ids: Vec<String> = suggestion.change_ids.iter().map(|id| format!("#{}", id)).collect();
    let ids = ids.join(", ");
    if suggestion.is_new_test() {
        let text = suggestion.new_tests.join("; ");
        if color {
            format!("  {} {} ({})", "new".bright_magenta(), text, ids.dimmed())
        } else {
            format!("  new {} ({})", text, ids)
        }
    } else {
        let tests = suggestion.existing_tests.join(", ");
        if color {
            format!("  {} {} ({})", "rerun".bright_blue(), tests, ids.dimmed())
        } else {
            format!("  rerun {} ({})", tests, ids)
        }
    }
}

/// Formats summary statistics.
fn format_summary(report: &DiffReport) -> String {
    if !report.has_changes() {
        return "Summary: No changes".to_string();
    }

    let severities: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .filter_map(|severity| {
            let count = report.summary.by_severity.get(severity).copied().unwrap_or(0);
            (count > 0).then(|| format!("{} {}", count, severity))
        })
        .collect();
    let categories: Vec<String> = report
        .summary
        .by_category
        .iter()
        .map(|(category, count)| format!("{} {}", count, category))
        .collect();

    format!(
        "Summary: {} change{} ({}); {}",
        report.summary.total,
        if report.summary.total == 1 { "" } else { "s" },
        severities.join(", "),
        categories.join(", ")
    )
}
