//! DOMDIFF command-line interface.
//!
//! This is the main entry point for the domdiff CLI tool. It uses clap for
//! argument parsing and wires the library pipeline together: build, match,
//! classify, filter, analyze impact and report.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::{Parser, ValueEnum};
use domdiff_rs::batch::{discover_samples, run_batch};
use domdiff_rs::classify::Severity;
use domdiff_rs::config::DocumentMode;
use domdiff_rs::filter::FilterConfig;
use domdiff_rs::impact::TestSelectorMap;
use domdiff_rs::parser::load_selector_map;
use domdiff_rs::pipeline::{DiffEngine, DiffInput, Source};
use domdiff_rs::report::{DiffReport, SampleMetadata};
use domdiff_rs::screenshot::SiblingFileScreenshots;
use domdiff_rs::{format_report, DiffConfig, OutputFormat, OutputOptions};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// DOMDIFF - Structural diff engine for HTML documents
///
/// Compares two versions of a page, classifies every change by category and
/// severity, and maps changes onto the tests that exercise them.
#[derive(Parser)]
#[command(name = "domdiff-rs")]
#[command(version)]
#[command(about = "Structural diff engine for HTML documents", long_about = None)]
#[command(author = "DOMDIFF Contributors")]
struct Cli {
    /// Markup before the change
    #[arg(value_name = "BEFORE", required_unless_present = "batch")]
    before: Option<PathBuf>,

    /// Markup after the change
    #[arg(value_name = "AFTER", required_unless_present = "batch")]
    after: Option<PathBuf>,

    /// Diff every sample directory (holding before.html and after.html) under DIR
    #[arg(long, value_name = "DIR", conflicts_with_all = ["before", "after"])]
    batch: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "terminal")]
    format: OutputFormatArg,

    /// Test selector map (JSON or YAML): selector -> test ids
    #[arg(short, long, value_name = "MAP")]
    tests: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Sample id (defaults to the directory holding BEFORE)
    #[arg(long)]
    sample_id: Option<String>,

    #[arg(long, default_value = "unknown")]
    page_type: String,

    #[arg(long, default_value = "custom_demo_app")]
    source: String,

    #[arg(long, default_value = "domdiff")]
    created_by: String,

    /// RFC 3339 creation timestamp (defaults to now)
    #[arg(long)]
    created_at: Option<String>,

    #[arg(long, default_value = "v1")]
    dom_before: String,

    #[arg(long, default_value = "v2")]
    dom_after: String,

    /// Treat inputs as body fragments rather than full documents
    #[arg(long)]
    fragment: bool,

    /// Ignore changes inside elements matching SELECTOR (repeatable)
    #[arg(long, value_name = "SELECTOR")]
    ignore: Vec<String>,

    /// Only keep changes inside elements matching SELECTOR (repeatable)
    #[arg(long, value_name = "SELECTOR")]
    only: Vec<String>,

    /// Drop changes below this severity
    #[arg(long, value_enum)]
    min_severity: Option<SeverityArg>,

    /// Drop whitespace-only changes
    #[arg(long)]
    ignore_whitespace: bool,

    /// Show category labels next to each change
    #[arg(long)]
    categories: bool,

    /// Write annotation.json and metadata.json into DIR
    #[arg(long, value_name = "DIR")]
    write_dir: Option<PathBuf>,

    /// Attach screenshots rendered next to the markup files (<stem>.png)
    #[arg(long)]
    screenshots: bool,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (only show changes, suppress summary)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format argument for clap
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormatArg {
    /// Colored terminal output
    Terminal,
    /// Annotation JSON
    Json,
    /// Plain text (no colors)
    Plain,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Terminal => OutputFormat::Terminal,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Plain => OutputFormat::Plain,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            process::exit(2);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = match &cli.config {
        Some(path) => DiffConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => DiffConfig::default(),
    };
    if cli.fragment {
        config.build.mode = DocumentMode::Fragment;
    }

    let selectors = match &cli.tests {
        Some(path) => load_selector_map(path)
            .with_context(|| format!("Failed to load test selector map: {}", path.display()))?,
        None => TestSelectorMap::new(),
    };

    let mut engine = DiffEngine::new(config).with_filter(build_filter(&cli)?);
    if cli.screenshots {
        engine = engine.with_screenshots(Arc::new(SiblingFileScreenshots));
    }

    if let Some(dir) = &cli.batch {
        return run_batch_mode(&cli, &engine, dir, &selectors);
    }

    let (Some(before), Some(after)) = (&cli.before, &cli.after) else {
        bail!("BEFORE and AFTER are required unless --batch is given");
    };

    let mut metadata = base_metadata(&cli);
    metadata.sample_id = cli.sample_id.clone().or_else(|| directory_name(before));
    if metadata.created_at_utc.is_none() {
        metadata.created_at_utc = Some(now());
    }

    let input = DiffInput {
        before: Source::File(before.clone()),
        after: Source::File(after.clone()),
        metadata,
    };
    let report = engine.run(&input, &selectors).with_context(|| {
        format!(
            "Failed to diff {} against {}",
            before.display(),
            after.display()
        )
    })?;

    if let Some(dir) = &cli.write_dir {
        write_artifacts(&report, dir)?;
    }

    let output_format: OutputFormat = cli.format.into();
    let options = OutputOptions {
        show_categories: cli.categories,
        show_suggestions: !cli.quiet,
        ..Default::default()
    };
    let output =
        format_report(&report, output_format, &options).context("Failed to format diff output")?;

    if !cli.quiet || output_format == OutputFormat::Json {
        println!("{}", output);
    } else {
        for line in output.lines() {
            if !line.starts_with("Summary:") && !line.trim().is_empty() {
                println!("{}", line);
            }
        }
    }

    Ok(if report.has_changes() { 1 } else { 0 })
}

fn run_batch_mode(
    cli: &Cli,
    engine: &DiffEngine,
    dir: &Path,
    selectors: &TestSelectorMap,
) -> Result<i32> {
    let samples = discover_samples(dir)
        .with_context(|| format!("Failed to scan dataset directory: {}", dir.display()))?;
    let outcomes = run_batch(engine, &samples, selectors, &base_metadata(cli));

    let mut failed = 0;
    let mut changed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                if report.has_changes() {
                    changed += 1;
                }
                if let Some(root) = &cli.write_dir {
                    write_artifacts(report, &root.join(&outcome.sample.id))?;
                }
                if !cli.quiet {
                    println!(
                        "{}: {} change(s), {} suggestion(s)",
                        outcome.sample.id,
                        report.changes.len(),
                        report.suggestions.len()
                    );
                }
            }
            Err(err) => {
                failed += 1;
                eprintln!("{}: {}", outcome.sample.id, err);
            }
        }
    }

    if !cli.quiet {
        println!(
            "Summary: {} sample(s), {} with changes, {} failed",
            outcomes.len(),
            changed,
            failed
        );
    }

    Ok(if failed > 0 {
        2
    } else if changed > 0 {
        1
    } else {
        0
    })
}

fn build_filter(cli: &Cli) -> Result<FilterConfig> {
    let mut filter = FilterConfig::new();
    for selector in &cli.ignore {
        filter = filter
            .ignore(selector)
            .with_context(|| format!("Invalid --ignore selector: {}", selector))?;
    }
    for selector in &cli.only {
        filter = filter
            .only(selector)
            .with_context(|| format!("Invalid --only selector: {}", selector))?;
    }
    if let Some(severity) = cli.min_severity {
        filter = filter.min_severity(severity.into());
    }
    if cli.ignore_whitespace {
        filter = filter.exclude_insignificant();
    }
    Ok(filter)
}

fn base_metadata(cli: &Cli) -> SampleMetadata {
    SampleMetadata {
        sample_id: None,
        page_type: cli.page_type.clone(),
        source: cli.source.clone(),
        created_by: cli.created_by.clone(),
        created_at_utc: cli.created_at.clone(),
        dom_version_before: cli.dom_before.clone(),
        dom_version_after: cli.dom_after.clone(),
    }
}

fn directory_name(path: &Path) -> Option<String> {
    path.canonicalize()
        .ok()
        .and_then(|p| p.parent().and_then(|d| d.file_name()).map(|n| n.to_string_lossy().to_string()))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_artifacts(report: &DiffReport, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    write_json(&dir.join("annotation.json"), &report.annotation())?;
    write_json(&dir.join("metadata.json"), &report.metadata())?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
    fs::write(path, json + "\n").with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_conversion() {
        assert_eq!(
            OutputFormat::from(OutputFormatArg::Terminal),
            OutputFormat::Terminal
        );
        assert_eq!(
            OutputFormat::from(OutputFormatArg::Json),
            OutputFormat::Json
        );
        assert_eq!(
            OutputFormat::from(OutputFormatArg::Plain),
            OutputFormat::Plain
        );
    }

    #[test]
    fn test_severity_conversion() {
        assert_eq!(Severity::from(SeverityArg::High), Severity::High);
        assert_eq!(Severity::from(SeverityArg::Low), Severity::Low);
    }

    #[test]
    fn test_cli_requires_inputs_or_batch() {
        assert!(Cli::try_parse_from(["domdiff-rs"]).is_err());
        assert!(Cli::try_parse_from(["domdiff-rs", "--batch", "samples"]).is_ok());
        assert!(Cli::try_parse_from(["domdiff-rs", "a.html", "b.html"]).is_ok());
    }
}
