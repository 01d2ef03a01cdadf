use domdiff_rs::batch::{discover_samples, run_batch};
use domdiff_rs::impact::TestSelectorMap;
use domdiff_rs::parser::load_selector_map;
use domdiff_rs::screenshot::{ScreenshotStatus, SiblingFileScreenshots};
use domdiff_rs::{
    Category, DiffConfig, DiffEngine, DiffInput, DomDiffError, SampleMetadata, SchemaError,
    Severity, Source,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const CREATED_AT: &str = "2025-01-15T10:30:00Z";

fn fixture(name: &str) -> Source {
    Source::File(PathBuf::from(format!("tests/fixtures/{}", name)))
}

fn input(before: &str, after: &str) -> DiffInput {
    DiffInput {
        before: fixture(before),
        after: fixture(after),
        metadata: SampleMetadata::new("sample_001", CREATED_AT),
    }
}

#[test]
fn test_button_report() {
    let report = DiffEngine::default()
        .run(
            &input("button_before.html", "button_after.html"),
            &TestSelectorMap::new(),
        )
        .unwrap();

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.by_category.len(), 2);
    assert_eq!(report.summary.by_category[&Category::Style], 1);
    assert_eq!(report.summary.by_category[&Category::Text], 1);
    assert_eq!(report.summary.by_severity[&Severity::High], 0);
    assert!(report.suggestions.is_empty());
    assert!(report.warnings.is_empty());
}

#[test]
fn test_login_report_recommends_new_test() {
    let report = DiffEngine::default()
        .run(
            &input("login_before.html", "login_after.html"),
            &TestSelectorMap::new(),
        )
        .unwrap();

    let annotation = report.annotation();
    assert!(annotation.test_impact_analysis.is_empty());
    assert_eq!(annotation.new_tests_recommended.len(), 1);
    let recommendation = &annotation.new_tests_recommended[0].new_tests[0];
    assert!(recommendation.contains(r#"[data-testid="login-btn"]"#));
}

#[test]
fn test_login_report_with_selector_map() {
    let map = load_selector_map(Path::new("tests/fixtures/tests.yaml")).unwrap();
    let report = DiffEngine::default()
        .run(&input("login_before.html", "login_after.html"), &map)
        .unwrap();

    let annotation = report.annotation();
    assert!(annotation.new_tests_recommended.is_empty());
    let tests: Vec<&str> = annotation
        .test_impact_analysis
        .iter()
        .flat_map(|s| s.existing_tests.iter().map(String::as_str))
        .collect();
    assert_eq!(tests, vec!["auth::login_form_renders", "auth::login_submits"]);
}

#[test]
fn test_metadata_artifact() {
    let report = DiffEngine::default()
        .run(
            &input("nav_before.html", "nav_after.html"),
            &TestSelectorMap::new(),
        )
        .unwrap();
    let metadata = serde_json::to_value(report.metadata()).unwrap();

    assert_eq!(metadata["sample_id"], "sample_001");
    assert_eq!(metadata["source"], "custom_demo_app");
    assert_eq!(metadata["created_at_utc"], CREATED_AT);
    assert_eq!(metadata["change_summary"]["layout_changes"], 2);
    assert_eq!(metadata["change_summary"]["attribute_changes"], 1);
}

#[test]
fn test_invalid_timestamp_fails() {
    let mut input = input("button_before.html", "button_after.html");
    input.metadata.created_at_utc = Some("15/01/2025".to_string());
    let err = DiffEngine::default()
        .run(&input, &TestSelectorMap::new())
        .unwrap_err();
    assert!(matches!(
        err,
        DomDiffError::Schema(SchemaError::InvalidTimestamp { .. })
    ));
}

#[test]
fn test_config_changes_are_respected() {
    let config = DiffConfig::load(Path::new("tests/fixtures/config.toml")).unwrap();
    assert_eq!(config.matching.min_confidence, 0.6);
    let report = DiffEngine::new(config)
        .run(
            &input("button_before.html", "button_after.html"),
            &TestSelectorMap::new(),
        )
        .unwrap();
    assert_eq!(report.changes.len(), 2);
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = DiffConfig::load(Path::new("tests/fixtures/bad_config.toml")).unwrap_err();
    assert!(matches!(err, DomDiffError::ConfigError { .. }));
}

#[test]
fn test_missing_screenshots_degrade() {
    let report = DiffEngine::default()
        .with_screenshots(Arc::new(SiblingFileScreenshots))
        .run(
            &input("button_before.html", "button_after.html"),
            &TestSelectorMap::new(),
        )
        .unwrap();
    let shots = report.screenshots.unwrap();
    assert_eq!(shots.before, ScreenshotStatus::Unavailable);
    assert_eq!(shots.after, ScreenshotStatus::Unavailable);
}

#[test]
fn test_batch_over_dataset() {
    let root = TempDir::new().unwrap();
    for (id, before, after) in [
        ("sample_001", "button_before.html", "button_after.html"),
        ("sample_002", "login_before.html", "login_after.html"),
        ("sample_003", "identical_1.html", "identical_2.html"),
    ] {
        let dir = root.path().join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::copy(format!("tests/fixtures/{}", before), dir.join("before.html")).unwrap();
        fs::copy(format!("tests/fixtures/{}", after), dir.join("after.html")).unwrap();
    }
    fs::write(
        root.path().join("sample_002").join("metadata.json"),
        r#"{"page_type": "login"}"#,
    )
    .unwrap();

    let samples = discover_samples(root.path()).unwrap();
    assert_eq!(samples.len(), 3);
    let outcomes = run_batch(
        &DiffEngine::default(),
        &samples,
        &TestSelectorMap::new(),
        &SampleMetadata::default(),
    );

    let reports: Vec<_> = outcomes
        .iter()
        .map(|o| o.result.as_ref().unwrap())
        .collect();
    assert_eq!(reports[0].sample.sample_id, "sample_001");
    assert_eq!(reports[1].sample.page_type, "login");
    assert_eq!(reports[0].changes.len(), 2);
    assert_eq!(reports[1].changes.len(), 2);
    assert!(!reports[2].has_changes());
}
