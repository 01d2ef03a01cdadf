use domdiff_rs::classify::{count_by_category, Classifier};
use domdiff_rs::config::BuildOptions;
use domdiff_rs::{build, build_file, compute_diff, Category, ChangeRecord, DiffConfig, Severity};
use std::collections::BTreeSet;
use std::path::Path;

fn classify(before: &str, after: &str) -> Vec<ChangeRecord> {
    let before = build(before).unwrap();
    let after = build(after).unwrap();
    let config = DiffConfig::default();
    let diff = compute_diff(&before, &after, &config);
    Classifier::new(&before, &after, &config.classify).classify_all(diff.operations)
}

fn classify_fixtures(before: &str, after: &str) -> Vec<ChangeRecord> {
    let load = |name: &str| {
        build_file(
            Path::new(&format!("tests/fixtures/{}", name)),
            &BuildOptions::default(),
        )
        .unwrap()
    };
    let before = load(before);
    let after = load(after);
    let config = DiffConfig::default();
    let diff = compute_diff(&before, &after, &config);
    Classifier::new(&before, &after, &config.classify).classify_all(diff.operations)
}

fn categories(items: &[Category]) -> BTreeSet<Category> {
    items.iter().copied().collect()
}

#[test]
fn test_button_scenario_classification() {
    let records = classify_fixtures("button_before.html", "button_after.html");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].categories, categories(&[Category::Style]));
    assert_eq!(records[0].severity, Severity::Medium);
    assert_eq!(records[1].categories, categories(&[Category::Text]));
    assert_eq!(records[1].severity, Severity::Low);
    assert_eq!(
        records[1].description,
        "Button text changed from 'Save' to 'Save Now'."
    );

    let counts = count_by_category(&records);
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[&Category::Style], 1);
    assert_eq!(counts[&Category::Text], 1);
}

#[test]
fn test_login_scenario_classification() {
    let records = classify_fixtures("login_before.html", "login_after.html");
    let button = records
        .iter()
        .find(|r| r.operation.node().is_some_and(|n| n.tag == "button"))
        .unwrap();

    assert_eq!(
        button.categories,
        categories(&[Category::Structural, Category::Identity])
    );
    assert_eq!(button.severity, Severity::High);
    assert_eq!(button.selector, r#"[data-testid="login-btn"]"#);
    assert_eq!(
        button.description,
        "Button with data-testid 'login-btn' was removed."
    );
}

#[test]
fn test_nav_layout_changes() {
    let records = classify_fixtures("nav_before.html", "nav_after.html");

    let style = records
        .iter()
        .find(|r| r.operation.kind() == "attribute_change")
        .unwrap();
    assert_eq!(
        style.categories,
        categories(&[Category::Style, Category::Layout])
    );
    assert!(style.severity >= Severity::Medium);

    let moved = records
        .iter()
        .find(|r| r.operation.kind() == "move")
        .unwrap();
    assert!(moved.categories.contains(&Category::Structural));
    assert_eq!(moved.severity, Severity::High);
}

#[test]
fn test_color_only_style_change_is_not_layout() {
    let records = classify(
        r#"<p style="color: red">Hi</p>"#,
        r#"<p style="color: blue">Hi</p>"#,
    );
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].categories, categories(&[Category::Style]));
    assert_eq!(records[0].severity, Severity::Low);
}

#[test]
fn test_plain_attribute_change() {
    let records = classify(
        r#"<a href="/old">Docs</a>"#,
        r#"<a href="/new">Docs</a>"#,
    );
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].categories, categories(&[Category::Attribute]));
}

#[test]
fn test_whitespace_only_text_change_is_low_significance() {
    let records = classify("<p>Hello world</p>", "<p>Hello   world </p>");
    assert_eq!(records.len(), 1);
    assert!(records[0].low_significance);
    assert_eq!(records[0].severity, Severity::Low);
}

#[test]
fn test_every_record_has_a_category() {
    let pairs = [
        ("<div><span>a</span></div>", "<div><b>a</b><i>b</i></div>"),
        (
            r#"<ul><li id="x">1</li><li id="y">2</li></ul>"#,
            r#"<ul><li id="y">2</li><li id="x" hidden>1</li></ul>"#,
        ),
        (
            r#"<section data-testid="hero"><h1>Hi</h1></section>"#,
            r#"<section data-testid="banner"><h2>Hi</h2></section>"#,
        ),
    ];
    for (before, after) in pairs {
        for record in classify(before, after) {
            assert!(!record.categories.is_empty(), "{:?}", record);
            assert!(!record.description.is_empty());
            assert!(!record.selector.is_empty());
        }
    }
}

#[test]
fn test_record_ids_follow_script_order() {
    let records = classify(
        "<div><p>a</p><p>b</p></div>",
        "<div><p>a!</p><span>c</span></div>",
    );
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.id, i);
    }
}

#[test]
fn test_severity_ordering_and_parsing() {
    assert!(Severity::Low < Severity::Medium);
    assert!(Severity::Medium < Severity::High);
    assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
    assert!("urgent".parse::<Severity>().is_err());
}

#[test]
fn test_stylesheet_rule_hiding_cards_is_layout() {
    let records = classify(
        "<head><style>.card { display: block }</style></head><div class=\"card\">x</div>",
        "<head><style>.card { display: none }</style></head><div class=\"card\">x</div>",
    );

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].categories,
        categories(&[Category::Style, Category::Layout])
    );
    assert_eq!(records[0].severity, Severity::Medium);
    assert!(!records[0].categories.contains(&Category::Text));
}
