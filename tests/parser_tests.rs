use domdiff_rs::config::{BuildOptions, DocumentMode};
use domdiff_rs::parser::{build_bytes, load_selector_map};
use domdiff_rs::{build, build_file, build_with, NodePath, ParseError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_build_file_document() {
    let tree = build_file(
        Path::new("tests/fixtures/button_before.html"),
        &BuildOptions::default(),
    )
    .unwrap();

    let button = tree.node_at(&NodePath::parse("/1/0/0").unwrap()).unwrap();
    assert_eq!(button.tag, "button");
    assert_eq!(button.attr("id"), Some("submit"));
    let text = tree.node_at(&NodePath::parse("/1/0/0/0").unwrap()).unwrap();
    assert_eq!(text.text.as_deref(), Some("Save"));
}

#[test]
fn test_head_is_kept() {
    let tree = build_file(
        Path::new("tests/fixtures/login_before.html"),
        &BuildOptions::default(),
    )
    .unwrap();
    let head = tree.node_at(&NodePath::parse("/0").unwrap()).unwrap();
    assert_eq!(head.tag, "head");
    let title = tree.node_at(&NodePath::parse("/0/0").unwrap()).unwrap();
    assert_eq!(title.tag, "title");
}

#[test]
fn test_fragment_mode_has_no_body() {
    let options = BuildOptions {
        mode: DocumentMode::Fragment,
        ..Default::default()
    };
    let tree = build_with("<span>a</span><span>b</span>", &options).unwrap();
    let root = tree.get(tree.root());
    assert_eq!(root.tag, "html");
    assert_eq!(tree.children(tree.root()).len(), 2);
    assert!(tree.nodes().all(|n| n.tag != "body"));
}

#[test]
fn test_malformed_markup_is_recovered() {
    let tree = build("<div><p>one<p>two</div></span>").unwrap();
    let paragraphs = tree.nodes().filter(|n| n.tag == "p").count();
    assert_eq!(paragraphs, 2);
}

#[test]
fn test_uppercase_tags_are_lowercased() {
    let tree = build("<DIV ID=main>x</DIV>").unwrap();
    let div = tree.nodes().find(|n| n.tag == "div").unwrap();
    assert_eq!(div.attr("id"), Some("main"));
}

#[test]
fn test_nul_character_rejected() {
    let result = build("<p>a\0b</p>");
    assert!(matches!(result, Err(ParseError::BinaryContent { offset: 4, .. })));
}

#[test]
fn test_invalid_utf8_rejected() {
    let result = build_bytes(&[0x3c, 0x70, 0x3e, 0xff, 0xfe], &BuildOptions::default());
    assert!(matches!(result, Err(ParseError::InvalidEncoding { .. })));
}

#[test]
fn test_depth_limit() {
    let options = BuildOptions {
        max_depth: 4,
        ..Default::default()
    };
    let result = build_with("<div><div><div><div></div></div></div></div>", &options);
    assert!(matches!(result, Err(ParseError::TooDeep { limit: 4, .. })));
}

#[test]
fn test_build_file_not_found() {
    let result = build_file(
        Path::new("tests/fixtures/missing.html"),
        &BuildOptions::default(),
    );
    assert!(matches!(result, Err(ParseError::FileNotFound { .. })));
}

#[test]
fn test_load_selector_map_json() {
    let map = load_selector_map(Path::new("tests/fixtures/tests.json")).unwrap();
    assert_eq!(map.len(), 3);
    let selectors: Vec<&str> = map.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(selectors, vec!["#login", "#submit", "nav a"]);
}

#[test]
fn test_load_selector_map_yaml() {
    let map = load_selector_map(Path::new("tests/fixtures/tests.yaml")).unwrap();
    assert_eq!(map.len(), 2);
    let (selector, tests) = map.iter().nth(1).unwrap();
    assert_eq!(selector, "[data-testid='login-btn']");
    assert_eq!(tests, &vec!["auth::login_submits".to_string()]);
}

#[test]
fn test_load_selector_map_invalid_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("map.json");
    fs::write(&path, "{not json").unwrap();
    let result = load_selector_map(&path);
    assert!(matches!(result, Err(ParseError::JsonError { .. })));
}
