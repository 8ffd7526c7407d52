use rulekit::Version;
use rulekit::version::{compare, numeric_cmp};
use std::cmp::Ordering;

#[test]
fn test_major_beats_longer_minor() {
    assert_eq!(compare("2.0", "1.10"), Ordering::Greater);
    assert!(Version::new("2.0") > Version::new("1.10"));
}

#[test]
fn test_missing_components_are_zero() {
    assert_eq!(compare("1.2", "1.2.0"), Ordering::Equal);
    assert_eq!(compare("1.2.0.0", "1.2"), Ordering::Equal);
    assert_eq!(Version::new("1.2"), Version::new("1.2.0"));
}

#[test]
fn test_components_compare_numerically() {
    assert_eq!(compare("1.2.3", "1.10.0"), Ordering::Less);
    assert_eq!(compare("1.9", "1.10"), Ordering::Less);
    assert_eq!(compare("10", "9"), Ordering::Greater);
}

#[test]
fn test_padding_applies_before_compare() {
    assert_eq!(compare("1.2", "1.2.1"), Ordering::Less);
    assert_eq!(compare("1.3", "1.2.9"), Ordering::Greater);
}

#[test]
fn test_identical_versions_are_equal() {
    assert_eq!(compare("4.0.1", "4.0.1"), Ordering::Equal);
}

#[test]
fn test_numeric_cmp_mixed_text() {
    assert_eq!(numeric_cmp("beta2", "beta10"), Ordering::Less);
    assert_eq!(numeric_cmp("alpha", "beta"), Ordering::Less);
    assert_eq!(numeric_cmp("1a", "1b"), Ordering::Less);
    assert_eq!(numeric_cmp("1", "1a"), Ordering::Less);
}

#[test]
fn test_numeric_cmp_huge_components() {
    assert_eq!(
        numeric_cmp("99999999999999999999999", "100000000000000000000000"),
        Ordering::Less
    );
}

#[test]
fn test_non_numeric_components_compare_lexically() {
    assert_eq!(compare("1.0.rc", "1.0.beta"), Ordering::Greater);
}

#[test]
fn test_sorting_versions() {
    let mut versions: Vec<Version> = ["1.10", "1.2", "2.0", "1.2.1", "0.9"]
        .into_iter()
        .map(Version::from)
        .collect();
    versions.sort();
    let sorted: Vec<&str> = versions.iter().map(Version::as_str).collect();
    assert_eq!(sorted, ["0.9", "1.2", "1.2.1", "1.10", "2.0"]);
}

#[test]
fn test_serializes_as_plain_string() {
    let json = serde_json::to_string(&Version::new("3.1.4")).unwrap();
    assert_eq!(json, r#""3.1.4""#);

    let back: Version = serde_json::from_str(&json).unwrap();
    assert_eq!(back.as_str(), "3.1.4");
}

#[test]
fn test_display_keeps_raw_text() {
    assert_eq!(Version::new("1.2").to_string(), "1.2");
}
