//! Tests for format detection

use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn test_detects_json_array() {
    let input = r#"[{"Plan": {"Node Type": "Result"}}]"#;
    assert_eq!(detect_format(input), SourceFormat::Json(input));
}

#[test]
fn test_detects_json_with_surrounding_whitespace() {
    let input = "\n  {\"Plan\": {\"Node Type\": \"Result\"}}  \n";
    assert_eq!(
        detect_format(input),
        SourceFormat::Json("{\"Plan\": {\"Node Type\": \"Result\"}}")
    );
}

#[test]
fn test_duplicate_keys_still_count_as_json() {
    let input = r#"{"Plan": {"Workers": [], "Workers": []}}"#;
    assert_eq!(detect_format(input), SourceFormat::Json(input));
}

#[test]
fn test_detects_embedded_json() {
    let input = indoc! {r#"
        Explain output for query 42:
        [
          {
            "Plan": {"Node Type": "Result"}
          }
        ]
        Time: 1.234 ms
    "#};
    let expected = indoc! {r#"
        [
          {
            "Plan": {"Node Type": "Result"}
          }
        ]"#};
    assert_eq!(detect_format(input), SourceFormat::EmbeddedJson(expected));
}

#[test]
fn test_embedded_json_requires_matching_indentation() {
    let input = indoc! {"
        banner
          {
        }
    "};
    assert_eq!(detect_format(input), SourceFormat::Text(input));
}

#[test]
fn test_broken_json_is_still_classified_as_json() {
    let input = r#"[{"Plan": {"Node Type": "Result"}"#;
    assert_eq!(detect_format(input), SourceFormat::Json(input));
}

#[test]
fn test_detects_text() {
    let input = "Seq Scan on t  (cost=0.00..1.00 rows=1 width=4)";
    assert_eq!(detect_format(input), SourceFormat::Text(input));
}
