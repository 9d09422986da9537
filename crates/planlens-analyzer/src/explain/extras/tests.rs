//! Tests for detail-line parsers

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn facts(line: &str) -> Vec<Fact> {
    parse_extra(line).expect("parse failed")
}

fn fact(key: &str, value: Value) -> Fact {
    (key.to_string(), value)
}

// ============================================================================
// Specialized Parser Tests
// ============================================================================

#[test]
fn test_sort_key_list() {
    assert_eq!(
        facts("Sort Key: t.a, (lower(t.b)) DESC"),
        vec![fact("Sort Key", json!(["t.a", "(lower(t.b)) DESC"]))]
    );
    assert_eq!(
        facts("Presorted Key: t.a"),
        vec![fact("Presorted Key", json!(["t.a"]))]
    );
}

#[test]
fn test_sort_method() {
    assert_eq!(
        facts("Sort Method: external merge  Disk: 1234kB"),
        vec![
            fact("Sort Method", json!("external merge")),
            fact("Sort Space Type", json!("Disk")),
            fact("Sort Space Used", json!(1234)),
        ]
    );
}

#[test]
fn test_buffers_default_unmentioned_operations_to_zero() {
    assert_eq!(
        facts("Buffers: shared hit=12 read=3, temp written=5"),
        vec![
            fact("Shared Hit Blocks", json!(12)),
            fact("Shared Read Blocks", json!(3)),
            fact("Shared Dirtied Blocks", json!(0)),
            fact("Shared Written Blocks", json!(0)),
            fact("Temp Hit Blocks", json!(0)),
            fact("Temp Read Blocks", json!(0)),
            fact("Temp Dirtied Blocks", json!(0)),
            fact("Temp Written Blocks", json!(5)),
        ]
    );
}

#[test]
fn test_wal_counters() {
    assert_eq!(
        facts("WAL: records=10 fpi=2 bytes=4096 buffers full=1"),
        vec![
            fact("WAL Records", json!(10)),
            fact("WAL FPI", json!(2)),
            fact("WAL Bytes", json!(4096)),
            fact("WAL Buffers Full", json!(1)),
        ]
    );
}

#[test]
fn test_io_timings_old_and_new_forms() {
    assert_eq!(
        facts("I/O Timings: read=1.250 write=0.500"),
        vec![
            fact("I/O Read Time", json!(1.25)),
            fact("I/O Write Time", json!(0.5)),
        ]
    );
    assert_eq!(
        facts("I/O Timings: shared read=1.5, temp read=0.25 write=0.75"),
        vec![
            fact("Shared I/O Read Time", json!(1.5)),
            fact("Temp I/O Read Time", json!(0.25)),
            fact("Temp I/O Write Time", json!(0.75)),
        ]
    );
}

#[test]
fn test_jit_options() {
    assert_eq!(
        facts("Options: Inlining false, Optimization false, Expressions true, Deforming true"),
        vec![fact(
            "Options",
            json!({"Inlining": false, "Optimization": false, "Expressions": true, "Deforming": true})
        )]
    );
}

#[test]
fn test_non_boolean_options_fall_through() {
    assert_eq!(
        facts("Options: fetch_size 100"),
        vec![fact("Options", json!("fetch_size 100"))]
    );
}

#[test]
fn test_jit_timing_with_deform() {
    assert_eq!(
        facts("Timing: Generation 1.200 ms (Deform 0.300 ms), Inlining 0.000 ms, Optimization 2.000 ms, Emission 5.000 ms, Total 8.200 ms"),
        vec![fact(
            "Timing",
            json!({
                "Generation": 1.2,
                "Deform": 0.3,
                "Inlining": 0.0,
                "Optimization": 2.0,
                "Emission": 5.0,
                "Total": 8.2
            })
        )]
    );
}

#[test]
fn test_settings() {
    assert_eq!(
        facts("Settings: work_mem = '64MB', search_path = 'a, b'"),
        vec![fact(
            "Settings",
            json!({"work_mem": "64MB", "search_path": "a, b"})
        )]
    );
}

#[test]
fn test_sort_groups() {
    assert_eq!(
        facts("Full-sort Groups: 2  Sort Method: quicksort  Average Memory: 26kB  Peak Memory: 30kB"),
        vec![fact(
            "Full-sort Groups",
            json!({
                "Group Count": 2,
                "Sort Methods Used": ["quicksort"],
                "Sort Space Memory": {
                    "Average Sort Space Used": 26,
                    "Peak Sort Space Used": 30
                }
            })
        )]
    );
}

#[test]
fn test_unknown_sort_groups_kind_is_unsupported() {
    let result = parse_extra("Half-sort Groups: 2  Sort Method: quicksort  Average Memory: 26kB");
    assert!(matches!(result, Err(ParseError::UnsupportedConstruct(_))));
}

#[test]
fn test_other_groups_label_is_a_plain_fact() {
    assert_eq!(facts("Hash Groups: 12"), vec![fact("Hash Groups", json!(12))]);
}

// ============================================================================
// Generic Label: Value Tests
// ============================================================================

#[test]
fn test_generic_text_value() {
    assert_eq!(facts("Filter: (a > 1)"), vec![fact("Filter", json!("(a > 1)"))]);
}

#[test]
fn test_generic_numeric_value() {
    assert_eq!(
        facts("Rows Removed by Filter: 9000"),
        vec![fact("Rows Removed by Filter", json!(9000))]
    );
}

#[test]
fn test_generic_time_label_is_start_cased_and_unit_stripped() {
    assert_eq!(
        facts("Planning time: 0.156 ms"),
        vec![fact("Planning Time", json!(0.156))]
    );
    assert_eq!(
        facts("Total runtime: 12.5 ms"),
        vec![fact("Total Runtime", json!(12.5))]
    );
}

#[test]
fn test_generic_label_without_value_is_skipped() {
    assert!(facts("Planning:").is_empty());
    assert!(facts("something without a label").is_empty());
}

#[test]
fn test_generic_multi_segment_line() {
    assert_eq!(
        facts("Buckets: 1024  Batches: 1  Memory Usage: 9kB"),
        vec![
            fact("Buckets", json!(1024)),
            fact("Batches", json!(1)),
            fact("Memory Usage", json!("9kB")),
        ]
    );
}

#[test]
fn test_generic_keeps_double_spaces_inside_values() {
    assert_eq!(
        facts("Filter: (name = 'a  b')"),
        vec![fact("Filter", json!("(name = 'a  b')"))]
    );
}
