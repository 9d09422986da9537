//! Tests for logical line reassembly

use super::*;
use indoc::indoc;
use pretty_assertions::assert_eq;

fn collect(text: &str) -> Vec<String> {
    reassemble_lines(text).collect()
}

#[test]
fn test_unwrapped_plan_is_unchanged() {
    let text = indoc! {"
        Hash Join  (cost=1.00..2.00 rows=1 width=8)
          Hash Cond: (a.id = b.id)
          ->  Seq Scan on a  (cost=0.00..1.00 rows=1 width=4)
          ->  Hash  (cost=1.00..1.00 rows=1 width=4)
                ->  Seq Scan on b  (cost=0.00..1.00 rows=1 width=4)
        Planning Time: 0.1 ms"};
    assert_eq!(collect(text), text.lines().map(String::from).collect::<Vec<_>>());
}

#[test]
fn test_more_closing_parentheses_continue() {
    let text = "Seq Scan on t  (cost=0.00..1.00 rows=1\n width=4)";
    assert_eq!(collect(text), vec!["Seq Scan on t  (cost=0.00..1.00 rows=1 width=4)"]);
}

#[test]
fn test_unindented_line_continues() {
    let text = "  ->  Seq Scan on a_very_long_rel\nation_name  (cost=0.00..1.00 rows=1 width=4)";
    assert_eq!(
        collect(text),
        vec!["  ->  Seq Scan on a_very_long_relation_name  (cost=0.00..1.00 rows=1 width=4)"]
    );
}

#[test]
fn test_opening_parenthesis_continues() {
    let text = "  ->  Seq Scan on t\n        (cost=0.00..1.00 rows=1 width=4)";
    assert_eq!(
        collect(text),
        vec!["  ->  Seq Scan on t        (cost=0.00..1.00 rows=1 width=4)"]
    );
}

#[test]
fn test_closing_before_opening_continues() {
    let text = "  Filter: ((a = 1) AND\n    b = 2) OR (c = 3)";
    assert_eq!(
        collect(text),
        vec!["  Filter: ((a = 1) AND    b = 2) OR (c = 3)"]
    );
}

#[test]
fn test_output_list_continuation() {
    let text = indoc! {"
        Seq Scan on public.t
          Output: a, b,
              c
          Filter: (a > 1)"};
    assert_eq!(
        collect(text),
        vec![
            "Seq Scan on public.t",
            "  Output: a, b,      c",
            "  Filter: (a > 1)",
        ]
    );
}

#[test]
fn test_keywords_start_new_lines() {
    let text = "Result  (cost=0.00..0.01 rows=1 width=4)\nPlanning Time: 0.05 ms\nExecution Time: 0.02 ms";
    assert_eq!(collect(text).len(), 3);
}

#[test]
fn test_query_text_keeps_line_breaks() {
    let text = indoc! {"
        Query Text: select *
        from t
        where a = 1
        Seq Scan on t  (cost=0.00..1.00 rows=1 width=4)"};
    assert_eq!(
        collect(text),
        vec![
            "Query Text: select *\nfrom t\nwhere a = 1",
            "Seq Scan on t  (cost=0.00..1.00 rows=1 width=4)",
        ]
    );
}

#[test]
fn test_sequence_is_restartable() {
    let text = "Limit\n  ->  Seq Scan on t";
    let lines = reassemble_lines(text);
    let first_pass: Vec<_> = lines.clone().collect();
    let second_pass: Vec<_> = lines.collect();
    assert_eq!(first_pass, second_pass);
    assert_eq!(first_pass.len(), 2);
}
