//! Logical line reassembly for text plans
//!
//! Terminals and GUI tools wrap long plan lines. Before structural parsing,
//! physical lines are glued back together into logical lines. A physical line
//! continues the previous logical line when, checked in order:
//!
//! 1. it closes more parentheses than it opens;
//! 2. (unless it starts with `->` or a fixed keyword such as `Filter`,
//!    `Execution Time` or `JIT`, which always start a new line)
//! 3. it starts at column 0, or its first non-blank character is `(`;
//! 4. the previous logical line is an `Output` list and the indentation
//!    differs;
//! 5. a `)` appears before any `(`.
//!
//! The first physical line always starts a logical line. Query text keeps
//! its line breaks; every other continuation is appended as-is.

use regex::Regex;
use std::iter::Peekable;
use std::str::Lines;
use std::sync::LazyLock;

static NEW_LINE_KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:->|Total\s+runtime|Planning(?:\s+time)?|Execution\s+time|Time|Filter|Output|JIT|Trigger|Settings|Query\s+(?:Text|Identifier))",
    )
    .expect("valid regex")
});

static OUTPUT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Output").expect("valid regex"));

static QUERY_TEXT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*Query\s+Text:").expect("valid regex"));

static NODE_ESTIMATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?:cost=|actual\s|never executed\))").expect("valid regex")
});

/// Lazily yields logical lines; a clone replays the remainder independently
#[derive(Debug, Clone)]
pub struct LogicalLines<'a> {
    physical: Peekable<Lines<'a>>,
}

/// Splits cleaned text into logical lines
pub fn reassemble_lines(text: &str) -> LogicalLines<'_> {
    LogicalLines {
        physical: text.lines().peekable(),
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let mut current = self.physical.next()?.to_string();

        while let Some(line) = self.physical.next_if(|line| continues(&current, line)) {
            if QUERY_TEXT_REGEX.is_match(&current) {
                current.push('\n');
            }
            current.push_str(line);
        }

        Some(current)
    }
}

/// Whether `line` continues the logical line `previous`
fn continues(previous: &str, line: &str) -> bool {
    if count(line, ')') > count(line, '(') {
        return true;
    }
    if NEW_LINE_KEYWORD_REGEX.is_match(line) {
        return false;
    }
    if starts_at_column_zero(line) || line.trim_start().starts_with('(') {
        // Query text may be followed directly by an unindented root node
        return !(QUERY_TEXT_REGEX.is_match(previous) && NODE_ESTIMATE_REGEX.is_match(line));
    }
    if OUTPUT_REGEX.is_match(previous) && indent(previous) != indent(line) {
        return true;
    }
    closing_first(line)
}

fn count(line: &str, ch: char) -> usize {
    line.chars().filter(|c| *c == ch).count()
}

fn starts_at_column_zero(line: &str) -> bool {
    line.chars().next().is_some_and(|c| !c.is_whitespace())
}

fn indent(line: &str) -> Option<usize> {
    line.find(|c: char| !c.is_whitespace())
}

fn closing_first(line: &str) -> bool {
    match (line.find(')'), line.find('(')) {
        (Some(closing), Some(opening)) => closing < opening,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests;
