//! Line lexer for text plans
//!
//! Classifies one logical line into a [`Token`] and measures its depth.
//! Precedence is fixed: blank/banner, `CTE` marker, `SubPlan`/`InitPlan`
//! marker, node header, worker header, trigger, `JIT:` marker, and finally
//! any other line as an extra fact.

use crate::explain::plan::{ParentRelationship, Trigger};
use regex::Regex;
use std::sync::LazyLock;

static BANNER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:QUERY|---|#)").expect("valid regex"));

static CTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CTE\s+(\S+)\s*$").expect("valid regex"));

static SUBPLAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:Sub|Init)Plan)(?:\s+[^\s(]+)?(?:\s*\(returns.*\))?\s*$")
        .expect("valid regex")
});

static NODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(->\s*)?",
        r"(\S.*?)\s*",
        r"(?:\(cost=(\d+(?:\.\d+)?)\.\.(\d+(?:\.\d+)?)\s+rows=(\d+(?:\.\d+)?)\s+width=(\d+)\))?\s*",
        r"(?:\((?:actual(?:\s+time=(\d+(?:\.\d+)?)\.\.(\d+(?:\.\d+)?))?\s+rows=(\d+(?:\.\d+)?)\s+loops=(\d+)|(never\s+executed))\))?",
        r"\s*$",
    ))
    .expect("valid regex")
});

static WORKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^Worker\s+(\d+):\s*",
        r"(?:actual(?:\s+time=(\d+(?:\.\d+)?)\.\.(\d+(?:\.\d+)?))?\s+rows=(\d+(?:\.\d+)?)\s+loops=(\d+))?",
        r"\s*(.*?)\s*$",
    ))
    .expect("valid regex")
});

static TRIGGER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Trigger\s+(.*):\s+time=(\d+(?:\.\d+)?)\s+calls=(\d+)\s*$").expect("valid regex")
});

static JIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^JIT:\s*$").expect("valid regex"));

/// Planner estimate from `(cost=S..T rows=R width=W)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub startup_cost: f64,
    pub total_cost: f64,
    pub rows: u64,
    pub width: u32,
}

/// Measured values from `(actual time=a..b rows=r loops=l)`; timing is
/// absent when the plan was run with `TIMING OFF`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actuals {
    pub time: Option<(f64, f64)>,
    pub rows: f64,
    pub loops: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeHeader {
    /// Raw type text, before decomposition
    pub label: String,
    pub estimate: Option<Estimate>,
    pub actuals: Option<Actuals>,
    pub never_executed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerHeader {
    pub number: u32,
    pub actuals: Option<Actuals>,
    /// Whatever followed the timing on the same line, e.g. a sort method
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Blank,
    NodeHeader(NodeHeader),
    WorkerHeader(WorkerHeader),
    SubPlanHeader {
        relationship: ParentRelationship,
        name: String,
    },
    CteHeader {
        name: String,
    },
    TriggerLine(Trigger),
    JitHeader,
    ExtraFact(String),
}

/// A classified line and the indentation depth it was found at
#[derive(Debug, Clone, PartialEq)]
pub struct LexedLine {
    pub depth: usize,
    pub token: Token,
}

/// Classifies one logical line
pub fn lex_line(line: &str, tab_width: usize) -> LexedLine {
    let line = strip_wrapping_quote(line);
    let indent = leading_width(line, tab_width);
    let body = line.trim();

    let lexed = |depth: usize, token: Token| LexedLine { depth, token };

    if body.is_empty() || BANNER_REGEX.is_match(body) {
        return lexed(indent, Token::Blank);
    }

    if let Some(caps) = CTE_REGEX.captures(body) {
        return lexed(
            indent,
            Token::CteHeader {
                name: caps[1].to_string(),
            },
        );
    }

    if let Some(caps) = SUBPLAN_REGEX.captures(body) {
        let relationship = if &caps[1] == "InitPlan" {
            ParentRelationship::InitPlan
        } else {
            ParentRelationship::SubPlan
        };
        return lexed(
            indent,
            Token::SubPlanHeader {
                relationship,
                name: body.to_string(),
            },
        );
    }

    if let Some((arrow_width, header)) = node_header(body, tab_width) {
        return lexed(indent + arrow_width, Token::NodeHeader(header));
    }

    if let Some(caps) = WORKER_REGEX.captures(body)
        && let Ok(number) = caps[1].parse()
    {
        let header = WorkerHeader {
            number,
            actuals: actuals(&caps, 2, 3, 4, 5),
            rest: caps[6].to_string(),
        };
        return lexed(indent, Token::WorkerHeader(header));
    }

    if let Some(caps) = TRIGGER_REGEX.captures(body) {
        let (name, relation) = match caps[1].rsplit_once(" on ") {
            Some((name, relation)) => (name.to_string(), Some(relation.to_string())),
            None => (caps[1].to_string(), None),
        };
        let trigger = Trigger {
            name,
            relation,
            time_ms: caps[2].parse().unwrap_or(0.0),
            calls: caps[3].parse().unwrap_or(0),
        };
        return lexed(indent, Token::TriggerLine(trigger));
    }

    if JIT_REGEX.is_match(body) {
        return lexed(indent, Token::JitHeader);
    }

    tracing::trace!(depth = indent, line = body, "extra fact");
    lexed(indent, Token::ExtraFact(body.to_string()))
}

/// Matches the node grammar; returns the width of the `->` prefix and the header
fn node_header(body: &str, tab_width: usize) -> Option<(usize, NodeHeader)> {
    let caps = NODE_REGEX.captures(body)?;
    let arrow = caps.get(1);
    let label = caps[2].trim();
    // `Label: (...)` is a fact, not a node
    if label.is_empty() || label.ends_with(':') {
        return None;
    }

    let estimate = match (caps.get(3), caps.get(4), caps.get(5), caps.get(6)) {
        (Some(startup), Some(total), Some(rows), Some(width)) => Some(Estimate {
            startup_cost: startup.as_str().parse().ok()?,
            total_cost: total.as_str().parse().ok()?,
            rows: rows.as_str().parse::<f64>().ok()?.round() as u64,
            width: width.as_str().parse().ok()?,
        }),
        _ => None,
    };
    let actuals = actuals(&caps, 7, 8, 9, 10);
    let never_executed = caps.get(11).is_some();

    // Without costs a line is only a node when it hangs off an arrow
    if arrow.is_none() && estimate.is_none() && actuals.is_none() && !never_executed {
        return None;
    }

    let arrow_width = arrow.map_or(0, |m| leading_width_of(m.as_str(), tab_width));
    Some((
        arrow_width,
        NodeHeader {
            label: label.to_string(),
            estimate,
            actuals,
            never_executed,
        },
    ))
}

fn actuals(
    caps: &regex::Captures<'_>,
    startup: usize,
    total: usize,
    rows: usize,
    loops: usize,
) -> Option<Actuals> {
    let rows = caps.get(rows)?.as_str().parse().ok()?;
    let loops = caps.get(loops)?.as_str().parse().ok()?;
    let time = match (caps.get(startup), caps.get(total)) {
        (Some(startup), Some(total)) => Some((
            startup.as_str().parse().ok()?,
            total.as_str().parse().ok()?,
        )),
        _ => None,
    };
    Some(Actuals { time, rows, loops })
}

/// Drops a stray leading double quote, and the trailing one paired with it
fn strip_wrapping_quote(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix('"') {
        Some(rest) => rest.trim_end().strip_suffix('"').unwrap_or(rest),
        None => line,
    }
}

fn leading_width(line: &str, tab_width: usize) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { tab_width } else { 1 })
        .sum()
}

fn leading_width_of(prefix: &str, tab_width: usize) -> usize {
    prefix
        .chars()
        .map(|c| if c == '\t' { tab_width } else { 1 })
        .sum()
}
