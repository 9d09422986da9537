//! Parsers for the detail lines of text plans
//!
//! Each line is tried against a fixed battery of specialized parsers, in
//! order: sort keys, sort method, buffers, WAL, I/O timings, JIT options, JIT
//! timing, settings, incremental-sort groups. A line none of them claims falls
//! through to a generic `Label: Value` reading. Every parser produces facts
//! named in the `EXPLAIN (FORMAT JSON)` vocabulary so they can be applied
//! through [`PropertySink`](crate::explain::properties::PropertySink).

use crate::error::{ParseError, Result};
use crate::explain::plan::{BufferLocation, BufferOperation, IoTiming};
use crate::explain::properties::{buffer_property_name, split_balanced};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// A named fact ready for `set_property`
pub type Fact = (String, Value);

static SORT_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Sort Key|Presorted Key):\s+(.*)$").expect("valid regex"));

static SORT_METHOD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Sort Method:\s+(.*?)\s+(Memory|Disk):\s+(\d+)kB\s*$").expect("valid regex")
});

static BUFFERS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Buffers:\s+(.*)$").expect("valid regex"));

static WAL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^WAL:\s+(.*)$").expect("valid regex"));

static WAL_COUNTER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(records|fpi|bytes|buffers full)=(\d+)").expect("valid regex")
});

static IO_TIMINGS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^I/O Timings:\s+(.*)$").expect("valid regex"));

static JIT_OPTIONS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Options:\s+(.*)$").expect("valid regex"));

static JIT_OPTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)\s+(true|false)$").expect("valid regex"));

static JIT_TIMING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Timing:\s+(.*)$").expect("valid regex"));

static JIT_STAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\w+)\s+(\d+(?:\.\d+)?)\s*ms").expect("valid regex")
});

static SETTINGS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Settings:\s+(.*)$").expect("valid regex"));

static SORT_GROUPS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+) Groups:\s+(.*)$").expect("valid regex"));

static SORT_GROUPS_BODY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+Sort Methods?:\s+(.*?)\s+(?:Average|Peak)\s").expect("valid regex")
});

static SORT_SPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Average|Peak)\s+(Memory|Disk):\s+(\d+)kB").expect("valid regex")
});

static SEGMENT_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

static SEGMENT_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][\w /-]*:\s").expect("valid regex"));

static TIME_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|\s)(?:time|runtime)$").expect("valid regex"));

type Specialized = fn(&str) -> Result<Option<Vec<Fact>>>;

const BATTERY: [Specialized; 9] = [
    sort_keys,
    sort_method,
    buffers,
    wal,
    io_timings,
    jit_options,
    jit_timing,
    settings,
    sort_groups,
];

/// Reads the facts carried by one detail line.
///
/// Returns an empty list for lines that carry nothing usable (a label with
/// no value, for instance).
pub fn parse_extra(line: &str) -> Result<Vec<Fact>> {
    let line = line.trim();
    for parser in BATTERY {
        if let Some(facts) = parser(line)? {
            return Ok(facts);
        }
    }
    Ok(generic(line))
}

fn sort_keys(line: &str) -> Result<Option<Vec<Fact>>> {
    Ok(SORT_KEY_REGEX.captures(line).map(|caps| {
        vec![(caps[1].to_string(), Value::from(split_balanced(&caps[2])))]
    }))
}

fn sort_method(line: &str) -> Result<Option<Vec<Fact>>> {
    Ok(SORT_METHOD_REGEX.captures(line).map(|caps| {
        let mut facts = vec![
            ("Sort Method".to_string(), Value::from(&caps[1])),
            ("Sort Space Type".to_string(), Value::from(&caps[2])),
        ];
        if let Ok(kb) = caps[3].parse::<u64>() {
            facts.push(("Sort Space Used".to_string(), Value::from(kb)));
        }
        facts
    }))
}

/// `Buffers: shared hit=12 read=3, temp written=5`
///
/// Every operation of a mentioned location defaults to zero.
fn buffers(line: &str) -> Result<Option<Vec<Fact>>> {
    let Some(caps) = BUFFERS_REGEX.captures(line) else {
        return Ok(None);
    };

    let mut facts = Vec::new();
    for group in caps[1].split(',') {
        let mut words = group.split_whitespace();
        let Some(location) = words.next().and_then(BufferLocation::parse) else {
            continue;
        };
        let mut counts = [0u64; 4];
        for pair in words {
            if let Some((operation, blocks)) = pair.split_once('=')
                && let Some(operation) = BufferOperation::parse(operation)
                && let Ok(blocks) = blocks.parse()
                && let Some(slot) = BufferOperation::ALL.iter().position(|op| *op == operation)
            {
                counts[slot] = blocks;
            }
        }
        for (operation, blocks) in BufferOperation::ALL.iter().zip(counts) {
            facts.push((buffer_property_name(location, *operation), Value::from(blocks)));
        }
    }
    Ok(Some(facts))
}

fn wal(line: &str) -> Result<Option<Vec<Fact>>> {
    Ok(WAL_REGEX.captures(line).map(|caps| {
        WAL_COUNTER_REGEX
            .captures_iter(&caps[1])
            .filter_map(|counter| {
                let key = match &counter[1] {
                    "records" => "WAL Records",
                    "fpi" => "WAL FPI",
                    "bytes" => "WAL Bytes",
                    _ => "WAL Buffers Full",
                };
                let value: u64 = counter[2].parse().ok()?;
                Some((key.to_string(), Value::from(value)))
            })
            .collect()
    }))
}

/// `I/O Timings: read=1.2 write=0.3` on older servers, or
/// `I/O Timings: shared read=1.2, temp read=0.5 write=0.6` on newer ones
fn io_timings(line: &str) -> Result<Option<Vec<Fact>>> {
    let Some(caps) = IO_TIMINGS_REGEX.captures(line) else {
        return Ok(None);
    };

    let mut facts = Vec::new();
    for group in caps[1].split(',') {
        let mut words = group.split_whitespace().peekable();
        let location = words.peek().and_then(|word| BufferLocation::parse(word));
        if location.is_some() {
            words.next();
        }
        for pair in words {
            let Some((direction, ms)) = pair.split_once('=') else {
                continue;
            };
            let Ok(ms) = ms.parse::<f64>() else {
                continue;
            };
            let timing = match (location, direction) {
                (None, "read") => IoTiming::Read,
                (None, "write") => IoTiming::Write,
                (Some(BufferLocation::Shared), "read") => IoTiming::SharedRead,
                (Some(BufferLocation::Shared), "write") => IoTiming::SharedWrite,
                (Some(BufferLocation::Local), "read") => IoTiming::LocalRead,
                (Some(BufferLocation::Local), "write") => IoTiming::LocalWrite,
                (Some(BufferLocation::Temp), "read") => IoTiming::TempRead,
                (Some(BufferLocation::Temp), "write") => IoTiming::TempWrite,
                _ => continue,
            };
            facts.push((timing.property_name().to_string(), Value::from(ms)));
        }
    }
    Ok(Some(facts))
}

/// `Options: Inlining false, Optimization false, Expressions true, Deforming true`
fn jit_options(line: &str) -> Result<Option<Vec<Fact>>> {
    let Some(caps) = JIT_OPTIONS_REGEX.captures(line) else {
        return Ok(None);
    };

    let mut options = Map::new();
    for item in caps[1].split(',') {
        let Some(option) = JIT_OPTION_REGEX.captures(item.trim()) else {
            return Ok(None);
        };
        options.insert(option[1].to_string(), Value::from(&option[2] == "true"));
    }
    Ok(Some(vec![("Options".to_string(), Value::Object(options))]))
}

/// `Timing: Generation 1.2 ms (Deform 0.3 ms), Inlining 0.0 ms, ..., Total 9.5 ms`
fn jit_timing(line: &str) -> Result<Option<Vec<Fact>>> {
    let Some(caps) = JIT_TIMING_REGEX.captures(line) else {
        return Ok(None);
    };

    let mut stages = Map::new();
    for stage in JIT_STAGE_REGEX.captures_iter(&caps[1]) {
        if let Ok(ms) = stage[2].parse::<f64>() {
            stages.insert(stage[1].to_string(), Value::from(ms));
        }
    }
    if stages.is_empty() {
        return Ok(None);
    }
    Ok(Some(vec![("Timing".to_string(), Value::Object(stages))]))
}

/// `Settings: work_mem = '64MB', random_page_cost = '1.1'`
fn settings(line: &str) -> Result<Option<Vec<Fact>>> {
    let Some(caps) = SETTINGS_REGEX.captures(line) else {
        return Ok(None);
    };

    let mut settings = Map::new();
    for item in split_balanced(&caps[1]) {
        if let Some((name, value)) = item.split_once('=') {
            let value = value.trim();
            let value = value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .unwrap_or(value);
            settings.insert(name.trim().to_string(), Value::from(value));
        }
    }
    Ok(Some(vec![("Settings".to_string(), Value::Object(settings))]))
}

/// `Full-sort Groups: 1  Sort Method: quicksort  Average Memory: 26kB  Peak Memory: 26kB`
fn sort_groups(line: &str) -> Result<Option<Vec<Fact>>> {
    let Some(caps) = SORT_GROUPS_REGEX.captures(line) else {
        return Ok(None);
    };
    // Only a sort-groups summary body makes an unknown kind unsupported
    let body = &caps[2];
    let Some(head) = SORT_GROUPS_BODY_REGEX.captures(body) else {
        return Ok(None);
    };
    let key = match &caps[1] {
        "Full-sort" => "Full-sort Groups",
        "Pre-sorted" => "Pre-sorted Groups",
        other => {
            return Err(ParseError::UnsupportedConstruct(format!(
                "sort groups kind \"{other}\""
            )));
        }
    };
    let Ok(group_count) = head[1].parse::<u64>() else {
        return Ok(None);
    };
    let methods: Vec<String> = head[2]
        .split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    let mut groups = Map::new();
    groups.insert("Group Count".to_string(), Value::from(group_count));
    groups.insert("Sort Methods Used".to_string(), Value::from(methods));
    for space in SORT_SPACE_REGEX.captures_iter(body) {
        let Ok(kb) = space[3].parse::<u64>() else {
            continue;
        };
        let bucket = groups
            .entry(format!("Sort Space {}", &space[2]))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(bucket) = bucket {
            bucket.insert(format!("{} Sort Space Used", &space[1]), Value::from(kb));
        }
    }
    Ok(Some(vec![(key.to_string(), Value::Object(groups))]))
}

/// Falls back to `Label: Value`, reading several facts when the line holds
/// two-space separated segments such as `Buckets: 1024  Batches: 1`
fn generic(line: &str) -> Vec<Fact> {
    let segments: Vec<&str> = SEGMENT_SPLIT_REGEX.split(line).collect();
    if segments.len() > 1 && segments.iter().all(|s| SEGMENT_LABEL_REGEX.is_match(s)) {
        return segments.into_iter().filter_map(label_value).collect();
    }
    label_value(line).into_iter().collect()
}

fn label_value(segment: &str) -> Option<Fact> {
    let (label, value) = segment.split_once(": ")?;
    let (label, value) = (label.trim(), value.trim());
    if label.is_empty() || value.is_empty() {
        return None;
    }

    let label = if TIME_LABEL_REGEX.is_match(label) {
        start_case(label)
    } else {
        label.to_string()
    };
    Some((label, coerce(value)))
}

/// Numbers become numbers (with a trailing `ms` unit dropped); anything else
/// stays text
fn coerce(value: &str) -> Value {
    let number = value.strip_suffix("ms").map(str::trim_end).unwrap_or(value);
    if let Ok(n) = number.parse::<u64>() {
        return Value::from(n);
    }
    if let Ok(n) = number.parse::<f64>()
        && n.is_finite()
    {
        return Value::from(n);
    }
    Value::from(value)
}

fn start_case(label: &str) -> String {
    label
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests;
