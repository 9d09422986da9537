//! Format detection for normalized EXPLAIN output

use regex::Regex;
use serde::de::IgnoredAny;
use std::sync::LazyLock;

static OPENING_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)([\[{])\s*$").expect("valid regex"));

static CLOSING_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)([\]}])\s*,?\s*$").expect("valid regex"));

/// What a normalized source turned out to be, with the slice to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat<'a> {
    /// The source is a JSON document (or is shaped like one and must be
    /// reported as malformed)
    Json(&'a str),
    /// A JSON document surrounded by banner text
    EmbeddedJson(&'a str),
    /// Indented text output
    Text(&'a str),
}

/// Classifies a normalized source
pub fn detect_format(source: &str) -> SourceFormat<'_> {
    let trimmed = source.trim();

    if looks_like_json(trimmed) && serde_json::from_str::<IgnoredAny>(trimmed).is_ok() {
        tracing::debug!("source is a JSON document");
        return SourceFormat::Json(trimmed);
    }

    if let Some(span) = embedded_json_span(source) {
        tracing::debug!(len = span.len(), "found JSON embedded in surrounding text");
        return SourceFormat::EmbeddedJson(span);
    }

    if looks_like_json(trimmed) {
        tracing::debug!("source starts like JSON but does not parse");
        return SourceFormat::Json(trimmed);
    }

    tracing::debug!("source is text");
    SourceFormat::Text(source)
}

fn looks_like_json(trimmed: &str) -> bool {
    trimmed.starts_with('[') || trimmed.starts_with('{')
}

/// Finds a bracket that opens alone on its line and the first later line
/// that closes it at the same indentation
fn embedded_json_span(source: &str) -> Option<&str> {
    let mut offset = 0;
    let mut opening: Option<(usize, String, char)> = None;

    for line in source.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);

        match &opening {
            None => {
                if let Some(caps) = OPENING_LINE_REGEX.captures(content) {
                    let bracket = caps[2].chars().next()?;
                    opening = Some((offset, caps[1].to_string(), bracket));
                }
            }
            Some((start, indent, bracket)) => {
                if let Some(caps) = CLOSING_LINE_REGEX.captures(content)
                    && &caps[1] == indent.as_str()
                    && caps[2].starts_with(closing_for(*bracket))
                {
                    let end = offset + content.trim_end().trim_end_matches(',').len();
                    return Some(source[*start..end].trim());
                }
            }
        }

        offset += line.len();
    }

    None
}

fn closing_for(bracket: char) -> char {
    if bracket == '[' { ']' } else { '}' }
}

#[cfg(test)]
mod tests;
