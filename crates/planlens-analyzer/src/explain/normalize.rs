//! Source normalization
//!
//! Strips the cosmetic wrapping console clients and GUI tools put around
//! EXPLAIN output (table borders, quoting, `+` continuation markers, the
//! `QUERY PLAN` banner and the row-count footer) so the detector and the
//! parsers only ever see plan content. Normalizing already-normalized text is
//! a no-op.

use regex::Regex;
use std::sync::LazyLock;

const FRAME_CHARS: [char; 3] = ['|', '║', '│'];

static SEPARATOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:\+[-+]+\+|-{2,}|─{2,}|═{2,}|[┌╔└╚├╟╠╞][─═┬┴┼╤╧╪╦╩╬]*[┐╗┘╝┤╢╣╡])\s*$",
    )
    .expect("valid regex")
});

static CONTINUATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\+$").expect("valid regex"));

static HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*QUERY PLAN\s*$").expect("valid regex"));

static FOOTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(\d+\s+\p{L}+\)\s*$").expect("valid regex"));

/// Removes framing, quoting and banners from raw EXPLAIN output
pub fn normalize_source(raw: &str) -> String {
    let mut lines = Vec::new();
    let mut header_seen = false;

    for physical in raw.lines() {
        let line = strip_frame(physical.trim_end_matches('\r'));
        if SEPARATOR_REGEX.is_match(&line) {
            continue;
        }

        let line = strip_quotes(&line);
        let line = CONTINUATION_REGEX.replace(&line, "");

        if !header_seen && HEADER_REGEX.is_match(&line) {
            header_seen = true;
            continue;
        }
        if FOOTER_REGEX.is_match(&line) {
            lines.push(String::new());
            continue;
        }

        for piece in line.split('↵') {
            lines.push(piece.trim_end().to_string());
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Removes one pair of matching border characters, or a lone trailing one
fn strip_frame(line: &str) -> String {
    let trimmed = line.trim();
    let mut chars = trimmed.chars();
    let first = chars.next();
    let last = chars.next_back();

    match (first, last) {
        (Some(first), Some(last)) if first == last && FRAME_CHARS.contains(&first) => {
            let inner = &trimmed[first.len_utf8()..trimmed.len() - last.len_utf8()];
            let inner = inner.strip_prefix(' ').unwrap_or(inner);
            inner.trim_end().to_string()
        }
        (_, Some(last)) if FRAME_CHARS.contains(&last) => {
            line.trim_end()[..line.trim_end().len() - last.len_utf8()]
                .trim_end()
                .to_string()
        }
        _ => line.trim_end().to_string(),
    }
}

/// Removes one layer of `'...'` or `"..."` wrapping that starts at column 0.
/// Doubled double quotes are unescaped on lines that were double-quoted.
/// Indented quoted lines are content, such as string elements of
/// pretty-printed JSON, and are left alone.
fn strip_quotes(line: &str) -> String {
    for quote in ['"', '\''] {
        if line.len() < 2 || !line.starts_with(quote) || !line.ends_with(quote) {
            continue;
        }
        let inner = &line[1..line.len() - 1];
        let doubled = format!("{quote}{quote}");
        // A lone quote inside means the quotes belong to the content (a JSON
        // key/value line, for instance)
        if inner.replace(&doubled, "").contains(quote) {
            continue;
        }
        if quote == '"' {
            return inner.replace(&doubled, "\"");
        }
        return inner.to_string();
    }
    line.to_string()
}
