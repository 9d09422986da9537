//! Node-type label decomposition
//!
//! Text plans pack several attributes into the node label, e.g.
//! `Parallel Index Only Scan Backward using idx on public.users u`. This
//! module pulls them apart. Pattern classes are tried in a fixed order and
//! only the first match applies; the `Parallel` prefix, the partial-mode
//! prefix and the `<Modifier> Join` suffix are always stripped afterwards.

use crate::explain::plan::{JoinType, ScanDirection};
use regex::Regex;
use std::sync::LazyLock;

static SCAN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:Parallel\s+)?(?:Seq\s+Scan|Sample\s+Scan|Tid.*Scan|Bitmap\s+Heap\s+Scan|WorkTable\s+Scan|(?:Async\s+)?Foreign\s+Scan|Update|Insert|Delete|Merge))\s+on\s+(\S+)(?:\s+(\S+))?$",
    )
    .expect("valid regex")
});

static BITMAP_INDEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Bitmap\s+Index\s+Scan)\s+on\s+(\S+)$").expect("valid regex")
});

static INDEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:Parallel\s+)?Index(?:\s+Only)?\s+Scan)(\s+Backward)?\s+using\s+(\S+)\s+on\s+(\S+)(?:\s+(\S+))?$",
    )
    .expect("valid regex")
});

static CTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(CTE\s+Scan)\s+on\s+(\S+)(?:\s+(\S+))?$").expect("valid regex")
});

static FUNCTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Function\s+Scan)\s+on\s+(\S+)(?:\s+(\S+))?$").expect("valid regex")
});

static SUBQUERY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Subquery\s+Scan)\s+on\s+(.+)$").expect("valid regex"));

static PARALLEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Parallel\s+(.*)$").expect("valid regex"));

static PARTIAL_MODE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Partial|Finalize|Simple)\s+(\S.*)$").expect("valid regex")
});

static JOIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?)\s+((?:Right\s+)?(?:Full|Left|Right|Anti|Semi))\s+Join$")
        .expect("valid regex")
});

/// Structured attributes recovered from a node label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeTypeParts {
    /// The bare node type, e.g. "Seq Scan" or "Hash Join"
    pub label: String,
    pub relation: Option<String>,
    pub schema: Option<String>,
    pub alias: Option<String>,
    pub index_name: Option<String>,
    pub cte_name: Option<String>,
    pub function_name: Option<String>,
    pub join_type: Option<JoinType>,
    pub scan_direction: Option<ScanDirection>,
    pub parallel_aware: bool,
    pub partial_mode: Option<String>,
}

/// Splits a raw node label into its attributes. Unmatched labels pass
/// through unchanged.
pub fn decompose_node_type(raw: &str) -> NodeTypeParts {
    let raw = raw.trim();
    let mut parts = NodeTypeParts {
        label: raw.to_string(),
        ..NodeTypeParts::default()
    };

    let capture = |caps: &regex::Captures<'_>, index: usize| {
        caps.get(index).map(|m| m.as_str().to_string())
    };

    if let Some(caps) = SCAN_REGEX.captures(raw) {
        parts.label = caps[1].to_string();
        parts.set_relation(&caps[2]);
        parts.alias = capture(&caps, 3);
    } else if let Some(caps) = BITMAP_INDEX_REGEX.captures(raw) {
        parts.label = caps[1].to_string();
        parts.index_name = capture(&caps, 2);
    } else if let Some(caps) = INDEX_REGEX.captures(raw) {
        parts.label = caps[1].to_string();
        parts.scan_direction = Some(if caps.get(2).is_some() {
            ScanDirection::Backward
        } else {
            ScanDirection::Forward
        });
        parts.index_name = capture(&caps, 3);
        parts.set_relation(&caps[4]);
        parts.alias = capture(&caps, 5);
    } else if let Some(caps) = CTE_REGEX.captures(raw) {
        parts.label = caps[1].to_string();
        parts.cte_name = capture(&caps, 2);
        parts.alias = capture(&caps, 3);
    } else if let Some(caps) = FUNCTION_REGEX.captures(raw) {
        parts.label = caps[1].to_string();
        parts.function_name = capture(&caps, 2);
        parts.alias = capture(&caps, 3);
    } else if let Some(caps) = SUBQUERY_REGEX.captures(raw) {
        parts.label = caps[1].to_string();
        parts.alias = capture(&caps, 2);
    }

    if let Some(caps) = PARALLEL_REGEX.captures(&parts.label) {
        let label = caps[1].to_string();
        parts.label = label;
        parts.parallel_aware = true;
    }

    if let Some(caps) = PARTIAL_MODE_REGEX.captures(&parts.label) {
        let (mode, label) = (caps[1].to_string(), caps[2].to_string());
        parts.partial_mode = Some(mode);
        parts.label = label;
    }

    if let Some(caps) = JOIN_REGEX.captures(&parts.label) {
        let (base, modifier) = (caps[1].to_string(), caps[2].to_string());
        parts.join_type = JoinType::parse(&modifier.split_whitespace().collect::<Vec<_>>().join(" "));
        parts.label = format!("{base} Join");
    }

    parts
}

impl NodeTypeParts {
    fn set_relation(&mut self, qualified: &str) {
        match qualified.split_once('.') {
            Some((schema, relation)) if !schema.is_empty() && !relation.is_empty() => {
                self.schema = Some(schema.to_string());
                self.relation = Some(relation.to_string());
            }
            _ => self.relation = Some(qualified.to_string()),
        }
    }
}
