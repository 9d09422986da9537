//! `EXPLAIN (FORMAT JSON)` parsing
//!
//! PostgreSQL may emit the same key twice inside one object (most notably two
//! `"Workers"` arrays, one per instrumentation group). A plain
//! `serde_json::Value` keeps only the last occurrence, so documents are first
//! deserialized through [`MergedValue`], which deep-merges repeated keys:
//!
//! - object into object: key union, shared keys merged recursively
//! - array into array: element-wise by position, extra elements appended
//! - anything else: the later value wins
//!
//! # Examples
//!
//! ```
//! use planlens_analyzer::explain::json::parse_json_document;
//!
//! let document = parse_json_document(r#"[
//!   {
//!     "Plan": {
//!       "Node Type": "Seq Scan",
//!       "Relation Name": "users",
//!       "Startup Cost": 0.0,
//!       "Total Cost": 10.0,
//!       "Plan Rows": 100,
//!       "Plan Width": 36
//!     },
//!     "Planning Time": 0.05
//!   }
//! ]"#).unwrap();
//!
//! assert_eq!(document.root.relation.as_deref(), Some("users"));
//! assert_eq!(document.info.planning_time_ms, Some(0.05));
//! ```

use crate::error::{ParseError, Result};
use crate::explain::plan::{DocumentInfo, PlanDocument, PlanNode};
use crate::explain::properties::PropertySink;
use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};
use std::fmt;

/// A JSON value whose objects had their duplicate keys merged
#[derive(Debug, Clone, PartialEq)]
pub struct MergedValue(pub Value);

impl MergedValue {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl<'de> Deserialize<'de> for MergedValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(MergingVisitor)
    }
}

struct MergingVisitor;

impl<'de> Visitor<'de> for MergingVisitor {
    type Value = MergedValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::Bool(v)))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::Number(v.into())))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::Number(v.into())))
    }

    fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Number::from_f64(v).map_or(Value::Null, Value::Number)))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::String(v.to_string())))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::String(v)))
    }

    fn visit_none<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::Null))
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
        Ok(MergedValue(Value::Null))
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        MergedValue::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(MergedValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(MergedValue(Value::Array(items)))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut object = Map::new();
        while let Some((key, MergedValue(value))) = map.next_entry::<String, MergedValue>()? {
            match object.get_mut(&key) {
                Some(existing) => {
                    tracing::trace!(key = %key, "merging duplicate key");
                    merge_into(existing, value);
                }
                None => {
                    object.insert(key, value);
                }
            }
        }
        Ok(MergedValue(Value::Object(object)))
    }
}

/// Deep-merges `incoming` into `target`
pub fn merge_into(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(incoming)) => {
            for (index, value) in incoming.into_iter().enumerate() {
                match target.get_mut(index) {
                    Some(existing) => merge_into(existing, value),
                    None => target.push(value),
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}

/// Parses JSON text into a value with duplicate keys merged
pub fn parse_merged(source: &str) -> Result<Value> {
    let MergedValue(value) = serde_json::from_str(source)?;
    Ok(value)
}

/// Parses an `EXPLAIN (FORMAT JSON)` document.
///
/// The document may be the array PostgreSQL prints (only the first element
/// is used) or the bare object inside it.
pub fn parse_json_document(source: &str) -> Result<PlanDocument> {
    let value = parse_merged(source)?;

    let top = match value {
        Value::Array(items) => items.into_iter().next().ok_or_else(|| {
            ParseError::InvalidDocument("EXPLAIN output array is empty".into())
        })?,
        other => other,
    };
    let Value::Object(mut top) = top else {
        return Err(ParseError::InvalidDocument(
            "expected an object holding the plan".into(),
        ));
    };

    let plan = top
        .remove("Plan")
        .ok_or_else(|| ParseError::InvalidDocument("missing \"Plan\" object".into()))?;
    let root = build_node(plan)?;

    let mut info = DocumentInfo::default();
    for (key, value) in top {
        info.set_property(&key, value);
    }

    Ok(PlanDocument::with_info(root, info))
}

fn build_node(value: Value) -> Result<PlanNode> {
    let Value::Object(object) = value else {
        return Err(ParseError::InvalidDocument(
            "plan node is not an object".into(),
        ));
    };
    if !object.contains_key("Node Type") {
        return Err(ParseError::InvalidDocument(
            "plan node without \"Node Type\"".into(),
        ));
    }

    let mut node = PlanNode::default();
    for (key, value) in object {
        if key == "Plans" {
            let Value::Array(children) = value else {
                return Err(ParseError::InvalidDocument(
                    "\"Plans\" is not an array".into(),
                ));
            };
            for child in children {
                node.children.push(build_node(child)?);
            }
        } else {
            node.set_property(&key, value);
        }
    }
    Ok(node)
}
