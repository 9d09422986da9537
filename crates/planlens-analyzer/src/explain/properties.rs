//! Property assignment by canonical EXPLAIN name
//!
//! Both parsers feed facts into the plan model through [`PropertySink`] using
//! the vocabulary of `EXPLAIN (FORMAT JSON)` ("Shared Hit Blocks", "Actual
//! Loops", ...). Recognized names land in typed fields; anything else, or a
//! recognized name whose value cannot be coerced, is kept verbatim in the
//! target's `extra` map.

use crate::explain::plan::{
    ActualTime, BufferLocation, BufferOperation, Buffers, DocumentInfo, IoTiming, JitInfo,
    JoinType, NodeCost, NodeType, ParentRelationship, PlanDocument, PlanNode, ScanDirection,
    SortGroups, SortSpace, SortSpaceType, Trigger, WorkerRecord,
};
use serde_json::{Map, Value};

/// A plan element that accepts properties by canonical name
pub trait PropertySink {
    fn set_property(&mut self, key: &str, value: Value);
}

impl PropertySink for PlanNode {
    fn set_property(&mut self, key: &str, value: Value) {
        if !self.apply_known(key, &value) {
            self.extra.insert(key.to_string(), value);
        }
    }
}

impl PropertySink for WorkerRecord {
    fn set_property(&mut self, key: &str, value: Value) {
        if !self.apply_known(key, &value) {
            self.extra.insert(key.to_string(), value);
        }
    }
}

impl PropertySink for JitInfo {
    fn set_property(&mut self, key: &str, value: Value) {
        if !self.apply_known(key, &value) {
            self.extra.insert(key.to_string(), value);
        }
    }
}

impl PropertySink for DocumentInfo {
    fn set_property(&mut self, key: &str, value: Value) {
        if !self.apply_known(key, &value) {
            self.extra.insert(key.to_string(), value);
        }
    }
}

impl PropertySink for PlanDocument {
    fn set_property(&mut self, key: &str, value: Value) {
        self.info.set_property(key, value);
    }
}

impl PlanNode {
    fn apply_known(&mut self, key: &str, value: &Value) -> bool {
        if let Some((location, operation)) = buffer_key(key) {
            return apply_buffer(&mut self.buffers, location, operation, value);
        }
        if let Some(timing) = IoTiming::from_property_name(key) {
            return match as_f64(value) {
                Some(ms) => {
                    self.io_timings.set(timing, ms);
                    true
                }
                None => false,
            };
        }

        match key {
            "Node Type" => match value.as_str() {
                Some(label) => {
                    self.node_type = NodeType::from_postgres_str(label);
                    self.type_label = label.to_string();
                    true
                }
                None => false,
            },
            "Partial Mode" => assign(&mut self.partial_mode, as_string(value)),
            "Parallel Aware" => match as_bool(value) {
                Some(flag) => {
                    self.parallel_aware = flag;
                    true
                }
                None => false,
            },
            "Relation Name" => assign(&mut self.relation, as_string(value)),
            "Schema" => assign(&mut self.schema, as_string(value)),
            "Alias" => assign(&mut self.alias, as_string(value)),
            "Index Name" => assign(&mut self.index_name, as_string(value)),
            "CTE Name" => assign(&mut self.cte_name, as_string(value)),
            "Function Name" => assign(&mut self.function_name, as_string(value)),
            "Join Type" => assign(&mut self.join_type, value.as_str().and_then(JoinType::parse)),
            "Scan Direction" => assign(
                &mut self.scan_direction,
                value.as_str().and_then(ScanDirection::parse),
            ),
            "Parent Relationship" => assign(
                &mut self.parent_relationship,
                value.as_str().and_then(ParentRelationship::parse),
            ),
            "Subplan Name" => assign(&mut self.subplan_name, as_string(value)),
            "Startup Cost" => match as_f64(value) {
                Some(cost) => {
                    self.cost.get_or_insert_with(NodeCost::default).startup = cost;
                    true
                }
                None => false,
            },
            "Total Cost" => match as_f64(value) {
                Some(cost) => {
                    self.cost.get_or_insert_with(NodeCost::default).total = cost;
                    true
                }
                None => false,
            },
            "Plan Rows" => assign(&mut self.rows, as_u64(value)),
            "Plan Width" => assign(&mut self.width, as_u32(value)),
            "Actual Startup Time" => match as_f64(value) {
                Some(ms) => {
                    self.actual_time_ms
                        .get_or_insert_with(ActualTime::default)
                        .startup = ms;
                    true
                }
                None => false,
            },
            "Actual Total Time" => match as_f64(value) {
                Some(ms) => {
                    self.actual_time_ms.get_or_insert_with(ActualTime::default).total = ms;
                    true
                }
                None => false,
            },
            "Actual Rows" => assign(&mut self.actual_rows, as_f64(value)),
            "Actual Loops" => assign(&mut self.loops, as_u64(value)),
            "Rows Removed by Filter" => assign(&mut self.rows_removed_by_filter, as_f64(value)),
            "Rows Removed by Join Filter" => {
                assign(&mut self.rows_removed_by_join_filter, as_f64(value))
            }
            "Workers Planned" => assign(&mut self.workers_planned, as_u32(value)),
            "Workers Launched" => assign(&mut self.workers_launched, as_u32(value)),
            "Filter" => assign(&mut self.filter, as_string(value)),
            "Index Cond" => assign(&mut self.index_cond, as_string(value)),
            "Recheck Cond" => assign(&mut self.recheck_cond, as_string(value)),
            "Join Filter" => assign(&mut self.join_filter, as_string(value)),
            "Hash Cond" => assign(&mut self.hash_cond, as_string(value)),
            "Merge Cond" => assign(&mut self.merge_cond, as_string(value)),
            "Sort Key" => assign_list(&mut self.sort_keys, value),
            "Presorted Key" => assign_list(&mut self.presorted_keys, value),
            "Group Key" => assign_list(&mut self.group_keys, value),
            "Output" => assign_list(&mut self.output, value),
            "Sort Method" => assign(&mut self.sort_method, as_string(value)),
            "Sort Space Used" => assign(&mut self.sort_space_used_kb, as_u64(value)),
            "Sort Space Type" => assign(
                &mut self.sort_space_type,
                value.as_str().and_then(SortSpaceType::parse),
            ),
            "Full-sort Groups" => assign(&mut self.full_sort_groups, sort_groups(value)),
            "Pre-sorted Groups" => assign(&mut self.pre_sorted_groups, sort_groups(value)),
            "WAL Records" => assign(&mut self.wal.records, as_u64(value)),
            "WAL FPI" => assign(&mut self.wal.fpi, as_u64(value)),
            "WAL Bytes" => assign(&mut self.wal.bytes, as_u64(value)),
            "WAL Buffers Full" => assign(&mut self.wal.buffers_full, as_u64(value)),
            "Workers" => match value.as_array() {
                Some(entries) => {
                    for entry in entries {
                        self.absorb_worker(entry);
                    }
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn absorb_worker(&mut self, entry: &Value) {
        let Some(object) = entry.as_object() else {
            return;
        };
        let Some(number) = object.get("Worker Number").and_then(as_u32) else {
            return;
        };
        let worker = self.worker_mut(number);
        for (key, value) in object {
            worker.set_property(key, value.clone());
        }
    }

    /// Reads a property back by its canonical name.
    ///
    /// Typed fields are rendered in the JSON vocabulary; anything else is
    /// looked up in `extra`.
    pub fn property(&self, name: &str) -> Option<Value> {
        if let Some((location, operation)) = buffer_key(name) {
            return self.buffers.get(location, operation).map(Value::from);
        }
        if let Some(timing) = IoTiming::from_property_name(name) {
            return self.io_timings.get(timing).map(Value::from);
        }

        let text = |field: &Option<String>| field.clone().map(Value::from);
        let list = |field: &Vec<String>| {
            (!field.is_empty()).then(|| Value::from(field.clone()))
        };

        match name {
            "Node Type" => Some(Value::from(self.type_label.clone())),
            "Partial Mode" => text(&self.partial_mode),
            "Parallel Aware" => Some(Value::from(self.parallel_aware)),
            "Relation Name" => text(&self.relation),
            "Schema" => text(&self.schema),
            "Alias" => text(&self.alias),
            "Index Name" => text(&self.index_name),
            "CTE Name" => text(&self.cte_name),
            "Function Name" => text(&self.function_name),
            "Join Type" => self.join_type.map(|j| Value::from(j.as_str())),
            "Scan Direction" => self.scan_direction.map(|d| Value::from(d.as_str())),
            "Parent Relationship" => self.parent_relationship.map(|r| Value::from(r.as_str())),
            "Subplan Name" => text(&self.subplan_name),
            "Startup Cost" => self.cost.map(|c| Value::from(c.startup)),
            "Total Cost" => self.cost.map(|c| Value::from(c.total)),
            "Plan Rows" => self.rows.map(Value::from),
            "Plan Width" => self.width.map(Value::from),
            "Actual Startup Time" => self.actual_time_ms.map(|t| Value::from(t.startup)),
            "Actual Total Time" => self.actual_time_ms.map(|t| Value::from(t.total)),
            "Actual Rows" => self.actual_rows.map(Value::from),
            "Actual Loops" => self.loops.map(Value::from),
            "Rows Removed by Filter" => self.rows_removed_by_filter.map(Value::from),
            "Rows Removed by Join Filter" => self.rows_removed_by_join_filter.map(Value::from),
            "Workers Planned" => self.workers_planned.map(Value::from),
            "Workers Launched" => self.workers_launched.map(Value::from),
            "Filter" => text(&self.filter),
            "Index Cond" => text(&self.index_cond),
            "Recheck Cond" => text(&self.recheck_cond),
            "Join Filter" => text(&self.join_filter),
            "Hash Cond" => text(&self.hash_cond),
            "Merge Cond" => text(&self.merge_cond),
            "Sort Key" => list(&self.sort_keys),
            "Presorted Key" => list(&self.presorted_keys),
            "Group Key" => list(&self.group_keys),
            "Output" => list(&self.output),
            "Sort Method" => text(&self.sort_method),
            "Sort Space Used" => self.sort_space_used_kb.map(Value::from),
            "Sort Space Type" => self.sort_space_type.map(|t| Value::from(t.as_str())),
            "WAL Records" => self.wal.records.map(Value::from),
            "WAL FPI" => self.wal.fpi.map(Value::from),
            "WAL Bytes" => self.wal.bytes.map(Value::from),
            "WAL Buffers Full" => self.wal.buffers_full.map(Value::from),
            _ => self.extra.get(name).cloned(),
        }
    }
}

impl WorkerRecord {
    fn apply_known(&mut self, key: &str, value: &Value) -> bool {
        if let Some((location, operation)) = buffer_key(key) {
            return apply_buffer(&mut self.buffers, location, operation, value);
        }

        match key {
            // Fixed when the record is created
            "Worker Number" => as_u32(value).is_some(),
            "Actual Startup Time" => match as_f64(value) {
                Some(ms) => {
                    self.actual_time_ms
                        .get_or_insert_with(ActualTime::default)
                        .startup = ms;
                    true
                }
                None => false,
            },
            "Actual Total Time" => match as_f64(value) {
                Some(ms) => {
                    self.actual_time_ms.get_or_insert_with(ActualTime::default).total = ms;
                    true
                }
                None => false,
            },
            "Actual Rows" => assign(&mut self.actual_rows, as_f64(value)),
            "Actual Loops" => assign(&mut self.loops, as_u64(value)),
            "Sort Method" => assign(&mut self.sort_method, as_string(value)),
            "Sort Space Used" => assign(&mut self.sort_space_used_kb, as_u64(value)),
            "Sort Space Type" => assign(
                &mut self.sort_space_type,
                value.as_str().and_then(SortSpaceType::parse),
            ),
            "JIT" => match value.as_object() {
                Some(object) => {
                    let jit = self.jit.get_or_insert_with(JitInfo::default);
                    for (key, value) in object {
                        jit.set_property(key, value.clone());
                    }
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

impl JitInfo {
    fn apply_known(&mut self, key: &str, value: &Value) -> bool {
        match key {
            "Functions" => assign(&mut self.functions, as_u64(value)),
            "Options" => match value.as_object() {
                Some(object) => {
                    for (stage, enabled) in object {
                        if let Some(enabled) = as_bool(enabled) {
                            self.options.insert(stage.clone(), enabled);
                        }
                    }
                    true
                }
                None => false,
            },
            "Timing" => match value.as_object() {
                Some(object) => {
                    self.absorb_timing(object);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    fn absorb_timing(&mut self, object: &Map<String, Value>) {
        let timing = &mut self.timing;
        for (stage, value) in object {
            // Newer servers nest deform time under generation
            let (ms, deform) = match value.as_object() {
                Some(nested) => (
                    nested.get("Total").and_then(as_f64),
                    nested.get("Deform").and_then(as_f64),
                ),
                None => (as_f64(value), None),
            };
            if deform.is_some() {
                timing.deform = deform;
            }
            let Some(ms) = ms else {
                continue;
            };
            match stage.as_str() {
                "Generation" => timing.generation = Some(ms),
                "Deform" => timing.deform = Some(ms),
                "Inlining" => timing.inlining = Some(ms),
                "Optimization" => timing.optimization = Some(ms),
                "Emission" => timing.emission = Some(ms),
                "Total" => timing.total = Some(ms),
                _ => {
                    self.extra.insert(format!("Timing {stage}"), Value::from(ms));
                }
            }
        }
    }
}

impl DocumentInfo {
    fn apply_known(&mut self, key: &str, value: &Value) -> bool {
        if let Some((location, operation)) = buffer_key(key) {
            return apply_buffer(&mut self.planning_buffers, location, operation, value);
        }

        match key {
            "Planning Time" => assign(&mut self.planning_time_ms, as_f64(value)),
            "Execution Time" | "Total Runtime" => {
                assign(&mut self.execution_time_ms, as_f64(value))
            }
            "Query Text" => assign(&mut self.query_text, as_string(value)),
            "Triggers" => match value.as_array() {
                Some(entries) => {
                    self.triggers.extend(entries.iter().filter_map(trigger));
                    true
                }
                None => false,
            },
            "JIT" => match value.as_object() {
                Some(object) => {
                    let jit = self.jit.get_or_insert_with(JitInfo::default);
                    for (key, value) in object {
                        jit.set_property(key, value.clone());
                    }
                    true
                }
                None => false,
            },
            "Settings" => match value.as_object() {
                Some(object) => {
                    for (name, setting) in object {
                        if let Some(setting) = as_string(setting) {
                            self.settings.insert(name.clone(), setting);
                        }
                    }
                    true
                }
                None => false,
            },
            "Planning" => match value.as_object() {
                Some(object) => {
                    for (key, value) in object {
                        self.set_property(key, value.clone());
                    }
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

fn trigger(entry: &Value) -> Option<Trigger> {
    let object = entry.as_object()?;
    Some(Trigger {
        name: object.get("Trigger Name").and_then(as_string)?,
        relation: object.get("Relation").and_then(as_string),
        time_ms: object.get("Time").and_then(as_f64).unwrap_or(0.0),
        calls: object.get("Calls").and_then(as_u64).unwrap_or(0),
    })
}

fn sort_groups(value: &Value) -> Option<SortGroups> {
    let object = value.as_object()?;
    let space = |key: &str| {
        let space = object.get(key)?.as_object()?;
        Some(SortSpace {
            average_kb: space.get("Average Sort Space Used").and_then(as_u64)?,
            peak_kb: space.get("Peak Sort Space Used").and_then(as_u64)?,
        })
    };
    Some(SortGroups {
        group_count: object.get("Group Count").and_then(as_u64)?,
        sort_methods_used: object
            .get("Sort Methods Used")
            .map(as_list)
            .unwrap_or_default(),
        memory: space("Sort Space Memory"),
        disk: space("Sort Space Disk"),
    })
}

/// Splits a canonical buffer property name ("Temp Written Blocks")
pub fn buffer_key(key: &str) -> Option<(BufferLocation, BufferOperation)> {
    let rest = key.strip_suffix(" Blocks")?;
    let (location, operation) = rest.split_once(' ')?;
    Some((
        BufferLocation::parse(location)?,
        BufferOperation::parse(operation)?,
    ))
}

/// Canonical buffer property name for a location and operation
pub fn buffer_property_name(location: BufferLocation, operation: BufferOperation) -> String {
    format!("{} {} Blocks", location.label(), operation.label())
}

fn apply_buffer(
    buffers: &mut Buffers,
    location: BufferLocation,
    operation: BufferOperation,
    value: &Value,
) -> bool {
    match as_u64(value) {
        Some(blocks) => {
            buffers.set(location, operation, blocks);
            true
        }
        None => false,
    }
}

fn assign<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = Some(value);
            true
        }
        None => false,
    }
}

fn assign_list(slot: &mut Vec<String>, value: &Value) -> bool {
    if value.is_array() || value.is_string() {
        *slot = as_list(value);
        true
    } else {
        false
    }
}

/// Numeric view of a value; numeric strings are accepted
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Unsigned integral view of a value; integral floats are accepted
pub fn as_u64(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = as_f64(value)?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" => Some(true),
            "false" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_string).collect(),
        Value::String(s) => split_balanced(s),
        _ => Vec::new(),
    }
}

/// Splits a comma-separated list, ignoring commas inside parentheses or quotes
pub fn split_balanced(input: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                push_item(&mut items, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    push_item(&mut items, &current);
    items
}

fn push_item(items: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() {
        items.push(item.to_string());
    }
}
