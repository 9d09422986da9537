//! Query Plan Model - Data structures for representing PostgreSQL execution plans
//!
//! A [`PlanDocument`] wraps a single root [`PlanNode`] together with the
//! document-level facts EXPLAIN reports around the tree (planning and
//! execution time, triggers, JIT, settings). Nodes are created by the JSON or
//! text parser and later decorated in place by the metrics engine through
//! their [`NodeMetrics`] record.

use crate::metrics::{NodeMetrics, PlanMaxima};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A parsed plan: the root node plus document-level facts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanDocument {
    /// Root node of the plan tree
    pub root: PlanNode,
    /// Everything reported outside the node tree
    pub info: DocumentInfo,
    /// Plan-wide maxima, filled in by the metrics engine
    pub maxima: PlanMaxima,
}

impl PlanDocument {
    /// Creates a document with the given root and no document-level facts
    pub fn new(root: PlanNode) -> Self {
        Self::with_info(root, DocumentInfo::default())
    }

    pub fn with_info(root: PlanNode, info: DocumentInfo) -> Self {
        Self {
            root,
            info,
            maxima: PlanMaxima::default(),
        }
    }

    /// Returns an iterator over all nodes in the plan (depth-first)
    pub fn iter_nodes(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(&self.root)
    }

    /// Finds all nodes matching a specific node type
    pub fn find_nodes_by_type(&self, node_type: NodeType) -> Vec<&PlanNode> {
        self.iter_nodes()
            .filter(|n| n.node_type == node_type)
            .collect()
    }
}

/// Facts reported alongside the plan tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    /// Planning time in milliseconds
    pub planning_time_ms: Option<f64>,
    /// Execution time in milliseconds (`Total runtime` on old servers)
    pub execution_time_ms: Option<f64>,
    /// Trigger executions, in report order
    pub triggers: Vec<Trigger>,
    /// Query-level JIT compilation summary
    pub jit: Option<JitInfo>,
    /// Non-default planner settings (`SETTINGS` option)
    pub settings: BTreeMap<String, String>,
    /// Buffers used during planning
    pub planning_buffers: Buffers,
    /// Query text, as reported by auto_explain
    pub query_text: Option<String>,
    /// Unrecognized document-level properties, verbatim
    pub extra: Map<String, Value>,
}

impl DocumentInfo {
    /// The query text with runs of interior whitespace collapsed to one space
    pub fn normalized_query(&self) -> Option<String> {
        self.query_text.as_ref().map(|text| {
            text.lines()
                .map(|line| {
                    let indent = line.len() - line.trim_start().len();
                    let body = line.split_whitespace().collect::<Vec<_>>().join(" ");
                    format!("{}{}", &line[..indent], body)
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}

/// Represents a single node in the query plan tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanNode {
    /// Identity assigned in parse order once the tree is complete (1-based)
    pub node_id: u32,
    /// Type of operation this node performs
    pub node_type: NodeType,
    /// Node type label after decomposition (e.g. "Bitmap Heap Scan")
    pub type_label: String,
    /// Partial aggregation mode ("Partial", "Finalize", "Simple")
    pub partial_mode: Option<String>,
    /// Whether the node is parallel aware
    pub parallel_aware: bool,
    /// Relation/table name (if applicable)
    pub relation: Option<String>,
    /// Schema name (if applicable)
    pub schema: Option<String>,
    /// Alias used in the query (if applicable)
    pub alias: Option<String>,
    /// Index name used (for index scans)
    pub index_name: Option<String>,
    /// Name of the scanned common table expression
    pub cte_name: Option<String>,
    /// Name of the scanned function
    pub function_name: Option<String>,
    /// Join type (for joins)
    pub join_type: Option<JoinType>,
    /// Index scan direction
    pub scan_direction: Option<ScanDirection>,
    /// Relationship to the parent node
    pub parent_relationship: Option<ParentRelationship>,
    /// Name of the InitPlan/SubPlan/CTE this node belongs to
    pub subplan_name: Option<String>,
    /// Estimated cost
    pub cost: Option<NodeCost>,
    /// Estimated number of rows
    pub rows: Option<u64>,
    /// Estimated width of each row in bytes
    pub width: Option<u32>,
    /// Actual time per loop in milliseconds (from EXPLAIN ANALYZE)
    pub actual_time_ms: Option<ActualTime>,
    /// Actual rows per loop (from EXPLAIN ANALYZE)
    pub actual_rows: Option<f64>,
    /// Number of loops/iterations
    pub loops: Option<u64>,
    /// Rows removed by filter, per loop
    pub rows_removed_by_filter: Option<f64>,
    /// Rows removed by join filter, per loop
    pub rows_removed_by_join_filter: Option<f64>,
    /// Parallel workers planned (coordinator nodes)
    pub workers_planned: Option<u32>,
    /// Parallel workers launched (coordinator nodes)
    pub workers_launched: Option<u32>,
    /// Filter condition applied
    pub filter: Option<String>,
    /// Index condition (for index scans)
    pub index_cond: Option<String>,
    /// Recheck condition (for bitmap heap scans)
    pub recheck_cond: Option<String>,
    /// Join filter
    pub join_filter: Option<String>,
    /// Hash join condition
    pub hash_cond: Option<String>,
    /// Merge join condition
    pub merge_cond: Option<String>,
    /// Sort keys (for sort operations)
    pub sort_keys: Vec<String>,
    /// Presorted keys (for incremental sort)
    pub presorted_keys: Vec<String>,
    /// Sort method used (from EXPLAIN ANALYZE)
    pub sort_method: Option<String>,
    /// Sort space used in kB
    pub sort_space_used_kb: Option<u64>,
    /// Where the sort happened
    pub sort_space_type: Option<SortSpaceType>,
    /// Incremental sort full-sort group summary
    pub full_sort_groups: Option<SortGroups>,
    /// Incremental sort pre-sorted group summary
    pub pre_sorted_groups: Option<SortGroups>,
    /// Group keys (for aggregations)
    pub group_keys: Vec<String>,
    /// Output columns (EXPLAIN VERBOSE)
    pub output: Vec<String>,
    /// Buffer usage, inclusive of children
    pub buffers: Buffers,
    /// Write-ahead log usage
    pub wal: WalCounters,
    /// I/O timings, inclusive of children
    pub io_timings: IoTimings,
    /// Per-worker records
    pub workers: Vec<WorkerRecord>,
    /// Child nodes
    pub children: Vec<PlanNode>,
    /// Additional properties not captured by specific fields
    pub extra: Map<String, Value>,
    /// Derived values computed by the metrics engine
    pub metrics: NodeMetrics,
}

impl PlanNode {
    /// Creates a new plan node with the given type
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            type_label: node_type.label().to_string(),
            ..Self::default()
        }
    }

    /// Creates a node from a type label, keeping the label verbatim
    pub fn from_label(label: impl Into<String>) -> Self {
        let type_label = label.into();
        Self {
            node_type: NodeType::from_postgres_str(&type_label),
            type_label,
            ..Self::default()
        }
    }

    /// Sets the relation/table name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// Sets the cost information
    pub fn with_cost(mut self, startup: f64, total: f64) -> Self {
        self.cost = Some(NodeCost { startup, total });
        self
    }

    /// Sets the estimated rows
    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Sets actual timing, rows and loops as EXPLAIN ANALYZE reports them
    pub fn with_actuals(mut self, startup: f64, total: f64, rows: f64, loops: u64) -> Self {
        self.actual_time_ms = Some(ActualTime::new(startup, total));
        self.actual_rows = Some(rows);
        self.loops = Some(loops);
        self
    }

    /// Adds a child node
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Sets the parent relationship
    pub fn with_parent_relationship(mut self, relationship: ParentRelationship) -> Self {
        self.parent_relationship = Some(relationship);
        self
    }

    /// Returns the total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Returns the maximum depth of this subtree
    pub fn depth(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
        }
    }

    /// Returns true if this is a leaf node (no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns an iterator over this subtree (depth-first, self first)
    pub fn iter(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(self)
    }

    /// True for an InitPlan whose name marks it as a common table expression
    pub fn is_cte(&self) -> bool {
        self.parent_relationship == Some(ParentRelationship::InitPlan)
            && self
                .subplan_name
                .as_deref()
                .is_some_and(|name| name.starts_with("CTE"))
    }

    /// Looks up a worker record by number
    pub fn worker(&self, number: u32) -> Option<&WorkerRecord> {
        self.workers.iter().find(|w| w.worker_number == number)
    }

    /// Returns the worker record with the given number, creating it on first sight
    pub fn worker_mut(&mut self, number: u32) -> &mut WorkerRecord {
        let position = match self.workers.iter().position(|w| w.worker_number == number) {
            Some(position) => position,
            None => {
                self.workers.push(WorkerRecord::new(number));
                self.workers.len() - 1
            }
        };
        &mut self.workers[position]
    }
}

/// Cost information for a plan node
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeCost {
    /// Startup cost (time to return first row)
    pub startup: f64,
    /// Total cost (time to return all rows)
    pub total: f64,
}

impl NodeCost {
    /// Creates a new cost with startup and total values
    pub fn new(startup: f64, total: f64) -> Self {
        Self { startup, total }
    }
}

/// Actual timing information from EXPLAIN ANALYZE, per loop
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ActualTime {
    /// Time to return first row
    pub startup: f64,
    /// Total execution time
    pub total: f64,
}

impl ActualTime {
    /// Creates new actual timing
    pub fn new(startup: f64, total: f64) -> Self {
        Self { startup, total }
    }
}

/// Partial metrics reported by one parallel worker
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkerRecord {
    pub worker_number: u32,
    pub actual_time_ms: Option<ActualTime>,
    pub actual_rows: Option<f64>,
    pub loops: Option<u64>,
    pub sort_method: Option<String>,
    pub sort_space_used_kb: Option<u64>,
    pub sort_space_type: Option<SortSpaceType>,
    pub buffers: Buffers,
    pub jit: Option<JitInfo>,
    pub extra: Map<String, Value>,
}

impl WorkerRecord {
    pub fn new(worker_number: u32) -> Self {
        Self {
            worker_number,
            ..Self::default()
        }
    }
}

/// A trigger execution reported after the plan
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trigger {
    pub name: String,
    pub relation: Option<String>,
    pub time_ms: f64,
    pub calls: u64,
}

/// JIT compilation summary
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JitInfo {
    /// Number of functions compiled
    pub functions: Option<u64>,
    /// Enabled JIT stages ("Inlining", "Optimization", ...)
    pub options: BTreeMap<String, bool>,
    pub timing: JitTiming,
    pub extra: Map<String, Value>,
}

/// JIT time per stage in milliseconds
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct JitTiming {
    pub generation: Option<f64>,
    pub deform: Option<f64>,
    pub inlining: Option<f64>,
    pub optimization: Option<f64>,
    pub emission: Option<f64>,
    pub total: Option<f64>,
}

/// Where a sort spilled its data
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SortSpaceType {
    Memory,
    Disk,
}

impl SortSpaceType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Memory" => Some(Self::Memory),
            "Disk" => Some(Self::Disk),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "Memory",
            Self::Disk => "Disk",
        }
    }
}

/// Summary of one group class of an incremental sort
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SortGroups {
    pub group_count: u64,
    pub sort_methods_used: Vec<String>,
    pub memory: Option<SortSpace>,
    pub disk: Option<SortSpace>,
}

/// Average and peak sort space in kB
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortSpace {
    pub average_kb: u64,
    pub peak_kb: u64,
}

/// Buffer usage counters, by location
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Buffers {
    pub shared: BufferCounts,
    pub temp: BufferCounts,
    pub local: BufferCounts,
}

impl Buffers {
    pub fn location(&self, location: BufferLocation) -> &BufferCounts {
        match location {
            BufferLocation::Shared => &self.shared,
            BufferLocation::Temp => &self.temp,
            BufferLocation::Local => &self.local,
        }
    }

    pub fn location_mut(&mut self, location: BufferLocation) -> &mut BufferCounts {
        match location {
            BufferLocation::Shared => &mut self.shared,
            BufferLocation::Temp => &mut self.temp,
            BufferLocation::Local => &mut self.local,
        }
    }

    pub fn get(&self, location: BufferLocation, operation: BufferOperation) -> Option<u64> {
        self.location(location).get(operation)
    }

    pub fn set(&mut self, location: BufferLocation, operation: BufferOperation, blocks: u64) {
        self.location_mut(location).set(operation, blocks);
    }

    pub fn is_empty(&self) -> bool {
        BufferLocation::ALL
            .iter()
            .all(|location| self.location(*location).is_empty())
    }
}

/// Block counts for one buffer location
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BufferCounts {
    pub hit: Option<u64>,
    pub read: Option<u64>,
    pub dirtied: Option<u64>,
    pub written: Option<u64>,
}

impl BufferCounts {
    pub fn get(&self, operation: BufferOperation) -> Option<u64> {
        match operation {
            BufferOperation::Hit => self.hit,
            BufferOperation::Read => self.read,
            BufferOperation::Dirtied => self.dirtied,
            BufferOperation::Written => self.written,
        }
    }

    pub fn set(&mut self, operation: BufferOperation, blocks: u64) {
        let slot = match operation {
            BufferOperation::Hit => &mut self.hit,
            BufferOperation::Read => &mut self.read,
            BufferOperation::Dirtied => &mut self.dirtied,
            BufferOperation::Written => &mut self.written,
        };
        *slot = Some(blocks);
    }

    /// Sum of all reported operations
    pub fn total(&self) -> u64 {
        BufferOperation::ALL
            .iter()
            .filter_map(|op| self.get(*op))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        BufferOperation::ALL.iter().all(|op| self.get(*op).is_none())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BufferLocation {
    Shared,
    Temp,
    Local,
}

impl BufferLocation {
    pub const ALL: [Self; 3] = [Self::Shared, Self::Temp, Self::Local];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "shared" => Some(Self::Shared),
            "temp" => Some(Self::Temp),
            "local" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Shared => "Shared",
            Self::Temp => "Temp",
            Self::Local => "Local",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BufferOperation {
    Hit,
    Read,
    Dirtied,
    Written,
}

impl BufferOperation {
    pub const ALL: [Self; 4] = [Self::Hit, Self::Read, Self::Dirtied, Self::Written];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hit" => Some(Self::Hit),
            "read" => Some(Self::Read),
            "dirtied" => Some(Self::Dirtied),
            "written" => Some(Self::Written),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Hit => "Hit",
            Self::Read => "Read",
            Self::Dirtied => "Dirtied",
            Self::Written => "Written",
        }
    }
}

/// Write-ahead log usage
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalCounters {
    pub records: Option<u64>,
    pub fpi: Option<u64>,
    pub bytes: Option<u64>,
    pub buffers_full: Option<u64>,
}

/// I/O timing counters in milliseconds.
///
/// `read`/`write` carry the combined shared+local figures older servers
/// report; newer servers split them by location.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct IoTimings {
    pub read: Option<f64>,
    pub write: Option<f64>,
    pub shared_read: Option<f64>,
    pub shared_write: Option<f64>,
    pub local_read: Option<f64>,
    pub local_write: Option<f64>,
    pub temp_read: Option<f64>,
    pub temp_write: Option<f64>,
}

/// One I/O timing counter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IoTiming {
    Read,
    Write,
    SharedRead,
    SharedWrite,
    LocalRead,
    LocalWrite,
    TempRead,
    TempWrite,
}

impl IoTiming {
    pub const ALL: [Self; 8] = [
        Self::Read,
        Self::Write,
        Self::SharedRead,
        Self::SharedWrite,
        Self::LocalRead,
        Self::LocalWrite,
        Self::TempRead,
        Self::TempWrite,
    ];

    /// Canonical property name, e.g. "Temp I/O Read Time"
    pub fn property_name(&self) -> &'static str {
        match self {
            Self::Read => "I/O Read Time",
            Self::Write => "I/O Write Time",
            Self::SharedRead => "Shared I/O Read Time",
            Self::SharedWrite => "Shared I/O Write Time",
            Self::LocalRead => "Local I/O Read Time",
            Self::LocalWrite => "Local I/O Write Time",
            Self::TempRead => "Temp I/O Read Time",
            Self::TempWrite => "Temp I/O Write Time",
        }
    }

    pub fn from_property_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.property_name() == name)
    }

    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::Read | Self::SharedRead | Self::LocalRead | Self::TempRead
        )
    }
}

impl IoTimings {
    pub fn get(&self, timing: IoTiming) -> Option<f64> {
        match timing {
            IoTiming::Read => self.read,
            IoTiming::Write => self.write,
            IoTiming::SharedRead => self.shared_read,
            IoTiming::SharedWrite => self.shared_write,
            IoTiming::LocalRead => self.local_read,
            IoTiming::LocalWrite => self.local_write,
            IoTiming::TempRead => self.temp_read,
            IoTiming::TempWrite => self.temp_write,
        }
    }

    pub fn set(&mut self, timing: IoTiming, ms: f64) {
        let slot = match timing {
            IoTiming::Read => &mut self.read,
            IoTiming::Write => &mut self.write,
            IoTiming::SharedRead => &mut self.shared_read,
            IoTiming::SharedWrite => &mut self.shared_write,
            IoTiming::LocalRead => &mut self.local_read,
            IoTiming::LocalWrite => &mut self.local_write,
            IoTiming::TempRead => &mut self.temp_read,
            IoTiming::TempWrite => &mut self.temp_write,
        };
        *slot = Some(ms);
    }

    /// Sum of all read timings
    pub fn total_read(&self) -> f64 {
        self.sum_where(|t| t.is_read())
    }

    /// Sum of all write timings
    pub fn total_write(&self) -> f64 {
        self.sum_where(|t| !t.is_read())
    }

    pub fn total(&self) -> f64 {
        self.total_read() + self.total_write()
    }

    fn sum_where(&self, keep: impl Fn(&IoTiming) -> bool) -> f64 {
        IoTiming::ALL
            .iter()
            .filter(|t| keep(t))
            .filter_map(|t| self.get(*t))
            .sum()
    }
}

/// How a node relates to its parent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ParentRelationship {
    Outer,
    Inner,
    Member,
    InitPlan,
    SubPlan,
    Subquery,
}

impl ParentRelationship {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Outer" => Some(Self::Outer),
            "Inner" => Some(Self::Inner),
            "Member" => Some(Self::Member),
            "InitPlan" => Some(Self::InitPlan),
            "SubPlan" => Some(Self::SubPlan),
            "Subquery" => Some(Self::Subquery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outer => "Outer",
            Self::Inner => "Inner",
            Self::Member => "Member",
            Self::InitPlan => "InitPlan",
            Self::SubPlan => "SubPlan",
            Self::Subquery => "Subquery",
        }
    }
}

/// Index scan direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanDirection {
    Forward,
    Backward,
    NoMovement,
}

impl ScanDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Forward" => Some(Self::Forward),
            "Backward" => Some(Self::Backward),
            "NoMovement" => Some(Self::NoMovement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "Forward",
            Self::Backward => "Backward",
            Self::NoMovement => "NoMovement",
        }
    }
}

/// Type of join operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    RightSemi,
    RightAnti,
}

impl JoinType {
    /// Parses a join type from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inner" => Some(Self::Inner),
            "left" | "left outer" => Some(Self::Left),
            "right" | "right outer" => Some(Self::Right),
            "full" | "full outer" => Some(Self::Full),
            "semi" => Some(Self::Semi),
            "anti" => Some(Self::Anti),
            "right semi" => Some(Self::RightSemi),
            "right anti" => Some(Self::RightAnti),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "Inner",
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Full => "Full",
            Self::Semi => "Semi",
            Self::Anti => "Anti",
            Self::RightSemi => "Right Semi",
            Self::RightAnti => "Right Anti",
        }
    }
}

/// Type of operation performed by a plan node
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    // Scan operations
    SeqScan,
    SampleScan,
    IndexScan,
    IndexOnlyScan,
    BitmapIndexScan,
    BitmapHeapScan,
    TidScan,
    TidRangeScan,
    SubqueryScan,
    FunctionScan,
    TableFunctionScan,
    ValuesScan,
    CteScan,
    NamedTuplestoreScan,
    WorkTableScan,
    ForeignScan,
    CustomScan,

    // Join operations
    NestedLoop,
    HashJoin,
    MergeJoin,

    // Aggregation operations
    Aggregate,
    GroupAggregate,
    HashAggregate,
    MixedAggregate,
    Group,
    WindowAgg,

    // Sort operations
    Sort,
    IncrementalSort,

    // Set operations
    SetOp,
    Append,
    MergeAppend,
    RecursiveUnion,

    // Limit/Offset
    Limit,

    // Materialize
    Materialize,
    Memoize,

    // Hash
    Hash,

    // Unique
    Unique,

    // Bitmap operations
    BitmapAnd,
    BitmapOr,

    // Modification operations
    ModifyTable,
    Insert,
    Update,
    Delete,
    Merge,

    // Result
    Result,

    // Gather (parallel query)
    Gather,
    GatherMerge,

    // Lock
    LockRows,

    // Project
    ProjectSet,

    // Unknown/Other
    #[default]
    Unknown,
}

impl NodeType {
    /// Parses a node type from PostgreSQL EXPLAIN output
    pub fn from_postgres_str(s: &str) -> Self {
        match s {
            "Seq Scan" => Self::SeqScan,
            "Sample Scan" => Self::SampleScan,
            "Index Scan" => Self::IndexScan,
            "Index Only Scan" => Self::IndexOnlyScan,
            "Bitmap Index Scan" => Self::BitmapIndexScan,
            "Bitmap Heap Scan" => Self::BitmapHeapScan,
            "Tid Scan" | "TID Scan" => Self::TidScan,
            "Tid Range Scan" | "TID Range Scan" => Self::TidRangeScan,
            "Subquery Scan" => Self::SubqueryScan,
            "Function Scan" => Self::FunctionScan,
            "Table Function Scan" => Self::TableFunctionScan,
            "Values Scan" => Self::ValuesScan,
            "CTE Scan" => Self::CteScan,
            "Named Tuplestore Scan" => Self::NamedTuplestoreScan,
            "WorkTable Scan" => Self::WorkTableScan,
            "Foreign Scan" | "Async Foreign Scan" => Self::ForeignScan,
            "Custom Scan" => Self::CustomScan,
            "Nested Loop" | "Nested Loop Join" => Self::NestedLoop,
            "Hash Join" => Self::HashJoin,
            "Merge Join" => Self::MergeJoin,
            "Aggregate" => Self::Aggregate,
            "GroupAggregate" | "Group Aggregate" => Self::GroupAggregate,
            "HashAggregate" | "Hash Aggregate" => Self::HashAggregate,
            "MixedAggregate" | "Mixed Aggregate" => Self::MixedAggregate,
            "Group" => Self::Group,
            "WindowAgg" | "Window Aggregate" => Self::WindowAgg,
            "Sort" => Self::Sort,
            "Incremental Sort" => Self::IncrementalSort,
            "SetOp" | "HashSetOp" | "SetOperation" => Self::SetOp,
            "Append" => Self::Append,
            "Merge Append" | "MergeAppend" => Self::MergeAppend,
            "Recursive Union" => Self::RecursiveUnion,
            "Limit" => Self::Limit,
            "Materialize" => Self::Materialize,
            "Memoize" => Self::Memoize,
            "Hash" => Self::Hash,
            "Unique" => Self::Unique,
            "BitmapAnd" | "Bitmap And" => Self::BitmapAnd,
            "BitmapOr" | "Bitmap Or" => Self::BitmapOr,
            "ModifyTable" | "Modify Table" => Self::ModifyTable,
            "Insert" => Self::Insert,
            "Update" => Self::Update,
            "Delete" => Self::Delete,
            "Merge" => Self::Merge,
            "Result" => Self::Result,
            "Gather" => Self::Gather,
            "Gather Merge" => Self::GatherMerge,
            "LockRows" | "Lock Rows" => Self::LockRows,
            "ProjectSet" | "Project Set" => Self::ProjectSet,
            _ => Self::Unknown,
        }
    }

    /// The label PostgreSQL uses for this node type
    pub fn label(&self) -> &'static str {
        match self {
            Self::SeqScan => "Seq Scan",
            Self::SampleScan => "Sample Scan",
            Self::IndexScan => "Index Scan",
            Self::IndexOnlyScan => "Index Only Scan",
            Self::BitmapIndexScan => "Bitmap Index Scan",
            Self::BitmapHeapScan => "Bitmap Heap Scan",
            Self::TidScan => "Tid Scan",
            Self::TidRangeScan => "Tid Range Scan",
            Self::SubqueryScan => "Subquery Scan",
            Self::FunctionScan => "Function Scan",
            Self::TableFunctionScan => "Table Function Scan",
            Self::ValuesScan => "Values Scan",
            Self::CteScan => "CTE Scan",
            Self::NamedTuplestoreScan => "Named Tuplestore Scan",
            Self::WorkTableScan => "WorkTable Scan",
            Self::ForeignScan => "Foreign Scan",
            Self::CustomScan => "Custom Scan",
            Self::NestedLoop => "Nested Loop",
            Self::HashJoin => "Hash Join",
            Self::MergeJoin => "Merge Join",
            Self::Aggregate => "Aggregate",
            Self::GroupAggregate => "GroupAggregate",
            Self::HashAggregate => "HashAggregate",
            Self::MixedAggregate => "MixedAggregate",
            Self::Group => "Group",
            Self::WindowAgg => "WindowAgg",
            Self::Sort => "Sort",
            Self::IncrementalSort => "Incremental Sort",
            Self::SetOp => "SetOp",
            Self::Append => "Append",
            Self::MergeAppend => "Merge Append",
            Self::RecursiveUnion => "Recursive Union",
            Self::Limit => "Limit",
            Self::Materialize => "Materialize",
            Self::Memoize => "Memoize",
            Self::Hash => "Hash",
            Self::Unique => "Unique",
            Self::BitmapAnd => "BitmapAnd",
            Self::BitmapOr => "BitmapOr",
            Self::ModifyTable => "ModifyTable",
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Merge => "Merge",
            Self::Result => "Result",
            Self::Gather => "Gather",
            Self::GatherMerge => "Gather Merge",
            Self::LockRows => "LockRows",
            Self::ProjectSet => "ProjectSet",
            Self::Unknown => "Unknown",
        }
    }
}

/// Iterator for traversing plan nodes depth-first
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order so we visit them in order
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests;
