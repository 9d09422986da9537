//! Metric records attached to nodes and plans

use crate::explain::plan::{
    ActualTime, BufferLocation, BufferOperation, Buffers, DocumentInfo, IoTiming, IoTimings,
    PlanDocument, PlanNode, Trigger,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values derived for a single node by the metrics engine
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeMetrics {
    /// Actual time multiplied by loops and divided by the worker fan-out
    pub adjusted_time_ms: Option<ActualTime>,
    /// Adjusted total time minus the time spent in descendants
    pub exclusive_duration_ms: Option<f64>,
    /// Total cost minus the total cost of children
    pub exclusive_cost: Option<f64>,
    /// `Workers Planned` of the enclosing parallel coordinator
    pub enclosing_workers_planned: Option<u32>,
    /// `Workers Launched` of the enclosing parallel coordinator
    pub enclosing_workers_launched: Option<u32>,
    /// Actual rows across all loops
    pub revised_actual_rows: Option<f64>,
    /// Planned rows across all loops
    pub revised_plan_rows: Option<f64>,
    pub revised_rows_removed_by_filter: Option<f64>,
    pub revised_rows_removed_by_join_filter: Option<f64>,
    /// Buffer counters minus those of children
    pub exclusive_buffers: Buffers,
    /// I/O timings minus those of children
    pub exclusive_io_timings: IoTimings,
    /// Blocks read per second of exclusive read time
    pub read_throughput: Option<f64>,
    /// Blocks written per second of exclusive write time
    pub write_throughput: Option<f64>,
    pub planner_estimate: Option<PlannerEstimate>,
    /// Exclusive values that had to be clamped to zero
    pub anomalies: Vec<MeasurementAnomaly>,
}

impl NodeMetrics {
    /// Worker fan-out used for time adjustment: enclosing workers plus the leader
    pub fn fan_out(&self, fall_back_to_planned: bool) -> u64 {
        let workers = match self.enclosing_workers_launched {
            Some(launched) => launched,
            None if fall_back_to_planned => self.enclosing_workers_planned.unwrap_or(0),
            None => 0,
        };
        u64::from(workers) + 1
    }

    /// Returns true if any exclusive value was clamped
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }
}

/// Direction of a planner row misestimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateDirection {
    /// The planner expected more rows than were produced
    Over,
    /// The planner expected fewer rows than were produced
    Under,
    /// The estimate was exact
    None,
}

impl EstimateDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Over => "over",
            Self::Under => "under",
            Self::None => "none",
        }
    }
}

/// How far actual rows strayed from the planner's estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannerEstimate {
    /// Ratio of the larger to the smaller figure, always >= 1. Absent when
    /// the smaller figure is zero.
    pub factor: Option<f64>,
    pub direction: EstimateDirection,
}

impl PlannerEstimate {
    /// Compares per-loop actual rows against planned rows
    pub fn from_rows(planned: f64, actual: f64) -> Self {
        let ratio = |larger: f64, smaller: f64| (smaller > 0.0).then(|| larger / smaller);
        if actual > planned {
            Self {
                factor: ratio(actual, planned),
                direction: EstimateDirection::Under,
            }
        } else if actual < planned {
            Self {
                factor: ratio(planned, actual),
                direction: EstimateDirection::Over,
            }
        } else {
            Self {
                factor: Some(1.0),
                direction: EstimateDirection::None,
            }
        }
    }
}

/// The metric an anomaly was recorded for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyMetric {
    Duration,
    Cost,
    Buffers {
        location: BufferLocation,
        operation: BufferOperation,
    },
    IoTiming(IoTiming),
}

/// Children reported more than their parent for an additive metric; the
/// parent's exclusive value was floored at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementAnomaly {
    pub metric: AnomalyMetric,
    /// Amount by which the children exceeded the parent
    pub deficit: f64,
}

/// Plan-wide maxima, for normalizing per-node figures
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanMaxima {
    /// Greatest revised actual row count
    pub max_rows: Option<f64>,
    /// Greatest exclusive cost
    pub max_cost: Option<f64>,
    /// Greatest total cost
    pub max_total_cost: Option<f64>,
    /// Greatest exclusive duration; absent without `ANALYZE`
    pub max_duration: Option<f64>,
    /// Greatest exclusive block count per buffer location
    pub max_blocks: BTreeMap<String, u64>,
    /// Greatest exclusive I/O time
    pub max_io: Option<f64>,
}

impl PlanMaxima {
    pub fn max_blocks(&self, location: BufferLocation) -> Option<u64> {
        self.max_blocks.get(location.label()).copied()
    }
}

/// Plan-level summary figures
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanStats {
    pub execution_time_ms: Option<f64>,
    pub planning_time_ms: Option<f64>,
    /// Total JIT time, query level plus every worker
    pub jit_time_ms: Option<f64>,
    pub trigger_count: usize,
    pub trigger_time_ms: f64,
    /// Nodes in the tree plus every hoisted CTE
    pub node_count: usize,
    /// Whether the plan carries `ANALYZE` measurements
    pub is_analyze: bool,
    /// Whether the plan carries `VERBOSE` output lists
    pub is_verbose: bool,
}

/// A parsed plan with its metrics computed and CTEs hoisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnnotatedPlan {
    pub document: PlanDocument,
    /// Common table expressions detached from the tree, in plan order
    pub ctes: Vec<PlanNode>,
    pub stats: PlanStats,
}

impl AnnotatedPlan {
    /// Returns the root node
    pub fn root(&self) -> &PlanNode {
        &self.document.root
    }

    pub fn ctes(&self) -> &[PlanNode] {
        &self.ctes
    }

    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    pub fn maxima(&self) -> &PlanMaxima {
        &self.document.maxima
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.document.info
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.document.info.triggers
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.document.info.settings
    }

    /// Iterates over the tree and then every CTE, depth-first
    pub fn iter_nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.document
            .iter_nodes()
            .chain(self.ctes.iter().flat_map(PlanNode::iter))
    }

    /// Finds a node by its identity
    pub fn find_node(&self, node_id: u32) -> Option<&PlanNode> {
        self.iter_nodes().find(|node| node.node_id == node_id)
    }
}
