//! Metrics Engine
//!
//! Runs once the full tree is available:
//!
//! 1. nodes are numbered in parse order (pre-order, starting at 1);
//! 2. CTE sub-trees are detached from their structural parent and collected
//!    in plan order;
//! 3. a post-order pass computes per-node figures, carrying the enclosing
//!    coordinator's worker counts downward;
//! 4. a flat scan over every node, CTEs included, collects plan-wide maxima.

use super::model::{
    AnnotatedPlan, AnomalyMetric, MeasurementAnomaly, PlanMaxima, PlanStats, PlannerEstimate,
};
use crate::explain::plan::{
    ActualTime, BufferLocation, BufferOperation, IoTiming, ParentRelationship, PlanDocument,
    PlanNode,
};
use crate::options::{ParseContext, ParserOptions};

/// Negative deltas smaller than this are rounding noise, not anomalies
const DEFICIT_TOLERANCE: f64 = 1e-9;

/// Worker counts of the nearest enclosing parallel coordinator
#[derive(Debug, Clone, Copy, Default)]
struct EnclosingWorkers {
    planned: Option<u32>,
    launched: Option<u32>,
}

impl EnclosingWorkers {
    /// Counts seen by the children of `node`: its own non-zero counts, or
    /// whatever it inherited
    fn passed_down_by(self, node: &PlanNode) -> Self {
        Self {
            planned: node.workers_planned.filter(|n| *n > 0).or(self.planned),
            launched: node.workers_launched.filter(|n| *n > 0).or(self.launched),
        }
    }
}

/// Computes every derived value and wraps the document in an [`AnnotatedPlan`]
pub fn annotate(mut document: PlanDocument, ctx: &mut ParseContext) -> AnnotatedPlan {
    assign_node_ids(&mut document.root, ctx);

    let mut ctes = Vec::new();
    hoist_ctes(&mut document.root, &mut ctes);
    if !ctes.is_empty() {
        tracing::debug!(count = ctes.len(), "hoisted common table expressions");
    }

    compute(&mut document.root, EnclosingWorkers::default(), &ctx.options);
    for cte in &mut ctes {
        compute(cte, EnclosingWorkers::default(), &ctx.options);
    }

    document.maxima = plan_maxima(
        document
            .root
            .iter()
            .chain(ctes.iter().flat_map(PlanNode::iter)),
    );
    let stats = plan_stats(&document, &ctes);
    tracing::debug!(
        nodes = stats.node_count,
        analyze = stats.is_analyze,
        "plan annotated"
    );

    AnnotatedPlan {
        document,
        ctes,
        stats,
    }
}

fn assign_node_ids(node: &mut PlanNode, ctx: &mut ParseContext) {
    node.node_id = ctx.next_node_id();
    for child in &mut node.children {
        assign_node_ids(child, ctx);
    }
}

/// Moves every CTE below `node` into `ctes`, keeping pre-order
fn hoist_ctes(node: &mut PlanNode, ctes: &mut Vec<PlanNode>) {
    for mut child in std::mem::take(&mut node.children) {
        if child.is_cte() {
            let mut nested = Vec::new();
            hoist_ctes(&mut child, &mut nested);
            tracing::debug!(
                node_id = child.node_id,
                name = child.subplan_name.as_deref().unwrap_or_default(),
                "detached CTE"
            );
            ctes.push(child);
            ctes.extend(nested);
        } else {
            hoist_ctes(&mut child, ctes);
            node.children.push(child);
        }
    }
}

fn is_init_plan(node: &PlanNode) -> bool {
    node.parent_relationship == Some(ParentRelationship::InitPlan)
}

/// Post-order pass over one sub-tree. Returns the sum of exclusive durations
/// of `node` and its descendants (InitPlan sub-trees excluded).
fn compute(node: &mut PlanNode, enclosing: EnclosingWorkers, options: &ParserOptions) -> f64 {
    node.metrics.enclosing_workers_planned = enclosing.planned;
    node.metrics.enclosing_workers_launched = enclosing.launched;

    let inherited = enclosing.passed_down_by(node);
    let mut descendant_duration = 0.0;
    for child in &mut node.children {
        // Sub-plans run outside the coordinator's worker fan-out
        let workers = match child.parent_relationship {
            Some(ParentRelationship::InitPlan | ParentRelationship::SubPlan) => {
                EnclosingWorkers::default()
            }
            _ => inherited,
        };
        let duration = compute(child, workers, options);
        if !is_init_plan(child) {
            descendant_duration += duration;
        }
    }

    revise_rows(node);
    adjust_time(node, descendant_duration, options);
    exclusive_cost(node, options);
    exclusive_buffers(node, options);
    exclusive_io(node, options);
    throughput(node);

    node.metrics.exclusive_duration_ms.unwrap_or(0.0) + descendant_duration
}

fn revise_rows(node: &mut PlanNode) {
    let loops = node.loops.unwrap_or(1) as f64;
    let metrics = &mut node.metrics;

    metrics.revised_actual_rows = node.actual_rows.map(|rows| rows * loops);
    metrics.revised_plan_rows = node.rows.map(|rows| rows as f64 * loops);
    metrics.revised_rows_removed_by_filter = node.rows_removed_by_filter.map(|rows| rows * loops);
    metrics.revised_rows_removed_by_join_filter =
        node.rows_removed_by_join_filter.map(|rows| rows * loops);

    if let (Some(planned), Some(actual)) = (node.rows, node.actual_rows)
        && node.loops != Some(0)
    {
        metrics.planner_estimate = Some(PlannerEstimate::from_rows(planned as f64, actual));
    }
}

fn adjust_time(node: &mut PlanNode, descendant_duration: f64, options: &ParserOptions) {
    let Some(time) = node.actual_time_ms else {
        return;
    };
    let loops = node.loops.unwrap_or(1) as f64;
    let fan_out = node.metrics.fan_out(options.fall_back_to_planned_workers) as f64;
    let adjusted = ActualTime::new(time.startup * loops / fan_out, time.total * loops / fan_out);

    node.metrics.adjusted_time_ms = Some(adjusted);
    node.metrics.exclusive_duration_ms = Some(floor_at_zero(
        node,
        AnomalyMetric::Duration,
        adjusted.total - descendant_duration,
        options,
    ));
}

fn exclusive_cost(node: &mut PlanNode, options: &ParserOptions) {
    let Some(cost) = node.cost else {
        return;
    };
    let children: f64 = node
        .children
        .iter()
        .filter(|child| !is_init_plan(child))
        .filter_map(|child| child.cost)
        .map(|cost| cost.total)
        .sum();

    node.metrics.exclusive_cost = Some(floor_at_zero(
        node,
        AnomalyMetric::Cost,
        cost.total - children,
        options,
    ));
}

fn exclusive_buffers(node: &mut PlanNode, options: &ParserOptions) {
    for location in BufferLocation::ALL {
        for operation in BufferOperation::ALL {
            let Some(raw) = node.buffers.get(location, operation) else {
                continue;
            };
            let children: u64 = node
                .children
                .iter()
                .filter_map(|child| child.buffers.get(location, operation))
                .sum();

            let exclusive = match raw.checked_sub(children) {
                Some(blocks) => blocks,
                None => {
                    floor_at_zero(
                        node,
                        AnomalyMetric::Buffers {
                            location,
                            operation,
                        },
                        raw as f64 - children as f64,
                        options,
                    );
                    0
                }
            };
            node.metrics
                .exclusive_buffers
                .set(location, operation, exclusive);
        }
    }
}

fn exclusive_io(node: &mut PlanNode, options: &ParserOptions) {
    for timing in IoTiming::ALL {
        let Some(raw) = node.io_timings.get(timing) else {
            continue;
        };
        let children: f64 = node
            .children
            .iter()
            .filter_map(|child| child.io_timings.get(timing))
            .sum();

        let exclusive = floor_at_zero(node, AnomalyMetric::IoTiming(timing), raw - children, options);
        node.metrics.exclusive_io_timings.set(timing, exclusive);
    }
}

/// Average blocks per second over the node's own I/O time
fn throughput(node: &mut PlanNode) {
    let metrics = &mut node.metrics;
    let blocks = |operation: BufferOperation| -> u64 {
        BufferLocation::ALL
            .iter()
            .filter_map(|location| metrics.exclusive_buffers.get(*location, operation))
            .sum()
    };
    let per_second = |blocks: u64, ms: f64| (ms > 0.0).then(|| blocks as f64 / (ms / 1000.0));

    let read = per_second(
        blocks(BufferOperation::Read),
        metrics.exclusive_io_timings.total_read(),
    );
    let write = per_second(
        blocks(BufferOperation::Written),
        metrics.exclusive_io_timings.total_write(),
    );
    metrics.read_throughput = read;
    metrics.write_throughput = write;
}

/// Floors an exclusive value at zero, recording the deficit on the node
fn floor_at_zero(
    node: &mut PlanNode,
    metric: AnomalyMetric,
    value: f64,
    options: &ParserOptions,
) -> f64 {
    if value >= 0.0 {
        return value;
    }

    let deficit = -value;
    if deficit > DEFICIT_TOLERANCE {
        tracing::warn!(
            node_id = node.node_id,
            ?metric,
            deficit,
            "children exceed their parent, clamped to zero"
        );
        if options.record_anomalies {
            node.metrics
                .anomalies
                .push(MeasurementAnomaly { metric, deficit });
        }
    }
    0.0
}

fn plan_maxima<'a>(nodes: impl Iterator<Item = &'a PlanNode>) -> PlanMaxima {
    let mut maxima = PlanMaxima::default();

    for node in nodes {
        let metrics = &node.metrics;
        raise(&mut maxima.max_rows, metrics.revised_actual_rows);
        raise(&mut maxima.max_cost, metrics.exclusive_cost);
        raise(&mut maxima.max_total_cost, node.cost.map(|cost| cost.total));
        raise(&mut maxima.max_duration, metrics.exclusive_duration_ms);

        for location in BufferLocation::ALL {
            let blocks = metrics.exclusive_buffers.location(location).total();
            if blocks > 0 {
                maxima
                    .max_blocks
                    .entry(location.label().to_string())
                    .and_modify(|max| *max = (*max).max(blocks))
                    .or_insert(blocks);
            }
        }

        let io = &metrics.exclusive_io_timings;
        if IoTiming::ALL.iter().any(|timing| io.get(*timing).is_some()) {
            raise(&mut maxima.max_io, Some(io.total()));
        }
    }

    maxima
}

fn raise(slot: &mut Option<f64>, value: Option<f64>) {
    if let Some(value) = value {
        *slot = Some(slot.map_or(value, |current| current.max(value)));
    }
}

fn plan_stats(document: &PlanDocument, ctes: &[PlanNode]) -> PlanStats {
    let nodes = || {
        document
            .iter_nodes()
            .chain(ctes.iter().flat_map(PlanNode::iter))
    };
    let info = &document.info;

    // The query-level JIT block already includes worker time when present
    let jit_time_ms = info
        .jit
        .as_ref()
        .and_then(|jit| jit.timing.total)
        .or_else(|| {
            nodes()
                .flat_map(|node| node.workers.iter())
                .filter_map(|worker| worker.jit.as_ref()?.timing.total)
                .reduce(|sum, ms| sum + ms)
        });

    PlanStats {
        execution_time_ms: info.execution_time_ms,
        planning_time_ms: info.planning_time_ms,
        jit_time_ms,
        trigger_count: info.triggers.len(),
        trigger_time_ms: info.triggers.iter().map(|trigger| trigger.time_ms).sum(),
        node_count: nodes().count(),
        is_analyze: nodes().any(|node| node.actual_rows.is_some() || node.loops.is_some()),
        is_verbose: nodes().any(|node| !node.output.is_empty()),
    }
}

#[cfg(test)]
mod tests;
