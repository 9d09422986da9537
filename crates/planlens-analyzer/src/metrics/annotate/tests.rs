//! Tests for the metrics engine

use super::*;
use crate::explain::plan::{JitInfo, NodeType, Trigger};
use crate::metrics::EstimateDirection;
use pretty_assertions::assert_eq;

fn run(root: PlanNode) -> AnnotatedPlan {
    annotate(PlanDocument::new(root), &mut ParseContext::default())
}

fn scan(relation: &str, total_ms: f64, loops: u64) -> PlanNode {
    PlanNode::new(NodeType::SeqScan)
        .with_relation(relation)
        .with_actuals(0.0, total_ms, 10.0, loops)
}

fn cte(name: &str, child: PlanNode) -> PlanNode {
    let mut node = child.with_parent_relationship(ParentRelationship::InitPlan);
    node.subplan_name = Some(format!("CTE {name}"));
    node
}

// ============================================================================
// Identity Tests
// ============================================================================

#[test]
fn test_node_ids_follow_parse_order() {
    let root = PlanNode::new(NodeType::HashJoin)
        .with_child(scan("a", 1.0, 1))
        .with_child(PlanNode::new(NodeType::Hash).with_child(scan("b", 1.0, 1)));
    let plan = run(root);

    let ids: Vec<u32> = plan.iter_nodes().map(|node| node.node_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
    assert_eq!(plan.root().children[1].children[0].node_id, 4);
}

#[test]
fn test_context_restarts_numbering_per_call() {
    let mut ctx = ParseContext::default();
    ctx.next_node_id();
    ctx.reset();

    let plan = annotate(PlanDocument::new(scan("a", 1.0, 1)), &mut ctx);
    assert_eq!(plan.root().node_id, 1);
}

// ============================================================================
// Timing Tests
// ============================================================================

#[test]
fn test_time_is_multiplied_by_loops() {
    let root = PlanNode::new(NodeType::NestedLoop)
        .with_actuals(0.0, 10.0, 100.0, 1)
        .with_child(scan("outer", 2.0, 1))
        .with_child(scan("inner", 0.25, 20));
    let plan = run(root);
    let inner = &plan.root().children[1];

    assert_eq!(inner.metrics.adjusted_time_ms.map(|t| t.total), Some(5.0));
    assert_eq!(inner.metrics.exclusive_duration_ms, Some(5.0));
    assert_eq!(plan.root().metrics.exclusive_duration_ms, Some(3.0));
}

#[test]
fn test_parallel_child_time_is_divided_by_fan_out() {
    let mut gather = PlanNode::new(NodeType::Gather).with_actuals(0.0, 12.0, 300.0, 1);
    gather.workers_planned = Some(2);
    gather.workers_launched = Some(2);
    let gather = gather.with_child(scan("big", 9.0, 3));
    let plan = run(gather);
    let child = &plan.root().children[0];

    assert_eq!(child.metrics.enclosing_workers_launched, Some(2));
    assert_eq!(child.metrics.fan_out(true), 3);
    assert_eq!(child.metrics.adjusted_time_ms.map(|t| t.total), Some(9.0));
    assert_eq!(plan.root().metrics.fan_out(true), 1);
    assert_eq!(plan.root().metrics.exclusive_duration_ms, Some(3.0));
}

#[test]
fn test_maximum_worker_count_does_not_overflow() {
    let mut gather = PlanNode::new(NodeType::Gather).with_actuals(0.0, 12.0, 300.0, 1);
    gather.workers_launched = Some(u32::MAX);
    let plan = run(gather.with_child(scan("big", 9.0, 3)));
    let child = &plan.root().children[0];

    let adjusted = child.metrics.adjusted_time_ms.unwrap().total;
    assert!(adjusted.is_finite() && adjusted > 0.0);
    let root = plan.root().metrics.exclusive_duration_ms.unwrap();
    assert!(root > 11.99 && root <= 12.0);
}

#[test]
fn test_planned_workers_are_inherited_transitively() {
    let index = PlanNode::new(NodeType::BitmapIndexScan).with_actuals(0.0, 3.0, 10.0, 1);
    let heap = PlanNode::new(NodeType::BitmapHeapScan)
        .with_actuals(0.0, 6.0, 10.0, 1)
        .with_child(index);
    let mut gather = PlanNode::new(NodeType::Gather).with_actuals(0.0, 4.0, 30.0, 1);
    gather.workers_planned = Some(2);
    let gather = gather.with_child(heap);

    let plan = run(gather.clone());
    let index = &plan.root().children[0].children[0];
    assert_eq!(index.metrics.enclosing_workers_planned, Some(2));
    assert_eq!(index.metrics.adjusted_time_ms.map(|t| t.total), Some(1.0));

    let mut ctx = ParseContext::new(ParserOptions {
        fall_back_to_planned_workers: false,
        ..ParserOptions::default()
    });
    let plan = annotate(PlanDocument::new(gather), &mut ctx);
    let index = &plan.root().children[0].children[0];
    assert_eq!(index.metrics.adjusted_time_ms.map(|t| t.total), Some(3.0));
}

#[test]
fn test_sub_plans_do_not_inherit_workers() {
    let sub = scan("lookup", 1.0, 1).with_parent_relationship(ParentRelationship::SubPlan);
    let mut gather = PlanNode::new(NodeType::Gather).with_actuals(0.0, 5.0, 10.0, 1);
    gather.workers_launched = Some(3);
    let gather = gather.with_child(scan("big", 2.0, 1).with_child(sub));
    let plan = run(gather);

    let sub = &plan.root().children[0].children[0];
    assert_eq!(sub.metrics.enclosing_workers_launched, None);
    assert_eq!(sub.metrics.fan_out(true), 1);
}

#[test]
fn test_init_plans_are_not_subtracted() {
    let init = scan("config", 4.0, 1).with_parent_relationship(ParentRelationship::InitPlan);
    let root = PlanNode::new(NodeType::Result)
        .with_actuals(0.0, 6.0, 1.0, 1)
        .with_child(init)
        .with_child(scan("data", 2.0, 1));
    let plan = run(root);

    assert_eq!(plan.root().metrics.exclusive_duration_ms, Some(4.0));
}

#[test]
fn test_exclusive_durations_sum_to_root_time() {
    let root = PlanNode::new(NodeType::HashJoin)
        .with_actuals(0.0, 20.0, 100.0, 1)
        .with_child(scan("a", 7.5, 1))
        .with_child(
            PlanNode::new(NodeType::Hash)
                .with_actuals(0.0, 9.0, 50.0, 1)
                .with_child(scan("b", 8.0, 1)),
        );
    let plan = run(root);

    let total: f64 = plan
        .iter_nodes()
        .filter_map(|node| node.metrics.exclusive_duration_ms)
        .sum();
    let root_time = plan.root().metrics.adjusted_time_ms.map(|t| t.total).unwrap();
    assert!((total - root_time).abs() <= root_time * 0.01);
}

// ============================================================================
// Clamp Tests
// ============================================================================

#[test]
fn test_negative_duration_is_clamped_and_recorded() {
    let root = PlanNode::new(NodeType::Limit)
        .with_actuals(0.0, 1.0, 1.0, 1)
        .with_child(scan("t", 2.0, 1));
    let plan = run(root);
    let metrics = &plan.root().metrics;

    assert_eq!(metrics.exclusive_duration_ms, Some(0.0));
    assert_eq!(
        metrics.anomalies,
        vec![MeasurementAnomaly {
            metric: AnomalyMetric::Duration,
            deficit: 1.0,
        }]
    );
}

#[test]
fn test_anomalies_can_be_disabled() {
    let root = PlanNode::new(NodeType::Limit)
        .with_actuals(0.0, 1.0, 1.0, 1)
        .with_child(scan("t", 2.0, 1));
    let mut ctx = ParseContext::new(ParserOptions {
        record_anomalies: false,
        ..ParserOptions::default()
    });
    let plan = annotate(PlanDocument::new(root), &mut ctx);

    assert_eq!(plan.root().metrics.exclusive_duration_ms, Some(0.0));
    assert!(!plan.root().metrics.has_anomalies());
}

// ============================================================================
// Cost, Rows and Buffer Tests
// ============================================================================

#[test]
fn test_exclusive_cost() {
    let root = PlanNode::new(NodeType::HashJoin)
        .with_cost(10.0, 100.0)
        .with_child(PlanNode::new(NodeType::SeqScan).with_cost(0.0, 30.0))
        .with_child(PlanNode::new(NodeType::Hash).with_cost(0.0, 50.0));
    let plan = run(root);

    assert_eq!(plan.root().metrics.exclusive_cost, Some(20.0));
    assert_eq!(plan.root().children[0].metrics.exclusive_cost, Some(30.0));
}

#[test]
fn test_revised_rows_and_estimate() {
    let mut node = PlanNode::new(NodeType::IndexScan)
        .with_rows(1)
        .with_actuals(0.0, 0.5, 4.0, 10);
    node.rows_removed_by_filter = Some(2.0);
    let plan = run(node);
    let metrics = &plan.root().metrics;

    assert_eq!(metrics.revised_actual_rows, Some(40.0));
    assert_eq!(metrics.revised_plan_rows, Some(10.0));
    assert_eq!(metrics.revised_rows_removed_by_filter, Some(20.0));

    let estimate = metrics.planner_estimate.unwrap();
    assert_eq!(estimate.direction, EstimateDirection::Under);
    assert_eq!(estimate.factor, Some(4.0));
}

#[test]
fn test_exclusive_buffers_and_throughput() {
    let mut child = scan("t", 5.0, 1);
    child.buffers.set(BufferLocation::Shared, BufferOperation::Hit, 60);
    child.buffers.set(BufferLocation::Shared, BufferOperation::Read, 10);
    child.io_timings.set(IoTiming::SharedRead, 10.0);

    let mut root = PlanNode::new(NodeType::Sort).with_actuals(0.0, 30.0, 10.0, 1);
    root.buffers.set(BufferLocation::Shared, BufferOperation::Hit, 100);
    root.buffers.set(BufferLocation::Shared, BufferOperation::Read, 30);
    root.io_timings.set(IoTiming::SharedRead, 20.0);
    let plan = run(root.with_child(child));
    let metrics = &plan.root().metrics;

    assert_eq!(
        metrics
            .exclusive_buffers
            .get(BufferLocation::Shared, BufferOperation::Hit),
        Some(40)
    );
    assert_eq!(
        metrics
            .exclusive_buffers
            .get(BufferLocation::Shared, BufferOperation::Read),
        Some(20)
    );
    assert_eq!(
        metrics.exclusive_io_timings.get(IoTiming::SharedRead),
        Some(10.0)
    );
    assert_eq!(metrics.read_throughput, Some(2000.0));
    assert_eq!(metrics.write_throughput, None);
    assert_eq!(plan.maxima().max_blocks(BufferLocation::Shared), Some(70));
}

// ============================================================================
// CTE Tests
// ============================================================================

#[test]
fn test_ctes_are_hoisted_in_plan_order() {
    let root = PlanNode::new(NodeType::Append)
        .with_actuals(0.0, 10.0, 20.0, 1)
        .with_child(cte("first", scan("a", 6.0, 1)))
        .with_child(cte("second", scan("b", 7.0, 1)))
        .with_child(PlanNode::new(NodeType::CteScan).with_actuals(0.0, 4.0, 10.0, 1));
    let plan = run(root);

    let names: Vec<_> = plan
        .ctes()
        .iter()
        .map(|node| node.subplan_name.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["CTE first", "CTE second"]);
    assert_eq!(plan.ctes()[0].node_id, 2);
    assert_eq!(plan.root().children.len(), 1);
    assert_eq!(plan.root().metrics.exclusive_duration_ms, Some(6.0));
    assert_eq!(plan.stats().node_count, 4);
}

#[test]
fn test_nested_ctes_follow_their_parent() {
    let inner = cte("inner", scan("x", 1.0, 1));
    let outer = cte("outer", scan("y", 2.0, 1).with_child(inner));
    let root = PlanNode::new(NodeType::CteScan).with_child(outer);
    let plan = run(root);

    let names: Vec<_> = plan
        .ctes()
        .iter()
        .map(|node| node.subplan_name.as_deref().unwrap())
        .collect();
    assert_eq!(names, vec!["CTE outer", "CTE inner"]);
    assert!(plan.ctes()[0].children.is_empty());
}

// ============================================================================
// Maxima and Statistics Tests
// ============================================================================

#[test]
fn test_estimate_only_plan_has_no_duration_maximum() {
    let root = PlanNode::new(NodeType::Sort)
        .with_cost(50.0, 60.0)
        .with_rows(100)
        .with_child(PlanNode::new(NodeType::SeqScan).with_cost(0.0, 40.0).with_rows(100));
    let plan = run(root);

    assert_eq!(plan.maxima().max_duration, None);
    assert_eq!(plan.maxima().max_rows, None);
    assert_eq!(plan.maxima().max_total_cost, Some(60.0));
    assert_eq!(plan.maxima().max_cost, Some(40.0));
    assert!(!plan.stats().is_analyze);
}

#[test]
fn test_plan_stats() {
    let mut root = scan("t", 1.0, 1);
    root.output = vec!["id".to_string()];
    let mut document = PlanDocument::new(root);
    document.info.execution_time_ms = Some(3.5);
    document.info.planning_time_ms = Some(0.5);
    document.info.triggers = vec![
        Trigger {
            name: "audit".to_string(),
            relation: None,
            time_ms: 1.25,
            calls: 1,
        },
        Trigger {
            name: "touch".to_string(),
            relation: Some("t".to_string()),
            time_ms: 0.75,
            calls: 2,
        },
    ];
    let mut jit = JitInfo::default();
    jit.timing.total = Some(12.0);
    document.info.jit = Some(jit);

    let plan = annotate(document, &mut ParseContext::default());
    let stats = plan.stats();

    assert_eq!(stats.execution_time_ms, Some(3.5));
    assert_eq!(stats.planning_time_ms, Some(0.5));
    assert_eq!(stats.jit_time_ms, Some(12.0));
    assert_eq!(stats.trigger_count, 2);
    assert_eq!(stats.trigger_time_ms, 2.0);
    assert_eq!(stats.node_count, 1);
    assert!(stats.is_analyze);
    assert!(stats.is_verbose);
}
