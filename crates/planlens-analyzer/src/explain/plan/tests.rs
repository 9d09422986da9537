//! Tests for the Query Plan Model

use super::*;

#[test]
fn test_plan_document_creation() {
    let root = PlanNode::new(NodeType::SeqScan)
        .with_relation("users")
        .with_cost(0.0, 100.0)
        .with_rows(1000);

    let plan = PlanDocument::new(root);

    assert_eq!(plan.root.cost, Some(NodeCost::new(0.0, 100.0)));
    assert_eq!(plan.root.rows, Some(1000));
    assert!(plan.info.planning_time_ms.is_none());
    assert!(plan.info.execution_time_ms.is_none());
    assert!(plan.info.triggers.is_empty());
}

#[test]
fn test_plan_node_from_label_keeps_label() {
    let node = PlanNode::from_label("Nested Loop");
    assert_eq!(node.node_type, NodeType::NestedLoop);
    assert_eq!(node.type_label, "Nested Loop");

    let custom = PlanNode::from_label("Columnar Scan");
    assert_eq!(custom.node_type, NodeType::Unknown);
    assert_eq!(custom.type_label, "Columnar Scan");
}

#[test]
fn test_plan_node_tree_traversal() {
    // Build a tree:
    //       HashJoin
    //      /        \
    //   SeqScan   IndexScan
    let leaf1 = PlanNode::new(NodeType::SeqScan).with_relation("users");
    let leaf2 = PlanNode::new(NodeType::IndexScan).with_relation("orders");
    let root = PlanNode::new(NodeType::HashJoin)
        .with_child(leaf1)
        .with_child(leaf2);

    let plan = PlanDocument::new(root);

    let nodes: Vec<_> = plan.iter_nodes().collect();
    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0].node_type, NodeType::HashJoin);
    assert_eq!(nodes[1].node_type, NodeType::SeqScan);
    assert_eq!(nodes[2].node_type, NodeType::IndexScan);
}

#[test]
fn test_plan_node_count_and_depth() {
    let single = PlanNode::new(NodeType::Result);
    assert_eq!(single.node_count(), 1);
    assert_eq!(single.depth(), 1);
    assert!(single.is_leaf());

    let leaf = PlanNode::new(NodeType::SeqScan);
    let middle = PlanNode::new(NodeType::Hash).with_child(leaf);
    let root = PlanNode::new(NodeType::HashJoin)
        .with_child(middle)
        .with_child(PlanNode::new(NodeType::SeqScan));

    assert_eq!(root.node_count(), 4);
    assert_eq!(root.depth(), 3);
    assert!(!root.is_leaf());
}

#[test]
fn test_find_nodes_by_type() {
    let root = PlanNode::new(NodeType::Append)
        .with_child(PlanNode::new(NodeType::SeqScan).with_relation("a"))
        .with_child(PlanNode::new(NodeType::SeqScan).with_relation("b"))
        .with_child(PlanNode::new(NodeType::IndexScan).with_relation("c"));
    let plan = PlanDocument::new(root);

    let scans = plan.find_nodes_by_type(NodeType::SeqScan);
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].relation.as_deref(), Some("a"));
    assert_eq!(scans[1].relation.as_deref(), Some("b"));
}

#[test]
fn test_is_cte() {
    let cte = PlanNode::new(NodeType::SeqScan)
        .with_parent_relationship(ParentRelationship::InitPlan);
    assert!(!cte.is_cte());

    let mut named = cte.clone();
    named.subplan_name = Some("CTE recent".to_string());
    assert!(named.is_cte());

    let mut init_plan = cte;
    init_plan.subplan_name = Some("InitPlan 1 (returns $0)".to_string());
    assert!(!init_plan.is_cte());
}

#[test]
fn test_worker_mut_creates_once() {
    let mut node = PlanNode::new(NodeType::SeqScan);
    node.worker_mut(1).actual_rows = Some(10.0);
    node.worker_mut(0).actual_rows = Some(5.0);
    node.worker_mut(1).loops = Some(1);

    assert_eq!(node.workers.len(), 2);
    assert_eq!(node.workers[0].worker_number, 1);
    assert_eq!(node.worker(1).and_then(|w| w.loops), Some(1));
    assert_eq!(node.worker(0).and_then(|w| w.actual_rows), Some(5.0));
    assert!(node.worker(2).is_none());
}

#[test]
fn test_buffers_get_set_and_total() {
    let mut buffers = Buffers::default();
    assert!(buffers.is_empty());

    buffers.set(BufferLocation::Shared, BufferOperation::Hit, 12);
    buffers.set(BufferLocation::Shared, BufferOperation::Read, 3);
    buffers.set(BufferLocation::Temp, BufferOperation::Written, 7);

    assert!(!buffers.is_empty());
    assert_eq!(buffers.get(BufferLocation::Shared, BufferOperation::Hit), Some(12));
    assert_eq!(buffers.get(BufferLocation::Local, BufferOperation::Hit), None);
    assert_eq!(buffers.shared.total(), 15);
    assert_eq!(buffers.temp.total(), 7);
}

#[test]
fn test_io_timings_totals() {
    let mut timings = IoTimings::default();
    timings.set(IoTiming::SharedRead, 1.5);
    timings.set(IoTiming::TempRead, 0.5);
    timings.set(IoTiming::SharedWrite, 2.0);

    assert_eq!(timings.total_read(), 2.0);
    assert_eq!(timings.total_write(), 2.0);
    assert_eq!(timings.total(), 4.0);
    assert_eq!(
        IoTiming::from_property_name("Temp I/O Read Time"),
        Some(IoTiming::TempRead)
    );
    assert_eq!(IoTiming::from_property_name("Temp I/O Time"), None);
}

#[test]
fn test_join_type_parse() {
    assert_eq!(JoinType::parse("Inner"), Some(JoinType::Inner));
    assert_eq!(JoinType::parse("LEFT"), Some(JoinType::Left));
    assert_eq!(JoinType::parse("Right Anti"), Some(JoinType::RightAnti));
    assert_eq!(JoinType::parse("sideways"), None);
}

#[test]
fn test_node_type_from_postgres_str() {
    assert_eq!(NodeType::from_postgres_str("Seq Scan"), NodeType::SeqScan);
    assert_eq!(NodeType::from_postgres_str("Nested Loop Join"), NodeType::NestedLoop);
    assert_eq!(NodeType::from_postgres_str("Gather Merge"), NodeType::GatherMerge);
    assert_eq!(NodeType::from_postgres_str("Something Else"), NodeType::Unknown);
}

#[test]
fn test_node_type_label_round_trips() {
    for node_type in [
        NodeType::SeqScan,
        NodeType::BitmapHeapScan,
        NodeType::HashAggregate,
        NodeType::IncrementalSort,
        NodeType::GatherMerge,
    ] {
        assert_eq!(NodeType::from_postgres_str(node_type.label()), node_type);
    }
}

#[test]
fn test_normalized_query_collapses_whitespace() {
    let info = DocumentInfo {
        query_text: Some("select  *\n  from   t\nwhere a = 1".to_string()),
        ..DocumentInfo::default()
    };
    assert_eq!(
        info.normalized_query().as_deref(),
        Some("select *\n  from t\nwhere a = 1")
    );
}
