//! Text plan parsing
//!
//! Builds the plan tree from indented `EXPLAIN` text. Nodes live in an arena
//! while parsing; a stack of `(depth, frame)` pairs tracks the open context,
//! and a node's parent is the nearest open frame whose depth is smaller than
//! the node line's depth. The owned tree is assembled once all lines are
//! consumed.
//!
//! # Examples
//!
//! ```
//! use planlens_analyzer::explain::text::parse_text_document;
//! use planlens_analyzer::ParserOptions;
//!
//! let text = "Seq Scan on users  (cost=0.00..10.00 rows=100 width=36)\n  Filter: (active)";
//! let document = parse_text_document(text, &ParserOptions::default()).unwrap();
//!
//! assert_eq!(document.root.relation.as_deref(), Some("users"));
//! assert_eq!(document.root.filter.as_deref(), Some("(active)"));
//! ```

use crate::error::{ParseError, Result};
use crate::explain::extras::parse_extra;
use crate::explain::lexer::{LexedLine, NodeHeader, Token, WorkerHeader, lex_line};
use crate::explain::lines::reassemble_lines;
use crate::explain::node_type::decompose_node_type;
use crate::explain::plan::{
    ActualTime, DocumentInfo, JitInfo, NodeCost, NodeType, ParentRelationship, PlanDocument,
    PlanNode,
};
use crate::explain::properties::PropertySink;
use crate::options::ParserOptions;

/// What an open stack entry refers to
#[derive(Debug)]
enum Frame {
    Node(usize),
    /// A `SubPlan`/`InitPlan`/`CTE` marker; `filled` once its plan is attached
    SubPlan {
        node: usize,
        relationship: ParentRelationship,
        name: String,
        filled: bool,
    },
    Worker {
        node: usize,
        number: u32,
    },
    DocumentJit,
    WorkerJit {
        node: usize,
        number: u32,
    },
}

impl Frame {
    /// The node this frame hangs off, if any
    fn node(&self) -> Option<usize> {
        match self {
            Frame::Node(node)
            | Frame::SubPlan { node, .. }
            | Frame::Worker { node, .. }
            | Frame::WorkerJit { node, .. } => Some(*node),
            Frame::DocumentJit => None,
        }
    }
}

/// Where an extra fact lands
enum Target {
    Document,
    Node(usize),
    Worker(usize, u32),
    DocumentJit,
    WorkerJit(usize, u32),
}

#[derive(Default)]
struct TreeBuilder {
    nodes: Vec<PlanNode>,
    children: Vec<Vec<usize>>,
    stack: Vec<(usize, Frame)>,
    info: DocumentInfo,
}

/// Parses normalized text output into a plan document
pub fn parse_text_document(text: &str, options: &ParserOptions) -> Result<PlanDocument> {
    let mut builder = TreeBuilder::default();

    for line in reassemble_lines(text) {
        let lexed = lex_line(&line, options.tab_width);
        builder.consume(lexed, &line)?;
    }

    builder.finish()
}

impl TreeBuilder {
    fn consume(&mut self, lexed: LexedLine, raw: &str) -> Result<()> {
        let LexedLine { depth, token } = lexed;

        // Query text may span lines before the first node
        if self.nodes.is_empty()
            && self.info.query_text.is_some()
            && !matches!(token, Token::NodeHeader(_) | Token::Blank)
        {
            if let Some(query) = self.info.query_text.as_mut() {
                query.push('\n');
                query.push_str(raw.trim_end());
            }
            return Ok(());
        }

        match token {
            Token::Blank => {}
            Token::NodeHeader(header) => self.open_node(depth, header),
            Token::SubPlanHeader { relationship, name } => {
                self.open_subplan(depth, relationship, name, raw)
            }
            Token::CteHeader { name } => self.open_subplan(
                depth,
                ParentRelationship::InitPlan,
                format!("CTE {name}"),
                raw,
            ),
            Token::WorkerHeader(header) => self.open_worker(depth, header)?,
            Token::TriggerLine(trigger) => {
                self.close_to(depth);
                self.info.triggers.push(trigger);
            }
            Token::JitHeader => self.open_jit(depth),
            Token::ExtraFact(fact) => {
                self.close_to(depth);
                let target = self.current_target();
                self.apply_extra(target, &fact)?;
            }
        }
        Ok(())
    }

    /// Pops every frame at or below `depth`
    fn close_to(&mut self, depth: usize) {
        while self.stack.last().is_some_and(|(d, _)| *d >= depth) {
            self.stack.pop();
        }
    }

    fn open_node(&mut self, depth: usize, header: NodeHeader) {
        let index = self.nodes.len();
        let mut node = build_node(header);

        if index == 0 {
            self.stack.clear();
            self.push_node(node);
            self.stack.push((depth, Frame::Node(index)));
            return;
        }

        self.close_to(depth);
        // A sub-plan marker holds a single plan; later nodes are its siblings
        while matches!(self.stack.last(), Some((_, Frame::SubPlan { filled: true, .. }))) {
            self.stack.pop();
        }

        let parent = match self.stack.last_mut() {
            Some((
                _,
                Frame::SubPlan {
                    node: parent,
                    relationship,
                    name,
                    filled,
                },
            )) => {
                node.parent_relationship = Some(*relationship);
                node.subplan_name = Some(name.clone());
                *filled = true;
                Some(*parent)
            }
            Some((_, frame)) => frame.node(),
            None => None,
        };

        let Some(parent) = parent else {
            tracing::debug!(depth, label = %node.type_label, "node line without a parent, dropped");
            return;
        };
        self.push_node(node);
        self.children[parent].push(index);
        self.stack.push((depth, Frame::Node(index)));
    }

    fn push_node(&mut self, node: PlanNode) {
        self.nodes.push(node);
        self.children.push(Vec::new());
    }

    fn open_subplan(
        &mut self,
        depth: usize,
        relationship: ParentRelationship,
        name: String,
        raw: &str,
    ) {
        self.close_to(depth);
        match self.stack.last().and_then(|(_, frame)| frame.node()) {
            Some(node) => self.stack.push((
                depth,
                Frame::SubPlan {
                    node,
                    relationship,
                    name,
                    filled: false,
                },
            )),
            None => tracing::debug!(line = raw.trim(), "sub-plan marker outside any node, ignored"),
        }
    }

    fn open_worker(&mut self, depth: usize, header: WorkerHeader) -> Result<()> {
        self.close_to(depth);
        let Some(node) = self.stack.last().and_then(|(_, frame)| frame.node()) else {
            tracing::debug!(worker = header.number, "worker line outside any node, ignored");
            return Ok(());
        };

        let worker = self.nodes[node].worker_mut(header.number);
        if let Some(actuals) = header.actuals {
            if let Some((startup, total)) = actuals.time {
                worker.actual_time_ms = Some(ActualTime::new(startup, total));
            }
            worker.actual_rows = Some(actuals.rows);
            worker.loops = Some(actuals.loops);
        }

        if !header.rest.is_empty() {
            self.apply_extra(Target::Worker(node, header.number), &header.rest)?;
        }
        self.stack.push((
            depth,
            Frame::Worker {
                node,
                number: header.number,
            },
        ));
        Ok(())
    }

    fn open_jit(&mut self, depth: usize) {
        self.close_to(depth);
        let frame = match self.stack.last() {
            Some((_, Frame::Worker { node, number })) => Frame::WorkerJit {
                node: *node,
                number: *number,
            },
            _ => Frame::DocumentJit,
        };
        match &frame {
            Frame::WorkerJit { node, number } => {
                self.nodes[*node]
                    .worker_mut(*number)
                    .jit
                    .get_or_insert_with(JitInfo::default);
            }
            _ => {
                self.info.jit.get_or_insert_with(JitInfo::default);
            }
        }
        self.stack.push((depth, frame));
    }

    fn current_target(&self) -> Target {
        match self.stack.last() {
            None => Target::Document,
            Some((_, Frame::Node(node))) | Some((_, Frame::SubPlan { node, .. })) => {
                Target::Node(*node)
            }
            Some((_, Frame::Worker { node, number })) => Target::Worker(*node, *number),
            Some((_, Frame::DocumentJit)) => Target::DocumentJit,
            Some((_, Frame::WorkerJit { node, number })) => Target::WorkerJit(*node, *number),
        }
    }

    fn apply_extra(&mut self, target: Target, line: &str) -> Result<()> {
        let facts = parse_extra(line)?;
        if facts.is_empty() {
            tracing::trace!(line, "line carries no facts");
            return Ok(());
        }

        let sink: &mut dyn PropertySink = match target {
            Target::Document => &mut self.info,
            Target::Node(node) => &mut self.nodes[node],
            Target::Worker(node, number) => self.nodes[node].worker_mut(number),
            Target::DocumentJit => self.info.jit.get_or_insert_with(JitInfo::default),
            Target::WorkerJit(node, number) => self.nodes[node]
                .worker_mut(number)
                .jit
                .get_or_insert_with(JitInfo::default),
        };
        for (key, value) in facts {
            sink.set_property(&key, value);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<PlanDocument> {
        if self.nodes.is_empty() {
            return Err(ParseError::UnparseableText);
        }
        let root = self.assemble(0);
        Ok(PlanDocument::with_info(root, self.info))
    }

    fn assemble(&mut self, index: usize) -> PlanNode {
        let mut node = std::mem::take(&mut self.nodes[index]);
        let children = std::mem::take(&mut self.children[index]);
        node.children = children.into_iter().map(|child| self.assemble(child)).collect();
        node
    }
}

fn build_node(header: NodeHeader) -> PlanNode {
    let parts = decompose_node_type(&header.label);
    let mut node = PlanNode {
        node_type: NodeType::from_postgres_str(&parts.label),
        type_label: parts.label,
        partial_mode: parts.partial_mode,
        parallel_aware: parts.parallel_aware,
        relation: parts.relation,
        schema: parts.schema,
        alias: parts.alias,
        index_name: parts.index_name,
        cte_name: parts.cte_name,
        function_name: parts.function_name,
        join_type: parts.join_type,
        scan_direction: parts.scan_direction,
        ..PlanNode::default()
    };

    if let Some(estimate) = header.estimate {
        node.cost = Some(NodeCost::new(estimate.startup_cost, estimate.total_cost));
        node.rows = Some(estimate.rows);
        node.width = Some(estimate.width);
    }

    if header.never_executed {
        node.actual_time_ms = Some(ActualTime::new(0.0, 0.0));
        node.actual_rows = Some(0.0);
        node.loops = Some(0);
    } else if let Some(actuals) = header.actuals {
        if let Some((startup, total)) = actuals.time {
            node.actual_time_ms = Some(ActualTime::new(startup, total));
        }
        node.actual_rows = Some(actuals.rows);
        node.loops = Some(actuals.loops);
    }

    node
}
