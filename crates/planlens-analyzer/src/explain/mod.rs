//! PostgreSQL EXPLAIN Parser Module
//!
//! Turns raw EXPLAIN output, as pasted from psql, pgAdmin, log files or
//! terminal sessions, into a typed plan tree. The pipeline is:
//!
//! 1. [`normalize`]: strip quoting, table frames, `+` continuation markers
//!    and headers left behind by the client that printed the plan;
//! 2. [`detect`]: decide between JSON, JSON wrapped in banner text, and text;
//! 3. [`json`] or [`text`]: build the tree;
//! 4. [`metrics`](crate::metrics): derive per-node and plan-wide figures.
//!
//! # Example
//!
//! ```
//! use planlens_analyzer::explain::{parse, NodeType};
//!
//! // Text format
//! let plan = parse("Seq Scan on users  (cost=0.00..35.50 rows=2550 width=36)").unwrap();
//! assert_eq!(plan.root().node_type, NodeType::SeqScan);
//!
//! // JSON format
//! let plan = parse(r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users"}}]"#).unwrap();
//! assert_eq!(plan.root().relation.as_deref(), Some("users"));
//! ```

pub mod detect;
pub mod extras;
pub mod json;
pub mod lexer;
pub mod lines;
pub mod node_type;
pub mod normalize;
pub mod plan;
pub mod properties;
pub mod text;

pub use detect::{SourceFormat, detect_format};
pub use json::{parse_json_document, parse_merged};
pub use node_type::{NodeTypeParts, decompose_node_type};
pub use normalize::normalize_source;
pub use plan::{
    ActualTime, BufferCounts, BufferLocation, BufferOperation, Buffers, DocumentInfo, IoTiming,
    IoTimings, JitInfo, JitTiming, JoinType, NodeCost, NodeType, ParentRelationship,
    PlanDocument, PlanNode, PlanNodeIterator, ScanDirection, SortGroups, SortSpace,
    SortSpaceType, Trigger, WalCounters, WorkerRecord,
};
pub use properties::PropertySink;
pub use text::parse_text_document;

use crate::error::Result;
use crate::metrics::{AnnotatedPlan, annotate};
use crate::options::{ParseContext, ParserOptions};

/// Parses raw EXPLAIN output with default options
pub fn parse(raw: &str) -> Result<AnnotatedPlan> {
    parse_with_context(raw, &mut ParseContext::default())
}

/// Parses raw EXPLAIN output using a caller-owned context.
///
/// The context's node counter restarts at 1 for every call, so one context
/// can serve consecutive parses; it must not be shared by concurrent ones.
#[tracing::instrument(skip_all, fields(len = raw.len()))]
pub fn parse_with_context(raw: &str, ctx: &mut ParseContext) -> Result<AnnotatedPlan> {
    ctx.reset();
    let document = parse_document(raw, &ctx.options)?;
    Ok(annotate(document, ctx))
}

/// Parses raw EXPLAIN output into a plan document, without metrics
pub fn parse_document(raw: &str, options: &ParserOptions) -> Result<PlanDocument> {
    let source = normalize_source(raw);
    match detect_format(&source) {
        SourceFormat::Json(json) | SourceFormat::EmbeddedJson(json) => parse_json_document(json),
        SourceFormat::Text(text) => parse_text_document(text, options),
    }
}
