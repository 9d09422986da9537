//! Planlens Analyzer - PostgreSQL EXPLAIN plan parsing and metrics
//!
//! This crate provides functionality for:
//! - Parsing EXPLAIN output in text or JSON form, as pasted from any client
//! - Building a typed plan tree with every reported property
//! - Deriving exclusive per-node timings, costs, buffers and misestimates
//!
//! # Example
//!
//! ```
//! use planlens_analyzer::parse;
//!
//! let plan = parse(
//!     "Seq Scan on test  (cost=0.00..34.00 rows=2400 width=4) (actual time=0.052..2.183 rows=1000 loops=1)",
//! )
//! .unwrap();
//!
//! assert_eq!(plan.root().type_label, "Seq Scan");
//! assert_eq!(plan.root().metrics.revised_actual_rows, Some(1000.0));
//! ```

pub mod error;
pub mod explain;
pub mod metrics;
pub mod options;

pub use error::{ParseError, Result};
pub use explain::{PlanDocument, PlanNode, parse, parse_document, parse_with_context};
pub use metrics::{AnnotatedPlan, NodeMetrics, PlanMaxima, PlanStats};
pub use options::{OptionsError, ParseContext, ParserOptions};
