//! Plan Metrics Module
//!
//! Derives per-node performance figures from a parsed plan: loop and worker
//! adjusted timings, exclusive (self) duration, cost, buffers and I/O time,
//! planner misestimates, and plan-wide maxima and statistics. Raw values are
//! never overwritten; everything derived lands in [`NodeMetrics`] or on the
//! [`AnnotatedPlan`].

mod annotate;
mod model;

pub use annotate::*;
pub use model::*;
