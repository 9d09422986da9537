//! Parser configuration and the per-invocation parse context
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! tab_width = 8
//! fall_back_to_planned_workers = true
//! record_anomalies = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading [`ParserOptions`]
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Tunables for the text parser and the metrics engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserOptions {
    /// Number of spaces a tab counts for when measuring indentation
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,
    /// Use `Workers Planned` when a coordinator reports no launched workers
    #[serde(default = "default_true")]
    pub fall_back_to_planned_workers: bool,
    /// Record a [`MeasurementAnomaly`](crate::metrics::MeasurementAnomaly)
    /// whenever an exclusive metric is clamped to zero
    #[serde(default = "default_true")]
    pub record_anomalies: bool,
}

fn default_tab_width() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            tab_width: default_tab_width(),
            fall_back_to_planned_workers: true,
            record_anomalies: true,
        }
    }
}

impl ParserOptions {
    /// Parses options from a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML options file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }
}

/// Caller-owned state for a single parse invocation.
///
/// Holds the options and the node-identity counter. A context may be reused
/// for consecutive parses, but not shared between concurrent ones: the
/// counter is restarted at the beginning of every invocation.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub options: ParserOptions,
    next_node_id: u32,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(ParserOptions::default())
    }
}

impl ParseContext {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            next_node_id: 1,
        }
    }

    /// Restarts node numbering at 1
    pub fn reset(&mut self) {
        self.next_node_id = 1;
    }

    /// Hands out the next node identity
    pub fn next_node_id(&mut self) -> u32 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = ParserOptions::default();
        assert_eq!(options.tab_width, 4);
        assert!(options.fall_back_to_planned_workers);
        assert!(options.record_anomalies);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let options = ParserOptions::from_toml_str("tab_width = 8").unwrap();
        assert_eq!(options.tab_width, 8);
        assert!(options.record_anomalies);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ParserOptions::from_toml_str("tabwidth = 8").unwrap_err();
        assert!(matches!(err, OptionsError::Toml(_)));
    }

    #[test]
    fn test_node_ids_restart_after_reset() {
        let mut ctx = ParseContext::default();
        assert_eq!(ctx.next_node_id(), 1);
        assert_eq!(ctx.next_node_id(), 2);
        ctx.reset();
        assert_eq!(ctx.next_node_id(), 1);
    }
}
