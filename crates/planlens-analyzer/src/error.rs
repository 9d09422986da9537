//! Error types for plan parsing

use thiserror::Error;

/// Errors that can occur while turning EXPLAIN output into an annotated plan.
///
/// Every variant is terminal for the call that produced it: no partial tree
/// is ever returned alongside an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The input had a recognizable shape but no root plan node
    #[error("Invalid plan document: {0}")]
    InvalidDocument(String),

    /// No line of the text input matched the node grammar
    #[error("Unable to parse plan")]
    UnparseableText,

    /// The JSON token stream was malformed
    #[error("Malformed JSON at line {line}, column {column}: {message}")]
    MalformedJson {
        line: usize,
        column: usize,
        message: String,
    },

    /// A recognized label implies a variant with no defined handling
    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJson {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

/// Result type for plan parsing
pub type Result<T> = std::result::Result<T, ParseError>;
