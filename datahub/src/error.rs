//! Error types for the datahub access layer.
//!
//! This module defines the error hierarchy shared by all adapters:
//!
//! - [`FilterError`] - Rule configuration and header lookup errors
//! - [`SourceError`] - Reading and writing delimited sources
//! - [`TreeError`] - XML/JSON/YAML parsing, serialization and scope paths
//! - [`ContainerError`] - Top-level facade errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Soft misses (unknown header on a direct lookup, out-of-range row, merge
//! conflicts) are not errors: they are reported through
//! [`crate::diagnostics::Diagnostics`] and answered with an empty result.

use thiserror::Error;

use crate::container::Format;

// =============================================================================
// Filter Errors
// =============================================================================

/// Errors raised while building or evaluating filter rules.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// Numeric operator configured with a value that is not a number.
    #[error("Operator {operator} requires numeric values, got '{value}'")]
    NonNumericValue { operator: String, value: String },

    /// Rule created without any comparison value.
    #[error("Rule on header '{0}' has no comparison value")]
    MissingValues(String),

    /// BETWEEN needs a lower and an upper bound.
    #[error("BETWEEN expects exactly 2 values, got {0}")]
    BetweenArity(usize),

    /// Operator name could not be parsed.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Textual rule could not be parsed.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A rule names a header the data source does not have.
    #[error("No such header: {0}")]
    UnknownHeader(String),
}

// =============================================================================
// Source Errors
// =============================================================================

/// Errors while reading or writing delimited sources.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read or write a file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode bytes with the requested encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Malformed delimited record.
    #[error("Invalid record: {0}")]
    Record(#[from] csv::Error),

    /// Delimiter cannot be expressed as a single byte.
    #[error("Delimiter '{0}' is not a single-byte character")]
    InvalidDelimiter(char),
}

// =============================================================================
// Tree Errors
// =============================================================================

/// Errors from the tree adapters and the XML editor.
#[derive(Debug, Error)]
pub enum TreeError {
    /// XML reader/writer error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON parse or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse or serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Failed to read or write the document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document is structurally invalid.
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// Scope path could not be parsed.
    #[error("Invalid path expression: {0}")]
    InvalidPath(String),
}

// =============================================================================
// Container Errors (top-level)
// =============================================================================

/// Top-level facade error.
///
/// This is the single error type surfaced by [`crate::Container`]; it wraps
/// all lower-level errors and adds dispatch-specific variants.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Filter configuration or lookup error.
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Delimited source error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Tree document error.
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    /// IO error outside of a specific source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Format could not be resolved.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Verb called on an adapter variant that does not support it.
    #[error("Operation '{verb}' is not supported by the {format} adapter")]
    UnsupportedOperation { verb: &'static str, format: Format },

    /// `read_data`/`write_data` called on a container without a source.
    #[error("Container has no backing source")]
    Unbound,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Result type for container operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
