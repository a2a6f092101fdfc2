//! # Datahub - uniform access to tabular and tree-shaped data
//!
//! Datahub reads delimited files (CSV), XML, JSON and YAML into one container
//! type and exposes the same read, query and mutate verbs over all of them.
//! Callers address data by header name and row index (tables) or by tag and
//! scope path (trees), and narrow results with a small filter language.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  File/Stream│────▶│   Detect    │────▶│   Adapter   │────▶│   Filter    │
//! │ (ISO/UTF8)  │     │ (ext/sniff) │     │ (table/tree)│     │  (rules)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use datahub::{Container, ContainerOptions, Filter};
//!
//! let csv = "Name;City\nAnn;Linz\nBo;Graz";
//! let container = Container::from_bytes(csv, None, ContainerOptions::default()).unwrap();
//!
//! let filter = Filter::parse_rules(["City EQUALS Graz"]).unwrap();
//! let rows = container.get_rows_list(None, &filter).unwrap();
//! assert_eq!(rows, vec![vec!["Bo".to_string(), "Graz".to_string()]]);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`diagnostics`] - Soft-fail log entries returned to the caller
//! - [`config`] - Container options and environment overrides
//! - [`source`] - Encoding detection and delimited record IO
//! - [`header`] - Header name/position index
//! - [`filter`] - Filter rules and operators
//! - [`tabular`] - Row store for delimited data
//! - [`tree`] - XML, JSON and YAML adapters
//! - [`container`] - Format detection and the facade

// Core modules
pub mod config;
pub mod diagnostics;
pub mod error;

// Sources
pub mod source;

// Data model
pub mod filter;
pub mod header;

// Adapters
pub mod tabular;
pub mod tree;

// Facade
pub mod container;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ContainerError, ContainerResult, FilterError, FilterResult, SourceError, SourceResult, TreeError,
    TreeResult,
};

// =============================================================================
// Re-exports - Configuration & diagnostics
// =============================================================================

pub use config::{parse_delimiter, ContainerOptions, Orientation};
pub use diagnostics::{Diagnostics, LogEntry, LogLevel};

// =============================================================================
// Re-exports - Headers & filters
// =============================================================================

pub use filter::{Concatenation, Filter, FilterRule, Operator};
pub use header::{check_header, HeaderCheck, HeaderIndex};

// =============================================================================
// Re-exports - Adapters
// =============================================================================

pub use tabular::{Row, TabularAdapter};
pub use tree::{Scope, TreeElement, ValueSyntax, ValueTreeAdapter, XmlAdapter, XmlDocument};

// =============================================================================
// Re-exports - Facade
// =============================================================================

pub use container::{sniff, Adapter, Container, Format};
