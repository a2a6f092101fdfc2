//! Soft-fail diagnostics collected per adapter.
//!
//! Unknown headers on direct lookups, rejected rows, skipped merges and
//! scope-less tree mutations do not raise errors. They are recorded here and
//! handed back to the caller through [`crate::Container::take_diagnostics`].

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// Severity of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single diagnostic entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Source line the entry refers to, for row-level reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        match self.line {
            Some(line) => write!(f, "{} line {}: {}", prefix, line, self.message),
            None => write!(f, "{} {}", prefix, self.message),
        }
    }
}

/// Buffer of diagnostics owned by one adapter.
///
/// Uses interior mutability so read-only queries can still report soft misses.
/// Not `Sync`: one container per thread.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: RefCell<Vec<LogEntry>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: LogEntry) {
        self.entries.borrow_mut().push(entry);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Info, msg));
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Success, msg));
    }

    pub fn warning(&self, msg: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warning, msg));
    }

    /// Warning tied to a line of the source being read
    pub fn warning_at(&self, line: u64, msg: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Warning, msg).at_line(line));
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.push(LogEntry::new(LogLevel::Error, msg));
    }

    /// Copy of all entries recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.borrow().clone()
    }

    /// Drain all entries recorded so far
    pub fn take(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    /// Number of warnings currently buffered
    pub fn warning_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.level == LogLevel::Warning)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Clone for Diagnostics {
    fn clone(&self) -> Self {
        Self {
            entries: RefCell::new(self.entries()),
        }
    }
}
