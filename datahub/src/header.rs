//! Bidirectional header name ⇄ position mapping.
//!
//! Positions always form the dense range `0..len()` in insertion order.
//! Duplicate names are made unique by appending `_2`, `_3`, …; names are never
//! removed. Every successful mutation bumps [`HeaderIndex::version`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of comparing two header layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderCheck {
    /// Every candidate name sits at the same position in the reference
    Match,
    /// All candidate names exist in the reference, some at other positions
    Reordered,
    /// At least one candidate name is unknown to the reference
    Mismatch,
}

/// Owned, versioned header index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
    version: u64,
}

/// Result of adding a single column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAdded {
    /// Position of the column
    pub position: usize,
    /// Name actually stored (may carry a `_N` suffix)
    pub name: String,
    /// False when `use_existing` returned an already present column
    pub created: bool,
}

impl HeaderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from names, resolving duplicates
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        index.set_headers(names, true);
        index
    }

    /// Store a header set.
    ///
    /// With `overwrite` the index is cleared first; otherwise positions continue
    /// after the current last one. Returns the names actually stored.
    pub fn set_headers<I, S>(&mut self, names: I, overwrite: bool) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if overwrite {
            self.names.clear();
            self.positions.clear();
        }
        let stored: Vec<String> = names
            .into_iter()
            .map(|name| self.insert_unique(name.as_ref()))
            .collect();
        self.version += 1;
        stored
    }

    /// Add one column.
    ///
    /// With `use_existing` an already present name is returned as is.
    pub fn add_column(&mut self, name: &str, use_existing: bool) -> ColumnAdded {
        if use_existing {
            if let Some(&position) = self.positions.get(name) {
                return ColumnAdded {
                    position,
                    name: name.to_string(),
                    created: false,
                };
            }
        }
        let stored = self.insert_unique(name);
        self.version += 1;
        ColumnAdded {
            position: self.names.len() - 1,
            name: stored,
            created: true,
        }
    }

    fn insert_unique(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut suffix = 2;
        while self.positions.contains_key(&candidate) {
            candidate = format!("{}_{}", name, suffix);
            suffix += 1;
        }
        self.positions.insert(candidate.clone(), self.names.len());
        self.names.push(candidate.clone());
        candidate
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Names in position order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Mutation counter, starts at 0
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

impl<S: AsRef<str>> FromIterator<S> for HeaderIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_names(iter)
    }
}

/// Compare a candidate header layout against a reference.
///
/// An unknown candidate name is an immediate [`HeaderCheck::Mismatch`]; a name at
/// a different position marks the result [`HeaderCheck::Reordered`] but keeps
/// scanning for unknown names.
pub fn check_header(reference: &HeaderIndex, candidate: &HeaderIndex) -> HeaderCheck {
    let mut result = HeaderCheck::Match;
    for (position, name) in candidate.iter() {
        match reference.position(name) {
            None => return HeaderCheck::Mismatch,
            Some(p) if p != position => result = HeaderCheck::Reordered,
            Some(_) => {}
        }
    }
    result
}
