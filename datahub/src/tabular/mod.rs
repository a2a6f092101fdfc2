//! Tabular adapter for delimited sources.
//!
//! Holds a [`HeaderIndex`], the rows, and a metadata list whose values are
//! appended to every row. All queries funnel through [`TabularAdapter::select`];
//! the orientation-dependent read/write algorithms live in [`orientation`].
//!
//! # Example
//!
//! ```rust
//! use datahub::{Filter, FilterRule, Operator, TabularAdapter};
//!
//! let mut table = TabularAdapter::default();
//! table.read_str("Name;City\nAnn;Linz\nBo;Graz").unwrap();
//!
//! let filter = Filter::new().with_rule(FilterRule::single("City", Operator::Equals, "Linz").unwrap());
//! let rows = table.get_rows_list(None, &filter).unwrap();
//! assert_eq!(rows, vec![vec!["Ann".to_string(), "Linz".to_string()]]);
//! ```

pub mod orientation;

use serde_json::{Map, Value};

use crate::config::ContainerOptions;
use crate::diagnostics::{Diagnostics, LogEntry};
use crate::error::FilterResult;
use crate::filter::Filter;
use crate::header::{check_header, HeaderCheck, HeaderIndex};

/// One data row; absent values are empty strings
pub type Row = Vec<String>;

/// A metadata column whose value is written into every row
#[derive(Debug, Clone, PartialEq)]
struct MetaEntry {
    name: String,
    value: String,
    /// Position once merged into the header index
    position: Option<usize>,
}

/// Row store for delimited data
#[derive(Debug, Clone, Default)]
pub struct TabularAdapter {
    headers: HeaderIndex,
    rows: Vec<Row>,
    metadata: Vec<MetaEntry>,
    options: ContainerOptions,
    diagnostics: Diagnostics,
}

impl TabularAdapter {
    pub fn new(options: ContainerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Empty table with the given headers
    pub fn with_headers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::default();
        table.set_headers(names, true);
        table
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn headers(&self) -> &[String] {
        self.headers.names()
    }

    pub fn header_index(&self) -> &HeaderIndex {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ContainerOptions {
        &mut self.options
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Metadata pairs in insertion order
    pub fn metadata(&self) -> Vec<(String, String)> {
        self.metadata
            .iter()
            .map(|m| (m.name.clone(), m.value.clone()))
            .collect()
    }

    /// Position of a header, logging a warning when it does not exist
    pub fn index_of(&self, header: &str) -> Option<usize> {
        let position = self.headers.position(header);
        if position.is_none() {
            self.diagnostics.warning(format!("No such header: '{}'", header));
        }
        position
    }

    // =========================================================================
    // Header mutation
    // =========================================================================

    /// Store a header set.
    ///
    /// `overwrite` replaces the current headers (rows are cut or padded to the
    /// new width); otherwise names are appended and rows backfilled with `""`.
    pub fn set_headers<I, S>(&mut self, names: I, overwrite: bool) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let stored = self.headers.set_headers(names, overwrite);
        if overwrite {
            for meta in &mut self.metadata {
                meta.position = None;
            }
        }
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        self.merge_metadata();
        stored
    }

    /// Add a column and backfill every existing row with `""`.
    ///
    /// With `use_existing` an existing header is reused. Returns the position.
    pub fn add_column(&mut self, name: &str, use_existing: bool) -> usize {
        let added = self.headers.add_column(name, use_existing);
        if added.created {
            for row in &mut self.rows {
                row.push(String::new());
            }
        }
        added.position
    }

    /// Attach a metadata column.
    ///
    /// The header is merged once; rows already present and every row ingested
    /// later carry `value`. Re-adding a name updates the value for future rows.
    pub fn add_metadata(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(meta) = self.metadata.iter_mut().find(|m| m.name == name) {
            meta.value = value;
            return;
        }
        self.metadata.push(MetaEntry {
            name,
            value,
            position: None,
        });
        self.merge_metadata();
    }

    /// Merge pending metadata into the header index (needs existing headers)
    fn merge_metadata(&mut self) {
        if self.headers.is_empty() {
            return;
        }
        for i in 0..self.metadata.len() {
            if self.metadata[i].position.is_some() {
                continue;
            }
            let added = self.headers.add_column(&self.metadata[i].name, false);
            let value = self.metadata[i].value.clone();
            for row in &mut self.rows {
                row.push(value.clone());
            }
            self.metadata[i].name = added.name;
            self.metadata[i].position = Some(added.position);
        }
    }

    fn is_metadata_position(&self, position: usize) -> bool {
        self.metadata.iter().any(|m| m.position == Some(position))
    }

    /// Write metadata values into a row laid out like the header index
    fn apply_metadata(&self, row: &mut Row) {
        for meta in &self.metadata {
            if let Some(slot) = meta.position.and_then(|p| row.get_mut(p)) {
                *slot = meta.value.clone();
            }
        }
    }

    // =========================================================================
    // Query surface
    // =========================================================================

    /// The single query primitive.
    ///
    /// * `row_indexes` - rows to consider (all if `None`); out-of-range indices are skipped
    /// * `headers` - columns to project (all if `None`); unknown headers are logged and skipped
    /// * `filter` - rows must match; unknown rule headers are an error
    pub fn select(
        &self,
        row_indexes: Option<&[usize]>,
        headers: Option<&[&str]>,
        filter: &Filter,
    ) -> FilterResult<Vec<Row>> {
        filter.check_headers(|h| self.headers.contains(h))?;

        let positions: Vec<usize> = match headers {
            Some(names) => names.iter().filter_map(|n| self.index_of(n)).collect(),
            None => (0..self.headers.len()).collect(),
        };
        let candidates: Vec<usize> = match row_indexes {
            Some(indexes) => indexes.iter().copied().filter(|&i| i < self.rows.len()).collect(),
            None => (0..self.rows.len()).collect(),
        };

        let mut result = Vec::new();
        for i in candidates {
            let row = &self.rows[i];
            if filter.matches(row, &self.headers)? {
                result.push(
                    positions
                        .iter()
                        .map(|&p| row.get(p).cloned().unwrap_or_default())
                        .collect(),
                );
            }
        }
        Ok(result)
    }

    /// Single cell; `None` for unknown header or row
    pub fn get_value(&self, row: usize, header: &str) -> Option<String> {
        self.select(Some(&[row]), Some(&[header]), &Filter::new())
            .ok()?
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
    }

    /// Whole row; `None` if out of range
    pub fn get_row(&self, row: usize) -> Option<Row> {
        self.select(Some(&[row]), None, &Filter::new())
            .ok()?
            .into_iter()
            .next()
    }

    /// Values of one column for all rows matching `filter`
    pub fn get_column(&self, header: &str, filter: &Filter) -> FilterResult<Vec<String>> {
        if self.index_of(header).is_none() {
            filter.check_headers(|h| self.headers.contains(h))?;
            return Ok(Vec::new());
        }
        Ok(self
            .select(None, Some(&[header]), filter)?
            .into_iter()
            .filter_map(|r| r.into_iter().next())
            .collect())
    }

    /// Rows matching `filter`, optionally projected onto `headers`
    pub fn get_rows_list(&self, headers: Option<&[&str]>, filter: &Filter) -> FilterResult<Vec<Row>> {
        self.select(None, headers, filter)
    }

    /// Ascending indices of rows matching `filter`
    pub fn get_rows_indexes(&self, filter: &Filter) -> FilterResult<Vec<usize>> {
        filter.check_headers(|h| self.headers.contains(h))?;
        let mut indexes = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            if filter.matches(row, &self.headers)? {
                indexes.push(i);
            }
        }
        Ok(indexes)
    }

    /// Matching rows as JSON objects keyed by header
    pub fn to_records(&self, filter: &Filter) -> FilterResult<Vec<Value>> {
        Ok(self
            .select(None, None, filter)?
            .into_iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .headers
                    .names()
                    .iter()
                    .cloned()
                    .zip(row.into_iter().map(Value::String))
                    .collect();
                Value::Object(obj)
            })
            .collect())
    }

    // =========================================================================
    // Mutation surface
    // =========================================================================

    /// Write one cell, creating the header if needed.
    ///
    /// Returns false (with a warning) if the row does not exist.
    pub fn set_value(&mut self, row: usize, header: &str, value: impl Into<String>) -> bool {
        if row >= self.rows.len() {
            self.diagnostics
                .warning(format!("Row {} out of range ({} rows), value not set", row, self.rows.len()));
            return false;
        }
        let position = self.add_column(header, true);
        self.rows[row][position] = value.into();
        true
    }

    /// Write `value` into `header` of every row matching `filter`.
    ///
    /// Returns the number of rows written.
    pub fn set_values(&mut self, header: &str, value: &str, filter: &Filter) -> FilterResult<usize> {
        let indexes = self.get_rows_indexes(filter)?;
        let position = self.add_column(header, true);
        for &i in &indexes {
            self.rows[i][position] = value.to_string();
        }
        Ok(indexes.len())
    }

    /// Append a row.
    ///
    /// Accepts either a full-width row, or one value per non-metadata column (metadata
    /// values are filled in). Any other width is rejected with a warning.
    pub fn add_row<I, S>(&mut self, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let width = self.headers.len();
        let merged = self.metadata.iter().filter(|m| m.position.is_some()).count();

        if width == 0 {
            self.diagnostics.warning("Cannot add a row to a table without headers");
            return false;
        }

        let row = if values.len() == width {
            values
        } else if values.len() == width - merged {
            let mut data = values.into_iter();
            let mut row: Row = (0..width)
                .map(|p| {
                    if self.is_metadata_position(p) {
                        String::new()
                    } else {
                        data.next().unwrap_or_default()
                    }
                })
                .collect();
            self.apply_metadata(&mut row);
            row
        } else {
            self.diagnostics.warning(format!(
                "Row rejected: expected {} fields, got {}",
                width - merged,
                values.len()
            ));
            return false;
        };

        self.rows.push(row);
        true
    }

    /// Append a row given as header/value pairs; unknown headers are created
    pub fn add_record<I, K, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let pairs: Vec<(usize, String)> = fields
            .into_iter()
            .map(|(k, v)| (self.add_column(k.as_ref(), true), v.into()))
            .collect();
        let mut row: Row = vec![String::new(); self.headers.len()];
        self.apply_metadata(&mut row);
        for (position, value) in pairs {
            row[position] = value;
        }
        self.rows.push(row);
    }

    /// Remove one row; `None` (with a warning) if out of range
    pub fn delete_row(&mut self, row: usize) -> Option<Row> {
        if row >= self.rows.len() {
            self.diagnostics
                .warning(format!("Row {} out of range ({} rows), nothing deleted", row, self.rows.len()));
            return None;
        }
        Some(self.rows.remove(row))
    }

    /// Remove all rows matching `filter`; returns how many were removed
    pub fn delete_rows(&mut self, filter: &Filter) -> FilterResult<usize> {
        let indexes = self.get_rows_indexes(filter)?;
        let mut next = indexes.iter().peekable();
        let mut position = 0;
        self.rows.retain(|_| {
            let keep = next.peek().map_or(true, |&&i| i != position);
            if !keep {
                next.next();
            }
            position += 1;
            keep
        });
        Ok(indexes.len())
    }

    /// Append all rows of `other`.
    ///
    /// Headers must match or be a reordering; otherwise a warning is logged
    /// and nothing changes. An empty table adopts the other table's headers.
    pub fn append_data_container(&mut self, other: &TabularAdapter) -> bool {
        if self.headers.is_empty() {
            self.set_headers(other.headers(), true);
        }

        let check = check_header(&self.headers, &other.headers);
        if check == HeaderCheck::Mismatch {
            self.diagnostics.warning(format!(
                "Cannot append: headers [{}] do not fit [{}]",
                other.headers().join(", "),
                self.headers().join(", ")
            ));
            return false;
        }

        let mapping: Vec<usize> = other
            .headers()
            .iter()
            .filter_map(|name| self.headers.position(name))
            .collect();
        for source in &other.rows {
            let mut row: Row = vec![String::new(); self.headers.len()];
            self.apply_metadata(&mut row);
            for (value, &position) in source.iter().zip(&mapping) {
                row[position] = value.clone();
            }
            self.rows.push(row);
        }

        if check == HeaderCheck::Reordered {
            self.diagnostics
                .info(format!("Appended {} reordered rows", other.rows.len()));
        }
        true
    }

    /// Drain the diagnostics collected so far
    pub fn take_diagnostics(&self) -> Vec<LogEntry> {
        self.diagnostics.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterRule, Operator};

    fn sample() -> TabularAdapter {
        let mut table = TabularAdapter::with_headers(["Name", "City"]);
        table.add_row(["Ann", "Linz"]);
        table.add_row(["Bo", "Graz"]);
        table
    }

    fn city_is(city: &str) -> Filter {
        Filter::new().with_rule(FilterRule::single("City", Operator::Equals, city).unwrap())
    }

    fn assert_rows_fit(table: &TabularAdapter) {
        for row in table.rows() {
            assert_eq!(row.len(), table.headers().len());
        }
    }

    #[test]
    fn test_scenario_filter_equals() {
        let table = sample();
        let rows = table.get_rows_list(None, &city_is("Linz")).unwrap();
        assert_eq!(rows, vec![vec!["Ann".to_string(), "Linz".to_string()]]);
    }

    #[test]
    fn test_add_column_backfills() {
        let mut table = sample();
        let position = table.add_column("Country", false);

        assert_eq!(position, 2);
        assert_eq!(table.rows()[0], vec!["Ann", "Linz", ""]);
        assert_eq!(table.rows()[1], vec!["Bo", "Graz", ""]);
        assert_rows_fit(&table);
    }

    #[test]
    fn test_add_duplicate_column() {
        let mut table = sample();
        let first = table.add_column("City", false);
        assert_eq!(table.headers(), &["Name", "City", "City_2"]);
        assert_eq!(first, 2);
        assert_rows_fit(&table);
    }

    #[test]
    fn test_set_headers_append_keeps_invariant() {
        let mut table = sample();
        table.set_headers(["Zip", "Street"], false);
        assert_eq!(table.headers().len(), 4);
        assert_rows_fit(&table);

        table.set_headers(["Only"], true);
        assert_rows_fit(&table);
        assert_eq!(table.rows()[0], vec!["Ann"]);
    }

    #[test]
    fn test_unknown_filter_header_is_error() {
        let table = sample();
        let filter = Filter::new().with_rule(FilterRule::single("Zip", Operator::Equals, "4020").unwrap());
        assert!(table.get_rows_list(None, &filter).is_err());
        assert!(table.get_rows_indexes(&filter).is_err());

        // independent of row content
        let empty = TabularAdapter::with_headers(["Name"]);
        assert!(empty.get_rows_list(None, &filter).is_err());
    }

    #[test]
    fn test_soft_misses() {
        let table = sample();
        assert_eq!(table.get_value(0, "Zip"), None);
        assert_eq!(table.get_value(7, "Name"), None);
        assert_eq!(table.get_row(9), None);
        assert!(table.get_column("Zip", &Filter::new()).unwrap().is_empty());
        assert!(table.diagnostics().warning_count() >= 2);
    }

    #[test]
    fn test_get_value_and_column() {
        let table = sample();
        assert_eq!(table.get_value(1, "City"), Some("Graz".to_string()));
        assert_eq!(table.get_column("Name", &Filter::new()).unwrap(), vec!["Ann", "Bo"]);
        assert_eq!(table.get_column("Name", &city_is("Graz")).unwrap(), vec!["Bo"]);
    }

    #[test]
    fn test_select_projection_and_indexes() {
        let table = sample();
        let rows = table.select(Some(&[1, 5]), Some(&["City"]), &Filter::new()).unwrap();
        assert_eq!(rows, vec![vec!["Graz".to_string()]]);
        assert_eq!(table.get_rows_indexes(&city_is("Graz")).unwrap(), vec![1]);
    }

    #[test]
    fn test_set_value_creates_header() {
        let mut table = sample();
        assert!(table.set_value(0, "Zip", "4020"));
        assert_eq!(table.get_value(0, "Zip"), Some("4020".to_string()));
        assert_eq!(table.get_value(1, "Zip"), Some(String::new()));
        assert!(!table.set_value(5, "Zip", "1010"));
        assert_rows_fit(&table);
    }

    #[test]
    fn test_set_values_with_filter() {
        let mut table = sample();
        let written = table.set_values("Country", "AT", &city_is("Linz")).unwrap();
        assert_eq!(written, 1);
        assert_eq!(table.get_column("Country", &Filter::new()).unwrap(), vec!["AT", ""]);
    }

    #[test]
    fn test_add_row_wrong_width_rejected() {
        let mut table = sample();
        assert!(!table.add_row(["only one"]));
        assert_eq!(table.len(), 2);
        assert_eq!(table.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_metadata_appended() {
        let mut table = sample();
        table.add_metadata("Source", "import.csv");
        assert_eq!(table.headers(), &["Name", "City", "Source"]);
        assert_eq!(table.rows()[0][2], "import.csv");

        assert!(table.add_row(["Cy", "Wien"]));
        assert_eq!(table.rows()[2], vec!["Cy", "Wien", "import.csv"]);
        assert_rows_fit(&table);
    }

    #[test]
    fn test_metadata_before_headers_trails() {
        let mut table = TabularAdapter::default();
        table.add_metadata("Batch", "7");
        table.read_str("Name;City\nAnn;Linz").unwrap();

        assert_eq!(table.headers(), &["Name", "City", "Batch"]);
        assert_eq!(table.rows()[0], vec!["Ann", "Linz", "7"]);
    }

    #[test]
    fn test_add_record() {
        let mut table = sample();
        table.add_record([("City", "Wels"), ("Zip", "4600")]);
        assert_eq!(table.rows()[2], vec!["", "Wels", "4600"]);
        assert_rows_fit(&table);
    }

    #[test]
    fn test_delete_rows() {
        let mut table = sample();
        table.add_row(["Cy", "Linz"]);
        let removed = table.delete_rows(&city_is("Linz")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(table.get_column("Name", &Filter::new()).unwrap(), vec!["Bo"]);

        assert_eq!(table.delete_row(0), Some(vec!["Bo".to_string(), "Graz".to_string()]));
        assert_eq!(table.delete_row(0), None);
    }

    #[test]
    fn test_append_reordered() {
        let mut table = sample();
        let mut other = TabularAdapter::with_headers(["City", "Name"]);
        other.add_row(["Wien", "Cy"]);

        assert!(table.append_data_container(&other));
        assert_eq!(table.rows()[2], vec!["Cy", "Wien"]);
    }

    #[test]
    fn test_append_mismatch_is_noop() {
        let mut table = sample();
        let mut other = TabularAdapter::with_headers(["Name", "Zip"]);
        other.add_row(["Cy", "1010"]);

        assert!(!table.append_data_container(&other));
        assert_eq!(table.len(), 2);
        assert_eq!(table.headers(), &["Name", "City"]);
        assert_eq!(table.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_to_records() {
        let table = sample();
        let records = table.to_records(&city_is("Graz")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["Name"], "Bo");
    }
}
