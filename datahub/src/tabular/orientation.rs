//! Column- and row-oriented read/write algorithms.
//!
//! ```text
//! COLUMN                     ROW
//! Name;City                  Name;Ann;Bo
//! Ann;Linz          ==       City;Linz;Graz
//! Bo;Graz
//! ```

use std::io::{Read, Write};
use std::path::Path;

use super::{Row, TabularAdapter};
use crate::config::Orientation;
use crate::error::SourceResult;
use crate::header::{check_header, HeaderCheck, HeaderIndex};
use crate::source::{self, RawRecord};

impl TabularAdapter {
    // =========================================================================
    // Reading
    // =========================================================================

    /// Parse decoded text with the configured delimiter and orientation.
    ///
    /// Returns the number of rows added.
    pub fn read_str(&mut self, content: &str) -> SourceResult<usize> {
        let delimiter = if self.options.detect_delimiter {
            source::detect_delimiter(content).unwrap_or(self.options.delimiter)
        } else {
            self.options.delimiter
        };
        let records = source::split_records(content, delimiter)?;
        if records.is_empty() {
            self.diagnostics.warning("Source contains no records");
            return Ok(0);
        }

        let added = match self.options.orientation {
            Orientation::Column => self.read_column_records(records),
            Orientation::Row => self.read_row_records(records),
        };
        self.diagnostics.success(format!("Read {} rows", added));
        Ok(added)
    }

    /// Decode raw bytes (configured or detected encoding) and parse them
    pub fn read_bytes(&mut self, bytes: &[u8]) -> SourceResult<usize> {
        let decoded = source::decode_bytes(bytes, self.options.encoding.as_deref())?;
        self.read_str(&decoded.content)
    }

    pub fn read_reader<R: Read>(&mut self, reader: R) -> SourceResult<usize> {
        let decoded = source::read_stream(reader, self.options.encoding.as_deref())?;
        self.read_str(&decoded.content)
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> SourceResult<usize> {
        let decoded = source::read_file(path, self.options.encoding.as_deref())?;
        self.read_str(&decoded.content)
    }

    /// Fold an incoming header set into the index.
    ///
    /// Header names are trimmed; cell values never are. Returns, for each
    /// incoming field, the container position it lands on.
    ///
    /// Columns first seen on a later read are appended at the end, after any
    /// metadata columns already merged. Metadata trails the source columns of
    /// the first read only.
    fn fold_header(&mut self, names: &[String]) -> Vec<usize> {
        let names: Vec<String> = names.iter().map(|n| n.trim().to_string()).collect();
        if self.headers.is_empty() {
            self.set_headers(&names, true);
            return (0..names.len()).collect();
        }

        let incoming = HeaderIndex::from_names(&names);
        match check_header(&self.headers, &incoming) {
            HeaderCheck::Match => (0..incoming.len()).collect(),
            check => {
                if check == HeaderCheck::Mismatch {
                    self.diagnostics.info("Source has new headers, appending columns");
                }
                incoming
                    .names()
                    .iter()
                    .map(|name| self.add_column(name, true))
                    .collect()
            }
        }
    }

    /// Lay out one record according to `mapping` and fill in metadata
    fn project_record(&self, mapping: &[usize], fields: Vec<String>) -> Row {
        let mut row: Row = vec![String::new(); self.headers.len()];
        for (&position, value) in mapping.iter().zip(fields) {
            if let Some(slot) = row.get_mut(position) {
                *slot = value;
            }
        }
        self.apply_metadata(&mut row);
        row
    }

    /// First logical record (after `header_row` skips) holds the headers
    fn read_column_records(&mut self, records: Vec<RawRecord>) -> usize {
        let header_row = self.options.header_row;
        let mut mapping: Option<Vec<usize>> = None;
        let mut added = 0;

        for (i, record) in records.into_iter().enumerate() {
            if i < header_row {
                continue;
            }
            if i == header_row {
                mapping = Some(self.fold_header(&record.fields));
                continue;
            }
            let Some(map) = mapping.as_ref() else {
                continue;
            };
            if record.fields.len() != map.len() {
                self.diagnostics.warning_at(
                    record.line,
                    format!("expected {} fields, got {} - row skipped", map.len(), record.fields.len()),
                );
                continue;
            }
            let row = self.project_record(map, record.fields);
            self.rows.push(row);
            added += 1;
        }

        if mapping.is_none() {
            self.diagnostics
                .warning(format!("Header record {} not found", header_row));
        }
        added
    }

    /// First field of every line is a header; the rest is transposed into rows
    fn read_row_records(&mut self, records: Vec<RawRecord>) -> usize {
        let mut names = Vec::new();
        let mut columns: Vec<Vec<String>> = Vec::new();

        for record in records.into_iter().skip(self.options.header_row) {
            let mut fields = record.fields.into_iter();
            names.push(fields.next().unwrap_or_default());
            columns.push(fields.collect());
        }

        let width = columns.iter().map(Vec::len).max().unwrap_or(0);
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != width {
                self.diagnostics.warning(format!(
                    "Header '{}' has {} values, expected {} - padded with empty values",
                    name,
                    column.len(),
                    width
                ));
            }
        }

        let mapping = self.fold_header(&names);
        for j in 0..width {
            let fields: Vec<String> = columns
                .iter()
                .map(|c| c.get(j).cloned().unwrap_or_default())
                .collect();
            let row = self.project_record(&mapping, fields);
            self.rows.push(row);
        }
        width
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Records in export layout for the configured orientation
    pub fn export_records(&self) -> Vec<Vec<String>> {
        match self.options.orientation {
            Orientation::Column => std::iter::once(self.headers().to_vec())
                .chain(self.rows.iter().cloned())
                .collect(),
            Orientation::Row => self
                .headers
                .iter()
                .map(|(position, name)| {
                    std::iter::once(name.to_string())
                        .chain(
                            self.rows
                                .iter()
                                .map(|r| r.get(position).cloned().unwrap_or_default()),
                        )
                        .collect()
                })
                .collect(),
        }
    }

    pub fn write_to<W: Write>(&self, writer: W) -> SourceResult<()> {
        source::write_records(writer, self.export_records(), self.options.delimiter)
    }

    pub fn write_string(&self) -> SourceResult<String> {
        source::records_to_string(self.export_records(), self.options.delimiter)
    }

    /// Replace the file content with the table (not atomic)
    pub fn write_file(&self, path: impl AsRef<Path>) -> SourceResult<()> {
        source::write_file(path, self.export_records(), self.options.delimiter)
    }
}
