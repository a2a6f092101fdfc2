//! Format-agnostic container facade.
//!
//! A [`Container`] owns exactly one [`Adapter`] variant and routes every verb
//! to it. Row verbs on a tree document (and scoped verbs on a table) fail
//! with [`ContainerError::UnsupportedOperation`].
//!
//! # Example
//!
//! ```rust
//! use datahub::{Container, ContainerOptions, Filter, Format, Scope};
//!
//! let xml = "<Contacts><Business><phone>333</phone></Business></Contacts>";
//! let container = Container::from_bytes(xml.as_bytes(), None, ContainerOptions::default()).unwrap();
//! assert_eq!(container.format(), Format::Xml);
//!
//! let phones = container.get_values("phone", &Scope::path("/Contacts/Business"), &Filter::new()).unwrap();
//! assert_eq!(phones, vec!["333"]);
//! ```

pub mod detect;

pub use detect::{sniff, Format};

use serde_json::Value;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::ContainerOptions;
use crate::diagnostics::{Diagnostics, LogEntry};
use crate::error::{ContainerError, ContainerResult};
use crate::filter::Filter;
use crate::source;
use crate::tabular::{Row, TabularAdapter};
use crate::tree::value::value_text;
use crate::tree::{Scope, TreeElement, ValueSyntax, ValueTreeAdapter, XmlAdapter, XmlDocument};

/// The active format implementation
#[derive(Debug, Clone)]
pub enum Adapter {
    Tabular(TabularAdapter),
    Xml(XmlAdapter),
    Json(ValueTreeAdapter),
    Yaml(ValueTreeAdapter),
}

impl Adapter {
    /// Empty adapter for `format`
    pub fn new(format: Format, options: ContainerOptions) -> Self {
        match format {
            Format::Tabular => Adapter::Tabular(TabularAdapter::new(options)),
            Format::Xml => Adapter::Xml(XmlAdapter::new(options)),
            Format::Json => Adapter::Json(ValueTreeAdapter::new(ValueSyntax::Json, options)),
            Format::Yaml => Adapter::Yaml(ValueTreeAdapter::new(ValueSyntax::Yaml, options)),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Adapter::Tabular(_) => Format::Tabular,
            Adapter::Xml(_) => Format::Xml,
            Adapter::Json(_) => Format::Json,
            Adapter::Yaml(_) => Format::Yaml,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        match self {
            Adapter::Tabular(t) => t.diagnostics(),
            Adapter::Xml(x) => x.diagnostics(),
            Adapter::Json(v) | Adapter::Yaml(v) => v.diagnostics(),
        }
    }
}

/// Where `read_data`/`write_data` go
#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    /// Stream content captured at construction; read-only
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct Container {
    adapter: Adapter,
    source: Option<Source>,
    options: ContainerOptions,
}

impl Container {
    /// Unbound, empty container
    pub fn new(format: Format, options: ContainerOptions) -> Self {
        Self {
            adapter: Adapter::new(format, options.clone()),
            source: None,
            options,
        }
    }

    /// Open a file with default options, detecting the format
    pub fn open(path: impl AsRef<Path>) -> ContainerResult<Self> {
        Self::open_with(path, None, ContainerOptions::default())
    }

    /// Open a file; `format` overrides extension and content detection
    pub fn open_with(path: impl AsRef<Path>, format: Option<Format>, options: ContainerOptions) -> ContainerResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mut container = Self::detected(format, Some(path), &bytes, options)?;
        container.source = Some(Source::Path(path.to_path_buf()));
        container.load(&bytes)?;
        Ok(container)
    }

    /// Read a whole stream and detect its format from content
    pub fn from_reader<R: Read>(mut reader: R, format: Option<Format>, options: ContainerOptions) -> ContainerResult<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes, format, options)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, format: Option<Format>, options: ContainerOptions) -> ContainerResult<Self> {
        let bytes = bytes.into();
        let mut container = Self::detected(format, None, &bytes, options)?;
        container.load(&bytes)?;
        container.source = Some(Source::Bytes(bytes));
        Ok(container)
    }

    fn detected(format: Option<Format>, path: Option<&Path>, bytes: &[u8], options: ContainerOptions) -> ContainerResult<Self> {
        let (format, how) = match format.or_else(|| path.and_then(Format::from_extension)) {
            Some(f) => (f, if format.is_some() { "explicit" } else { "extension" }),
            None => {
                let decoded = source::decode_bytes(bytes, options.encoding.as_deref())?;
                (sniff(&decoded.content), "content")
            }
        };
        let container = Self::new(format, options);
        container
            .diagnostics()
            .info(format!("Format {} (by {})", format, how));
        Ok(container)
    }

    /// Build a container of `format` holding the rows of `table`.
    ///
    /// Trees get one record per row: JSON/YAML an array of objects, XML
    /// `<records><record>…</record></records>` with `@name` headers as
    /// attributes.
    pub fn from_table(table: &TabularAdapter, format: Format, options: ContainerOptions) -> ContainerResult<Self> {
        let adapter = match format {
            Format::Tabular => {
                let mut copy = TabularAdapter::new(options.clone());
                copy.append_data_container(table);
                Adapter::Tabular(copy)
            }
            Format::Xml => Adapter::Xml(XmlAdapter::from_document(table_to_xml(table), options.clone())),
            Format::Json | Format::Yaml => {
                let records = table.to_records(&Filter::new())?;
                let syntax = if format == Format::Json { ValueSyntax::Json } else { ValueSyntax::Yaml };
                let tree = ValueTreeAdapter::from_value(Value::Array(records), syntax, options.clone());
                if format == Format::Json {
                    Adapter::Json(tree)
                } else {
                    Adapter::Yaml(tree)
                }
            }
        };
        Ok(Self {
            adapter,
            source: None,
            options,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn format(&self) -> Format {
        self.adapter.format()
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut Adapter {
        &mut self.adapter
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Some(Source::Path(p)) => Some(p),
            _ => None,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.adapter.diagnostics()
    }

    /// Drain the diagnostics collected so far
    pub fn take_diagnostics(&self) -> Vec<LogEntry> {
        self.diagnostics().take()
    }

    fn unsupported(&self, verb: &'static str) -> ContainerError {
        ContainerError::UnsupportedOperation {
            verb,
            format: self.format(),
        }
    }

    fn tabular(&self, verb: &'static str) -> ContainerResult<&TabularAdapter> {
        match &self.adapter {
            Adapter::Tabular(t) => Ok(t),
            _ => Err(self.unsupported(verb)),
        }
    }

    fn tabular_mut(&mut self, verb: &'static str) -> ContainerResult<&mut TabularAdapter> {
        let format = self.format();
        match &mut self.adapter {
            Adapter::Tabular(t) => Ok(t),
            _ => Err(ContainerError::UnsupportedOperation { verb, format }),
        }
    }

    /// The tabular adapter, for callers that need its full surface
    pub fn as_tabular(&self) -> ContainerResult<&TabularAdapter> {
        self.tabular("as_tabular")
    }

    // =========================================================================
    // Reading / writing
    // =========================================================================

    fn load(&mut self, bytes: &[u8]) -> ContainerResult<()> {
        let encoding = self.options.encoding.clone();
        match &mut self.adapter {
            Adapter::Tabular(t) => {
                t.read_bytes(bytes)?;
            }
            tree => {
                let decoded = source::decode_bytes(bytes, encoding.as_deref())?;
                match tree {
                    Adapter::Xml(x) => x.read_str(&decoded.content)?,
                    Adapter::Json(v) | Adapter::Yaml(v) => v.read_str(&decoded.content)?,
                    Adapter::Tabular(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Re-read the backing source.
    ///
    /// Tables merge the source rows into the current ones; trees are replaced.
    pub fn read_data(&mut self) -> ContainerResult<()> {
        let bytes = match &self.source {
            Some(Source::Path(p)) => std::fs::read(p)?,
            Some(Source::Bytes(b)) => b.clone(),
            None => return Err(ContainerError::Unbound),
        };
        self.load(&bytes)
    }

    /// Write back to the backing file (whole content, not atomic)
    pub fn write_data(&self) -> ContainerResult<()> {
        match &self.source {
            Some(Source::Path(p)) => self.write_file(p),
            _ => Err(ContainerError::Unbound),
        }
    }

    /// Write to `path` and make it the backing file
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> ContainerResult<()> {
        self.write_file(path.as_ref())?;
        self.source = Some(Source::Path(path.as_ref().to_path_buf()));
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> ContainerResult<()> {
        match &self.adapter {
            Adapter::Tabular(t) => t.write_file(path)?,
            Adapter::Xml(x) => x.write_file(path)?,
            Adapter::Json(v) | Adapter::Yaml(v) => v.write_file(path)?,
        }
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W) -> ContainerResult<()> {
        match &self.adapter {
            Adapter::Tabular(t) => t.write_to(writer)?,
            Adapter::Xml(x) => x.write_to(writer)?,
            Adapter::Json(v) | Adapter::Yaml(v) => v.write_to(writer)?,
        }
        Ok(())
    }

    pub fn write_string(&self) -> ContainerResult<String> {
        Ok(match &self.adapter {
            Adapter::Tabular(t) => t.write_string()?,
            Adapter::Xml(x) => x.write_string()?,
            Adapter::Json(v) | Adapter::Yaml(v) => v.write_string()?,
        })
    }

    // =========================================================================
    // Tabular verbs
    // =========================================================================

    pub fn headers(&self) -> ContainerResult<&[String]> {
        Ok(self.tabular("headers")?.headers())
    }

    pub fn set_headers(&mut self, names: &[&str], overwrite: bool) -> ContainerResult<Vec<String>> {
        Ok(self.tabular_mut("set_headers")?.set_headers(names, overwrite))
    }

    pub fn get_value(&self, row: usize, header: &str) -> ContainerResult<Option<String>> {
        Ok(self.tabular("get_value")?.get_value(row, header))
    }

    pub fn get_row(&self, row: usize) -> ContainerResult<Option<Row>> {
        Ok(self.tabular("get_row")?.get_row(row))
    }

    pub fn get_column(&self, header: &str, filter: &Filter) -> ContainerResult<Vec<String>> {
        Ok(self.tabular("get_column")?.get_column(header, filter)?)
    }

    pub fn get_rows_list(&self, headers: Option<&[&str]>, filter: &Filter) -> ContainerResult<Vec<Row>> {
        Ok(self.tabular("get_rows_list")?.get_rows_list(headers, filter)?)
    }

    pub fn get_rows_indexes(&self, filter: &Filter) -> ContainerResult<Vec<usize>> {
        Ok(self.tabular("get_rows_indexes")?.get_rows_indexes(filter)?)
    }

    pub fn to_records(&self, filter: &Filter) -> ContainerResult<Vec<Value>> {
        Ok(self.tabular("to_records")?.to_records(filter)?)
    }

    pub fn set_value(&mut self, row: usize, header: &str, value: &str) -> ContainerResult<bool> {
        Ok(self.tabular_mut("set_value")?.set_value(row, header, value))
    }

    pub fn set_values(&mut self, header: &str, value: &str, filter: &Filter) -> ContainerResult<usize> {
        Ok(self.tabular_mut("set_values")?.set_values(header, value, filter)?)
    }

    pub fn add_row(&mut self, values: &[&str]) -> ContainerResult<bool> {
        Ok(self.tabular_mut("add_row")?.add_row(values.iter().copied()))
    }

    pub fn add_column(&mut self, name: &str) -> ContainerResult<usize> {
        Ok(self.tabular_mut("add_column")?.add_column(name, false))
    }

    pub fn add_metadata(&mut self, name: &str, value: &str) -> ContainerResult<()> {
        self.tabular_mut("add_metadata")?.add_metadata(name, value);
        Ok(())
    }

    pub fn delete_row(&mut self, row: usize) -> ContainerResult<Option<Row>> {
        Ok(self.tabular_mut("delete_row")?.delete_row(row))
    }

    pub fn delete_rows(&mut self, filter: &Filter) -> ContainerResult<usize> {
        Ok(self.tabular_mut("delete_rows")?.delete_rows(filter)?)
    }

    /// Append the rows of another tabular container; false on header mismatch
    pub fn append_data_container(&mut self, other: &Container) -> ContainerResult<bool> {
        let other = other.tabular("append_data_container")?;
        Ok(self.tabular_mut("append_data_container")?.append_data_container(other))
    }

    // =========================================================================
    // Tree verbs
    // =========================================================================

    /// Elements named `name` under `scope` that pass `filter`
    pub fn get(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<TreeElement>> {
        match &self.adapter {
            Adapter::Xml(x) => x.get(name, scope, filter),
            Adapter::Json(v) | Adapter::Yaml(v) => v.get(name, scope, filter),
            Adapter::Tabular(_) => Err(self.unsupported("get")),
        }
    }

    /// Text of every element [`Container::get`] returns
    pub fn get_values(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<String>> {
        match &self.adapter {
            Adapter::Xml(x) => x.get_values(name, scope, filter),
            Adapter::Json(v) | Adapter::Yaml(v) => Ok(v
                .get_values(name, scope, filter)?
                .iter()
                .map(value_text)
                .collect()),
            Adapter::Tabular(_) => Err(self.unsupported("get_values")),
        }
    }

    pub fn set(&mut self, name: &str, value: &str, scope: &Scope, filter: &Filter, all: bool) -> ContainerResult<usize> {
        match &mut self.adapter {
            Adapter::Xml(x) => x.set(name, value, scope, filter, all),
            Adapter::Json(v) | Adapter::Yaml(v) => v.set(name, value, scope, filter, all),
            Adapter::Tabular(_) => Err(self.unsupported("set")),
        }
    }

    /// Add a child element (XML) or member (JSON/YAML) under `scope`
    pub fn add(&mut self, name: &str, value: &str, scope: &Scope) -> ContainerResult<usize> {
        match &mut self.adapter {
            Adapter::Xml(x) => x.add(name, None, None, value, scope),
            Adapter::Json(v) | Adapter::Yaml(v) => v.add(name, value, scope),
            Adapter::Tabular(_) => Err(self.unsupported("add")),
        }
    }

    /// XML only: set `attr` on `name[@attr=old_value]`, creating the element if absent
    pub fn add_attribute(
        &mut self,
        name: &str,
        attr: &str,
        old_value: Option<&str>,
        value: &str,
        scope: &Scope,
    ) -> ContainerResult<usize> {
        match &mut self.adapter {
            Adapter::Xml(x) => x.add(name, Some(attr), old_value, value, scope),
            _ => Err(self.unsupported("add_attribute")),
        }
    }

    /// Remove matching elements; with `value`, only those whose text equals it
    pub fn delete(&mut self, name: &str, value: Option<&str>, scope: &Scope, filter: &Filter) -> ContainerResult<usize> {
        match &mut self.adapter {
            Adapter::Xml(x) => x.delete(name, None, value, scope, filter),
            Adapter::Json(v) | Adapter::Yaml(v) => v.delete(name, value, scope, filter),
            Adapter::Tabular(_) => Err(self.unsupported("delete")),
        }
    }

    /// XML only: remove `name` elements whose `attr` equals `value` (or carries `attr` at all)
    pub fn delete_attribute(
        &mut self,
        name: &str,
        attr: &str,
        value: Option<&str>,
        scope: &Scope,
        filter: &Filter,
    ) -> ContainerResult<usize> {
        match &mut self.adapter {
            Adapter::Xml(x) => x.delete(name, Some(attr), value, scope, filter),
            _ => Err(self.unsupported("delete_attribute")),
        }
    }

    /// Flatten matching tree elements into a table
    pub fn project(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<TabularAdapter> {
        match &self.adapter {
            Adapter::Xml(x) => x.project(name, scope, filter),
            Adapter::Json(v) | Adapter::Yaml(v) => v.project(name, scope, filter),
            Adapter::Tabular(_) => Err(self.unsupported("project")),
        }
    }

    /// The container as a table: a copy for tabular data, a projection of
    /// `record` elements for trees
    pub fn to_table(&self, record: Option<&str>, scope: &Scope) -> ContainerResult<TabularAdapter> {
        match (&self.adapter, record) {
            (Adapter::Tabular(t), _) => Ok(t.clone()),
            (_, Some(name)) => self.project(name, scope, &Filter::new()),
            (Adapter::Json(v) | Adapter::Yaml(v), None) if v.root().is_array() => {
                let mut table = TabularAdapter::new(self.options.clone());
                if let Some(items) = v.root().as_array() {
                    for item in items {
                        match item.as_object() {
                            Some(map) => table.add_record(map.iter().map(|(k, field)| (k.as_str(), value_text(field)))),
                            None => table.add_record([("value", value_text(item))]),
                        }
                    }
                }
                Ok(table)
            }
            _ => Err(self.unsupported("to_table")),
        }
    }
}

/// XML element names cannot contain whitespace
fn element_name(header: &str) -> String {
    let name: String = header
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if name.is_empty() {
        "field".to_string()
    } else {
        name
    }
}

fn table_to_xml(table: &TabularAdapter) -> XmlDocument {
    let mut doc = XmlDocument::with_root("records");
    let Some(root) = doc.root() else {
        return doc;
    };
    for row in table.rows() {
        let record = doc.add_element(root, "record");
        for (header, value) in table.headers().iter().zip(row) {
            match header.strip_prefix('@') {
                Some(attr) => doc.set_attribute(record, attr, value.clone()),
                None => {
                    let field = doc.add_element(record, &element_name(header));
                    doc.set_text(field, value.clone());
                }
            }
        }
    }
    doc
}
