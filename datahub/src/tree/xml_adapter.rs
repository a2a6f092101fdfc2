//! Tabular-style verbs over an XML document.
//!
//! # Example
//!
//! ```rust
//! use datahub::{Filter, Scope, XmlAdapter};
//!
//! let mut xml = XmlAdapter::default();
//! xml.read_str("<Contacts><Private><phone>1</phone></Private><Business><phone>2</phone></Business></Contacts>")
//!     .unwrap();
//!
//! let phones = xml.get_values("phone", &Scope::path("/Contacts/Business"), &Filter::new()).unwrap();
//! assert_eq!(phones, vec!["2"]);
//! ```

use std::io::{Read, Write};
use std::path::Path;

use super::xml::{NodeId, XmlDocument};
use super::{filter_candidates, Fields, Scope, TreeElement, XPath};
use crate::config::ContainerOptions;
use crate::diagnostics::{Diagnostics, LogEntry};
use crate::error::{ContainerResult, TreeResult};
use crate::filter::Filter;
use crate::tabular::TabularAdapter;

#[derive(Debug, Clone, Default)]
pub struct XmlAdapter {
    document: XmlDocument,
    options: ContainerOptions,
    diagnostics: Diagnostics,
}

impl XmlAdapter {
    pub fn new(options: ContainerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn from_document(document: XmlDocument, options: ContainerOptions) -> Self {
        Self {
            document,
            options,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut XmlDocument {
        &mut self.document
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&self) -> Vec<LogEntry> {
        self.diagnostics.take()
    }

    // =========================================================================
    // Reading / writing
    // =========================================================================

    /// Replace the document with parsed `content`
    pub fn read_str(&mut self, content: &str) -> TreeResult<()> {
        self.document = XmlDocument::parse(content)?;
        self.diagnostics.success(format!(
            "Parsed XML document with {} elements",
            self.document.elements_by_tag("*").len()
        ));
        Ok(())
    }

    pub fn read_reader<R: Read>(&mut self, mut reader: R) -> TreeResult<()> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        self.read_str(&content)
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> TreeResult<()> {
        let content = std::fs::read_to_string(path)?;
        self.read_str(&content)
    }

    pub fn write_string(&self) -> TreeResult<String> {
        self.document.to_xml_string(self.options.pretty)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> TreeResult<()> {
        writer.write_all(self.write_string()?.as_bytes())?;
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> TreeResult<()> {
        self.document.save(path, self.options.pretty)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Scope elements for a path scope; `None` for [`Scope::Document`]
    fn scope_elements(&self, scope: &Scope) -> TreeResult<Option<Vec<NodeId>>> {
        let Some(raw) = scope.as_path() else {
            return Ok(None);
        };
        let path: XPath = raw.parse()?;
        let elements = self.document.select(&path);
        if elements.is_empty() {
            self.diagnostics
                .warning(format!("Scope '{}' matches no element", raw));
        }
        Ok(Some(elements))
    }

    fn candidates(&self, tag: &str, scope: &Scope) -> TreeResult<Vec<NodeId>> {
        Ok(match self.scope_elements(scope)? {
            None => self.document.elements_by_tag(tag),
            Some(parents) => parents
                .into_iter()
                .flat_map(|p| self.document.children_named(p, tag))
                .collect(),
        })
    }

    fn fields(&self, id: NodeId) -> Fields {
        let doc = &self.document;
        let mut fields = Fields::new();
        for &child in doc.children(id) {
            fields
                .entry(doc.name(child).to_string())
                .or_insert_with(|| doc.text(child).to_string());
        }
        for (key, value) in doc.attributes(id) {
            fields.insert(format!("@{}", key), value.clone());
        }
        fields.insert(doc.name(id).to_string(), doc.text(id).to_string());
        fields
    }

    /// Matching elements as ids into [`XmlAdapter::document`]
    pub fn find(&self, tag: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<NodeId>> {
        let candidates: Vec<(NodeId, Fields)> = self
            .candidates(tag, scope)?
            .into_iter()
            .map(|id| (id, self.fields(id)))
            .collect();
        Ok(filter_candidates(candidates, tag, filter)?)
    }

    /// Elements named `tag` under the scope (or anywhere) that pass `filter`
    pub fn get(&self, tag: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<TreeElement>> {
        let doc = &self.document;
        Ok(self
            .find(tag, scope, filter)?
            .into_iter()
            .map(|id| TreeElement {
                path: doc.path_of(id),
                name: doc.name(id).to_string(),
                text: doc.text(id).to_string(),
                attributes: doc.attributes(id).to_vec(),
            })
            .collect())
    }

    /// Text of every element [`XmlAdapter::get`] returns
    pub fn get_values(&self, tag: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<String>> {
        Ok(self
            .find(tag, scope, filter)?
            .into_iter()
            .map(|id| self.document.text(id).to_string())
            .collect())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Resolve a write scope; warns and returns `None` when the verb must be skipped
    fn write_targets(&self, verb: &str, scope: &Scope) -> TreeResult<Option<Vec<NodeId>>> {
        match self.scope_elements(scope)? {
            None => {
                self.diagnostics
                    .warning(format!("{} skipped: no scope path given", verb));
                Ok(None)
            }
            Some(parents) if parents.is_empty() => Ok(None),
            Some(parents) => Ok(Some(parents)),
        }
    }

    /// Add or update a child of every scope element.
    ///
    /// With `attr`, an existing `tag[@attr=old_value]` (or `value` when no old
    /// value is given) gets `attr=value`; otherwise `<tag attr="value"/>` is
    /// created. Without `attr`, `<tag>value</tag>` is appended.
    ///
    /// Returns the number of elements created or updated.
    pub fn add(
        &mut self,
        tag: &str,
        attr: Option<&str>,
        old_value: Option<&str>,
        value: &str,
        scope: &Scope,
    ) -> ContainerResult<usize> {
        let Some(parents) = self.write_targets("add", scope)? else {
            return Ok(0);
        };

        for &parent in &parents {
            match attr {
                Some(key) => {
                    let wanted = old_value.unwrap_or(value);
                    let existing = self
                        .document
                        .children_named(parent, tag)
                        .into_iter()
                        .find(|&c| self.document.attribute(c, key) == Some(wanted));
                    let target = match existing {
                        Some(id) => id,
                        None => self.document.add_element(parent, tag),
                    };
                    self.document.set_attribute(target, key, value);
                }
                None => {
                    let child = self.document.add_element(parent, tag);
                    self.document.set_text(child, value);
                }
            }
        }
        Ok(parents.len())
    }

    /// Rewrite the text of the first (or every) element matched by `get`
    pub fn set(&mut self, tag: &str, value: &str, scope: &Scope, filter: &Filter, all: bool) -> ContainerResult<usize> {
        if self.write_targets("set", scope)?.is_none() {
            return Ok(0);
        }
        let mut targets = self.find(tag, scope, filter)?;
        if !all {
            targets.truncate(1);
        }
        for &id in &targets {
            self.document.set_text(id, value);
        }
        if targets.is_empty() {
            self.diagnostics
                .info(format!("set: no <{}> under '{}'", tag, scope));
        }
        Ok(targets.len())
    }

    /// Remove scoped children named `tag`.
    ///
    /// `value` is compared with `attr` when given, else with the element text;
    /// `None` removes every element passing `filter`.
    pub fn delete(
        &mut self,
        tag: &str,
        attr: Option<&str>,
        value: Option<&str>,
        scope: &Scope,
        filter: &Filter,
    ) -> ContainerResult<usize> {
        if self.write_targets("delete", scope)?.is_none() {
            return Ok(0);
        }
        let doc = &self.document;
        let targets: Vec<NodeId> = self
            .find(tag, scope, filter)?
            .into_iter()
            .filter(|&id| match (attr, value) {
                (Some(key), Some(v)) => doc.attribute(id, key) == Some(v),
                (Some(key), None) => doc.attribute(id, key).is_some(),
                (None, Some(v)) => doc.text(id) == v,
                (None, None) => true,
            })
            .collect();

        for &id in &targets {
            self.document.remove(id);
        }
        Ok(targets.len())
    }

    // =========================================================================
    // Projection
    // =========================================================================

    /// One row per matching element; headers are `@attributes` and child tags
    /// in first-seen order, the element's own text lands under `tag`.
    pub fn project(&self, tag: &str, scope: &Scope, filter: &Filter) -> ContainerResult<TabularAdapter> {
        let doc = &self.document;
        let mut table = TabularAdapter::new(self.options.clone());

        for id in self.find(tag, scope, filter)? {
            let mut record: Vec<(String, String)> = doc
                .attributes(id)
                .iter()
                .map(|(k, v)| (format!("@{}", k), v.clone()))
                .collect();
            for &child in doc.children(id) {
                let name = doc.name(child);
                if !record.iter().any(|(k, _)| k == name) {
                    record.push((name.to_string(), doc.text(child).to_string()));
                }
            }
            if !doc.text(id).is_empty() || record.is_empty() {
                record.push((tag.to_string(), doc.text(id).to_string()));
            }
            table.add_record(record);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContainerError, FilterError};
    use crate::filter::{FilterRule, Operator};

    const CONTACTS: &str = r#"<Contacts>
  <Private>
    <phone type="mobile">111</phone>
    <phone type="home">222</phone>
  </Private>
  <Business>
    <phone type="mobile">333</phone>
  </Business>
</Contacts>"#;

    fn contacts() -> XmlAdapter {
        let mut xml = XmlAdapter::default();
        xml.read_str(CONTACTS).unwrap();
        xml
    }

    fn business() -> Scope {
        Scope::path("/Contacts/Business")
    }

    fn rule(header: &str, value: &str) -> Filter {
        Filter::new().with_rule(FilterRule::single(header, Operator::Equals, value).unwrap())
    }

    #[test]
    fn test_scoped_get() {
        let xml = contacts();
        let phones = xml.get_values("phone", &business(), &Filter::new()).unwrap();
        assert_eq!(phones, vec!["333"]);

        let all = xml.get_values("phone", &Scope::Document, &Filter::new()).unwrap();
        assert_eq!(all, vec!["111", "222", "333"]);
    }

    #[test]
    fn test_get_with_attribute_filter() {
        let xml = contacts();
        let mobiles = xml.get("phone", &Scope::Document, &rule("@type", "mobile")).unwrap();
        assert_eq!(mobiles.len(), 2);
        assert_eq!(mobiles[1].path, "/Contacts/Business/phone");
        assert_eq!(mobiles[1].attributes, vec![("type".to_string(), "mobile".to_string())]);
    }

    #[test]
    fn test_get_unknown_rule_header() {
        let xml = contacts();
        let result = xml.get("phone", &Scope::Document, &rule("zip", "*"));
        assert!(matches!(
            result,
            Err(ContainerError::Filter(FilterError::UnknownHeader(h))) if h == "zip"
        ));
    }

    #[test]
    fn test_child_rule_on_document_without_candidates() {
        let filter = rule("name", "x");

        let mut matching = XmlAdapter::default();
        matching.read_str("<r><p><name>x</name></p></r>").unwrap();
        assert_eq!(matching.get("p", &Scope::Document, &filter).unwrap().len(), 1);

        let mut other = XmlAdapter::default();
        other.read_str("<r><q/></r>").unwrap();
        assert!(other.get("p", &Scope::Document, &filter).unwrap().is_empty());
    }

    #[test]
    fn test_scope_matching_nothing_warns() {
        let xml = contacts();
        let values = xml.get_values("phone", &Scope::path("/Contacts/Other"), &Filter::new()).unwrap();
        assert!(values.is_empty());
        assert_eq!(xml.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_add_child_and_attribute() {
        let mut xml = contacts();
        assert_eq!(xml.add("fax", None, None, "444", &business()).unwrap(), 1);
        assert_eq!(xml.get_values("fax", &business(), &Filter::new()).unwrap(), vec!["444"]);

        // existing phone[@type='mobile'] is updated in place
        xml.add("phone", Some("type"), Some("mobile"), "work", &business()).unwrap();
        let phones = xml.get("phone", &business(), &Filter::new()).unwrap();
        assert_eq!(phones.len(), 1);
        assert_eq!(phones[0].attributes[0].1, "work");

        // no match: a new element is created
        xml.add("phone", Some("type"), Some("pager"), "pager", &business()).unwrap();
        assert_eq!(xml.get("phone", &business(), &Filter::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_document_scope_write_is_skipped() {
        let mut xml = contacts();
        let before = xml.write_string().unwrap();

        assert_eq!(xml.add("fax", None, None, "1", &Scope::Document).unwrap(), 0);
        assert_eq!(xml.set("phone", "0", &Scope::Document, &Filter::new(), true).unwrap(), 0);
        assert_eq!(xml.delete("phone", None, None, &Scope::Document, &Filter::new()).unwrap(), 0);

        assert_eq!(xml.write_string().unwrap(), before);
        assert_eq!(xml.diagnostics().warning_count(), 3);
    }

    #[test]
    fn test_set_first_or_all() {
        let mut xml = contacts();
        let private = Scope::path("/Contacts/Private");

        assert_eq!(xml.set("phone", "000", &private, &Filter::new(), false).unwrap(), 1);
        assert_eq!(xml.get_values("phone", &private, &Filter::new()).unwrap(), vec!["000", "222"]);

        assert_eq!(xml.set("phone", "999", &private, &Filter::new(), true).unwrap(), 2);
        assert_eq!(xml.get_values("phone", &private, &Filter::new()).unwrap(), vec!["999", "999"]);
    }

    #[test]
    fn test_delete_by_attribute() {
        let mut xml = contacts();
        let private = Scope::path("/Contacts/Private");
        let removed = xml
            .delete("phone", Some("type"), Some("home"), &private, &Filter::new())
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(xml.get_values("phone", &Scope::Document, &Filter::new()).unwrap(), vec!["111", "333"]);
    }

    #[test]
    fn test_project_to_table() {
        let xml = contacts();
        let table = xml.project("phone", &Scope::Document, &Filter::new()).unwrap();
        assert_eq!(table.headers(), &["@type", "phone"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.get_value(1, "@type"), Some("home".to_string()));
    }

    #[test]
    fn test_write_file_round_trip() {
        let mut xml = contacts();
        xml.add("fax", None, None, "444", &business()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.xml");
        xml.write_file(&path).unwrap();

        let mut reread = XmlAdapter::default();
        reread.read_file(&path).unwrap();
        assert_eq!(reread.get_values("fax", &Scope::Document, &Filter::new()).unwrap(), vec!["444"]);
    }
}
