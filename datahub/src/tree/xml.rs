//! In-memory XML document with in-place editing.
//!
//! Elements live in an arena and are addressed by [`NodeId`]. Removed
//! elements stay in the arena but are detached from their parent, so ids
//! handed out earlier never dangle. Comments and processing instructions are
//! not kept; mixed text inside an element is concatenated.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::path::{Predicate, XPath};
use crate::error::{TreeError, TreeResult};

/// Handle to an element in an [`XmlDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    detached: bool,
}

/// Parsed XML document
#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    declaration: bool,
}

impl XmlDocument {
    /// Document with a single empty root element
    pub fn with_root(name: &str) -> Self {
        let mut doc = Self {
            declaration: true,
            ..Self::default()
        };
        let root = doc.alloc(name.to_string(), Vec::new(), None);
        doc.root = Some(root);
        doc
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    pub fn parse(xml: &str) -> TreeResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut doc = Self::default();
        let mut stack: Vec<NodeId> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Decl(_) => doc.declaration = true,
                Event::Start(e) => {
                    let id = doc.open_element(&e, stack.last().copied())?;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    doc.open_element(&e, stack.last().copied())?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(t) => {
                    if let Some(&current) = stack.last() {
                        let text = t.unescape()?;
                        doc.nodes[current.0].text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    if let Some(&current) = stack.last() {
                        let raw = c.into_inner();
                        doc.nodes[current.0].text.push_str(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&open) = stack.last() {
            return Err(TreeError::Malformed(format!(
                "element <{}> is never closed",
                doc.nodes[open.0].name
            )));
        }
        if doc.root.is_none() {
            return Err(TreeError::Malformed("document has no root element".to_string()));
        }
        Ok(doc)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> TreeResult<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::parse(&content)
    }

    pub fn open(path: impl AsRef<Path>) -> TreeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn open_element(&mut self, e: &BytesStart, parent: Option<NodeId>) -> TreeResult<NodeId> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| TreeError::Malformed(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        if parent.is_none() && self.root.is_some() {
            return Err(TreeError::Malformed(format!(
                "second root element <{}>",
                name
            )));
        }
        let id = self.alloc(name, attributes, parent);
        if parent.is_none() {
            self.root = Some(id);
        }
        Ok(id)
    }

    fn alloc(&mut self, name: String, attributes: Vec<(String, String)>, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name,
            attributes,
            parent,
            ..Node::default()
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes[id.0]
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        &self.nodes[id.0].attributes
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Direct children named `tag` (`*` for any)
    pub fn children_named(&self, id: NodeId, tag: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| tag == "*" || self.name(c) == tag)
            .collect()
    }

    /// True while the element is reachable from the root
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if self.nodes[c.0].detached {
                return false;
            }
            current = self.nodes[c.0].parent;
        }
        self.root.is_some()
    }

    /// `id` and all its descendants, document order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// All elements named `tag` (`*` for any), document order
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        match self.root {
            Some(root) => self
                .descendants(root)
                .into_iter()
                .filter(|&id| tag == "*" || self.name(id) == tag)
                .collect(),
            None => Vec::new(),
        }
    }

    /// First element named `tag`, optionally with `attr` equal to `value`
    pub fn element(&self, tag: &str, attr: Option<(&str, &str)>) -> Option<NodeId> {
        self.elements_by_tag(tag).into_iter().find(|&id| match attr {
            Some((key, value)) => self.attribute(id, key) == Some(value),
            None => true,
        })
    }

    /// Absolute location of an element, e.g. `/Contacts/Business/phone`
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            names.push(self.name(c));
            current = self.parent(c);
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Evaluate an XPath subset expression, document order without duplicates
    pub fn select(&self, path: &XPath) -> Vec<NodeId> {
        let Some(root) = self.root else {
            return Vec::new();
        };

        // `None` stands for the document node above the root
        let mut context: Vec<Option<NodeId>> = vec![None];
        for step in path.steps() {
            let mut next = Vec::new();
            let mut seen = HashSet::new();
            for ctx in &context {
                let candidates: Vec<NodeId> = match (ctx, step.descendant) {
                    (None, false) => vec![root],
                    (None, true) => self.descendants(root),
                    (Some(id), false) => self.children(*id).to_vec(),
                    (Some(id), true) => self
                        .children(*id)
                        .iter()
                        .flat_map(|&c| self.descendants(c))
                        .collect(),
                };
                let mut matched: Vec<NodeId> = candidates
                    .into_iter()
                    .filter(|&c| step.matches_name(self.name(c)))
                    .collect();
                for predicate in &step.predicates {
                    matched = self.apply_predicate(matched, predicate);
                }
                for id in matched {
                    if seen.insert(id) {
                        next.push(Some(id));
                    }
                }
            }
            context = next;
        }

        let selected: HashSet<NodeId> = context.into_iter().flatten().collect();
        self.descendants(root)
            .into_iter()
            .filter(|id| selected.contains(id))
            .collect()
    }

    fn apply_predicate(&self, nodes: Vec<NodeId>, predicate: &Predicate) -> Vec<NodeId> {
        match predicate {
            Predicate::Position(n) => nodes.get(n - 1).copied().into_iter().collect(),
            Predicate::AttributeEquals(key, value) => nodes
                .into_iter()
                .filter(|&id| self.attribute(id, key) == Some(value.as_str()))
                .collect(),
            Predicate::HasAttribute(key) => nodes
                .into_iter()
                .filter(|&id| self.attribute(id, key).is_some())
                .collect(),
            Predicate::ChildEquals(tag, value) => nodes
                .into_iter()
                .filter(|&id| {
                    self.children_named(id, tag)
                        .iter()
                        .any(|&c| self.text(c) == value)
                })
                .collect(),
        }
    }

    // =========================================================================
    // Editing
    // =========================================================================

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].text = text.into();
    }

    /// Set or create an attribute
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        let value = value.into();
        let attributes = &mut self.nodes[id.0].attributes;
        match attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => attributes.push((key.to_string(), value)),
        }
    }

    /// Append a new child element and return its id
    pub fn add_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.alloc(tag.to_string(), Vec::new(), Some(parent))
    }

    /// Detach an element (and its subtree) from the document.
    ///
    /// Removing the root empties the document.
    pub fn remove(&mut self, id: NodeId) {
        self.nodes[id.0].detached = true;
        match self.nodes[id.0].parent {
            Some(parent) => self.nodes[parent.0].children.retain(|&c| c != id),
            None => {
                if self.root == Some(id) {
                    self.root = None;
                }
            }
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn to_xml_string(&self, pretty: bool) -> TreeResult<String> {
        let mut writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        if self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        if let Some(root) = self.root {
            self.write_node(&mut writer, root)?;
        }
        String::from_utf8(writer.into_inner()).map_err(|e| TreeError::Malformed(e.to_string()))
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> TreeResult<()> {
        let node = &self.nodes[id.0];
        let mut start = BytesStart::new(node.name.as_str());
        for (key, value) in &node.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if node.children.is_empty() && node.text.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !node.text.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&node.text)))?;
        }
        for &child in &node.children {
            self.write_node(writer, child)?;
        }
        writer.write_event(Event::End(BytesEnd::new(node.name.as_str())))?;
        Ok(())
    }

    /// Write the document to `path`, replacing its content
    pub fn save(&self, path: impl AsRef<Path>, pretty: bool) -> TreeResult<()> {
        std::fs::write(path, self.to_xml_string(pretty)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Contacts>
  <Private>
    <phone type="mobile">111</phone>
    <phone type="home">222</phone>
  </Private>
  <Business>
    <phone type="mobile">333</phone>
    <name>ACME &amp; Co</name>
  </Business>
</Contacts>"#;

    fn texts(doc: &XmlDocument, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| doc.text(id).to_string()).collect()
    }

    #[test]
    fn test_parse_structure() {
        let doc = XmlDocument::parse(CONTACTS).unwrap();
        let root = doc.root().unwrap();
        assert_eq!(doc.name(root), "Contacts");
        assert_eq!(doc.children(root).len(), 2);

        let name = doc.element("name", None).unwrap();
        assert_eq!(doc.text(name), "ACME & Co");
        assert_eq!(doc.path_of(name), "/Contacts/Business/name");
    }

    #[test]
    fn test_elements_by_tag_document_order() {
        let doc = XmlDocument::parse(CONTACTS).unwrap();
        let phones = doc.elements_by_tag("phone");
        assert_eq!(texts(&doc, &phones), vec!["111", "222", "333"]);
    }

    #[test]
    fn test_select_paths() {
        let doc = XmlDocument::parse(CONTACTS).unwrap();
        let select = |p: &str| texts(&doc, &doc.select(&p.parse().unwrap()));

        assert_eq!(select("/Contacts/Business/phone"), vec!["333"]);
        assert_eq!(select("//phone[@type='mobile']"), vec!["111", "333"]);
        assert_eq!(select("/Contacts/*/phone[2]"), vec!["222"]);
        assert_eq!(select("/Contacts/*[name='ACME & Co']/phone"), vec!["333"]);
        assert!(select("/Other").is_empty());
    }

    #[test]
    fn test_edit_and_serialize() {
        let mut doc = XmlDocument::parse(CONTACTS).unwrap();
        let business = doc.element("Business", None).unwrap();
        let fax = doc.add_element(business, "fax");
        doc.set_text(fax, "444");
        doc.set_attribute(fax, "type", "work");

        let home = doc.element("phone", Some(("type", "home"))).unwrap();
        doc.remove(home);
        assert!(!doc.is_attached(home));

        let xml = doc.to_xml_string(true).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"<fax type="work">444</fax>"#));
        assert!(!xml.contains("222"));
        assert!(xml.contains("ACME &amp; Co"));

        let reparsed = XmlDocument::parse(&xml).unwrap();
        assert_eq!(reparsed.elements_by_tag("phone").len(), 2);
    }

    #[test]
    fn test_empty_element_round_trip() {
        let mut doc = XmlDocument::with_root("root");
        let root = doc.root().unwrap();
        let item = doc.add_element(root, "item");
        doc.set_attribute(item, "id", "1");

        let xml = doc.to_xml_string(false).unwrap();
        assert!(xml.ends_with(r#"<root><item id="1"/></root>"#));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("<a>").is_err());
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_save_file() {
        let doc = XmlDocument::parse(CONTACTS).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.xml");
        doc.save(&path, true).unwrap();

        let reread = XmlDocument::open(&path).unwrap();
        assert_eq!(reread.elements_by_tag("*").len(), doc.elements_by_tag("*").len());
    }
}
