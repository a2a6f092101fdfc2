//! Tabular-style verbs over JSON and YAML documents.
//!
//! Both syntaxes are held as a [`serde_json::Value`]; YAML is converted on
//! read (non-string keys become their textual form, tags are dropped) and
//! serialized back with `serde_yaml`. Repeated elements are arrays: a key
//! whose value is an array yields one candidate per item.

use serde_json::{Map, Number, Value};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use super::path::{join_segments, split_value_path, Segment};
use super::{filter_candidates, Fields, Scope, TreeElement};
use crate::config::ContainerOptions;
use crate::diagnostics::{Diagnostics, LogEntry};
use crate::error::{ContainerResult, TreeResult};
use crate::filter::Filter;
use crate::tabular::TabularAdapter;

/// Serialization syntax of a value tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueSyntax {
    #[default]
    Json,
    Yaml,
}

impl fmt::Display for ValueSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSyntax::Json => f.write_str("JSON"),
            ValueSyntax::Yaml => f.write_str("YAML"),
        }
    }
}

/// Parse `content` into a value tree
pub fn parse_value(content: &str, syntax: ValueSyntax) -> TreeResult<Value> {
    match syntax {
        ValueSyntax::Json => Ok(serde_json::from_str(content)?),
        ValueSyntax::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
            Ok(yaml_to_json(yaml))
        }
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Text of a value; nested objects and arrays as compact JSON
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// New value for a slot, keeping the slot's scalar type when `raw` parses
fn coerce(existing: &Value, raw: &str) -> Value {
    match existing {
        Value::Number(_) => {
            if let Ok(i) = raw.trim().parse::<i64>() {
                return Value::from(i);
            }
            raw.trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or_else(|| Value::String(raw.to_string()), Value::Number)
        }
        Value::Bool(_) => raw
            .trim()
            .parse::<bool>()
            .map_or_else(|_| Value::String(raw.to_string()), Value::Bool),
        _ => Value::String(raw.to_string()),
    }
}

fn navigate<'a>(root: &'a Value, path: &[Segment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |current, seg| match (current, seg) {
        (Value::Object(map), Segment::Key(k)) => map.get(k),
        (Value::Array(items), Segment::Index(i)) => items.get(*i),
        _ => None,
    })
}

fn navigate_mut<'a>(root: &'a mut Value, path: &[Segment]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |current, seg| match (current, seg) {
        (Value::Object(map), Segment::Key(k)) => map.get_mut(k),
        (Value::Array(items), Segment::Index(i)) => items.get_mut(*i),
        _ => None,
    })
}

/// Paths for `value` found under `path`: one per item when it is an array
fn push_flattened(out: &mut Vec<Vec<Segment>>, path: Vec<Segment>, value: &Value) {
    match value {
        Value::Array(items) => {
            for i in 0..items.len() {
                let mut item = path.clone();
                item.push(Segment::Index(i));
                out.push(item);
            }
        }
        _ => out.push(path),
    }
}

fn collect_named(out: &mut Vec<Vec<Segment>>, path: &[Segment], value: &Value, name: &str) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let mut child_path = path.to_vec();
                child_path.push(Segment::Key(key.clone()));
                if key == name {
                    push_flattened(out, child_path.clone(), child);
                }
                collect_named(out, &child_path, child, name);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let mut item_path = path.to_vec();
                item_path.push(Segment::Index(i));
                collect_named(out, &item_path, item, name);
            }
        }
        _ => {}
    }
}

/// JSON or YAML document with the tree verbs
#[derive(Debug, Clone, Default)]
pub struct ValueTreeAdapter {
    root: Value,
    syntax: ValueSyntax,
    options: ContainerOptions,
    diagnostics: Diagnostics,
}

impl ValueTreeAdapter {
    pub fn new(syntax: ValueSyntax, options: ContainerOptions) -> Self {
        Self {
            syntax,
            options,
            ..Self::default()
        }
    }

    pub fn from_value(root: Value, syntax: ValueSyntax, options: ContainerOptions) -> Self {
        Self {
            root,
            syntax,
            options,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn syntax(&self) -> ValueSyntax {
        self.syntax
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
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

    pub fn read_str(&mut self, content: &str) -> TreeResult<()> {
        self.root = parse_value(content, self.syntax)?;
        self.diagnostics
            .success(format!("Parsed {} document", self.syntax));
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
        Ok(match self.syntax {
            ValueSyntax::Json if self.options.pretty => serde_json::to_string_pretty(&self.root)?,
            ValueSyntax::Json => serde_json::to_string(&self.root)?,
            ValueSyntax::Yaml => serde_yaml::to_string(&self.root)?,
        })
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> TreeResult<()> {
        writer.write_all(self.write_string()?.as_bytes())?;
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> TreeResult<()> {
        std::fs::write(path, self.write_string()?)?;
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Walk a slash-joined scope path; warns when it leads nowhere
    fn resolve_scope(&self, raw: &str) -> Option<Vec<Segment>> {
        let mut current = &self.root;
        let mut resolved = Vec::new();
        for part in split_value_path(raw) {
            let next = match current {
                Value::Object(map) => map.get(part).map(|v| (v, Segment::Key(part.to_string()))),
                Value::Array(items) => part
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).map(|v| (v, Segment::Index(i)))),
                _ => None,
            };
            match next {
                Some((value, seg)) => {
                    current = value;
                    resolved.push(seg);
                }
                None => {
                    self.diagnostics
                        .warning(format!("Scope '{}' matches no element", raw));
                    return None;
                }
            }
        }
        Some(resolved)
    }

    fn candidates(&self, name: &str, scope: &Scope) -> Vec<Vec<Segment>> {
        let mut out = Vec::new();
        let Some(raw) = scope.as_path() else {
            collect_named(&mut out, &[], &self.root, name);
            return out;
        };
        let Some(base) = self.resolve_scope(raw) else {
            return out;
        };

        match navigate(&self.root, &base) {
            Some(Value::Object(map)) => {
                if let Some(child) = map.get(name) {
                    let mut path = base.clone();
                    path.push(Segment::Key(name.to_string()));
                    push_flattened(&mut out, path, child);
                }
            }
            Some(Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if let Some(child) = item.as_object().and_then(|m| m.get(name)) {
                        let mut path = base.clone();
                        path.push(Segment::Index(i));
                        path.push(Segment::Key(name.to_string()));
                        push_flattened(&mut out, path, child);
                    }
                }
            }
            _ => {}
        }
        out
    }

    fn fields(value: &Value, name: &str) -> Fields {
        let mut fields = Fields::new();
        if let Value::Object(map) = value {
            for (key, member) in map {
                fields.insert(key.clone(), value_text(member));
            }
        }
        fields.insert(name.to_string(), value_text(value));
        fields
    }

    /// Paths of the matching values
    pub fn find(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<Vec<Segment>>> {
        let candidates: Vec<(Vec<Segment>, Fields)> = self
            .candidates(name, scope)
            .into_iter()
            .filter_map(|path| {
                let fields = Self::fields(navigate(&self.root, &path)?, name);
                Some((path, fields))
            })
            .collect();
        Ok(filter_candidates(candidates, name, filter)?)
    }

    pub fn get(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<TreeElement>> {
        Ok(self
            .find(name, scope, filter)?
            .into_iter()
            .filter_map(|path| {
                let value = navigate(&self.root, &path)?;
                let attributes = match value {
                    Value::Object(map) => map
                        .iter()
                        .filter(|(_, v)| !v.is_object() && !v.is_array())
                        .map(|(k, v)| (k.clone(), value_text(v)))
                        .collect(),
                    _ => Vec::new(),
                };
                Some(TreeElement {
                    path: join_segments(&path),
                    name: name.to_string(),
                    text: value_text(value),
                    attributes,
                })
            })
            .collect())
    }

    /// Matching values as clones
    pub fn get_values(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<Vec<Value>> {
        Ok(self
            .find(name, scope, filter)?
            .iter()
            .filter_map(|path| navigate(&self.root, path).cloned())
            .collect())
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    fn write_scope(&self, verb: &str, scope: &Scope) -> Option<Vec<Segment>> {
        match scope.as_path() {
            Some(raw) => self.resolve_scope(raw),
            None => {
                self.diagnostics
                    .warning(format!("{} skipped: no scope path given", verb));
                None
            }
        }
    }

    /// Add `name: value` to the scope object.
    ///
    /// An existing key turns into (or extends) an array; a scope array gets a
    /// new `{name: value}` item.
    pub fn add(&mut self, name: &str, value: &str, scope: &Scope) -> ContainerResult<usize> {
        let Some(base) = self.write_scope("add", scope) else {
            return Ok(0);
        };
        let new_value = Value::String(value.to_string());

        match navigate_mut(&mut self.root, &base) {
            Some(Value::Object(map)) => match map.get_mut(name) {
                None => {
                    map.insert(name.to_string(), new_value);
                }
                Some(Value::Array(items)) => items.push(new_value),
                Some(existing) => {
                    let old = existing.take();
                    *existing = Value::Array(vec![old, new_value]);
                }
            },
            Some(Value::Array(items)) => {
                let mut item = Map::new();
                item.insert(name.to_string(), new_value);
                items.push(Value::Object(item));
            }
            _ => {
                self.diagnostics
                    .warning(format!("add skipped: '{}' is not an object or array", scope));
                return Ok(0);
            }
        }
        Ok(1)
    }

    /// Replace the first (or every) matching value, keeping scalar types
    pub fn set(&mut self, name: &str, value: &str, scope: &Scope, filter: &Filter, all: bool) -> ContainerResult<usize> {
        if self.write_scope("set", scope).is_none() {
            return Ok(0);
        }
        let mut targets = self.find(name, scope, filter)?;
        if !all {
            targets.truncate(1);
        }
        let mut count = 0;
        for path in &targets {
            if let Some(slot) = navigate_mut(&mut self.root, path) {
                *slot = coerce(slot, value);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Remove matching values; with `value`, only those whose text equals it
    pub fn delete(&mut self, name: &str, value: Option<&str>, scope: &Scope, filter: &Filter) -> ContainerResult<usize> {
        if self.write_scope("delete", scope).is_none() {
            return Ok(0);
        }
        let mut targets: Vec<Vec<Segment>> = self
            .find(name, scope, filter)?
            .into_iter()
            .filter(|path| match value {
                Some(v) => navigate(&self.root, path).map(value_text).as_deref() == Some(v),
                None => true,
            })
            .collect();

        // deepest and highest indexes first so earlier paths stay valid
        targets.sort();
        targets.reverse();

        let mut count = 0;
        for path in &targets {
            let Some((last, parent)) = path.split_last() else {
                continue;
            };
            let removed = match (navigate_mut(&mut self.root, parent), last) {
                (Some(Value::Object(map)), Segment::Key(k)) => map.remove(k).is_some(),
                (Some(Value::Array(items)), Segment::Index(i)) if *i < items.len() => {
                    items.remove(*i);
                    true
                }
                _ => false,
            };
            if removed {
                count += 1;
            }
        }
        Ok(count)
    }

    // =========================================================================
    // Projection
    // =========================================================================

    /// One row per matching value; objects contribute their keys as headers
    pub fn project(&self, name: &str, scope: &Scope, filter: &Filter) -> ContainerResult<TabularAdapter> {
        let mut table = TabularAdapter::new(self.options.clone());
        for path in self.find(name, scope, filter)? {
            let Some(value) = navigate(&self.root, &path) else {
                continue;
            };
            match value {
                Value::Object(map) => {
                    table.add_record(map.iter().map(|(k, v)| (k.as_str(), value_text(v))));
                }
                other => table.add_record([(name, value_text(other))]),
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterRule, Operator};
    use serde_json::json;

    fn contacts() -> ValueTreeAdapter {
        let mut tree = ValueTreeAdapter::default();
        tree.read_str(
            r#"{
                "Contacts": {
                    "Private": {"phone": ["111", "222"]},
                    "Business": {"phone": "333", "employees": 12}
                }
            }"#,
        )
        .unwrap();
        tree
    }

    fn people() -> ValueTreeAdapter {
        let mut tree = ValueTreeAdapter::new(ValueSyntax::Yaml, ContainerOptions::default());
        tree.read_str("people:\n  - person: {name: Ann, city: Linz}\n  - person: {name: Bo, city: Graz}\n")
            .unwrap();
        tree
    }

    fn texts(elements: &[TreeElement]) -> Vec<&str> {
        elements.iter().map(|e| e.text.as_str()).collect()
    }

    #[test]
    fn test_scoped_get() {
        let tree = contacts();
        let business = tree.get("phone", &Scope::path("/Contacts/Business"), &Filter::new()).unwrap();
        assert_eq!(texts(&business), vec!["333"]);

        let all = tree.get("phone", &Scope::Document, &Filter::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|e| e.path == "/Contacts/Private/phone/1"));
    }

    #[test]
    fn test_array_scope_and_filter() {
        let tree = people();
        let filter = Filter::new().with_rule(FilterRule::single("city", Operator::Equals, "Graz").unwrap());
        let found = tree.get("person", &Scope::path("/people"), &filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/people/1/person");
        assert!(found[0].attributes.contains(&("name".to_string(), "Bo".to_string())));
    }

    #[test]
    fn test_unknown_scope_warns() {
        let tree = contacts();
        assert!(tree.get("phone", &Scope::path("/Contacts/Other"), &Filter::new()).unwrap().is_empty());
        assert_eq!(tree.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_set_keeps_number_type() {
        let mut tree = contacts();
        let business = Scope::path("/Contacts/Business");
        tree.set("employees", "15", &business, &Filter::new(), false).unwrap();
        assert_eq!(tree.root()["Contacts"]["Business"]["employees"], json!(15));

        tree.set("employees", "many", &business, &Filter::new(), false).unwrap();
        assert_eq!(tree.root()["Contacts"]["Business"]["employees"], json!("many"));
    }

    #[test]
    fn test_add_grows_arrays() {
        let mut tree = contacts();
        let business = Scope::path("/Contacts/Business");
        tree.add("fax", "444", &business).unwrap();
        tree.add("phone", "555", &business).unwrap();

        let node = &tree.root()["Contacts"]["Business"];
        assert_eq!(node["fax"], json!("444"));
        assert_eq!(node["phone"], json!(["333", "555"]));

        tree.add("phone", "666", &Scope::path("/Contacts/Private")).unwrap();
        assert_eq!(tree.root()["Contacts"]["Private"]["phone"], json!(["111", "222", "666"]));
    }

    #[test]
    fn test_delete_values() {
        let mut tree = contacts();
        let private = Scope::path("/Contacts/Private");
        assert_eq!(tree.delete("phone", Some("111"), &private, &Filter::new()).unwrap(), 1);
        assert_eq!(tree.root()["Contacts"]["Private"]["phone"], json!(["222"]));

        let mut tree = people();
        assert_eq!(tree.delete("person", None, &Scope::path("/people"), &Filter::new()).unwrap(), 2);
        assert_eq!(tree.root()["people"], json!([{}, {}]));
    }

    #[test]
    fn test_document_scope_write_is_skipped() {
        let mut tree = contacts();
        assert_eq!(tree.add("fax", "1", &Scope::Document).unwrap(), 0);
        assert_eq!(tree.set("phone", "1", &Scope::Document, &Filter::new(), true).unwrap(), 0);
        assert_eq!(tree.delete("phone", None, &Scope::Document, &Filter::new()).unwrap(), 0);
        assert_eq!(tree.diagnostics().warning_count(), 3);
    }

    #[test]
    fn test_project_objects() {
        let table = people().project("person", &Scope::Document, &Filter::new()).unwrap();
        assert_eq!(table.headers(), &["city", "name"]);
        assert_eq!(table.get_column("name", &Filter::new()).unwrap(), vec!["Ann", "Bo"]);
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut tree = people();
        tree.set("city", "Wien", &Scope::path("/people/0/person"), &Filter::new(), false).unwrap();

        let yaml = tree.write_string().unwrap();
        let mut reread = ValueTreeAdapter::new(ValueSyntax::Yaml, ContainerOptions::default());
        reread.read_str(&yaml).unwrap();
        assert_eq!(reread.root()["people"][0]["person"]["city"], json!("Wien"));
    }

    #[test]
    fn test_yaml_non_string_keys() {
        let value = parse_value("1: one\ntrue: yes\n", ValueSyntax::Yaml).unwrap();
        assert_eq!(value["1"], json!("one"));
        assert_eq!(value["true"], json!("yes"));
    }

    #[test]
    fn test_json_file_round_trip() {
        let tree = contacts();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");
        tree.write_file(&path).unwrap();

        let mut reread = ValueTreeAdapter::default();
        reread.read_file(&path).unwrap();
        assert_eq!(reread.root(), tree.root());
    }
}
