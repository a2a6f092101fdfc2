//! Format resolution: explicit, by extension, or by sniffing content.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ContainerError;
use crate::tree::value::{parse_value, ValueSyntax};
use crate::tree::XmlDocument;

/// Data format behind a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Delimited text (CSV and friends)
    Tabular,
    Xml,
    Json,
    Yaml,
}

impl Format {
    pub fn all() -> &'static [Format] {
        &[Format::Tabular, Format::Xml, Format::Json, Format::Yaml]
    }

    /// Tree formats support the scoped verbs instead of the row verbs
    pub fn is_tree(&self) -> bool {
        !matches!(self, Format::Tabular)
    }

    /// Default file extension when writing
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Tabular => "csv",
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    /// Format implied by a file extension, if known
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Format> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Some(Format::Tabular),
            "xml" => Some(Format::Xml),
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Tabular => "CSV",
            Format::Xml => "XML",
            Format::Json => "JSON",
            Format::Yaml => "YAML",
        };
        f.write_str(name)
    }
}

impl FromStr for Format {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "txt" | "tsv" | "tabular" => Ok(Format::Tabular),
            "xml" => Ok(Format::Xml),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(ContainerError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Guess the format of decoded content.
///
/// `<` tries XML, `{`/`[` tries JSON, then YAML is tried and accepted only for
/// a mapping or sequence. Anything else is tabular.
pub fn sniff(content: &str) -> Format {
    let trimmed = content.trim_start();
    match trimmed.chars().next() {
        None => return Format::Tabular,
        Some('<') => {
            if XmlDocument::parse(trimmed).is_ok() {
                return Format::Xml;
            }
        }
        Some('{') | Some('[') => {
            if serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
                return Format::Json;
            }
        }
        _ => {}
    }

    match parse_value(trimmed, ValueSyntax::Yaml) {
        Ok(value) if value.is_object() || value.is_array() => Format::Yaml,
        _ => Format::Tabular,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(Format::from_extension("data/contacts.XML"), Some(Format::Xml));
        assert_eq!(Format::from_extension("a.yml"), Some(Format::Yaml));
        assert_eq!(Format::from_extension("a.txt"), Some(Format::Tabular));
        assert_eq!(Format::from_extension("a.dat"), None);
        assert_eq!(Format::from_extension("noext"), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff("  <a><b/></a>"), Format::Xml);
        assert_eq!(sniff(r#"{"a": 1}"#), Format::Json);
        assert_eq!(sniff("[1, 2]"), Format::Json);
        assert_eq!(sniff("name: Ann\ncity: Linz\n"), Format::Yaml);
        assert_eq!(sniff("- a\n- b\n"), Format::Yaml);
        assert_eq!(sniff("Name;City\nAnn;Linz\n"), Format::Tabular);
        assert_eq!(sniff(""), Format::Tabular);
    }

    #[test]
    fn test_sniff_fallbacks() {
        // broken XML and flow-style YAML
        assert_eq!(sniff("<a;b>\n1;2"), Format::Tabular);
        assert_eq!(sniff("{a: 1}"), Format::Yaml);
    }

    #[test]
    fn test_parse_format_name() {
        assert_eq!("YML".parse::<Format>().unwrap(), Format::Yaml);
        assert!("parquet".parse::<Format>().is_err());
        assert_eq!(Format::Tabular.to_string(), "CSV");
    }
}
