//! Container configuration.
//!
//! Options can be built in code, loaded from a JSON file, or overridden from
//! the environment (`DATAHUB_*` variables, `.env` is loaded by the CLI).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{SourceError, SourceResult};

/// Environment variable overriding the field delimiter
pub const ENV_DELIMITER: &str = "DATAHUB_DELIMITER";
/// Environment variable overriding the orientation (`column` or `row`)
pub const ENV_ORIENTATION: &str = "DATAHUB_ORIENTATION";
/// Environment variable overriding the header record index
pub const ENV_HEADER_ROW: &str = "DATAHUB_HEADER_ROW";
/// Environment variable forcing a source encoding
pub const ENV_ENCODING: &str = "DATAHUB_ENCODING";

/// Where the header names live in a delimited source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// First logical record is the header row
    #[default]
    Column,
    /// First field of every line is a header; file columns are rows
    Row,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "column" | "col" | "columns" => Ok(Orientation::Column),
            "row" | "rows" => Ok(Orientation::Row),
            other => Err(format!("unknown orientation '{}'", other)),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Column => write!(f, "column"),
            Orientation::Row => write!(f, "row"),
        }
    }
}

/// Options shared by every adapter a container may build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerOptions {
    /// Field delimiter for delimited sources
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Header orientation for delimited sources
    #[serde(default)]
    pub orientation: Orientation,

    /// Index of the header record (records before it are skipped)
    #[serde(default)]
    pub header_row: usize,

    /// Source encoding (auto-detect if not specified)
    #[serde(default)]
    pub encoding: Option<String>,

    /// Pick the delimiter from the first line instead of `delimiter`
    #[serde(default)]
    pub detect_delimiter: bool,

    /// Indent tree documents when serializing
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_delimiter() -> char {
    ';'
}

fn default_pretty() -> bool {
    true
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            orientation: Orientation::default(),
            header_row: 0,
            encoding: None,
            detect_delimiter: false,
            pretty: default_pretty(),
        }
    }
}

impl ContainerOptions {
    /// Defaults overridden by any `DATAHUB_*` environment variable that parses
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply `DATAHUB_*` environment overrides on top of these options
    pub fn with_env(mut self) -> Self {
        if let Some(d) = std::env::var(ENV_DELIMITER).ok().and_then(|v| parse_delimiter(&v)) {
            self.delimiter = d;
        }
        if let Some(o) = std::env::var(ENV_ORIENTATION).ok().and_then(|v| v.parse().ok()) {
            self.orientation = o;
        }
        if let Some(h) = std::env::var(ENV_HEADER_ROW).ok().and_then(|v| v.trim().parse().ok()) {
            self.header_row = h;
        }
        if let Ok(enc) = std::env::var(ENV_ENCODING) {
            if !enc.trim().is_empty() {
                self.encoding = Some(enc.trim().to_string());
            }
        }
        self
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            SourceError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_header_row(mut self, header_row: usize) -> Self {
        self.header_row = header_row;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}

/// Parse a delimiter given on the command line or in the environment.
///
/// Accepts a single character or the escapes `\t`, `tab`, `comma`, `semicolon`, `pipe`.
pub fn parse_delimiter(raw: &str) -> Option<char> {
    match raw {
        "\\t" | "tab" => Some('\t'),
        "comma" => Some(','),
        "semicolon" => Some(';'),
        "pipe" => Some('|'),
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let opts = ContainerOptions::default();
        assert_eq!(opts.delimiter, ';');
        assert_eq!(opts.orientation, Orientation::Column);
        assert_eq!(opts.header_row, 0);
        assert!(opts.encoding.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"orientation": "row"}}"#).unwrap();

        let opts = ContainerOptions::from_json_file(file.path()).unwrap();
        assert_eq!(opts.orientation, Orientation::Row);
        assert_eq!(opts.delimiter, ';');
        assert!(opts.pretty);
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter("\\t"), Some('\t'));
        assert_eq!(parse_delimiter(","), Some(','));
        assert_eq!(parse_delimiter("pipe"), Some('|'));
        assert_eq!(parse_delimiter(";;"), None);
    }

    #[test]
    fn test_orientation_from_str() {
        assert_eq!("ROW".parse::<Orientation>().unwrap(), Orientation::Row);
        assert_eq!("column".parse::<Orientation>().unwrap(), Orientation::Column);
        assert!("diagonal".parse::<Orientation>().is_err());
    }
}
