//! Scope expressions for tree documents.
//!
//! XML scopes use a small XPath subset:
//!
//! | Form            | Meaning                                   |
//! |-----------------|-------------------------------------------|
//! | `/a/b`          | child steps from the document             |
//! | `//b`           | `b` at any depth                          |
//! | `*`             | any element name                          |
//! | `b[2]`          | second `b` child of each context element  |
//! | `b[@k='v']`     | `b` with attribute `k` equal to `v`       |
//! | `b[@k]`         | `b` carrying attribute `k`                |
//! | `b[c='v']`      | `b` with a child `c` whose text is `v`    |
//!
//! JSON/YAML scopes are plain slash-joined key/index paths (`/a/0/b`).

use std::fmt;
use std::str::FromStr;

use crate::error::{TreeError, TreeResult};

/// Where a tree operation is applied
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    /// Whole document; read verbs search everywhere, write verbs are skipped
    #[default]
    Document,
    /// Path expression selecting the scope element(s)
    Path(String),
}

impl Scope {
    pub fn path(path: impl Into<String>) -> Self {
        Scope::Path(path.into())
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Scope::Document)
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            Scope::Document => None,
            Scope::Path(p) => Some(p),
        }
    }
}

impl From<&str> for Scope {
    fn from(path: &str) -> Self {
        if path.trim().is_empty() {
            Scope::Document
        } else {
            Scope::Path(path.trim().to_string())
        }
    }
}

impl From<Option<&str>> for Scope {
    fn from(path: Option<&str>) -> Self {
        path.map(Scope::from).unwrap_or_default()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Document => f.write_str("<document>"),
            Scope::Path(p) => f.write_str(p),
        }
    }
}

/// Filter inside `[...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// 1-based position among the step's matches for one context element
    Position(usize),
    AttributeEquals(String, String),
    HasAttribute(String),
    ChildEquals(String, String),
}

/// One location step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// `//` before the step
    pub descendant: bool,
    /// `None` for `*`
    pub name: Option<String>,
    pub predicates: Vec<Predicate>,
}

impl Step {
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.as_deref().map_or(true, |n| n == name)
    }

    fn parse(text: &str, descendant: bool) -> TreeResult<Self> {
        let (name, mut rest) = match text.find('[') {
            Some(i) => (&text[..i], &text[i..]),
            None => (text, ""),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(TreeError::InvalidPath(format!("empty step in '{}'", text)));
        }

        let mut predicates = Vec::new();
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| TreeError::InvalidPath(format!("unclosed '[' in '{}'", text)))?;
            predicates.push(Predicate::parse(&rest[1..close])?);
            rest = rest[close + 1..].trim_start();
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(TreeError::InvalidPath(format!("unexpected '{}' in '{}'", rest, text)));
            }
        }

        Ok(Self {
            descendant,
            name: if name == "*" { None } else { Some(name.to_string()) },
            predicates,
        })
    }
}

impl Predicate {
    fn parse(text: &str) -> TreeResult<Self> {
        let text = text.trim();
        if let Ok(position) = text.parse::<usize>() {
            if position == 0 {
                return Err(TreeError::InvalidPath("positions start at 1".to_string()));
            }
            return Ok(Predicate::Position(position));
        }

        let (lhs, rhs) = match text.split_once('=') {
            Some((l, r)) => (l.trim(), Some(unquote(r.trim()))),
            None => (text, None),
        };
        match (lhs.strip_prefix('@'), rhs) {
            (Some(attr), Some(value)) => Ok(Predicate::AttributeEquals(attr.to_string(), value)),
            (Some(attr), None) => Ok(Predicate::HasAttribute(attr.to_string())),
            (None, Some(value)) if !lhs.is_empty() => Ok(Predicate::ChildEquals(lhs.to_string(), value)),
            _ => Err(TreeError::InvalidPath(format!("unsupported predicate '[{}]'", text))),
        }
    }
}

fn unquote(value: &str) -> String {
    let stripped = value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')));
    stripped.unwrap_or(value).to_string()
}

/// Parsed XPath subset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    steps: Vec<Step>,
}

impl XPath {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl FromStr for XPath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let chars: Vec<char> = trimmed.chars().collect();
        let mut steps = Vec::new();
        let mut i = 0;
        // relative paths search at any depth
        let mut descendant = !trimmed.starts_with('/');

        while i < chars.len() {
            if chars[i] == '/' {
                i += 1;
                if i < chars.len() && chars[i] == '/' {
                    descendant = true;
                    i += 1;
                }
            }
            if i >= chars.len() {
                break;
            }

            let start = i;
            let mut depth = 0usize;
            let mut quote: Option<char> = None;
            while i < chars.len() {
                let c = chars[i];
                match quote {
                    Some(q) if c == q => quote = None,
                    Some(_) => {}
                    None => match c {
                        '\'' | '"' => quote = Some(c),
                        '[' => depth += 1,
                        ']' => depth = depth.saturating_sub(1),
                        '/' if depth == 0 => break,
                        _ => {}
                    },
                }
                i += 1;
            }

            let text: String = chars[start..i].iter().collect();
            steps.push(Step::parse(&text, descendant)?);
            descendant = false;
        }

        if steps.is_empty() {
            return Err(TreeError::InvalidPath(format!("'{}' has no steps", s)));
        }
        Ok(Self { steps })
    }
}

/// Segment of a JSON/YAML path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Split a slash-joined value path into raw parts
pub fn split_value_path(path: &str) -> Vec<&str> {
    path.split('/').map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Render segments back into a slash-joined path
pub fn join_segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push('/');
        out.push_str(&seg.to_string());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path() {
        let path: XPath = "/Contacts/Business".parse().unwrap();
        assert_eq!(path.steps().len(), 2);
        assert!(!path.steps()[0].descendant);
        assert_eq!(path.steps()[1].name.as_deref(), Some("Business"));
    }

    #[test]
    fn test_descendant_and_wildcard() {
        let path: XPath = "//Contacts/*".parse().unwrap();
        assert!(path.steps()[0].descendant);
        assert_eq!(path.steps()[1].name, None);

        let relative: XPath = "phone".parse().unwrap();
        assert!(relative.steps()[0].descendant);
    }

    #[test]
    fn test_predicates() {
        let path: XPath = "/a/b[@type='mobile'][2]/c[name=\"x/y\"]".parse().unwrap();
        let b = &path.steps()[1];
        assert_eq!(
            b.predicates,
            vec![
                Predicate::AttributeEquals("type".into(), "mobile".into()),
                Predicate::Position(2)
            ]
        );
        assert_eq!(
            path.steps()[2].predicates,
            vec![Predicate::ChildEquals("name".into(), "x/y".into())]
        );
    }

    #[test]
    fn test_invalid_paths() {
        assert!("".parse::<XPath>().is_err());
        assert!("/a/b[".parse::<XPath>().is_err());
        assert!("/a/b[0]".parse::<XPath>().is_err());
        assert!("/a/[@x]".parse::<XPath>().is_err());
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!(Scope::from(""), Scope::Document);
        assert_eq!(Scope::from(" /a "), Scope::Path("/a".into()));
    }

    #[test]
    fn test_value_path_split() {
        assert_eq!(split_value_path("/a/0//b/"), vec!["a", "0", "b"]);
        assert_eq!(join_segments(&[Segment::Key("a".into()), Segment::Index(0)]), "/a/0");
        assert_eq!(join_segments(&[]), "/");
    }
}
