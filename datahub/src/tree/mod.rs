//! Tree adapters for XML, JSON and YAML documents.
//!
//! - `path`: [`Scope`] and the XPath subset used to address scope elements
//! - `xml`: arena DOM on top of `quick-xml`
//! - `xml_adapter`: tabular-style verbs over an [`XmlDocument`]
//! - `value`: the same verbs over JSON/YAML value trees
//!
//! Read verbs (`get`, `project`) accept [`Scope::Document`] and search the
//! whole tree. Write verbs (`add`, `set`, `delete`) need a [`Scope::Path`];
//! without one they are skipped with a warning.
//!
//! Filter rules address an element by:
//! - `@name`: attribute value (XML only)
//! - the element's own tag/key: its text
//! - a child tag or object key: that child's text

pub mod path;
pub mod value;
pub mod xml;
pub mod xml_adapter;

pub use path::{Scope, Segment, XPath};
pub use value::{ValueSyntax, ValueTreeAdapter};
pub use xml::{NodeId, XmlDocument};
pub use xml_adapter::XmlAdapter;

use serde::Serialize;
use std::collections::HashMap;

use crate::error::FilterResult;
use crate::filter::Filter;

/// Snapshot of one matched element
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeElement {
    /// Absolute location (`/Contacts/Business/phone`, `/items/0/name`)
    pub path: String,
    pub name: String,
    /// Own text; nested objects are rendered as compact JSON
    pub text: String,
    /// XML attributes, or scalar members of a JSON/YAML object
    pub attributes: Vec<(String, String)>,
}

/// Per-candidate values a filter rule can address
pub(crate) type Fields = HashMap<String, String>;

/// Keep the candidates whose fields satisfy `filter`.
///
/// A rule header must be an `@attribute`, the tag itself, or a field of at
/// least one candidate; anything else is [`crate::FilterError::UnknownHeader`].
/// Without candidates there is nothing to check headers against, and the
/// result is empty.
pub(crate) fn filter_candidates<T>(
    candidates: Vec<(T, Fields)>,
    tag: &str,
    filter: &Filter,
) -> FilterResult<Vec<T>> {
    if filter.is_empty() || candidates.is_empty() {
        return Ok(candidates.into_iter().map(|(c, _)| c).collect());
    }

    filter.check_headers(|header| {
        header.starts_with('@')
            || header == tag
            || candidates.iter().any(|(_, fields)| fields.contains_key(header))
    })?;

    Ok(candidates
        .into_iter()
        .filter(|(_, fields)| filter.matches_with(|h| fields.get(h).map(String::as_str)))
        .map(|(c, _)| c)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::filter::{FilterRule, Operator};

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_filter_candidates() {
        let candidates = vec![
            (1, fields(&[("phone", "111"), ("@type", "mobile")])),
            (2, fields(&[("phone", "222"), ("@type", "home")])),
        ];
        let filter = Filter::new().with_rule(FilterRule::single("@type", Operator::Equals, "home").unwrap());
        assert_eq!(filter_candidates(candidates, "phone", &filter).unwrap(), vec![2]);
    }

    #[test]
    fn test_unknown_rule_header() {
        let candidates = vec![(1, fields(&[("phone", "111")]))];
        let filter = Filter::new().with_rule(FilterRule::single("zip", Operator::Equals, "*").unwrap());
        assert_eq!(
            filter_candidates(candidates, "phone", &filter),
            Err(FilterError::UnknownHeader("zip".into()))
        );
    }

    #[test]
    fn test_no_candidates_is_empty_result() {
        let filter = Filter::new().with_rule(FilterRule::single("name", Operator::Equals, "x").unwrap());
        let none: Vec<(u8, Fields)> = Vec::new();
        assert_eq!(filter_candidates(none, "p", &filter), Ok(Vec::new()));
    }
}
