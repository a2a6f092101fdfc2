//! Filter language shared by every adapter.
//!
//! - `operator`: comparison operators and their string/number/date semantics
//! - `rule`: a single predicate on one header
//! - `date`: date layout auto-detection
//!
//! A [`Filter`] is an ordered list of rules evaluated as a strict AND chain:
//! a row matches when every rule has at least one matching value. The
//! AND/OR tag on a rule only affects [`Filter::to_query_string`].
//!
//! ```rust
//! use datahub::{Filter, FilterRule, HeaderIndex, Operator};
//!
//! let headers = HeaderIndex::from_names(["Name", "City"]);
//! let filter = Filter::new().with_rule(FilterRule::single("City", Operator::Equals, "Linz").unwrap());
//!
//! let row = vec!["Ann".to_string(), "Linz".to_string()];
//! assert!(filter.matches(&row, &headers).unwrap());
//! ```

pub mod date;
pub mod operator;
pub mod rule;

pub use operator::Operator;
pub use rule::{Concatenation, FilterRule, VALUE_SEPARATOR, WILDCARDS};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{FilterError, FilterResult};
use crate::header::HeaderIndex;

/// Ordered set of rules plus an optional whitelist of legal headers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    rules: Vec<FilterRule>,
    /// When non-empty, rules on other headers are dropped at insertion
    #[serde(default)]
    plausible_headers: BTreeSet<String>,
}

impl Filter {
    /// Empty filter, matches every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter restricted to the given header names
    pub fn with_plausible_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: Vec::new(),
            plausible_headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a rule.
    ///
    /// Returns false (and drops the rule) if a whitelist is set and does not
    /// contain the rule's header.
    pub fn add_rule(&mut self, rule: FilterRule) -> bool {
        if !self.plausible_headers.is_empty() && !self.plausible_headers.contains(rule.header()) {
            return false;
        }
        self.rules.push(rule);
        true
    }

    /// Builder form of [`Filter::add_rule`]
    pub fn with_rule(mut self, rule: FilterRule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Build and append a rule in one step
    pub fn add<I, S>(&mut self, header: impl Into<String>, operator: Operator, values: I) -> FilterResult<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = FilterRule::new(header, operator, values)?;
        Ok(self.add_rule(rule))
    }

    /// Parse textual rules (`<header> <OPERATOR> <v1>|<v2>`)
    pub fn parse_rules<I, S>(rules: I) -> FilterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for raw in rules {
            filter.add_rule(raw.as_ref().parse()?);
        }
        Ok(filter)
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn plausible_headers(&self) -> &BTreeSet<String> {
        &self.plausible_headers
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Header names referenced by the rules, first occurrence order
    pub fn referenced_headers(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for rule in &self.rules {
            if !seen.contains(&rule.header()) {
                seen.push(rule.header());
            }
        }
        seen
    }

    /// Fail with [`FilterError::UnknownHeader`] unless every rule header is known
    pub fn check_headers<F>(&self, is_known: F) -> FilterResult<()>
    where
        F: Fn(&str) -> bool,
    {
        match self.rules.iter().find(|r| !is_known(r.header())) {
            Some(rule) => Err(FilterError::UnknownHeader(rule.header().to_string())),
            None => Ok(()),
        }
    }

    /// Evaluate the filter against a tabular row.
    ///
    /// Unknown rule headers are a hard error, independent of the row content.
    pub fn matches(&self, row: &[String], headers: &HeaderIndex) -> FilterResult<bool> {
        self.check_headers(|h| headers.contains(h))?;
        Ok(self.matches_with(|header| {
            headers
                .position(header)
                .and_then(|p| row.get(p))
                .map(String::as_str)
        }))
    }

    /// Evaluate the filter with a custom value lookup.
    ///
    /// Header existence is the caller's responsibility; a header the lookup
    /// cannot resolve is compared as the empty string.
    pub fn matches_with<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.rules.iter().all(|rule| {
            let candidate = lookup(rule.header()).unwrap_or("");
            rule.matches_value(candidate)
        })
    }

    /// Render the rules as a SQL-like condition, honouring AND/OR tags
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if i > 0 {
                out.push(' ');
                out.push_str(&rule.concatenation().to_string());
                out.push(' ');
            }
            out.push_str(rule.rule_string());
        }
        out
    }
}

impl FromIterator<FilterRule> for Filter {
    fn from_iter<I: IntoIterator<Item = FilterRule>>(iter: I) -> Self {
        let mut filter = Filter::new();
        for rule in iter {
            filter.add_rule(rule);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> HeaderIndex {
        HeaderIndex::from_names(["Name", "City", "Age"])
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn rule(header: &str, op: Operator, value: &str) -> FilterRule {
        FilterRule::single(header, op, value).unwrap()
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = Filter::new();
        assert!(filter.matches(&row(&["", "", ""]), &headers()).unwrap());
    }

    #[test]
    fn test_and_semantics() {
        let filter = Filter::new()
            .with_rule(rule("City", Operator::Equals, "Linz"))
            .with_rule(rule("Age", Operator::GreaterThan, "30"));

        assert!(filter.matches(&row(&["Ann", "Linz", "41"]), &headers()).unwrap());
        assert!(!filter.matches(&row(&["Ann", "Linz", "22"]), &headers()).unwrap());
        assert!(!filter.matches(&row(&["Ann", "Graz", "41"]), &headers()).unwrap());
    }

    #[test]
    fn test_or_within_rule_and_across_rules() {
        let mut filter = Filter::new();
        filter.add("City", Operator::Equals, ["Linz", "Graz"]).unwrap();
        filter.add("Name", Operator::StartsWith, ["A"]).unwrap();

        assert!(filter.matches(&row(&["Ann", "Graz", "1"]), &headers()).unwrap());
        assert!(!filter.matches(&row(&["Bo", "Graz", "1"]), &headers()).unwrap());

        // dropping the only matching value flips the result
        let mut narrowed = Filter::new();
        narrowed.add("City", Operator::Equals, ["Linz"]).unwrap();
        narrowed.add("Name", Operator::StartsWith, ["A"]).unwrap();
        assert!(!narrowed.matches(&row(&["Ann", "Graz", "1"]), &headers()).unwrap());
    }

    #[test]
    fn test_or_tag_does_not_change_evaluation() {
        let filter = Filter::new()
            .with_rule(rule("City", Operator::Equals, "Linz"))
            .with_rule(rule("City", Operator::Equals, "Graz").with_concatenation(Concatenation::Or));

        assert!(!filter.matches(&row(&["Ann", "Graz", "1"]), &headers()).unwrap());
        assert_eq!(filter.to_query_string(), "City = 'Linz' OR City = 'Graz'");
    }

    #[test]
    fn test_wildcard_matches_empty_value() {
        let filter = Filter::new().with_rule(rule("City", Operator::Equals, "%"));
        assert!(filter.matches(&row(&["Ann", "", ""]), &headers()).unwrap());
    }

    #[test]
    fn test_unknown_header_is_error() {
        let filter = Filter::new().with_rule(rule("Zip", Operator::Equals, "*"));
        let result = filter.matches(&row(&["Ann", "Linz", "1"]), &headers());
        assert_eq!(result, Err(FilterError::UnknownHeader("Zip".into())));
    }

    #[test]
    fn test_plausible_headers_drop_rules() {
        let mut filter = Filter::with_plausible_headers(["City"]);
        assert!(filter.add_rule(rule("City", Operator::Equals, "Linz")));
        assert!(!filter.add_rule(rule("Zip", Operator::Equals, "4020")));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_parse_rules() {
        let filter = Filter::parse_rules(["City EQUALS Linz", "Age LESS_THAN 50"]).unwrap();
        assert_eq!(filter.referenced_headers(), vec!["City", "Age"]);
        assert!(Filter::parse_rules(["Age GREATER_THAN old"]).is_err());
    }

    #[test]
    fn test_filter_serde() {
        let json = r#"{"rules": [{"header": "City", "operator": "EQUALS", "values": ["Linz"]}]}"#;
        let filter: Filter = serde_json::from_str(json).unwrap();
        assert_eq!(filter.rules()[0].rule_string(), "City = 'Linz'");
    }
}
