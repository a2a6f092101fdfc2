//! A single filter predicate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::operator::{parse_number, Operator};
use crate::error::{FilterError, FilterResult};

/// Values that make a rule match anything
pub const WILDCARDS: [&str; 2] = ["*", "%"];

/// Separator between several values in a textual rule
pub const VALUE_SEPARATOR: char = '|';

/// How a rule joins the previous one when rendered as a query string.
///
/// In-memory evaluation is always a strict AND chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Concatenation {
    #[default]
    And,
    Or,
}

impl fmt::Display for Concatenation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concatenation::And => f.write_str("AND"),
            Concatenation::Or => f.write_str("OR"),
        }
    }
}

/// Predicate on one header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterRule {
    header: String,
    operator: Operator,
    values: Vec<String>,
    concatenation: Concatenation,
    #[serde(skip)]
    rule_string: String,
}

impl FilterRule {
    /// Build a rule, validating the values against the operator.
    ///
    /// Numeric operators reject values that do not parse as numbers; BETWEEN
    /// requires exactly two values; every rule needs at least one value.
    pub fn new<I, S>(header: impl Into<String>, operator: Operator, values: I) -> FilterResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let header = header.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();

        if values.is_empty() {
            return Err(FilterError::MissingValues(header));
        }
        if operator == Operator::Between && values.len() != 2 && !values.iter().any(|v| is_wildcard(v)) {
            return Err(FilterError::BetweenArity(values.len()));
        }
        if operator.is_numeric() {
            if let Some(bad) = values
                .iter()
                .find(|v| !is_wildcard(v) && parse_number(v).is_none())
            {
                return Err(FilterError::NonNumericValue {
                    operator: operator.to_string(),
                    value: bad.clone(),
                });
            }
        }

        let mut rule = Self {
            header,
            operator,
            values,
            concatenation: Concatenation::And,
            rule_string: String::new(),
        };
        rule.rule_string = rule.render();
        Ok(rule)
    }

    /// Shorthand for a single-value rule
    pub fn single(header: impl Into<String>, operator: Operator, value: impl Into<String>) -> FilterResult<Self> {
        Self::new(header, operator, [value.into()])
    }

    pub fn with_concatenation(mut self, concatenation: Concatenation) -> Self {
        self.concatenation = concatenation;
        self
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn concatenation(&self) -> Concatenation {
        self.concatenation
    }

    /// Query-string rendering, computed once at construction
    pub fn rule_string(&self) -> &str {
        &self.rule_string
    }

    /// True if any value is a wildcard
    pub fn is_wildcard(&self) -> bool {
        self.values.iter().any(|v| is_wildcard(v))
    }

    /// Test a candidate value.
    ///
    /// A wildcard matches anything; otherwise the rule matches if any single
    /// value matches (BETWEEN uses its two values as bounds).
    pub fn matches_value(&self, candidate: &str) -> bool {
        if self.is_wildcard() {
            return true;
        }
        match self.operator {
            Operator::Between => match self.values.as_slice() {
                [lower, upper] => Operator::test_range(candidate, lower, upper),
                _ => false,
            },
            op => self.values.iter().any(|v| op.test(candidate, v)),
        }
    }

    fn render(&self) -> String {
        let column = if self.operator.ignores_case() {
            format!("UPPER({})", self.header)
        } else {
            self.header.clone()
        };
        let quote = |v: &str| {
            let v = if self.operator.ignores_case() { v.to_uppercase() } else { v.to_string() };
            format!("'{}'", v.replace('\'', "''"))
        };

        match self.operator {
            Operator::In => {
                let list: Vec<String> = self.values.iter().map(|v| quote(v)).collect();
                format!("{} IN ({})", column, list.join(", "))
            }
            Operator::Between => match self.values.as_slice() {
                [lower, upper] => format!("{} BETWEEN {} AND {}", column, quote(lower), quote(upper)),
                _ => format!("{} LIKE '%'", column),
            },
            op => {
                let mut parts: Vec<String> = self
                    .values
                    .iter()
                    .map(|v| {
                        let (symbol, rhs) = match op {
                            Operator::Contains | Operator::ContainsIgnoreCase => ("LIKE", quote(&format!("%{}%", v))),
                            Operator::StartsWith | Operator::StartsWithIgnoreCase => ("LIKE", quote(&format!("{}%", v))),
                            Operator::EndsWith | Operator::EndsWithIgnoreCase => ("LIKE", quote(&format!("%{}", v))),
                            Operator::NotEquals | Operator::NotEqualsIgnoreCase => ("<>", quote(v)),
                            Operator::GreaterThan => (">", v.clone()),
                            Operator::LessThan => ("<", v.clone()),
                            Operator::DateAfter => (">", quote(v)),
                            Operator::DateBefore => ("<", quote(v)),
                            Operator::ContainsDate => ("LIKE", quote(&format!("{}%", v))),
                            _ => ("=", quote(v)),
                        };
                        format!("{} {} {}", column, symbol, rhs)
                    })
                    .collect();
                if parts.len() == 1 {
                    parts.remove(0)
                } else {
                    format!("({})", parts.join(" OR "))
                }
            }
        }
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule_string)
    }
}

/// Parse `<header> <OPERATOR> <value>[|<value>...]`.
///
/// The header may contain spaces; the first token after it that names an
/// operator splits header from values.
impl FromStr for FilterRule {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let split = tokens
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, t)| t.parse::<Operator>().is_ok())
            .map(|(i, _)| i)
            .ok_or_else(|| FilterError::InvalidRule(s.to_string()))?;

        let header = tokens[..split].join(" ");
        let operator: Operator = tokens[split].parse()?;
        let raw_values = tokens[split + 1..].join(" ");
        if raw_values.is_empty() {
            return Err(FilterError::MissingValues(header));
        }
        let values: Vec<String> = raw_values
            .split(VALUE_SEPARATOR)
            .map(|v| v.trim().to_string())
            .collect();

        Self::new(header, operator, values)
    }
}

impl<'de> Deserialize<'de> for FilterRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawRule {
            header: String,
            operator: Operator,
            values: Vec<String>,
            #[serde(default)]
            concatenation: Concatenation,
        }

        let raw = RawRule::deserialize(deserializer)?;
        FilterRule::new(raw.header, raw.operator, raw.values)
            .map(|r| r.with_concatenation(raw.concatenation))
            .map_err(serde::de::Error::custom)
    }
}

fn is_wildcard(value: &str) -> bool {
    WILDCARDS.contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_rule_rejects_text() {
        let result = FilterRule::single("Age", Operator::GreaterThan, "old");
        assert!(matches!(result, Err(FilterError::NonNumericValue { .. })));

        assert!(FilterRule::single("Age", Operator::LessThan, "42").is_ok());
    }

    #[test]
    fn test_between_arity() {
        let result = FilterRule::new("Age", Operator::Between, ["1"]);
        assert_eq!(result.unwrap_err(), FilterError::BetweenArity(1));
    }

    #[test]
    fn test_empty_values_rejected() {
        let result = FilterRule::new("City", Operator::Equals, Vec::<String>::new());
        assert!(matches!(result, Err(FilterError::MissingValues(_))));
    }

    #[test]
    fn test_any_value_matches() {
        let rule = FilterRule::new("City", Operator::Equals, ["Linz", "Graz"]).unwrap();
        assert!(rule.matches_value("Graz"));
        assert!(rule.matches_value("Linz"));
        assert!(!rule.matches_value("Wien"));
    }

    #[test]
    fn test_wildcards_match_empty() {
        for w in WILDCARDS {
            let rule = FilterRule::single("City", Operator::Equals, w).unwrap();
            assert!(rule.matches_value(""));
            assert!(rule.matches_value("anything"));
        }
    }

    #[test]
    fn test_rule_string() {
        let rule = FilterRule::single("City", Operator::Equals, "Linz").unwrap();
        assert_eq!(rule.rule_string(), "City = 'Linz'");

        let rule = FilterRule::new("City", Operator::In, ["Linz", "Graz"]).unwrap();
        assert_eq!(rule.rule_string(), "City IN ('Linz', 'Graz')");

        let rule = FilterRule::new("Name", Operator::StartsWithIgnoreCase, ["an", "bo"]).unwrap();
        assert_eq!(rule.rule_string(), "(UPPER(Name) LIKE 'AN%' OR UPPER(Name) LIKE 'BO%')");
    }

    #[test]
    fn test_parse_rule() {
        let rule: FilterRule = "Postal Code EQUALS 4020|4030".parse().unwrap();
        assert_eq!(rule.header(), "Postal Code");
        assert_eq!(rule.operator(), Operator::Equals);
        assert_eq!(rule.values(), &["4020", "4030"]);

        assert!("City".parse::<FilterRule>().is_err());
        assert!("City EQUALS".parse::<FilterRule>().is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: FilterRule = serde_json::from_str(
            r#"{"header": "Age", "operator": "GREATER_THAN", "values": ["18"], "concatenation": "OR"}"#,
        )
        .unwrap();
        assert_eq!(ok.concatenation(), Concatenation::Or);

        let bad = serde_json::from_str::<FilterRule>(
            r#"{"header": "Age", "operator": "GREATER_THAN", "values": ["adult"]}"#,
        );
        assert!(bad.is_err());
    }
}
