//! Comparison operators of the filter language.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::date::parse_date;
use crate::error::FilterError;

/// All comparison operators a [`super::FilterRule`] may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Contains,
    ContainsIgnoreCase,
    StartsWith,
    StartsWithIgnoreCase,
    EndsWith,
    EndsWithIgnoreCase,
    Equals,
    EqualsIgnoreCase,
    NotEquals,
    NotEqualsIgnoreCase,
    /// Numeric `candidate > value`. Both sides parse as `f64`, so decimals and
    /// exponents are accepted alongside integers; a non-numeric candidate
    /// never matches.
    GreaterThan,
    /// Numeric `candidate < value`, parsed as `f64` like [`Operator::GreaterThan`]
    LessThan,
    /// Candidate falls on the same calendar day
    ContainsDate,
    DateAfter,
    DateBefore,
    DateEquals,
    /// Candidate equals one of the values
    In,
    /// Inclusive range between two values
    Between,
}

const ALL: [Operator; 18] = [
    Operator::Contains,
    Operator::ContainsIgnoreCase,
    Operator::StartsWith,
    Operator::StartsWithIgnoreCase,
    Operator::EndsWith,
    Operator::EndsWithIgnoreCase,
    Operator::Equals,
    Operator::EqualsIgnoreCase,
    Operator::NotEquals,
    Operator::NotEqualsIgnoreCase,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::ContainsDate,
    Operator::DateAfter,
    Operator::DateBefore,
    Operator::DateEquals,
    Operator::In,
    Operator::Between,
];

impl Operator {
    /// Every operator, in declaration order
    pub fn all() -> &'static [Operator] {
        &ALL
    }

    /// Canonical upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Contains => "CONTAINS",
            Operator::ContainsIgnoreCase => "CONTAINS_IGNORE_CASE",
            Operator::StartsWith => "STARTS_WITH",
            Operator::StartsWithIgnoreCase => "STARTS_WITH_IGNORE_CASE",
            Operator::EndsWith => "ENDS_WITH",
            Operator::EndsWithIgnoreCase => "ENDS_WITH_IGNORE_CASE",
            Operator::Equals => "EQUALS",
            Operator::EqualsIgnoreCase => "EQUALS_IGNORE_CASE",
            Operator::NotEquals => "NOT_EQUALS",
            Operator::NotEqualsIgnoreCase => "NOT_EQUALS_IGNORE_CASE",
            Operator::GreaterThan => "GREATER_THAN",
            Operator::LessThan => "LESS_THAN",
            Operator::ContainsDate => "CONTAINS_DATE",
            Operator::DateAfter => "DATE_AFTER",
            Operator::DateBefore => "DATE_BEFORE",
            Operator::DateEquals => "DATE_EQUALS",
            Operator::In => "IN",
            Operator::Between => "BETWEEN",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Operator::GreaterThan | Operator::LessThan)
    }

    pub fn is_date(&self) -> bool {
        matches!(
            self,
            Operator::ContainsDate | Operator::DateAfter | Operator::DateBefore | Operator::DateEquals
        )
    }

    pub fn ignores_case(&self) -> bool {
        matches!(
            self,
            Operator::ContainsIgnoreCase
                | Operator::StartsWithIgnoreCase
                | Operator::EndsWithIgnoreCase
                | Operator::EqualsIgnoreCase
                | Operator::NotEqualsIgnoreCase
        )
    }

    /// Compare one candidate against one configured value.
    ///
    /// BETWEEN needs both bounds and is evaluated by [`Operator::test_range`].
    pub fn test(&self, candidate: &str, value: &str) -> bool {
        let candidate = candidate.trim();
        if self.ignores_case() {
            let candidate = candidate.to_uppercase();
            let value = value.to_uppercase();
            return self.test_text(&candidate, &value);
        }
        match self {
            Operator::GreaterThan => compare_numbers(candidate, value) == Some(Ordering::Greater),
            Operator::LessThan => compare_numbers(candidate, value) == Some(Ordering::Less),
            Operator::ContainsDate => match (parse_date(candidate), parse_date(value)) {
                (Some(c), Some(v)) => c.date() == v.date(),
                _ => false,
            },
            Operator::DateAfter => compare_dates(candidate, value) == Some(Ordering::Greater),
            Operator::DateBefore => compare_dates(candidate, value) == Some(Ordering::Less),
            Operator::DateEquals => compare_dates(candidate, value) == Some(Ordering::Equal),
            Operator::In => candidate == value,
            Operator::Between => false,
            _ => self.test_text(candidate, value),
        }
    }

    fn test_text(&self, candidate: &str, value: &str) -> bool {
        match self {
            Operator::Contains | Operator::ContainsIgnoreCase => candidate.contains(value),
            Operator::StartsWith | Operator::StartsWithIgnoreCase => candidate.starts_with(value),
            Operator::EndsWith | Operator::EndsWithIgnoreCase => candidate.ends_with(value),
            Operator::Equals | Operator::EqualsIgnoreCase => candidate == value,
            Operator::NotEquals | Operator::NotEqualsIgnoreCase => candidate != value,
            _ => false,
        }
    }

    /// Inclusive range test used by BETWEEN.
    ///
    /// Numeric when all three sides are numbers, chronological when all three
    /// are dates, lexicographic otherwise.
    pub fn test_range(candidate: &str, lower: &str, upper: &str) -> bool {
        let candidate = candidate.trim();
        if let (Some(c), Some(l), Some(u)) =
            (parse_number(candidate), parse_number(lower), parse_number(upper))
        {
            return l <= c && c <= u;
        }
        if let (Some(c), Some(l), Some(u)) =
            (parse_date(candidate), parse_date(lower), parse_date(upper))
        {
            return l <= c && c <= u;
        }
        lower <= candidate && candidate <= upper
    }
}

/// Parse a configured or candidate value as a number
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare_numbers(candidate: &str, value: &str) -> Option<Ordering> {
    let c = parse_number(candidate)?;
    let v = parse_number(value)?;
    c.partial_cmp(&v)
}

fn compare_dates(candidate: &str, value: &str) -> Option<Ordering> {
    let c = parse_date(candidate)?;
    let v = parse_date(value)?;
    Some(c.cmp(&v))
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace(['-', ' '], "_");
        ALL.iter()
            .copied()
            .find(|op| op.name() == wanted)
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_operators_trim_candidate() {
        assert!(Operator::Equals.test("  Linz ", "Linz"));
        assert!(Operator::StartsWith.test(" Linz", "Li"));
        assert!(Operator::EndsWith.test("Linz  ", "nz"));
        assert!(Operator::Contains.test("Salzburg", "zbu"));
        assert!(!Operator::Equals.test("linz", "Linz"));
    }

    #[test]
    fn test_ignore_case() {
        assert!(Operator::EqualsIgnoreCase.test("linz", "LINZ"));
        assert!(Operator::ContainsIgnoreCase.test("Salzburg", "ZBU"));
        assert!(!Operator::NotEqualsIgnoreCase.test("graz", "GRAZ"));
    }

    #[test]
    fn test_numeric() {
        assert!(Operator::GreaterThan.test("10", "9"));
        assert!(!Operator::GreaterThan.test("9", "10"));
        assert!(Operator::LessThan.test("-3", "0"));
        // non-numeric candidate never matches
        assert!(!Operator::GreaterThan.test("ten", "9"));
    }

    #[test]
    fn test_dates() {
        assert!(Operator::DateAfter.test("05.04.2024", "2024-04-03"));
        assert!(Operator::DateBefore.test("2024-04-01", "03.04.2024"));
        assert!(Operator::DateEquals.test("03.04.2024", "2024-04-03"));
        assert!(Operator::ContainsDate.test("2024-04-03 17:30:00", "03.04.2024"));
        assert!(!Operator::DateEquals.test("2024-04-03 17:30:00", "03.04.2024"));
        assert!(!Operator::DateAfter.test("not a date", "2024-04-03"));
    }

    #[test]
    fn test_between() {
        assert!(Operator::test_range("5", "1", "10"));
        assert!(Operator::test_range("10", "1", "10"));
        assert!(!Operator::test_range("11", "1", "10"));
        assert!(Operator::test_range("2024-02-10", "01.02.2024", "2024-03-01"));
        assert!(Operator::test_range("b", "a", "c"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("equals".parse::<Operator>().unwrap(), Operator::Equals);
        assert_eq!("date-after".parse::<Operator>().unwrap(), Operator::DateAfter);
        assert_eq!("NOT_EQUALS_IGNORE_CASE".parse::<Operator>().unwrap(), Operator::NotEqualsIgnoreCase);
        assert!("LIKE".parse::<Operator>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Operator::StartsWithIgnoreCase).unwrap();
        assert_eq!(json, "\"STARTS_WITH_IGNORE_CASE\"");
        for op in Operator::all() {
            let parsed: Operator = serde_json::from_str(&format!("\"{}\"", op.name())).unwrap();
            assert_eq!(parsed, *op);
        }
    }

    #[test]
    fn test_numeric_operators_accept_decimals() {
        assert!(Operator::GreaterThan.test("2.5", "2"));
        assert!(Operator::LessThan.test(" 1e2 ", "150"));
        assert!(!Operator::LessThan.test("NaN", "1"));
    }
}
