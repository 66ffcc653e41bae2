//! Label matchers
//!
//! `name="v"`, `name!="v"`, `name=~"re"`, `name!~"re"`. Regexes are fully
//! anchored. A label missing from a set matches as the empty string.

use crate::chunk::Labels;
use crate::querier::error::{QueryError, QueryResult};
use regex::Regex;
use std::fmt;

/// Comparison applied by a matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Equal,
    NotEqual,
    Regex,
    NotRegex,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchType::Equal => write!(f, "="),
            MatchType::NotEqual => write!(f, "!="),
            MatchType::Regex => write!(f, "=~"),
            MatchType::NotRegex => write!(f, "!~"),
        }
    }
}

/// Selects series by one label
#[derive(Debug, Clone)]
pub struct Matcher {
    pub match_type: MatchType,
    pub name: String,
    pub value: String,
    re: Option<Regex>,
}

impl Matcher {
    /// Build a matcher, compiling the regex for the regex types
    pub fn new(
        match_type: MatchType,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> QueryResult<Self> {
        let value = value.into();
        let re = match match_type {
            MatchType::Regex | MatchType::NotRegex => Some(
                Regex::new(&format!("^(?:{})$", value))
                    .map_err(|e| QueryError::InvalidMatcher(e.to_string()))?,
            ),
            MatchType::Equal | MatchType::NotEqual => None,
        };

        Ok(Self {
            match_type,
            name: name.into(),
            value,
            re,
        })
    }

    /// Equality matcher; never fails
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            match_type: MatchType::Equal,
            name: name.into(),
            value: value.into(),
            re: None,
        }
    }

    /// Test a single label value
    pub fn matches_value(&self, value: &str) -> bool {
        match (self.match_type, &self.re) {
            (MatchType::Equal, _) => value == self.value,
            (MatchType::NotEqual, _) => value != self.value,
            (MatchType::Regex, Some(re)) => re.is_match(value),
            (MatchType::NotRegex, Some(re)) => !re.is_match(value),
            (MatchType::Regex | MatchType::NotRegex, None) => false,
        }
    }

    /// Test a label set
    pub fn matches(&self, labels: &Labels) -> bool {
        self.matches_value(labels.get(&self.name).unwrap_or(""))
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.match_type, self.value)
    }
}

/// True when every matcher accepts `labels`
pub fn matches_all(matchers: &[Matcher], labels: &Labels) -> bool {
    matchers.iter().all(|m| m.matches(labels))
}
