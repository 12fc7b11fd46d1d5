use std::fmt;

use serde::Serialize;

use crate::{
    analysis::AnalysisRecord,
    error::{Error, Result},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Comparison {
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparison {
    fn holds(self, lhs: usize, rhs: usize) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Le => lhs <= rhs,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Lt => "<",
            Comparison::Ge => ">=",
            Comparison::Le => "<=",
        };
        f.write_str(symbol)
    }
}

/// One atomic comparison against a field of an [`AnalysisRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Condition {
    Length(Comparison, usize),
    IsPalindrome(bool),
    WordCount(Comparison, usize),
    /// Case-insensitive containment of a single character in `value`.
    Contains(char),
}

impl Condition {
    fn matches(&self, record: &AnalysisRecord) -> bool {
        match self {
            Condition::Length(cmp, n) => cmp.holds(record.length, *n),
            Condition::IsPalindrome(b) => record.is_palindrome == *b,
            Condition::WordCount(cmp, n) => cmp.holds(record.word_count, *n),
            Condition::Contains(needle) => record
                .value
                .chars()
                .any(|c| c.to_lowercase().eq(needle.to_lowercase())),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Condition::Length(cmp, n) => write!(f, "length {cmp} {n}"),
            Condition::IsPalindrome(b) => write!(f, "is_palindrome = {b}"),
            Condition::WordCount(cmp, n) => write!(f, "word_count {cmp} {n}"),
            Condition::Contains(c) => write!(f, "value contains {c:?}"),
        }
    }
}

/// A conjunction of conditions. An empty predicate matches every record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FilterPredicate {
    conditions: Vec<Condition>,
}

impl FilterPredicate {
    pub(crate) fn and(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub(crate) fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub(crate) fn matches(&self, record: &AnalysisRecord) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("*");
        }
        for (i, condition) in self.conditions().iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// The named, typed parameters accepted by the structured filter.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct FilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_palindrome: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) contains_character: Option<String>,
}

impl FilterParams {
    /// Reads parameters from raw name/value pairs such as a URL query string.
    ///
    /// Unknown names are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a numeric or boolean parameter cannot
    /// be parsed.
    pub(crate) fn from_raw<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = Self::default();
        for (name, value) in pairs {
            match name {
                "min_length" => params.min_length = Some(parse_count(name, value)?),
                "max_length" => params.max_length = Some(parse_count(name, value)?),
                "word_count" => params.word_count = Some(parse_count(name, value)?),
                "is_palindrome" => params.is_palindrome = Some(parse_bool(name, value)?),
                "contains_character" => params.contains_character = Some(value.to_string()),
                _ => {}
            }
        }
        Ok(params)
    }
}

fn parse_count(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("{name} must be a non-negative integer")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::Validation(format!("{name} must be true or false"))),
    }
}

/// Builds the predicate for a set of structured parameters.
///
/// Each present parameter contributes one condition. Contradictory bounds are
/// not rejected; they simply match nothing.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `contains_character` is not exactly one
/// character.
pub(crate) fn translate_structured(params: &FilterParams) -> Result<FilterPredicate> {
    let mut predicate = FilterPredicate::default();
    if let Some(n) = params.min_length {
        predicate.and(Condition::Length(Comparison::Ge, n));
    }
    if let Some(n) = params.max_length {
        predicate.and(Condition::Length(Comparison::Le, n));
    }
    if let Some(b) = params.is_palindrome {
        predicate.and(Condition::IsPalindrome(b));
    }
    if let Some(n) = params.word_count {
        predicate.and(Condition::WordCount(Comparison::Eq, n));
    }
    if let Some(value) = params.contains_character.as_deref() {
        // An empty value is treated as absent.
        if !value.is_empty() {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => predicate.and(Condition::Contains(c)),
                _ => {
                    return Err(Error::Validation(
                        "contains_character must be a single character".to_string(),
                    ))
                }
            }
        }
    }
    Ok(predicate)
}
