//! Rule-based translation of free-text queries into filter predicates.
//!
//! A query is lower-cased and passed through a fixed pipeline of detectors.
//! Each detector looks for one kind of phrase and contributes at most one
//! condition; the conditions are combined with AND. Phrase tables are checked
//! in declaration order and the first match wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Error, Result},
    filter::{Comparison, Condition, FilterPredicate},
};

type Detector = fn(&str) -> Option<Condition>;

const DETECTORS: [Detector; 4] = [
    detect_palindrome,
    detect_length,
    detect_word_count,
    detect_contains_character,
];

const PALINDROME_TERMS: &[&str] = &[
    "palindrome",
    "palindromic",
    "same forwards and backwards",
    "reads the same",
    "symmetrical",
    "mirror",
];
// Matched as raw substrings, so "non" also fires inside unrelated words.
const NEGATION_TERMS: &[&str] = &["not", "non", "no "];

const GREATER_TERMS: &[&str] = &["longer than", "more than", "greater than", "over"];
const LESS_TERMS: &[&str] = &["shorter than", "less than", "under"];
const AT_LEAST_TERMS: &[&str] = &["at least", "minimum", "min"];
const AT_MOST_TERMS: &[&str] = &["at most", "maximum", "max"];

const SINGLE_WORD_TERMS: &[&str] = &["single word", "one word"];
const MULTIPLE_WORD_TERMS: &[&str] = &["multiple words", "multi word", "more than one word"];
const NO_WORD_TERMS: &[&str] = &["no words", "zero words", "empty string"];
const WORD_COUNT_TERMS: &[(&str, usize)] = &[
    ("two words", 2),
    ("three words", 3),
    ("four words", 4),
    ("five words", 5),
];

const CHARACTER_ALIASES: &[(&str, char)] = &[
    ("first vowel", 'a'),
    ("vowel a", 'a'),
    ("vowel e", 'e'),
    ("vowel i", 'i'),
    ("vowel o", 'o'),
    ("vowel u", 'u'),
    ("letter a", 'a'),
    ("letter b", 'b'),
    ("letter c", 'c'),
    ("letter z", 'z'),
    ("character a", 'a'),
    ("character z", 'z'),
];

static NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("Invalid regex"));

// "the letter" forms come first so that "with the letter z" yields 'z'
// rather than the 't' of "the". Otherwise the first letter after the keyword
// is taken, even when it starts a longer word.
static CHARACTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"containing\s+the\s+letter\s+([a-z])",
        r"with\s+the\s+letter\s+([a-z])",
        r"has\s+the\s+letter\s+([a-z])",
        r#"containing\s+['"]?([a-z])"#,
        r#"with\s+['"]?([a-z])"#,
        r#"has\s+['"]?([a-z])"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Invalid regex"))
    .collect()
});

/// The filters a natural-language query was resolved to, named after the
/// structured filter parameters.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub(crate) struct ParsedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_palindrome: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) word_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) contains_character: Option<char>,
}

impl ParsedFilters {
    pub(crate) fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn record(&mut self, condition: &Condition) {
        match *condition {
            Condition::IsPalindrome(b) => self.is_palindrome = Some(b),
            Condition::Length(Comparison::Gt, n) => self.min_length = Some(n.saturating_add(1)),
            Condition::Length(Comparison::Ge, n) => self.min_length = Some(n),
            Condition::Length(Comparison::Lt, n) => self.max_length = Some(n.saturating_sub(1)),
            Condition::Length(Comparison::Le, n) => self.max_length = Some(n),
            Condition::Length(Comparison::Eq, n) => self.length = Some(n),
            Condition::WordCount(_, n) => self.word_count = Some(n),
            Condition::Contains(c) => self.contains_character = Some(c),
        }
    }
}

/// The query as the client sent it, with what it was resolved to.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub(crate) struct InterpretedQuery {
    pub(crate) original: String,
    pub(crate) parsed_filters: ParsedFilters,
}

/// Parses a free-text query into a predicate and the filters it names.
///
/// A query that matches no phrase yields an empty predicate, which matches
/// every record.
///
/// # Errors
///
/// Returns [`Error::InvalidQuery`] if the query is empty after trimming.
pub(crate) fn parse(query: &str) -> Result<(FilterPredicate, ParsedFilters)> {
    let query = query.to_lowercase();
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidQuery("Query cannot be empty".to_string()));
    }

    let mut predicate = FilterPredicate::default();
    let mut parsed = ParsedFilters::default();
    for detect in DETECTORS {
        if let Some(condition) = detect(query) {
            parsed.record(&condition);
            predicate.and(condition);
        }
    }
    if parsed.is_empty() {
        debug!("no filter recognized in query {query:?}");
    } else {
        debug!("query {query:?} parsed as {predicate}");
    }
    Ok((predicate, parsed))
}

/// Like [`parse`], but keeps the original query for echoing back to the
/// client.
///
/// # Errors
///
/// Returns [`Error::InvalidQuery`] if the query is empty after trimming.
pub(crate) fn translate_natural_language(
    query: &str,
) -> Result<(FilterPredicate, InterpretedQuery)> {
    let (predicate, parsed_filters) = parse(query)?;
    Ok((
        predicate,
        InterpretedQuery {
            original: query.trim().to_string(),
            parsed_filters,
        },
    ))
}

fn contains_any(query: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| query.contains(term))
}

fn detect_palindrome(query: &str) -> Option<Condition> {
    if !contains_any(query, PALINDROME_TERMS) {
        return None;
    }
    let negated = contains_any(query, NEGATION_TERMS);
    Some(Condition::IsPalindrome(!negated))
}

fn detect_length(query: &str) -> Option<Condition> {
    let mut numbers = NUMBER_PATTERN.find_iter(query);
    let n: usize = numbers.next()?.as_str().parse().ok()?;
    let single_number = numbers.next().is_none();

    let comparison = if contains_any(query, GREATER_TERMS) {
        Comparison::Gt
    } else if contains_any(query, LESS_TERMS) {
        Comparison::Lt
    } else if contains_any(query, AT_LEAST_TERMS) {
        Comparison::Ge
    } else if contains_any(query, AT_MOST_TERMS) {
        Comparison::Le
    } else if query.contains("character") && single_number {
        Comparison::Eq
    } else {
        return None;
    };
    Some(Condition::Length(comparison, n))
}

fn detect_word_count(query: &str) -> Option<Condition> {
    if contains_any(query, SINGLE_WORD_TERMS) {
        return Some(Condition::WordCount(Comparison::Eq, 1));
    }
    if contains_any(query, MULTIPLE_WORD_TERMS) {
        return Some(Condition::WordCount(Comparison::Gt, 1));
    }
    if contains_any(query, NO_WORD_TERMS) {
        return Some(Condition::WordCount(Comparison::Eq, 0));
    }
    if let Some((_, n)) = WORD_COUNT_TERMS
        .iter()
        .find(|(term, _)| query.contains(term))
    {
        return Some(Condition::WordCount(Comparison::Eq, *n));
    }
    if query.contains("word") {
        let n = NUMBER_PATTERN.find(query)?.as_str().parse().ok()?;
        return Some(Condition::WordCount(Comparison::Eq, n));
    }
    None
}

fn detect_contains_character(query: &str) -> Option<Condition> {
    let captured = CHARACTER_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(query)?.get(1)?.as_str().chars().next());
    if let Some(c) = captured {
        return Some(Condition::Contains(c.to_ascii_lowercase()));
    }
    CHARACTER_ALIASES
        .iter()
        .find(|(alias, _)| query.contains(alias))
        .map(|(_, c)| Condition::Contains(*c))
}
