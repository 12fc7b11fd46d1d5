use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The length of a hex-encoded SHA-256 digest.
const CONTENT_HASH_LEN: usize = 64;

/// Structural properties computed for one submitted string.
///
/// `value` and `content_hash` both identify a record uniquely.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub(crate) struct AnalysisRecord {
    pub(crate) value: String,
    pub(crate) length: usize,
    pub(crate) is_palindrome: bool,
    pub(crate) word_count: usize,
    pub(crate) unique_char_count: usize,
    pub(crate) character_frequency: BTreeMap<char, usize>,
    pub(crate) content_hash: String,
    pub(crate) sequence: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub(crate) fn new(value: &str, sequence: u64, now: DateTime<Utc>) -> Self {
        Self {
            value: value.to_string(),
            length: value.chars().count(),
            is_palindrome: is_palindrome(value),
            word_count: value.split_whitespace().count(),
            unique_char_count: value.chars().collect::<HashSet<_>>().len(),
            character_frequency: character_frequency(value),
            content_hash: content_hash(value),
            sequence,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns the lowercase hex SHA-256 digest of `value`'s UTF-8 bytes.
pub(crate) fn content_hash(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether `identifier` has the shape of a content hash: 64 lowercase hex
/// digits.
pub(crate) fn is_content_hash(identifier: &str) -> bool {
    identifier.len() == CONTENT_HASH_LEN
        && identifier
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

// Only alphanumeric characters count, compared case-insensitively.
fn is_palindrome(value: &str) -> bool {
    let cleaned: Vec<char> = value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    cleaned.iter().eq(cleaned.iter().rev())
}

fn character_frequency(value: &str) -> BTreeMap<char, usize> {
    value.chars().fold(BTreeMap::new(), |mut acc, c| {
        *acc.entry(c).or_insert(0) += 1;
        acc
    })
}
