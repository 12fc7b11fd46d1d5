use std::path::Path;

use chrono::Utc;
use sled::{
    transaction::{ConflictableTransactionError, TransactionError, Transactional},
    Db, Tree,
};
use tracing::info;

use crate::{
    analysis::{self, AnalysisRecord},
    error::{Error, Result},
    filter::FilterPredicate,
};

const ANALYSES: &str = "analyses";
const CONTENT_HASHES: &str = "content_hashes";

/// Identifies a single stored analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Criterion {
    Value(String),
    ContentHash(String),
}

impl Criterion {
    /// Resolves a client-supplied identifier: 64 lowercase hex digits name a
    /// content hash, anything else is an exact value.
    pub(crate) fn from_identifier(identifier: &str) -> Self {
        if analysis::is_content_hash(identifier) {
            Criterion::ContentHash(identifier.to_string())
        } else {
            Criterion::Value(identifier.to_string())
        }
    }
}

/// Stores analyses keyed by value, with a secondary index by content hash.
#[derive(Clone)]
pub(crate) struct Database {
    db: Db,
    analyses: Tree,
    content_hashes: Tree,
}

impl Database {
    fn connect_db(path: &Path) -> Result<Db> {
        Ok(sled::open(path)?)
    }

    pub(crate) fn connect(path: &Path) -> Result<Database> {
        let db = Database::connect_db(path)?;
        let analyses = db.open_tree(ANALYSES)?;
        let content_hashes = db.open_tree(CONTENT_HASHES)?;
        Ok(Database {
            db,
            analyses,
            content_hashes,
        })
    }

    /// Analyzes `value` and stores the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] if `value` or its content hash is
    /// already stored.
    pub(crate) fn insert(&self, value: &str) -> Result<AnalysisRecord> {
        let record = AnalysisRecord::new(value, self.db.generate_id()?, Utc::now());
        let encoded = bincode::serialize(&record)?;

        let result = (&self.analyses, &self.content_hashes).transaction(|(analyses, hashes)| {
            if analyses.get(record.value.as_bytes())?.is_some()
                || hashes.get(record.content_hash.as_bytes())?.is_some()
            {
                return Err(ConflictableTransactionError::Abort(Error::AlreadyExists(
                    "String already exists".to_string(),
                )));
            }
            analyses.insert(record.value.as_bytes(), encoded.as_slice())?;
            hashes.insert(record.content_hash.as_bytes(), record.value.as_bytes())?;
            Ok(())
        });
        match result {
            Ok(()) => {
                info!("Stored analysis {}", record.content_hash);
                Ok(record)
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    /// Looks up one analysis.
    ///
    /// A content-hash lookup that finds nothing falls back to an exact-value
    /// lookup, since a stored value may itself look like a hash.
    pub(crate) fn find_one(&self, criterion: &Criterion) -> Result<AnalysisRecord> {
        let found = match criterion {
            Criterion::Value(value) => self.select(value)?,
            Criterion::ContentHash(hash) => match self.content_hashes.get(hash.as_bytes())? {
                Some(value) => self.select_key(&value)?,
                None => self.select(hash)?,
            },
        };
        found.ok_or_else(|| Error::NotFound("String analysis not found".to_string()))
    }

    /// Returns every analysis matching `predicate`, newest first.
    pub(crate) fn find_many(&self, predicate: &FilterPredicate) -> Result<Vec<AnalysisRecord>> {
        let mut records = Vec::new();
        for entry in self.analyses.iter() {
            let (_, val) = entry?;
            let record: AnalysisRecord = bincode::deserialize(&val)?;
            if predicate.matches(&record) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| (b.created_at, b.sequence).cmp(&(a.created_at, a.sequence)));
        Ok(records)
    }

    /// Removes one analysis and its hash index entry.
    pub(crate) fn delete(&self, criterion: &Criterion) -> Result<()> {
        let record = self.find_one(criterion)?;
        let result = (&self.analyses, &self.content_hashes).transaction(|(analyses, hashes)| {
            analyses.remove(record.value.as_bytes())?;
            hashes.remove(record.content_hash.as_bytes())?;
            Ok::<_, ConflictableTransactionError<Error>>(())
        });
        match result {
            Ok(()) => {
                info!("Deleted analysis {}", record.content_hash);
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.analyses.len()
    }

    fn select(&self, value: &str) -> Result<Option<AnalysisRecord>> {
        self.select_key(value.as_bytes())
    }

    fn select_key(&self, key: &[u8]) -> Result<Option<AnalysisRecord>> {
        match self.analyses.get(key)? {
            Some(val) => Ok(Some(bincode::deserialize(&val)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Comparison, Condition};

    fn connect() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn insert_and_find() {
        let (_dir, db) = connect();
        let stored = db.insert("racecar").unwrap();
        assert_eq!(db.count(), 1);

        let by_value = db
            .find_one(&Criterion::Value("racecar".to_string()))
            .unwrap();
        let by_hash = db
            .find_one(&Criterion::from_identifier(&stored.content_hash))
            .unwrap();
        assert_eq!(by_value, stored);
        assert_eq!(by_hash, stored);
        assert_eq!(analysis::content_hash(&by_hash.value), by_hash.content_hash);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (_dir, db) = connect();
        db.insert("hello").unwrap();
        let err = db.insert("hello").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(db.count(), 1);
    }

    #[test]
    fn missing_record_is_not_found() {
        let (_dir, db) = connect();
        let err = db
            .find_one(&Criterion::from_identifier("missing"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = db
            .find_one(&Criterion::from_identifier(&"0".repeat(64)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn hash_shaped_value_falls_back_to_value_lookup() {
        let (_dir, db) = connect();
        let value = "ab".repeat(32);
        db.insert(&value).unwrap();
        let found = db.find_one(&Criterion::from_identifier(&value)).unwrap();
        assert_eq!(found.value, value);
    }

    #[test]
    fn find_many_is_newest_first() {
        let (_dir, db) = connect();
        for value in ["first", "second", "third"] {
            db.insert(value).unwrap();
        }
        let all = db.find_many(&FilterPredicate::default()).unwrap();
        let values: Vec<_> = all.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["third", "second", "first"]);
    }

    #[test]
    fn find_many_applies_predicate() {
        let (_dir, db) = connect();
        for value in ["level", "hello world", "noon", "a"] {
            db.insert(value).unwrap();
        }
        let mut predicate = FilterPredicate::default();
        predicate.and(Condition::IsPalindrome(true));
        predicate.and(Condition::Length(Comparison::Gt, 1));
        let found = db.find_many(&predicate).unwrap();
        let values: Vec<_> = found.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, ["noon", "level"]);
    }

    #[test]
    fn delete_removes_both_keys() {
        let (_dir, db) = connect();
        let stored = db.insert("delete me").unwrap();
        db.delete(&Criterion::ContentHash(stored.content_hash.clone()))
            .unwrap();
        assert_eq!(db.count(), 0);
        let err = db
            .find_one(&Criterion::ContentHash(stored.content_hash))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = db
            .delete(&Criterion::Value("delete me".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // The value can be stored again once deleted.
        db.insert("delete me").unwrap();
    }
}
