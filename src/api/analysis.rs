use std::collections::BTreeMap;

use async_graphql::{Context, ErrorExtensions, InputObject, Json, Object, Result, SimpleObject};

use crate::{
    analysis::AnalysisRecord,
    api::DateTimeUtc,
    database::{Criterion, Database},
    filter::{self, FilterParams},
    query::{self, ParsedFilters},
};

#[derive(SimpleObject)]
pub(crate) struct StringAnalysis {
    /// The content hash, which identifies the analysis as well as its value.
    pub(crate) id: String,
    pub(crate) value: String,
    pub(crate) properties: StringProperties,
    pub(crate) created_at: DateTimeUtc,
}

#[derive(SimpleObject)]
pub(crate) struct StringProperties {
    pub(crate) length: usize,
    pub(crate) is_palindrome: bool,
    pub(crate) unique_characters: usize,
    pub(crate) word_count: usize,
    pub(crate) sha256_hash: String,
    /// Occurrences of every character in the value.
    pub(crate) character_frequency_map: Json<BTreeMap<String, usize>>,
}

impl From<AnalysisRecord> for StringAnalysis {
    fn from(record: AnalysisRecord) -> Self {
        let character_frequency_map = record
            .character_frequency
            .into_iter()
            .map(|(c, n)| (c.to_string(), n))
            .collect();
        Self {
            id: record.content_hash.clone(),
            value: record.value,
            properties: StringProperties {
                length: record.length,
                is_palindrome: record.is_palindrome,
                unique_characters: record.unique_char_count,
                word_count: record.word_count,
                sha256_hash: record.content_hash,
                character_frequency_map: Json(character_frequency_map),
            },
            created_at: DateTimeUtc(record.created_at),
        }
    }
}

#[derive(InputObject, Debug, Default)]
pub(crate) struct StringFilter {
    /// Minimum length in characters. (inclusive)
    min_length: Option<usize>,
    /// Maximum length in characters. (inclusive)
    max_length: Option<usize>,
    is_palindrome: Option<bool>,
    /// Exact number of whitespace-separated words.
    word_count: Option<usize>,
    /// A single character the value must contain, ignoring case.
    contains_character: Option<String>,
}

impl From<StringFilter> for FilterParams {
    fn from(filter: StringFilter) -> Self {
        Self {
            min_length: filter.min_length,
            max_length: filter.max_length,
            is_palindrome: filter.is_palindrome,
            word_count: filter.word_count,
            contains_character: filter.contains_character,
        }
    }
}

#[derive(SimpleObject)]
struct StringList {
    data: Vec<StringAnalysis>,
    count: usize,
    filters_applied: Json<FilterParams>,
}

#[derive(SimpleObject)]
struct InterpretedQuery {
    original: String,
    parsed_filters: Json<ParsedFilters>,
}

#[derive(SimpleObject)]
struct NaturalLanguageResult {
    data: Vec<StringAnalysis>,
    count: usize,
    interpreted_query: InterpretedQuery,
}

fn into_objects(records: Vec<AnalysisRecord>) -> Vec<StringAnalysis> {
    records.into_iter().map(StringAnalysis::from).collect()
}

#[derive(Default)]
pub(super) struct AnalysisQuery;

#[Object]
impl AnalysisQuery {
    /// Stored analyses matching the filter, newest first.
    #[allow(clippy::unused_async)]
    async fn strings(
        &self,
        ctx: &Context<'_>,
        filter: Option<StringFilter>,
    ) -> Result<StringList> {
        let db = ctx.data::<Database>()?;
        let params = FilterParams::from(filter.unwrap_or_default());
        let predicate = filter::translate_structured(&params).map_err(|e| e.extend())?;
        let data = into_objects(db.find_many(&predicate).map_err(|e| e.extend())?);
        Ok(StringList {
            count: data.len(),
            data,
            filters_applied: Json(params),
        })
    }

    /// Looks up one analysis by its value or its content hash.
    #[allow(clippy::unused_async)]
    async fn string(&self, ctx: &Context<'_>, identifier: String) -> Result<StringAnalysis> {
        let db = ctx.data::<Database>()?;
        let record = db
            .find_one(&Criterion::from_identifier(&identifier))
            .map_err(|e| e.extend())?;
        Ok(record.into())
    }

    /// Stored analyses matching a plain-English description, newest first.
    #[allow(clippy::unused_async)]
    async fn filter_by_natural_language(
        &self,
        ctx: &Context<'_>,
        query: String,
    ) -> Result<NaturalLanguageResult> {
        let db = ctx.data::<Database>()?;
        let (predicate, interpreted) =
            query::translate_natural_language(&query).map_err(|e| e.extend())?;
        let data = into_objects(db.find_many(&predicate).map_err(|e| e.extend())?);
        Ok(NaturalLanguageResult {
            count: data.len(),
            data,
            interpreted_query: InterpretedQuery {
                original: interpreted.original,
                parsed_filters: Json(interpreted.parsed_filters),
            },
        })
    }
}

#[derive(Default)]
pub(super) struct AnalysisMutation;

#[Object]
impl AnalysisMutation {
    /// Analyzes and stores a new string.
    #[allow(clippy::unused_async)]
    async fn create_string(&self, ctx: &Context<'_>, value: String) -> Result<StringAnalysis> {
        let db = ctx.data::<Database>()?;
        let record = db.insert(&value).map_err(|e| e.extend())?;
        Ok(record.into())
    }

    #[allow(clippy::unused_async)]
    async fn delete_string(&self, ctx: &Context<'_>, identifier: String) -> Result<bool> {
        let db = ctx.data::<Database>()?;
        db.delete(&Criterion::from_identifier(&identifier))
            .map_err(|e| e.extend())?;
        Ok(true)
    }
}
