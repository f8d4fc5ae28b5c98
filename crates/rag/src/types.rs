//! Shared data types for the retrieval-augmentation pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use citeflow_core::AppError;

/// A document returned by a document index. Immutable once retrieved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub title: String,
    pub url: String,
    /// ISO-8601 date (`YYYY-MM-DD`), compared lexically
    #[serde(default)]
    pub date: String,
    pub body: String,
}

impl SearchDocument {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        date: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            date: date.into(),
            body: body.into(),
        }
    }
}

/// One ranked result from an index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: SearchDocument,

    /// Relevance score in [0, 1] for the requested mode
    pub score: f32,

    /// Snippet fragments around matched terms (keyword and hybrid modes)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

impl SearchHit {
    pub fn new(document: SearchDocument, score: f32) -> Self {
        Self {
            document,
            score,
            highlights: Vec::new(),
        }
    }
}

/// Aggregate facts about one retrieval, recomputed per request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    pub date_range_newest: Option<String>,
    pub date_range_oldest: Option<String>,
    pub result_count: usize,
}

/// A resolved citation marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub number: u32,
    pub title: String,
    pub url: String,
    pub date: String,
}

impl Citation {
    pub fn from_document(number: u32, document: &SearchDocument) -> Self {
        Self {
            number,
            title: document.title.clone(),
            url: document.url.clone(),
            date: document.date.clone(),
        }
    }
}

/// Ranking strategy requested from a document index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(AppError::Config(format!(
                "Unknown search mode: {}. Use keyword, semantic, or hybrid.",
                other
            ))),
        }
    }
}

/// Document field a search may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Body,
}

/// Options passed with every index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub similarity_threshold: f32,
    pub max_results: usize,
    pub fields: Vec<SearchField>,
}

impl SearchOptions {
    pub fn new(mode: SearchMode, max_results: usize, similarity_threshold: f32) -> Self {
        Self {
            mode,
            similarity_threshold,
            max_results,
            fields: vec![SearchField::Title, SearchField::Body],
        }
    }

    pub fn includes(&self, field: SearchField) -> bool {
        self.fields.contains(&field)
    }
}

/// Citation number to source document, numbered 1..N in retrieval order.
///
/// Built once per request by the prompt assembler and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceNumberMap {
    entries: BTreeMap<u32, SearchDocument>,
}

impl SourceNumberMap {
    /// Number documents from 1 in the order given.
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a SearchDocument>) -> Self {
        let entries = documents
            .into_iter()
            .zip(1u32..)
            .map(|(document, number)| (number, document.clone()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, number: u32) -> Option<&SearchDocument> {
        self.entries.get(&number)
    }

    /// Resolve a marker number into a citation.
    pub fn citation(&self, number: u32) -> Option<Citation> {
        self.get(number)
            .map(|document| Citation::from_document(number, document))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &SearchDocument)> {
        self.entries.iter().map(|(number, document)| (*number, document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_number_map_is_one_based_in_order() {
        let docs = vec![
            SearchDocument::new("Doc A", "u1", "2024-01-01", "a"),
            SearchDocument::new("Doc B", "u2", "2024-01-02", "b"),
        ];
        let map = SourceNumberMap::from_documents(&docs);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1).unwrap().title, "Doc A");
        assert_eq!(map.get(2).unwrap().title, "Doc B");
        assert!(map.get(0).is_none());
        assert!(map.get(3).is_none());

        let citation = map.citation(2).unwrap();
        assert_eq!(citation.number, 2);
        assert_eq!(citation.url, "u2");
    }

    #[test]
    fn test_search_mode_parsing() {
        assert_eq!("Keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let metadata = SearchMetadata {
            date_range_newest: Some("2024-01-02".to_string()),
            date_range_oldest: Some("2024-01-01".to_string()),
            result_count: 2,
        };
        let json = serde_json::to_value(&metadata).unwrap();

        assert_eq!(json["dateRangeNewest"], "2024-01-02");
        assert_eq!(json["dateRangeOldest"], "2024-01-01");
        assert_eq!(json["resultCount"], 2);
    }
}
