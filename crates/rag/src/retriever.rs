//! Retrieval: query resolution, index search, dedup and metadata.

use crate::observer::{EventLevel, PipelineObserver};
use crate::query::{QueryProcessor, ResolvedQuery};
use crate::sources::{find_source, DocumentSource};
use crate::types::{SearchHit, SearchMetadata, SearchMode, SearchOptions};
use citeflow_core::{AppError, AppResult, CompletionConfig, RetrievalConfig};
use citeflow_llm::{ChatMessage, LlmClient};
use std::collections::HashSet;
use std::sync::Arc;

/// Output of one retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub query: ResolvedQuery,

    /// Deduplicated hits in ranked order
    pub hits: Vec<SearchHit>,

    pub metadata: SearchMetadata,
}

pub struct Retriever {
    queries: QueryProcessor,
    observer: Arc<dyn PipelineObserver>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        observer: Arc<dyn PipelineObserver>,
        retrieval: RetrievalConfig,
        completion: CompletionConfig,
    ) -> Self {
        Self {
            queries: QueryProcessor::new(llm, observer.clone(), completion),
            observer,
            config: retrieval,
        }
    }

    /// Search the source named `source_id` for the conversation's question.
    ///
    /// # Errors
    /// - `SourceNotFound` when `source_id` is not in `sources`, before any
    ///   provider or index call
    /// - `NoUserMessage` when the conversation has no user message
    /// - `SearchFailed` when the index search fails
    pub async fn search(
        &self,
        messages: &[ChatMessage],
        source_id: &str,
        sources: &[DocumentSource],
        user: &str,
        model: &str,
    ) -> AppResult<Retrieval> {
        let Some(source) = find_source(sources, source_id) else {
            self.observer.log(
                EventLevel::Warn,
                "retrieve.source_not_found",
                &[("source_id", source_id.to_string()), ("user", user.to_string())],
            );
            return Err(AppError::SourceNotFound(source_id.to_string()));
        };

        let query = self.queries.resolve_query(messages, model).await?;
        let options = search_options(source.mode, &self.config);

        let raw_hits = match source.index.search(&query.text, &options).await {
            Ok(hits) => hits,
            Err(err) => {
                self.observer.log(
                    EventLevel::Error,
                    "retrieve.failed",
                    &[
                        ("source_id", source_id.to_string()),
                        ("user", user.to_string()),
                        ("index", source.index.name().to_string()),
                        ("error", err.to_string()),
                    ],
                );
                return Err(AppError::search_failed(source_id, err));
            }
        };

        let raw_count = raw_hits.len();
        let ranked = if options.mode == SearchMode::Semantic {
            raw_hits
                .into_iter()
                .filter(|hit| hit.score >= options.similarity_threshold)
                .collect()
        } else {
            raw_hits
        };
        let hits = deduplicate_hits(ranked);
        let metadata = compute_metadata(&hits);

        self.observer.log(
            EventLevel::Info,
            "retrieve.completed",
            &[
                ("source_id", source_id.to_string()),
                ("user", user.to_string()),
                ("mode", options.mode.to_string()),
                ("reformulated", query.reformulated.to_string()),
                ("raw_hits", raw_count.to_string()),
                ("hits", hits.len().to_string()),
            ],
        );

        Ok(Retrieval {
            query,
            hits,
            metadata,
        })
    }
}

/// Index options for a source's mode under the configured limits.
pub fn search_options(mode: SearchMode, config: &RetrievalConfig) -> SearchOptions {
    SearchOptions::new(mode, config.max_results, config.similarity_threshold)
}

fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase().trim_end_matches('/').to_string()
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Drop hits whose document repeats an earlier url or title.
///
/// Keeps the first (best ranked) hit. Empty keys never count as a match.
pub fn deduplicate_hits(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut urls = HashSet::new();
    let mut titles = HashSet::new();

    hits.into_iter()
        .filter(|hit| {
            let url = normalize_url(&hit.document.url);
            let title = normalize_title(&hit.document.title);

            let seen = (!url.is_empty() && urls.contains(&url))
                || (!title.is_empty() && titles.contains(&title));
            if seen {
                return false;
            }

            if !url.is_empty() {
                urls.insert(url);
            }
            if !title.is_empty() {
                titles.insert(title);
            }
            true
        })
        .collect()
}

/// Result count and date range over the given hits.
pub fn compute_metadata(hits: &[SearchHit]) -> SearchMetadata {
    let dates = hits
        .iter()
        .map(|hit| hit.document.date.trim())
        .filter(|date| !date.is_empty());

    let (oldest, newest) = dates.fold((None, None), |(min, max): (Option<&str>, Option<&str>), date| {
        (
            Some(min.map_or(date, |m| m.min(date))),
            Some(max.map_or(date, |m| m.max(date))),
        )
    });

    SearchMetadata {
        date_range_newest: newest.map(str::to_string),
        date_range_oldest: oldest.map(str::to_string),
        result_count: hits.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchDocument;

    fn hit(title: &str, url: &str, date: &str, score: f32) -> SearchHit {
        SearchHit::new(SearchDocument::new(title, url, date, "body"), score)
    }

    #[test]
    fn test_dedup_by_url_keeps_first() {
        let hits = vec![
            hit("Guide", "https://docs.example/guide/", "2024-01-01", 0.9),
            hit("Guide (mirror)", "HTTPS://docs.example/guide", "2024-02-01", 0.8),
            hit("Other", "https://docs.example/other", "2024-03-01", 0.7),
        ];

        let deduped = deduplicate_hits(hits);
        let titles: Vec<&str> = deduped.iter().map(|h| h.document.title.as_str()).collect();
        assert_eq!(titles, vec!["Guide", "Other"]);
    }

    #[test]
    fn test_dedup_by_title() {
        let hits = vec![
            hit("Release  Notes", "https://a.example/1", "", 0.9),
            hit(" release notes ", "https://b.example/2", "", 0.8),
        ];
        let deduped = deduplicate_hits(hits);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].document.url, "https://a.example/1");
    }

    #[test]
    fn test_dedup_ignores_empty_keys() {
        let hits = vec![
            hit("First", "", "", 0.9),
            hit("Second", "", "", 0.8),
            hit("", "https://x.example", "", 0.7),
            hit("", "https://y.example", "", 0.6),
        ];
        assert_eq!(deduplicate_hits(hits).len(), 4);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let hits = vec![
            hit("A", "u1", "", 0.9),
            hit("a", "u2", "", 0.8),
            hit("B", "U1/", "", 0.7),
            hit("C", "u3", "", 0.6),
        ];
        let once = deduplicate_hits(hits);
        let twice = deduplicate_hits(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_metadata_date_range() {
        let hits = vec![
            hit("A", "u1", "2024-01-01", 0.9),
            hit("B", "u2", "", 0.8),
            hit("C", "u3", "2024-06-30", 0.7),
            hit("D", "u4", "2023-12-31", 0.6),
        ];
        let metadata = compute_metadata(&hits);
        assert_eq!(metadata.result_count, 4);
        assert_eq!(metadata.date_range_oldest.as_deref(), Some("2023-12-31"));
        assert_eq!(metadata.date_range_newest.as_deref(), Some("2024-06-30"));
    }

    #[test]
    fn test_metadata_without_dates() {
        let metadata = compute_metadata(&[hit("A", "u1", "", 0.9)]);
        assert_eq!(metadata.result_count, 1);
        assert!(metadata.date_range_oldest.is_none());
        assert!(metadata.date_range_newest.is_none());

        assert_eq!(compute_metadata(&[]), SearchMetadata::default());
    }

    #[test]
    fn test_search_options_from_config() {
        let config = RetrievalConfig {
            max_results: 5,
            similarity_threshold: 0.42,
        };
        let options = search_options(SearchMode::Semantic, &config);
        assert_eq!(options.max_results, 5);
        assert_eq!(options.similarity_threshold, 0.42);
        assert_eq!(options.mode, SearchMode::Semantic);
    }
}
