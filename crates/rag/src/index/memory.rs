//! In-memory document index with keyword, semantic and hybrid ranking.

use super::embedding::{cosine_similarity, is_stop_word, TrigramEmbedder};
use super::DocumentIndex;
use crate::types::{SearchDocument, SearchField, SearchHit, SearchMode, SearchOptions};
use citeflow_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Minimum keyword score of any document whose title matches the query.
pub const TITLE_MATCH_FLOOR: f32 = 0.5;

/// Relative weight of the keyword score in hybrid mode.
pub const HYBRID_KEYWORD_WEIGHT: f32 = 0.4;

/// Relative weight of the semantic score in hybrid mode.
pub const HYBRID_SEMANTIC_WEIGHT: f32 = 0.6;

/// Bytes of context kept on each side of a highlighted term.
const HIGHLIGHT_CONTEXT: usize = 60;

/// Highlights returned per document.
const MAX_HIGHLIGHTS: usize = 3;

#[derive(Debug, Clone)]
struct IndexedDocument {
    document: SearchDocument,
    title_lower: String,
    body_lower: String,
    embedding: Vec<f32>,
}

/// Keyword match for one document.
#[derive(Debug, Clone)]
struct KeywordMatch {
    score: f32,
    highlights: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    name: String,
    embedder: TrigramEmbedder,
    documents: Vec<IndexedDocument>,
}

impl InMemoryIndex {
    pub fn new(name: impl Into<String>, documents: Vec<SearchDocument>) -> Self {
        let embedder = TrigramEmbedder::default();
        let documents = documents
            .into_iter()
            .map(|document| IndexedDocument {
                title_lower: document.title.to_lowercase(),
                body_lower: document.body.to_lowercase(),
                embedding: embedder.embed(&format!("{}\n{}", document.title, document.body)),
                document,
            })
            .collect();

        Self {
            name: name.into(),
            embedder,
            documents,
        }
    }

    /// Load documents from a JSONL file, one `SearchDocument` per line.
    pub fn from_jsonl(name: impl Into<String>, path: &Path) -> AppResult<Self> {
        let name = name.into();
        let file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open documents file {:?}: {}", path, e))
        })?;

        let reader = BufReader::new(file);
        let mut documents = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AppError::Config(format!("Failed to read line {} of {:?}: {}", line_num + 1, path, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let mut document: SearchDocument = serde_json::from_str(&line).map_err(|e| {
                AppError::Config(format!(
                    "Failed to parse line {} in {:?}: {}",
                    line_num + 1,
                    path,
                    e
                ))
            })?;
            document.date = normalize_date(&document.date);
            documents.push(document);
        }

        tracing::debug!("Loaded {} documents for index '{}'", documents.len(), name);
        Ok(Self::new(name, documents))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Keyword scores for every matching document, keyed by position.
    fn keyword_matches(&self, query: &str, options: &SearchOptions) -> HashMap<usize, KeywordMatch> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return HashMap::new();
        }

        let use_title = options.includes(SearchField::Title);
        let use_body = options.includes(SearchField::Body);
        let total = terms.len() as f32;

        let mut matches = HashMap::new();
        for (position, indexed) in self.documents.iter().enumerate() {
            let title_hits = if use_title {
                terms
                    .iter()
                    .filter(|t| indexed.title_lower.contains(t.as_str()))
                    .count()
            } else {
                0
            };
            let body_terms: Vec<&String> = if use_body {
                terms
                    .iter()
                    .filter(|t| indexed.body_lower.contains(t.as_str()))
                    .collect()
            } else {
                Vec::new()
            };

            if title_hits == 0 && body_terms.is_empty() {
                continue;
            }

            let score = if title_hits > 0 {
                TITLE_MATCH_FLOOR + (1.0 - TITLE_MATCH_FLOOR) * title_hits as f32 / total
            } else {
                TITLE_MATCH_FLOOR * body_terms.len() as f32 / total
            };

            let highlights = body_terms
                .iter()
                .filter_map(|term| highlight(&indexed.document.body, term))
                .take(MAX_HIGHLIGHTS)
                .collect();

            matches.insert(position, KeywordMatch { score, highlights });
        }

        matches
    }

    /// Cosine similarity of the query against every document, by position.
    fn semantic_scores(&self, query: &str) -> Vec<f32> {
        let query_embedding = self.embedder.embed(query);
        self.documents
            .iter()
            .map(|indexed| cosine_similarity(&query_embedding, &indexed.embedding).clamp(0.0, 1.0))
            .collect()
    }

    fn rank(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let threshold = options.similarity_threshold;

        // (position, score, highlights), built in index order
        let mut scored: Vec<(usize, f32, Vec<String>)> = match options.mode {
            SearchMode::Keyword => {
                let mut matches = self.keyword_matches(query, options);
                (0..self.documents.len())
                    .filter_map(|pos| matches.remove(&pos).map(|m| (pos, m.score, m.highlights)))
                    .collect()
            }
            SearchMode::Semantic => self
                .semantic_scores(query)
                .into_iter()
                .enumerate()
                .filter(|(_, score)| *score >= threshold)
                .map(|(pos, score)| (pos, score, Vec::new()))
                .collect(),
            SearchMode::Hybrid => {
                let mut matches = self.keyword_matches(query, options);
                self.semantic_scores(query)
                    .into_iter()
                    .enumerate()
                    .filter_map(|(pos, semantic)| {
                        let keyword = matches.remove(&pos);
                        if keyword.is_none() && semantic < threshold {
                            return None;
                        }
                        let (keyword_score, highlights) = keyword
                            .map(|m| (m.score, m.highlights))
                            .unwrap_or((0.0, Vec::new()));
                        let combined = HYBRID_KEYWORD_WEIGHT * keyword_score
                            + HYBRID_SEMANTIC_WEIGHT * semantic;
                        Some((pos, combined.clamp(0.0, 1.0), highlights))
                    })
                    .collect()
            }
        };

        // Stable sort: ties keep index order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(options.max_results);

        scored
            .into_iter()
            .map(|(pos, score, highlights)| SearchHit {
                document: self.documents[pos].document.clone(),
                score,
                highlights,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DocumentIndex for InMemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> AppResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let hits = self.rank(query, options);
        tracing::debug!(
            index = %self.name,
            mode = %options.mode,
            hits = hits.len(),
            "In-memory search finished"
        );
        Ok(hits)
    }
}

/// Lowercase content terms of a query, de-duplicated in order.
///
/// Falls back to the whole trimmed query when it holds only stop words or
/// single characters.
fn query_terms(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut terms: Vec<String> = Vec::new();

    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if token.chars().count() < 2 || is_stop_word(token) {
            continue;
        }
        if !terms.iter().any(|t| t == token) {
            terms.push(token.to_string());
        }
    }

    if terms.is_empty() {
        let whole = lower.trim();
        if !whole.is_empty() {
            terms.push(whole.to_string());
        }
    }

    terms
}

/// Byte offset just past `needle` when `rest` starts with it, ignoring case.
fn match_prefix_ignore_case(rest: &str, needle_lower: &str) -> Option<usize> {
    let mut needle = needle_lower.chars().peekable();
    for (offset, ch) in rest.char_indices() {
        for lower in ch.to_lowercase() {
            match needle.next() {
                Some(n) if n == lower => {}
                _ => return None,
            }
        }
        if needle.peek().is_none() {
            return Some(offset + ch.len_utf8());
        }
    }
    None
}

/// First case-insensitive occurrence of `needle_lower` as a byte range.
fn find_ignore_case(haystack: &str, needle_lower: &str) -> Option<(usize, usize)> {
    if needle_lower.is_empty() {
        return None;
    }
    haystack.char_indices().find_map(|(start, _)| {
        match_prefix_ignore_case(&haystack[start..], needle_lower).map(|len| (start, start + len))
    })
}

/// Body fragment around the first occurrence of `term`, with the term marked.
fn highlight(body: &str, term: &str) -> Option<String> {
    let (start, end) = find_ignore_case(body, term)?;

    let mut from = start.saturating_sub(HIGHLIGHT_CONTEXT);
    while !body.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + HIGHLIGHT_CONTEXT).min(body.len());
    while !body.is_char_boundary(to) {
        to += 1;
    }

    Some(format!(
        "{}{}<mark>{}</mark>{}{}",
        if from > 0 { "..." } else { "" },
        &body[from..start],
        &body[start..end],
        &body[end..to],
        if to < body.len() { "..." } else { "" },
    ))
}

/// Reduce RFC 3339 timestamps to their date so dates compare lexically.
fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return trimmed.to_string();
    }
    match chrono::DateTime::parse_from_rfc3339(trimmed) {
        Ok(timestamp) => timestamp.date_naive().to_string(),
        Err(_) => {
            tracing::warn!("Document date '{}' is not ISO-8601; kept verbatim", trimmed);
            trimmed.to_string()
        }
    }
}
