//! Wire formats for HTTP and CLI consumers.
//!
//! Streaming body: raw answer text, then [`CITATIONS_DELIMITER`] and one JSON
//! object `{"citations": [...]}`. Non-streaming: a [`ResponseEnvelope`].

use crate::augment::{AugmentedCompletion, CitationStream, StreamEvent};
use crate::types::{Citation, SearchMetadata};
use citeflow_core::AppResult;
use citeflow_llm::LlmUsage;
use futures::{future, Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Separates streamed answer text from the citation trailer.
pub const CITATIONS_DELIMITER: &str = "\n---CITATIONS_DATA---\n";

pub const STREAM_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const STREAM_CACHE_CONTROL: &str = "no-cache";

/// JSON object closing a streamed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationsPayload {
    pub citations: Vec<Citation>,
}

/// Non-streaming response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Answer text followed by the metadata footer
    pub answer: String,
    pub citations: Vec<Citation>,
    pub search_metadata: SearchMetadata,
    pub model: String,
    pub usage: LlmUsage,
}

impl From<AugmentedCompletion> for ResponseEnvelope {
    fn from(completion: AugmentedCompletion) -> Self {
        Self {
            answer: completion.answer,
            citations: completion.citations,
            search_metadata: completion.metadata,
            model: completion.model,
            usage: completion.usage,
        }
    }
}

/// Human-readable footer appended to non-streamed answers.
///
/// `Sources used` counts distinct cited sources; the date range line is left
/// out when no retrieved document carries a date.
pub fn metadata_footer(citations: &[Citation], metadata: &SearchMetadata) -> String {
    let mut footer = format!("\n\n---\nSources used: {}", citations.len());
    if let (Some(oldest), Some(newest)) = (&metadata.date_range_oldest, &metadata.date_range_newest) {
        footer.push_str(&format!("\nDate range: {}–{}", oldest, newest));
    }
    footer.push_str(&format!("\nTotal sources: {}", metadata.result_count));
    footer
}

/// Delimiter plus the JSON citation object.
pub fn citations_trailer(citations: &[Citation]) -> AppResult<String> {
    let payload = serde_json::to_string(&CitationsPayload {
        citations: citations.to_vec(),
    })?;
    Ok(format!("{}{}", CITATIONS_DELIMITER, payload))
}

/// Split a complete streamed body into answer text and citations.
///
/// Returns `None` when the body has no citation trailer.
pub fn split_wire_body(body: &str) -> Option<(&str, CitationsPayload)> {
    let (text, json) = body.rsplit_once(CITATIONS_DELIMITER)?;
    let payload = serde_json::from_str(json).ok()?;
    Some((text, payload))
}

/// Convert a citation stream into body fragments.
///
/// Text events pass through at the granularity they arrive; the final event
/// becomes the trailer.
pub fn into_wire_stream(stream: CitationStream) -> impl Stream<Item = AppResult<String>> + Send {
    stream.filter_map(|event| {
        future::ready(match event {
            Ok(StreamEvent::Text(text)) => Some(Ok(text)),
            Ok(StreamEvent::Citation(_)) => None,
            Ok(StreamEvent::Done { citations }) => Some(citations_trailer(&citations)),
            Err(err) => Some(Err(err)),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(number: u32, title: &str, date: &str) -> Citation {
        Citation {
            number,
            title: title.into(),
            url: format!("u{}", number),
            date: date.into(),
        }
    }

    #[test]
    fn test_footer_with_date_range() {
        let metadata = SearchMetadata {
            date_range_newest: Some("2024-01-02".into()),
            date_range_oldest: Some("2024-01-01".into()),
            result_count: 5,
        };
        let footer = metadata_footer(&[citation(1, "Doc A", ""), citation(2, "Doc B", "")], &metadata);

        assert_eq!(
            footer,
            "\n\n---\nSources used: 2\nDate range: 2024-01-01–2024-01-02\nTotal sources: 5"
        );
    }

    #[test]
    fn test_footer_without_dates() {
        let metadata = SearchMetadata {
            result_count: 1,
            ..SearchMetadata::default()
        };
        let footer = metadata_footer(&[], &metadata);
        assert!(!footer.contains("Date range"));
        assert!(footer.ends_with("Sources used: 0\nTotal sources: 1"));
    }

    #[test]
    fn test_trailer_round_trip() {
        let citations = vec![citation(1, "Doc A", "2024-01-01")];
        let body = format!("Answer [1].{}", citations_trailer(&citations).unwrap());

        assert!(body.contains("\n---CITATIONS_DATA---\n{\"citations\":[{\"number\":1"));
        let (text, payload) = split_wire_body(&body).unwrap();
        assert_eq!(text, "Answer [1].");
        assert_eq!(payload.citations, citations);
    }

    #[test]
    fn test_split_without_trailer() {
        assert!(split_wire_body("plain text").is_none());
    }

    #[test]
    fn test_envelope_field_names() {
        let envelope = ResponseEnvelope {
            answer: "a".into(),
            citations: vec![],
            search_metadata: SearchMetadata::default(),
            model: "llama3.2".into(),
            usage: LlmUsage::new(3, 4),
        };
        let json = serde_json::to_value(&envelope).unwrap();

        assert!(json.get("searchMetadata").is_some());
        assert_eq!(json["searchMetadata"]["resultCount"], 0);
        assert_eq!(json["usage"]["totalTokens"], 7);
    }
}
