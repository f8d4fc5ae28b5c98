//! Prompt assembly.
//!
//! Numbers the retrieved documents 1..N, renders the source profile and
//! packs sources, instructions and the question into one user message. The
//! resulting [`SourceNumberMap`] is the only way a `[n]` marker in the answer
//! maps back to a document.

use crate::query::{extract_query, is_follow_up, previous_questions};
use crate::types::{SearchHit, SourceNumberMap};
use citeflow_core::AppResult;
use citeflow_llm::ChatMessage;
use citeflow_prompt::{render_profile, SourceProfile};
use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Longest body excerpt sent per source, in grapheme clusters.
pub const MAX_SOURCE_CHARS: usize = 1200;

/// Joins highlight fragments of one source.
pub const HIGHLIGHT_SEPARATOR: &str = " ... ";

const CITATION_INSTRUCTION: &str = "Cite the sources you use inline with their number in \
square brackets, for example [1] or [2][3]. Only cite the numbered sources listed below and \
never invent a source number. If the sources do not answer the question, say so.";

const NO_SOURCES_NOTE: &str = "No sources matched this question.";

/// Completion input plus the numbering used in it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub messages: Vec<ChatMessage>,
    pub source_map: SourceNumberMap,
}

/// Build the completion messages for a conversation and its retrieval hits.
///
/// `hits` must already be deduplicated; numbering follows their order.
pub fn build_messages(
    messages: &[ChatMessage],
    profile: &SourceProfile,
    hits: &[SearchHit],
) -> AppResult<AssembledPrompt> {
    let question = extract_query(messages)?;
    let source_map = SourceNumberMap::from_documents(hits.iter().map(|hit| &hit.document));
    let rendered = render_profile(profile, hits.len(), HashMap::new())?;

    let mut sections = vec![rendered.preamble.trim().to_string(), CITATION_INSTRUCTION.to_string()];

    if is_follow_up(messages) {
        let previous = previous_questions(messages);
        if !previous.is_empty() {
            sections.push(follow_up_note(&previous));
        }
    }

    if hits.is_empty() {
        sections.push(NO_SOURCES_NOTE.to_string());
    } else {
        sections.extend(
            hits.iter()
                .zip(1u32..)
                .map(|(hit, number)| source_block(number, hit)),
        );
    }

    sections.push(format!("Question: {}", question));

    let mut assembled = Vec::with_capacity(2);
    if let Some(system) = rendered.system.filter(|s| !s.trim().is_empty()) {
        assembled.push(ChatMessage::system(system));
    }
    assembled.push(ChatMessage::user(sections.join("\n\n")));

    tracing::debug!(
        "Assembled prompt for profile '{}' with {} sources",
        profile.id,
        source_map.len()
    );

    Ok(AssembledPrompt {
        messages: assembled,
        source_map,
    })
}

/// `This is a follow-up question. Previous questions include: q1; q2`
fn follow_up_note(previous: &[String]) -> String {
    let questions: Vec<&str> = previous.iter().map(|q| q.trim()).collect();
    format!(
        "This is a follow-up question. Previous questions include: {}",
        questions.join("; ")
    )
}

fn source_block(number: u32, hit: &SearchHit) -> String {
    let document = &hit.document;
    let text = if hit.highlights.is_empty() {
        truncate_graphemes(document.body.trim(), MAX_SOURCE_CHARS)
    } else {
        hit.highlights.join(HIGHLIGHT_SEPARATOR)
    };

    if document.date.trim().is_empty() {
        format!("Source {}: {} — {}", number, document.title, text)
    } else {
        format!("Source {}: {} ({}) — {}", number, document.title, document.date, text)
    }
}

/// First `max` grapheme clusters of `text`.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    match text.grapheme_indices(true).nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
