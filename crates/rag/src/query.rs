//! Search query derivation from a conversation.
//!
//! The first turn is searched verbatim. Follow-up turns are rewritten by the
//! completion provider into a self-contained query, falling back to the
//! verbatim text whenever that rewrite fails.

use crate::observer::{EventLevel, PipelineObserver};
use citeflow_core::{AppError, AppResult, CompletionConfig};
use citeflow_llm::{ChatMessage, LlmClient, LlmRequest, Role};
use std::sync::Arc;
use std::time::Duration;

const REFORMULATION_INSTRUCTION: &str = "You rewrite follow-up questions into search queries. \
Given the conversation below and the user's latest question, reply with one self-contained \
search query that captures what the user is asking now. Resolve pronouns and references \
using the conversation. Reply with the query only, without quotes or explanation.";

/// The query a retrieval will run, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedQuery {
    /// Text sent to the document index
    pub text: String,

    /// Latest user message, verbatim
    pub original: String,

    /// Whether `text` was produced by the completion provider
    pub reformulated: bool,
}

/// Text of the last user message.
///
/// Multi-part content yields its text parts joined by newlines, or an empty
/// string when it has none.
pub fn extract_query(messages: &[ChatMessage]) -> AppResult<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.text())
        .ok_or(AppError::NoUserMessage)
}

pub fn user_message_count(messages: &[ChatMessage]) -> usize {
    messages.iter().filter(|m| m.role == Role::User).count()
}

/// A conversation is a follow-up once it holds two or more user messages.
pub fn is_follow_up(messages: &[ChatMessage]) -> bool {
    user_message_count(messages) >= 2
}

/// Text of every user message except the last, oldest first.
pub fn previous_questions(messages: &[ChatMessage]) -> Vec<String> {
    let mut questions: Vec<String> = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.text())
        .collect();
    questions.pop();
    questions.retain(|q| !q.trim().is_empty());
    questions
}

pub struct QueryProcessor {
    llm: Arc<dyn LlmClient>,
    observer: Arc<dyn PipelineObserver>,
    config: CompletionConfig,
}

impl QueryProcessor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        observer: Arc<dyn PipelineObserver>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            llm,
            observer,
            config,
        }
    }

    /// Derive the search query for a conversation.
    ///
    /// A single-user-message conversation never reaches the provider.
    pub async fn resolve_query(&self, messages: &[ChatMessage], model: &str) -> AppResult<ResolvedQuery> {
        let original = extract_query(messages)?;

        if !is_follow_up(messages) {
            return Ok(ResolvedQuery {
                text: original.clone(),
                original,
                reformulated: false,
            });
        }

        let text = self.reformulate_query(messages, model).await?;
        let reformulated = text != original;
        Ok(ResolvedQuery {
            text,
            original,
            reformulated,
        })
    }

    /// Ask the provider for a self-contained query.
    ///
    /// Never fails once a user message exists: any provider problem is
    /// reported to the observer and the verbatim question is returned.
    pub async fn reformulate_query(&self, messages: &[ChatMessage], model: &str) -> AppResult<String> {
        let original = extract_query(messages)?;

        match self.try_reformulate(messages, &original, model).await {
            Ok(query) => {
                self.observer.log(
                    EventLevel::Debug,
                    "query.reformulated",
                    &[
                        ("model", model.to_string()),
                        ("original", original.clone()),
                        ("query", query.clone()),
                    ],
                );
                Ok(query)
            }
            Err(err) => {
                self.observer.log(
                    EventLevel::Warn,
                    "query.reformulation_failed",
                    &[
                        ("model", model.to_string()),
                        ("error", err.to_string()),
                    ],
                );
                Ok(original)
            }
        }
    }

    async fn try_reformulate(
        &self,
        messages: &[ChatMessage],
        question: &str,
        model: &str,
    ) -> AppResult<String> {
        let request = LlmRequest::new(
            vec![
                ChatMessage::system(REFORMULATION_INSTRUCTION),
                ChatMessage::user(self.transcript(messages, question)),
            ],
            model,
        )
        .with_temperature(self.config.reformulation_temperature);

        let timeout = Duration::from_secs(self.config.reformulation_timeout_secs);
        let response = tokio::time::timeout(timeout, self.llm.complete(&request))
            .await
            .map_err(|_| {
                AppError::ReformulationFailed(format!("timed out after {}s", timeout.as_secs()))
            })?
            .map_err(|e| AppError::ReformulationFailed(e.to_string()))?;

        clean_query(&response.content)
            .ok_or_else(|| AppError::ReformulationFailed("empty reformulation".to_string()))
    }

    /// Recent turns before the current question, followed by the question.
    fn transcript(&self, messages: &[ChatMessage], question: &str) -> String {
        let current = messages
            .iter()
            .rposition(|m| m.role == Role::User)
            .unwrap_or(messages.len());
        let history = &messages[..current];
        let start = history.len().saturating_sub(self.config.reformulation_turns);

        let mut out = String::from("Conversation:\n");
        for message in history[start..].iter().filter(|m| m.role != Role::System) {
            out.push_str(message.role.as_str());
            out.push_str(": ");
            out.push_str(message.text().trim());
            out.push('\n');
        }
        out.push_str("\nLatest question: ");
        out.push_str(question.trim());
        out
    }
}

/// First non-empty line of a model reply, with surrounding quotes removed.
fn clean_query(reply: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned = line
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '“' | '”'))
        .trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}
