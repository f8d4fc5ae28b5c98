//! Scripted collaborators for pipeline tests.

use crate::index::DocumentIndex;
use crate::sources::DocumentSource;
use crate::types::{SearchDocument, SearchHit, SearchMode, SearchOptions};
use citeflow_core::{AppError, AppResult};
use citeflow_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use futures::{stream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

pub const MODEL: &str = "llama3.2";

/// Completion provider with canned output.
///
/// Requests whose prompt is a reformulation transcript get `reformulation`;
/// every other request gets `answer` (split into `chunks` when streamed).
pub struct FakeLlm {
    pub answer: String,
    pub chunks: Vec<String>,
    pub reformulation: Result<String, String>,
    pub fail_stream_after: Option<usize>,
    pub hold_open: bool,
    pub requests: Mutex<Vec<LlmRequest>>,
    pub stream_dropped: Arc<AtomicBool>,
}

impl FakeLlm {
    pub fn answering(chunks: &[&str]) -> Self {
        Self {
            answer: chunks.concat(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            reformulation: Ok("reformulated query".to_string()),
            fail_stream_after: None,
            hold_open: false,
            requests: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_reformulation(mut self, reply: Result<&str, &str>) -> Self {
        self.reformulation = reply.map(str::to_string).map_err(str::to_string);
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reformulation_calls(&self) -> usize {
        self.requests().iter().filter(|r| is_reformulation(r)).count()
    }

    /// The last answer request sent to the provider.
    pub fn answer_request(&self) -> Option<LlmRequest> {
        self.requests().into_iter().rev().find(|r| !is_reformulation(r))
    }
}

fn is_reformulation(request: &LlmRequest) -> bool {
    request
        .messages
        .last()
        .map(|m| m.text().starts_with("Conversation:"))
        .unwrap_or(false)
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let content = if is_reformulation(request) {
            self.reformulation.clone().map_err(AppError::Llm)?
        } else {
            self.answer.clone()
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(40, 12),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.requests.lock().unwrap().push(request.clone());

        let model = request.model.clone();
        let mut items: Vec<AppResult<LlmStreamChunk>> = self
            .chunks
            .iter()
            .map(|c| Ok(LlmStreamChunk::delta(c.clone(), model.clone())))
            .collect();

        if let Some(after) = self.fail_stream_after {
            items.truncate(after);
            items.push(Err(AppError::Llm("stream interrupted".to_string())));
        }

        let body = stream::iter(items);
        let inner: LlmStream = if self.hold_open {
            Box::pin(body.chain(stream::pending()))
        } else {
            Box::pin(body)
        };

        Ok(Box::pin(DropFlag {
            inner,
            dropped: self.stream_dropped.clone(),
        }))
    }
}

/// Sets a flag when the wrapped stream is dropped.
struct DropFlag {
    inner: LlmStream,
    dropped: Arc<AtomicBool>,
}

impl Stream for DropFlag {
    type Item = AppResult<LlmStreamChunk>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

/// Index returning fixed hits and recording the queries it receives.
pub struct FakeIndex {
    hits: AppResult<Vec<SearchHit>>,
    pub queries: Mutex<Vec<(String, SearchOptions)>>,
}

impl FakeIndex {
    pub fn returning(hits: Vec<SearchHit>) -> Self {
        Self {
            hits: Ok(hits),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Err(AppError::Other(message.to_string())),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl DocumentIndex for FakeIndex {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, query: &str, options: &SearchOptions) -> AppResult<Vec<SearchHit>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), options.clone()));
        match &self.hits {
            Ok(hits) => Ok(hits.clone()),
            Err(err) => Err(AppError::Other(err.to_string())),
        }
    }
}

pub fn hit(title: &str, url: &str, date: &str, score: f32) -> SearchHit {
    SearchHit::new(
        SearchDocument::new(title, url, date, format!("{} body text", title)),
        score,
    )
}

/// Doc A (u1, 2024-01-01) and Doc B (u2, 2024-01-02).
pub fn two_docs() -> Vec<SearchHit> {
    vec![
        hit("Doc A", "u1", "2024-01-01", 0.9),
        hit("Doc B", "u2", "2024-01-02", 0.8),
    ]
}

pub fn source(id: &str, mode: SearchMode, index: Arc<FakeIndex>) -> DocumentSource {
    DocumentSource::new(id, format!("{} source", id), mode, index)
}
