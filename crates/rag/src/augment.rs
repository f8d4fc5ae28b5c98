//! Retrieval-augmented completion.
//!
//! [`Augmenter::augment`] runs one request end to end: retrieve, assemble
//! the prompt, call the completion provider and resolve citation markers in
//! its output. The augmenter holds only shared, read-only collaborators;
//! everything that belongs to one request lives in a [`RequestContext`]
//! owned by the returned value.

use crate::assembler::build_messages;
use crate::citation::CitationStreamProcessor;
use crate::observer::{EventLevel, PipelineObserver, TracingObserver};
use crate::retriever::Retriever;
use crate::sources::{find_source, DocumentSource};
use crate::types::{Citation, SearchMetadata};
use crate::wire::metadata_footer;
use citeflow_core::{AppError, AppResult, CompletionConfig, RetrievalConfig};
use citeflow_llm::{ChatMessage, LlmClient, LlmRequest, LlmStream, LlmUsage};
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use uuid::Uuid;

/// User name logged when a request names none.
pub const ANONYMOUS_USER: &str = "anonymous";

/// One chat request against one source.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentRequest {
    pub messages: Vec<ChatMessage>,
    pub source_id: String,
    pub model: String,
    pub streaming: bool,
    pub user: String,
}

impl AugmentRequest {
    pub fn new(
        messages: Vec<ChatMessage>,
        source_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            source_id: source_id.into(),
            model: model.into(),
            streaming: false,
            user: ANONYMOUS_USER.to_string(),
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}

/// State scoped to a single request.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub user: String,
    pub source_id: String,
    pub model: String,
    pub processor: CitationStreamProcessor,
    started: Instant,
    message_count: usize,
    temperature: f32,
}

impl RequestContext {
    fn new(request: &AugmentRequest, processor: CitationStreamProcessor, temperature: f32) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user: request.user.clone(),
            source_id: request.source_id.clone(),
            model: request.model.clone(),
            processor,
            started: Instant::now(),
            message_count: request.messages.len(),
            temperature,
        }
    }

    /// Common log fields for this request.
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("request_id", self.request_id.to_string()),
            ("user", self.user.clone()),
            ("source_id", self.source_id.clone()),
            ("model", self.model.clone()),
            ("message_count", self.message_count.to_string()),
            ("temperature", self.temperature.to_string()),
            ("elapsed_ms", self.started.elapsed().as_millis().to_string()),
        ]
    }
}

/// Result of a non-streamed request.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedCompletion {
    /// Model text followed by the metadata footer
    pub answer: String,

    /// Distinct citations in first-seen order
    pub citations: Vec<Citation>,
    pub metadata: SearchMetadata,
    pub model: String,
    pub usage: LlmUsage,
}

/// What `augment` hands back, depending on the request's streaming flag.
#[derive(Debug)]
pub enum AugmentOutcome {
    Complete(AugmentedCompletion),
    Stream(CitationStream),
}

pub struct Augmenter {
    llm: Arc<dyn LlmClient>,
    observer: Arc<dyn PipelineObserver>,
    retriever: Retriever,
    completion: CompletionConfig,
}

impl Augmenter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        observer: Arc<dyn PipelineObserver>,
        retrieval: RetrievalConfig,
        completion: CompletionConfig,
    ) -> Self {
        let retriever =
            Retriever::new(llm.clone(), observer.clone(), retrieval, completion.clone());
        Self {
            llm,
            observer,
            retriever,
            completion,
        }
    }

    /// Augmenter reporting through `tracing`.
    pub fn with_tracing(
        llm: Arc<dyn LlmClient>,
        retrieval: RetrievalConfig,
        completion: CompletionConfig,
    ) -> Self {
        Self::new(llm, Arc::new(TracingObserver), retrieval, completion)
    }

    /// Run one request.
    ///
    /// Errors from retrieval and from starting the completion are returned
    /// as-is and never retried. For streamed requests, later provider errors
    /// arrive as items of the returned stream.
    pub async fn augment(
        &self,
        request: AugmentRequest,
        sources: &[DocumentSource],
    ) -> AppResult<AugmentOutcome> {
        let started = Instant::now();
        let result = self.run(&request, sources).await;

        if let Err(err) = &result {
            self.observer.log(
                EventLevel::Error,
                "augment.failed",
                &[
                    ("user", request.user.clone()),
                    ("source_id", request.source_id.clone()),
                    ("model", request.model.clone()),
                    ("message_count", request.messages.len().to_string()),
                    ("temperature", self.completion.temperature.to_string()),
                    ("elapsed_ms", started.elapsed().as_millis().to_string()),
                    ("code", err.code().to_string()),
                    ("error", err.to_string()),
                ],
            );
        }

        result
    }

    async fn run(
        &self,
        request: &AugmentRequest,
        sources: &[DocumentSource],
    ) -> AppResult<AugmentOutcome> {
        let retrieval = self
            .retriever
            .search(
                &request.messages,
                &request.source_id,
                sources,
                &request.user,
                &request.model,
            )
            .await?;

        let source = find_source(sources, &request.source_id)
            .ok_or_else(|| AppError::SourceNotFound(request.source_id.clone()))?;
        let prompt = build_messages(&request.messages, &source.profile, &retrieval.hits)?;

        let processor = CitationStreamProcessor::new(prompt.source_map);
        let mut context = RequestContext::new(request, processor, self.completion.temperature);

        let mut llm_request = LlmRequest::new(prompt.messages, &request.model)
            .with_temperature(self.completion.temperature);
        if let Some(max_tokens) = self.completion.max_tokens {
            llm_request = llm_request.with_max_tokens(max_tokens);
        }

        if request.streaming {
            let inner = self.llm.stream(&llm_request.with_streaming()).await?;
            self.observer
                .log(EventLevel::Debug, "augment.stream_started", &context.fields());
            return Ok(AugmentOutcome::Stream(CitationStream::new(
                inner,
                context,
                retrieval.metadata,
                self.observer.clone(),
            )));
        }

        let response = self.llm.complete(&llm_request).await?;
        let output = context.processor.process_complete(&response.content);
        let citations = context.processor.current_citations().to_vec();
        let answer = format!(
            "{}{}",
            output.text,
            metadata_footer(&citations, &retrieval.metadata)
        );

        let mut fields = context.fields();
        fields.push(("citations", citations.len().to_string()));
        fields.push(("result_count", retrieval.metadata.result_count.to_string()));
        self.observer.log(EventLevel::Info, "augment.completed", &fields);

        Ok(AugmentOutcome::Complete(AugmentedCompletion {
            answer,
            citations,
            metadata: retrieval.metadata,
            model: response.model,
            usage: response.usage,
        }))
    }
}

/// One item of a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Answer text, forwarded at the granularity the provider sent it
    Text(String),

    /// A resolved marker, reported for every occurrence
    Citation(Citation),

    /// End of stream with the distinct citations in first-seen order
    Done { citations: Vec<Citation> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Completed,
    Failed,
}

/// Provider stream with citation resolution applied.
///
/// Dropping it before the end drops the provider stream, which releases the
/// connection, and discards the citation state.
pub struct CitationStream {
    inner: Option<LlmStream>,
    context: RequestContext,
    metadata: SearchMetadata,
    observer: Arc<dyn PipelineObserver>,
    queue: VecDeque<StreamEvent>,
    usage: Option<LlmUsage>,
    state: StreamState,
}

impl CitationStream {
    pub fn new(
        inner: LlmStream,
        context: RequestContext,
        metadata: SearchMetadata,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            inner: Some(inner),
            context,
            metadata,
            observer,
            queue: VecDeque::new(),
            usage: None,
            state: StreamState::Streaming,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.context.request_id
    }

    /// Search metadata of the retrieval behind this answer.
    pub fn metadata(&self) -> &SearchMetadata {
        &self.metadata
    }

    fn push_output(&mut self, text: String, citations: Vec<Citation>) {
        if !text.is_empty() {
            self.queue.push_back(StreamEvent::Text(text));
        }
        self.queue
            .extend(citations.into_iter().map(StreamEvent::Citation));
    }

    fn complete(&mut self) {
        self.inner = None;
        let rest = self.context.processor.finish();
        self.push_output(rest.text, rest.citations);

        let citations = self.context.processor.current_citations().to_vec();
        let mut fields = self.context.fields();
        fields.push(("citations", citations.len().to_string()));
        fields.push(("result_count", self.metadata.result_count.to_string()));
        if let Some(usage) = &self.usage {
            fields.push(("total_tokens", usage.total_tokens.to_string()));
        }
        self.observer.log(EventLevel::Info, "augment.completed", &fields);

        self.queue.push_back(StreamEvent::Done { citations });
        self.state = StreamState::Completed;
    }

    fn fail(&mut self, err: &AppError) {
        self.inner = None;
        self.context.processor.reset_citation_tracking(false);
        let mut fields = self.context.fields();
        fields.push(("code", err.code().to_string()));
        fields.push(("error", err.to_string()));
        self.observer.log(EventLevel::Error, "augment.failed", &fields);
        self.state = StreamState::Failed;
    }
}

impl Stream for CitationStream {
    type Item = AppResult<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.queue.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.state != StreamState::Streaming {
                return Poll::Ready(None);
            }

            let Some(inner) = this.inner.as_mut() else {
                this.complete();
                continue;
            };

            match inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => {
                    if chunk.usage.is_some() {
                        this.usage = chunk.usage;
                    }
                    let output = this.context.processor.process_chunk(&chunk.content);
                    this.push_output(output.text, output.citations);
                    if chunk.done {
                        this.complete();
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.fail(&err);
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => this.complete(),
            }
        }
    }
}

impl Drop for CitationStream {
    fn drop(&mut self) {
        if self.state == StreamState::Streaming {
            self.inner = None;
            let mut fields = self.context.fields();
            fields.push(("pending", self.context.processor.has_pending().to_string()));
            self.observer
                .log(EventLevel::Info, "augment.cancelled", &fields);
        }
    }
}

impl std::fmt::Debug for CitationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CitationStream")
            .field("request_id", &self.context.request_id)
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .finish()
    }
}
