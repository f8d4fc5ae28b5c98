//! Ollama LLM provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime, through
//! its chat endpoint.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use crate::message::ChatMessage;
use citeflow_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama chat response format, used for both full responses and stream lines.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    #[serde(default)]
    message: Option<OllamaResponseMessage>,
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaChatResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }

    fn into_chunk(self) -> LlmStreamChunk {
        let usage = self.done.then(|| self.usage());
        LlmStreamChunk {
            content: self.message.map(|m| m.content).unwrap_or_default(),
            model: self.model,
            done: self.done,
            usage,
        }
    }
}

/// Splits a byte stream into newline-delimited JSON lines.
///
/// Network chunks do not respect line boundaries, so incomplete trailing
/// bytes are carried over to the next push.
#[derive(Debug, Default)]
struct NdjsonLines {
    pending: Vec<u8>,
}

impl NdjsonLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

fn parse_stream_line(line: &str) -> AppResult<LlmStreamChunk> {
    let response: OllamaChatResponse = serde_json::from_str(line)
        .map_err(|e| AppError::Llm(format!("Failed to parse chunk: {}", e)))?;
    Ok(response.into_chunk())
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// Timeout for non-streaming requests
    timeout: Option<Duration>,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
            client: reqwest::Client::new(),
        }
    }

    /// Bound non-streaming completions by a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// Convert LlmRequest to Ollama format.
    fn to_ollama_request(&self, request: &LlmRequest) -> OllamaChatRequest {
        let options = OllamaOptions {
            temperature: request.temperature,
            top_p: request.top_p,
            num_predict: request.max_tokens,
        };
        let has_options =
            options.temperature.is_some() || options.top_p.is_some() || options.num_predict.is_some();

        OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(to_ollama_message).collect(),
            stream: request.stream,
            options: has_options.then_some(options),
        }
    }

    async fn post(&self, body: &OllamaChatRequest, with_timeout: bool) -> AppResult<reqwest::Response> {
        let mut builder = self.client.post(self.chat_url()).json(body);
        if let (true, Some(timeout)) = (with_timeout, self.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

/// Ollama takes raw base64 image payloads, so only data URLs are forwarded.
fn to_ollama_message(message: &ChatMessage) -> OllamaMessage {
    let images = message
        .content
        .image_urls()
        .into_iter()
        .filter_map(|url| url.split_once(";base64,").map(|(_, data)| data.to_string()))
        .collect();

    OllamaMessage {
        role: message.role.as_str(),
        content: message.text(),
        images,
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Sending chat completion to Ollama");

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = false;

        let response = self.post(&ollama_request, true).await?;
        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::debug!(model = %ollama_response.model, "Received completion from Ollama");

        let usage = ollama_response.usage();
        Ok(LlmResponse {
            content: ollama_response
                .message
                .map(|m| m.content)
                .unwrap_or_default(),
            model: ollama_response.model,
            usage,
            done: ollama_response.done,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::debug!(model = %request.model, messages = request.messages.len(), "Starting streaming chat with Ollama");

        let mut ollama_request = self.to_ollama_request(request);
        ollama_request.stream = true;

        let response = self.post(&ollama_request, false).await?;
        let bytes = Box::pin(response.bytes_stream());

        let stream = futures::stream::unfold(
            (bytes, NdjsonLines::default(), false),
            |(mut bytes, mut lines, finished)| async move {
                if finished {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let items: Vec<_> = lines
                            .push(&chunk)
                            .iter()
                            .map(|line| parse_stream_line(line))
                            .collect();
                        Some((items, (bytes, lines, false)))
                    }
                    Some(Err(e)) => {
                        let err = AppError::Llm(format!("Stream error: {}", e));
                        Some((vec![Err(err)], (bytes, lines, true)))
                    }
                    None => {
                        let items: Vec<_> = lines
                            .finish()
                            .iter()
                            .map(|line| parse_stream_line(line))
                            .collect();
                        Some((items, (bytes, lines, true)))
                    }
                }
            },
        )
        .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }
}
