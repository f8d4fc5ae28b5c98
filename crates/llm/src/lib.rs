//! LLM integration crate for Citeflow.
//!
//! This crate provides a provider-agnostic abstraction for chat completion
//! models. Providers implement [`LlmClient`] for both one-shot and streaming
//! completions.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//!
//! # Example
//! ```no_run
//! use citeflow_llm::{ChatMessage, LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new(vec![ChatMessage::user("Hello, world!")], "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod message;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::{client_from_config, create_client};
pub use message::{ChatMessage, ContentPart, ImageUrl, MessageContent, Role};
pub use providers::OllamaClient;
