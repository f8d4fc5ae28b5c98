//! Ask command handler.
//!
//! Runs one augmented request against a configured source and prints the
//! answer with its citations.

use clap::Args;
use citeflow_core::{config::AppConfig, AppError, AppResult};
use citeflow_llm::ChatMessage;
use citeflow_rag::augment::ANONYMOUS_USER;
use citeflow_rag::{into_wire_stream, AugmentOutcome, AugmentRequest, Citation, ResponseEnvelope};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Ask a question against a document source
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Source to search
    #[arg(short, long, env = "CITEFLOW_SOURCE")]
    pub source: String,

    /// Earlier conversation as a JSON array of chat messages
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Disable streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Output the response envelope as JSON (implies --no-stream)
    #[arg(long)]
    pub json: bool,

    /// User name reported in logs
    #[arg(short, long)]
    pub user: Option<String>,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut messages = match &self.history {
            Some(path) => load_history(path)?,
            None => Vec::new(),
        };
        messages.push(ChatMessage::user(self.question.clone()));

        let (augmenter, catalog) = super::build_pipeline(config)?;

        let request = AugmentRequest::new(messages, &self.source, &config.model)
            .with_streaming(self.is_streaming())
            .with_user(self.user.as_deref().unwrap_or(ANONYMOUS_USER));

        match augmenter.augment(request, catalog.sources()).await? {
            AugmentOutcome::Complete(completion) => {
                if self.json {
                    let envelope = ResponseEnvelope::from(completion);
                    let json = serde_json::to_string_pretty(&envelope)?;
                    println!("{}", json);
                } else {
                    println!("{}", completion.answer);
                    print_citations(&completion.citations);
                    tracing::debug!(
                        "Token usage - Prompt: {}, Completion: {}, Total: {}",
                        completion.usage.prompt_tokens,
                        completion.usage.completion_tokens,
                        completion.usage.total_tokens
                    );
                }
            }
            AugmentOutcome::Stream(stream) => {
                let mut wire = Box::pin(into_wire_stream(stream));
                let mut stdout = std::io::stdout();

                // Stream the wire body to stdout in real time
                while let Some(fragment) = wire.next().await {
                    print!("{}", fragment?);
                    stdout.flush().ok();
                }
                println!();
            }
        }

        Ok(())
    }

    /// Check if streaming is enabled.
    pub fn is_streaming(&self) -> bool {
        !self.no_stream && !self.json
    }
}

/// Read earlier turns from a JSON file.
fn load_history(path: &Path) -> AppResult<Vec<ChatMessage>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        AppError::Config(format!("Failed to parse history file {:?}: {}", path, e))
    })
}

fn print_citations(citations: &[Citation]) {
    if citations.is_empty() {
        return;
    }
    println!();
    for citation in citations {
        if citation.date.is_empty() {
            println!("[{}] {} <{}>", citation.number, citation.title, citation.url);
        } else {
            println!(
                "[{}] {} ({}) <{}>",
                citation.number, citation.title, citation.date, citation.url
            );
        }
    }
}
