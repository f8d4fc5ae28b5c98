//! LLM provider factory.
//!
//! Creates LLM clients from application configuration.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use citeflow_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier (currently "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `timeout` - Optional timeout for non-streaming completions
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    timeout: Option<Duration>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            let mut client = OllamaClient::with_base_url(base_url);
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout);
            }
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

/// Create the LLM client described by the application configuration.
pub fn client_from_config(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    create_client(
        &config.provider,
        config.endpoint.as_deref(),
        config.llm_timeout_secs.map(Duration::from_secs),
    )
}
