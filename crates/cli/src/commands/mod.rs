//! Command handlers for the Citeflow CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod serve;
pub mod sources;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use serve::ServeCommand;
pub use sources::SourcesCommand;

use citeflow_core::{config::AppConfig, AppResult};
use citeflow_llm::client_from_config;
use citeflow_rag::{Augmenter, SourceCatalog};

/// Build the augmenter and load the workspace's sources.
pub fn build_pipeline(config: &AppConfig) -> AppResult<(Augmenter, SourceCatalog)> {
    config.validate()?;

    let llm = client_from_config(config)?;
    let catalog = SourceCatalog::load(&config.workspace)?;
    if catalog.is_empty() {
        tracing::warn!(
            "No sources configured in {:?}",
            SourceCatalog::catalog_path(&config.workspace)
        );
    }

    let augmenter = Augmenter::with_tracing(
        llm,
        config.retrieval.clone(),
        config.completion.clone(),
    );
    Ok((augmenter, catalog))
}
