//! Document index abstraction.
//!
//! The pipeline talks to any search backend through [`DocumentIndex`]. The
//! in-memory implementation serves the CLI, the HTTP server and the tests.

pub mod embedding;
pub mod memory;

pub use embedding::TrigramEmbedder;
pub use memory::InMemoryIndex;

use crate::types::{SearchHit, SearchOptions};
use citeflow_core::AppResult;

/// Trait for document index backends.
///
/// Implementations must:
/// - rank hits by descending score for the requested mode
/// - exclude semantic hits scoring below `options.similarity_threshold`
/// - return at most `options.max_results` hits
#[async_trait::async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run one search.
    async fn search(&self, query: &str, options: &SearchOptions) -> AppResult<Vec<SearchHit>>;
}
