//! Retrieval-augmented chat with inline citations.
//!
//! Pipeline for one request:
//! 1. [`query`]: derive the search query, reformulating follow-ups
//! 2. [`retriever`]: search a [`DocumentIndex`], dedup hits, compute metadata
//! 3. [`assembler`]: number sources and build the completion prompt
//! 4. [`augment`]: call the completion provider and resolve `[n]` markers
//!    through [`citation`], streamed or in one piece
//! 5. [`wire`]: encode the result for HTTP and CLI consumers

pub mod assembler;
pub mod augment;
pub mod citation;
pub mod index;
pub mod observer;
pub mod query;
pub mod registry;
pub mod retriever;
pub mod sources;
pub mod types;
pub mod wire;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use assembler::{build_messages, AssembledPrompt};
pub use augment::{
    AugmentOutcome, AugmentRequest, AugmentedCompletion, Augmenter, CitationStream,
    RequestContext, StreamEvent,
};
pub use citation::{ChunkOutput, CitationStreamProcessor};
pub use index::{DocumentIndex, InMemoryIndex};
pub use observer::{EventLevel, PipelineObserver, RecordingObserver, TracingObserver};
pub use query::{QueryProcessor, ResolvedQuery};
pub use registry::{deduplicate_citations, CitationRegistry};
pub use retriever::{Retrieval, Retriever};
pub use sources::{DocumentSource, SourceCatalog};
pub use types::{
    Citation, SearchDocument, SearchField, SearchHit, SearchMetadata, SearchMode, SearchOptions,
    SourceNumberMap,
};
pub use wire::{into_wire_stream, ResponseEnvelope, CITATIONS_DELIMITER};
