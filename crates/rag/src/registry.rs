//! Per-request citation registry.
//!
//! Holds the source number map for one request together with the citations
//! resolved so far, deduplicated by number in first-seen order.

use crate::types::{Citation, SourceNumberMap};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct CitationRegistry {
    sources: Option<SourceNumberMap>,
    emitted: HashSet<u32>,
    citations: Vec<Citation>,
}

impl CitationRegistry {
    pub fn new(sources: SourceNumberMap) -> Self {
        Self {
            sources: Some(sources),
            emitted: HashSet::new(),
            citations: Vec::new(),
        }
    }

    /// Registry without a map; every marker resolves to nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn source_map(&self) -> Option<&SourceNumberMap> {
        self.sources.as_ref()
    }

    /// Install a new map, keeping accumulated citations.
    pub fn set_source_map(&mut self, sources: SourceNumberMap) {
        self.sources = Some(sources);
    }

    /// Look up a marker number. Unknown numbers resolve to `None`.
    pub fn resolve(&self, number: u32) -> Option<Citation> {
        self.sources.as_ref()?.citation(number)
    }

    /// Record a resolved citation. Returns `true` the first time a number is seen.
    pub fn record(&mut self, citation: &Citation) -> bool {
        if self.emitted.insert(citation.number) {
            self.citations.push(citation.clone());
            true
        } else {
            false
        }
    }

    /// Citations found so far, in first-seen order.
    pub fn current(&self) -> &[Citation] {
        &self.citations
    }

    /// Clear accumulated citations; drop the map too unless `preserve_map`.
    pub fn reset(&mut self, preserve_map: bool) {
        self.emitted.clear();
        self.citations.clear();
        if !preserve_map {
            self.sources = None;
        }
    }
}

/// Collapse citations by number, keeping the first occurrence of each.
pub fn deduplicate_citations(citations: &[Citation]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    citations
        .iter()
        .filter(|citation| seen.insert(citation.number))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SearchDocument;

    fn registry() -> CitationRegistry {
        let docs = vec![
            SearchDocument::new("Doc A", "u1", "2024-01-01", "a"),
            SearchDocument::new("Doc B", "u2", "2024-01-02", "b"),
        ];
        CitationRegistry::new(SourceNumberMap::from_documents(&docs))
    }

    #[test]
    fn test_record_dedupes_by_number() {
        let mut registry = registry();
        let first = registry.resolve(1).unwrap();

        assert!(registry.record(&first));
        assert!(!registry.record(&first));
        assert!(registry.record(&registry.resolve(2).unwrap()));
        assert_eq!(
            registry.current().iter().map(|c| c.number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_unknown_number_resolves_to_none() {
        assert!(registry().resolve(99).is_none());
        assert!(CitationRegistry::empty().resolve(1).is_none());
    }

    #[test]
    fn test_reset_preserving_map() {
        let mut registry = registry();
        registry.record(&registry.resolve(1).unwrap());

        registry.reset(true);
        assert!(registry.current().is_empty());
        assert!(registry.resolve(1).is_some());
        // A number can be recorded again after a reset
        assert!(registry.record(&registry.resolve(1).unwrap()));
    }

    #[test]
    fn test_full_reset_drops_map() {
        let mut registry = registry();
        registry.record(&registry.resolve(2).unwrap());

        registry.reset(false);
        assert!(registry.current().is_empty());
        assert!(registry.source_map().is_none());
        assert!(registry.resolve(2).is_none());
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let a = Citation {
            number: 1,
            title: "Doc A".into(),
            url: "u1".into(),
            date: "2024-01-01".into(),
        };
        let b = Citation {
            number: 2,
            title: "Doc B".into(),
            url: "u2".into(),
            date: "2024-01-02".into(),
        };
        let input = vec![a.clone(), b.clone(), a.clone(), a.clone(), b.clone()];

        let once = deduplicate_citations(&input);
        let twice = deduplicate_citations(&once);
        assert_eq!(once, vec![a, b]);
        assert_eq!(once, twice);
    }
}
