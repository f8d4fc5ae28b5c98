//! Incremental citation extraction.
//!
//! [`CitationStreamProcessor`] scans generated text for `[n]` markers while
//! passing every character through unchanged. It is a two-state machine
//! (`Normal`, `InBracket`) with a carry-over buffer, so a marker split across
//! chunks (`"see [1"` + `"2] for"`) is recognized exactly as if it had
//! arrived whole.
//!
//! Rules:
//! - `[` opens a candidate; only ASCII digits may follow.
//! - `]` after at least one digit closes a marker. Known numbers resolve to a
//!   [`Citation`]; unknown numbers are ignored. The marker text is emitted
//!   either way.
//! - Any other character disqualifies the candidate: the buffered text is
//!   emitted literally and the character is scanned again in `Normal`.
//! - Text still buffered at end of input is emitted by [`finish`].
//!
//! [`finish`]: CitationStreamProcessor::finish

use crate::registry::CitationRegistry;
use crate::types::{Citation, SourceNumberMap};

/// Longest digit run accepted inside a marker; fits in a `u32`.
const MAX_MARKER_DIGITS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InBracket,
}

/// Result of feeding one chunk to the processor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkOutput {
    /// Text ready to forward to the caller
    pub text: String,

    /// Citations resolved in this chunk, one per marker occurrence
    pub citations: Vec<Citation>,
}

impl ChunkOutput {
    fn append(&mut self, other: ChunkOutput) {
        self.text.push_str(&other.text);
        self.citations.extend(other.citations);
    }
}

#[derive(Debug, Clone)]
pub struct CitationStreamProcessor {
    registry: CitationRegistry,
    state: ScanState,
    pending: String,
}

impl CitationStreamProcessor {
    pub fn new(sources: SourceNumberMap) -> Self {
        Self::with_registry(CitationRegistry::new(sources))
    }

    pub fn with_registry(registry: CitationRegistry) -> Self {
        Self {
            registry,
            state: ScanState::Normal,
            pending: String::new(),
        }
    }

    /// Feed the next chunk of generated text.
    ///
    /// Text belonging to an unfinished bracket is held back until a later
    /// chunk settles it, so the returned text may be shorter than the input.
    pub fn process_chunk(&mut self, chunk: &str) -> ChunkOutput {
        let mut output = ChunkOutput {
            text: String::with_capacity(chunk.len()),
            citations: Vec::new(),
        };

        for ch in chunk.chars() {
            self.step(ch, &mut output);
        }

        output
    }

    /// Flush text held back by an unclosed bracket at end of input.
    pub fn finish(&mut self) -> ChunkOutput {
        let mut output = ChunkOutput::default();
        if self.state == ScanState::InBracket {
            output.text = std::mem::take(&mut self.pending);
            self.state = ScanState::Normal;
        }
        output
    }

    /// Run a complete, non-streamed text through the same machine.
    pub fn process_complete(&mut self, text: &str) -> ChunkOutput {
        let mut output = self.process_chunk(text);
        output.append(self.finish());
        output
    }

    /// Citations found so far, deduplicated, in first-seen order.
    pub fn current_citations(&self) -> &[Citation] {
        self.registry.current()
    }

    /// Clear scan state and citations. The source map survives only when
    /// `preserve_map` is set.
    pub fn reset_citation_tracking(&mut self, preserve_map: bool) {
        self.registry.reset(preserve_map);
        self.state = ScanState::Normal;
        self.pending.clear();
    }

    /// Whether text is currently held back waiting for a closing bracket.
    pub fn has_pending(&self) -> bool {
        self.state == ScanState::InBracket
    }

    pub fn registry(&self) -> &CitationRegistry {
        &self.registry
    }

    fn step(&mut self, ch: char, output: &mut ChunkOutput) {
        match self.state {
            ScanState::Normal => {
                if ch == '[' {
                    self.state = ScanState::InBracket;
                    self.pending.push(ch);
                } else {
                    output.text.push(ch);
                }
            }
            ScanState::InBracket => {
                let digits = self.pending.len() - 1;
                if ch.is_ascii_digit() && digits < MAX_MARKER_DIGITS {
                    self.pending.push(ch);
                } else if ch == ']' && digits > 0 {
                    self.close_marker(output);
                } else {
                    output.text.push_str(&self.pending);
                    self.pending.clear();
                    self.state = ScanState::Normal;
                    // Rescan: the disqualifying character may open a new bracket
                    self.step(ch, output);
                }
            }
        }
    }

    fn close_marker(&mut self, output: &mut ChunkOutput) {
        let number = self.pending[1..].parse::<u32>().ok();

        output.text.push_str(&self.pending);
        output.text.push(']');
        self.pending.clear();
        self.state = ScanState::Normal;

        if let Some(citation) = number.and_then(|n| self.registry.resolve(n)) {
            self.registry.record(&citation);
            output.citations.push(citation);
        }
    }
}
