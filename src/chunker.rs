//! Semantic-boundary-aware text chunker.
//!
//! Splits document text into overlapping [`Chunk`]s sized to a token budget.
//! Splitting prefers paragraph boundaries (blank lines) and falls back to
//! sentence boundaries for paragraphs that exceed the budget on their own.
//!
//! The chunker is a pure transformation: the same input always yields the
//! same output, and no state is carried between calls.

use crate::models::{Chunk, Metadata};
use crate::tokens::TokenCounter;

/// Splits text into token-budgeted chunks with configurable overlap.
///
/// The token-counting strategy is fixed at construction.
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    counter: TokenCounter,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, counter: TokenCounter) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            counter,
        }
    }

    /// Split `text` into an ordered sequence of chunks.
    ///
    /// Paragraphs are accumulated greedily until the next one would exceed
    /// the chunk size; the accumulator is then flushed and the new chunk is
    /// seeded with an overlap tail drawn from the flushed text. A paragraph
    /// that alone exceeds the budget is split by sentences instead, with no
    /// cross-paragraph overlap.
    ///
    /// Chunk indices are dense, starting at 0. Empty or whitespace-only
    /// input yields an empty sequence.
    pub fn chunk(&self, text: &str, source_id: &str, metadata: &Metadata) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let paragraphs = split_paragraphs(text);
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for para in paragraphs {
            let para_tokens = self.counter.count(&para);

            if para_tokens > self.chunk_size {
                // Oversized paragraph: flush what we have, then pack its
                // sentences into their own chunks.
                if !current.is_empty() {
                    chunks.push(self.make_chunk(&current, source_id, chunks.len(), metadata));
                    current.clear();
                    current_tokens = 0;
                }
                self.pack_sentences(&para, source_id, metadata, &mut chunks);
            } else if current_tokens + para_tokens > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(self.make_chunk(&current, source_id, chunks.len(), metadata));
                }
                // Seed the next chunk with the tail of the one just flushed.
                let overlap = self.overlap_tail(&current);
                current.clear();
                if !overlap.is_empty() {
                    current.push(overlap);
                }
                current.push(para);
                current_tokens = self.counter.count(&current.join(" "));
            } else {
                current.push(para);
                current_tokens += para_tokens;
            }
        }

        if !current.is_empty() {
            chunks.push(self.make_chunk(&current, source_id, chunks.len(), metadata));
        }

        chunks
    }

    /// Greedily pack the sentences of an oversized paragraph into chunks.
    /// No overlap is applied between sentence-packed chunks.
    fn pack_sentences(
        &self,
        paragraph: &str,
        source_id: &str,
        metadata: &Metadata,
        chunks: &mut Vec<Chunk>,
    ) {
        let sentences = split_sentences(paragraph);
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for sentence in sentences {
            let sentence_tokens = self.counter.count(&sentence);

            if current_tokens + sentence_tokens > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(self.make_chunk(&current, source_id, chunks.len(), metadata));
                }
                // A single sentence over budget still becomes its own chunk;
                // there is no splitting below sentence granularity.
                current = vec![sentence];
                current_tokens = sentence_tokens;
            } else {
                current.push(sentence);
                current_tokens += sentence_tokens;
            }
        }

        if !current.is_empty() {
            chunks.push(self.make_chunk(&current, source_id, chunks.len(), metadata));
        }
    }

    fn make_chunk(
        &self,
        parts: &[String],
        source_id: &str,
        index: usize,
        metadata: &Metadata,
    ) -> Chunk {
        let content = parts.join(" ");
        let token_count = self.counter.count(&content);

        let mut merged = metadata.clone();
        merged.insert("token_count".to_string(), serde_json::json!(token_count));

        Chunk {
            content,
            source_id: source_id.to_string(),
            index,
            token_count,
            metadata: merged,
        }
    }

    /// Tail of the accumulated text used to seed the next chunk.
    /// An accumulator shorter than `chunk_overlap` tokens is returned whole.
    fn overlap_tail(&self, parts: &[String]) -> String {
        if parts.is_empty() {
            return String::new();
        }
        let full = parts.join(" ");
        self.counter.tail(&full, self.chunk_overlap)
    }
}

/// Split text into paragraphs on blank-line boundaries.
/// Whitespace-only lines count as blank; empty paragraphs are discarded.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buf = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !buf.trim().is_empty() {
                paragraphs.push(buf.trim().to_string());
            }
            buf.clear();
        } else {
            if !buf.is_empty() {
                buf.push('\n');
            }
            buf.push_str(line);
        }
    }
    if !buf.trim().is_empty() {
        paragraphs.push(buf.trim().to_string());
    }

    paragraphs
}

/// Split text into sentences at sentence-ending punctuation followed by
/// whitespace. The punctuation stays with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut start = 0usize;

    for i in 0..chars.len() {
        let (_, ch) = chars[i];
        if matches!(ch, '.' | '!' | '?') {
            if let Some(&(next_pos, next_ch)) = chars.get(i + 1) {
                if next_ch.is_whitespace() {
                    let piece = text[start..next_pos].trim();
                    if !piece.is_empty() {
                        sentences.push(piece.to_string());
                    }
                    start = next_pos;
                }
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }

    sentences
}
