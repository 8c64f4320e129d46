//! Core data models used throughout ragkit.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered key/value metadata attached to documents and chunks.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A raw document produced by the loader, immutable once created.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub source_id: String,
    pub metadata: Metadata,
}

/// A bounded slice of a document's text, sized for embedding.
///
/// Identity is `(source_id, index)`; indices within one source form a dense
/// 0-based sequence. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub source_id: String,
    pub index: usize,
    pub token_count: usize,
    pub metadata: Metadata,
}

impl Chunk {
    /// Unique identifier within the corpus: `<source>::chunk_<index>`.
    pub fn id(&self) -> String {
        format!("{}::chunk_{}", self.source_id, self.index)
    }
}

/// The record stored alongside each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ChunkPayload {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            content: chunk.content.clone(),
            source: chunk.source_id.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

/// A scored payload returned by a similarity search.
///
/// `score` is the inner product of unit-normalized vectors (cosine
/// similarity), in `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub payload: ChunkPayload,
    pub score: f32,
}

/// The assembled output of one retrieval: a formatted context string plus
/// the ranked results it was built from.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub context: String,
    pub results: Vec<SearchResult>,
}
