//! Retrieval orchestration: query embedding, index search, score filtering,
//! and token-bounded context assembly.
//!
//! The retriever carries no internal state; every call is a pure function of
//! its inputs plus the externally owned embedder and index.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::{RetrievedContext, SearchResult};
use crate::tokens::CHARS_PER_TOKEN;

/// Returned by [`Retriever::format_context`] when there is nothing to format.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant information found in the knowledge base.";

/// Separator between context blocks.
const BLOCK_SEPARATOR: &str = "\n---\n";

/// What to do when the next context block would overflow the token budget.
///
/// Parsed once from configuration (`"stop"` or `"skip"`); an unknown name
/// is rejected at config load, not at retrieval time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum OverflowPolicy {
    /// Stop assembling entirely; later, lower-ranked blocks are dropped.
    /// This favors fewer, higher-relevance blocks.
    #[default]
    #[serde(rename = "stop")]
    Stop,
    /// Skip the oversized block and keep trying later ones.
    #[serde(rename = "skip")]
    SkipAndContinue,
}

/// Orchestrates query embedding, similarity search, threshold filtering,
/// and context formatting against a borrowed embedder and index.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a VectorIndex,
    top_k: usize,
    score_threshold: f32,
    overflow_policy: OverflowPolicy,
}

impl<'a> Retriever<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a VectorIndex,
        top_k: usize,
        score_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            score_threshold,
            overflow_policy: OverflowPolicy::default(),
        }
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Retrieve relevant chunks for `query`, ranked by descending score.
    ///
    /// An empty or whitespace-only query yields an empty result without
    /// touching the provider. Results scoring below the threshold are
    /// dropped. Provider failures propagate to the caller after the retry
    /// budget is exhausted.
    pub async fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let k = top_k.unwrap_or(self.top_k);
        let query_vector = self
            .embedder
            .embed_query(query)
            .await
            .context("query embedding failed")?;

        let results = self.index.search(&query_vector, k)?;

        Ok(results
            .into_iter()
            .filter(|r| r.score >= self.score_threshold)
            .collect())
    }

    /// Assemble already-ranked results into a bounded context string.
    ///
    /// Each result becomes a labeled block; block cost is estimated at
    /// `len / 4` tokens and blocks accumulate until the budget would be
    /// exceeded, at which point the configured [`OverflowPolicy`] applies.
    /// Empty input yields the fixed [`NO_CONTEXT_SENTINEL`].
    pub fn format_context(&self, results: &[SearchResult], max_tokens: usize) -> String {
        if results.is_empty() {
            return NO_CONTEXT_SENTINEL.to_string();
        }

        let mut blocks = Vec::new();
        let mut used_tokens = 0usize;

        for (i, result) in results.iter().enumerate() {
            let block = format!(
                "\n[Source {}: {}]\nRelevance: {:.2}\nContent: {}\n",
                i + 1,
                result.payload.source,
                result.score,
                result.payload.content
            );
            let block_tokens = block.chars().count() / CHARS_PER_TOKEN;

            if used_tokens + block_tokens > max_tokens {
                match self.overflow_policy {
                    OverflowPolicy::Stop => break,
                    OverflowPolicy::SkipAndContinue => continue,
                }
            }

            used_tokens += block_tokens;
            blocks.push(block);
        }

        blocks.join(BLOCK_SEPARATOR)
    }

    /// Retrieve and format in one call.
    pub async fn retrieve_and_format(
        &self,
        query: &str,
        top_k: Option<usize>,
        max_tokens: usize,
    ) -> Result<RetrievedContext> {
        let results = self.retrieve(query, top_k).await?;
        let context = self.format_context(&results, max_tokens);
        Ok(RetrievedContext { context, results })
    }
}
