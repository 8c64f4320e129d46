//! Embedding provider abstraction and the Gemini implementation.
//!
//! The [`Embedder`] trait is the seam between the retrieval pipeline and the
//! external embedding model. The concrete [`GeminiEmbedder`] calls the Gemini
//! embedding REST API with batching, bounded retry, and backoff.
//!
//! # Retry Strategy
//!
//! Embedding is a pure function of its input text, so transient failures are
//! safe to retry. Each call site applies an explicit [`RetryPolicy`]:
//! at most 3 attempts, exponential backoff starting at 2s and capped at 10s.
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//!
//! Batch embedding partitions input into batches of at most
//! [`MAX_BATCH_SIZE`] texts. A batch that fails after retries falls back to
//! per-item embedding so a single bad item does not sink the whole batch.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// Hard ceiling on texts per batch API call.
pub const MAX_BATCH_SIZE: usize = 100;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The external embedding provider contract.
///
/// Implementations must return vectors of exactly `dims()` elements; the
/// pipeline validates this at the boundary before anything reaches the index.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of document texts, one vector per input, in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Bounded retry schedule applied around each external call.
///
/// Kept as a plain value so the schedule is testable independent of the
/// calls it wraps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_secs(config.initial_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }

    /// Delay to sleep before the given 1-based attempt.
    ///
    /// Attempt 1 runs immediately; attempt `n` waits
    /// `initial * 2^(n-2)`, capped at `max_backoff`.
    pub fn backoff_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        let exp = attempt.saturating_sub(2).min(16);
        let delay = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        Some(delay)
    }
}

/// Embedding provider backed by the Gemini embedding API.
///
/// Requires the `GEMINI_API_KEY` environment variable. Queries and documents
/// are embedded with distinct task types (`RETRIEVAL_QUERY` /
/// `RETRIEVAL_DOCUMENT`) for better retrieval quality.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    batch_size: usize,
    retry: RetryPolicy,
}

impl GeminiEmbedder {
    /// Create a provider from configuration. `dims` is the index's
    /// configured dimension; every returned vector is validated against it.
    pub fn new(config: &EmbeddingConfig, dims: usize) -> Result<Self> {
        if config.provider != "gemini" {
            bail!(
                "GeminiEmbedder requires embedding.provider = \"gemini\", got '{}'",
                config.provider
            );
        }
        let model = config
            .model
            .clone()
            .context("embedding.model required for the gemini provider")?;
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            dims,
            batch_size: config.batch_size.min(MAX_BATCH_SIZE),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Embed one text with retry. `task_type` distinguishes queries from
    /// documents on the Gemini side.
    async fn embed_single(&self, text: &str, task_type: &str) -> Result<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", GEMINI_API_BASE, self.model);
        let body = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [ { "text": text } ] },
            "taskType": task_type,
        });

        let json = self.post_with_retry(&url, &body).await?;
        let vector = parse_embed_response(&json)?;
        self.check_dims(&vector)?;
        Ok(vector)
    }

    /// Embed a single batch (already within the batch-size limit) with retry.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/models/{}:batchEmbedContents",
            GEMINI_API_BASE, self.model
        );
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [ { "text": text } ] },
                    "taskType": "RETRIEVAL_DOCUMENT",
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let json = self.post_with_retry(&url, &body).await?;
        let vectors = parse_batch_response(&json)?;
        if vectors.len() != texts.len() {
            bail!(
                "batch embedding returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        for v in &vectors {
            self.check_dims(v)?;
        }
        Ok(vectors)
    }

    /// POST with the retry policy: 429/5xx and network errors are retried
    /// with exponential backoff, other client errors fail immediately.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut last_err = None;

        for attempt in 1..=self.retry.max_attempts {
            if let Some(delay) = self.retry.backoff_before(attempt) {
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .header("Content-Type", "application/json")
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Gemini API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }

    fn check_dims(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dims {
            bail!(
                "embedding dimension {} does not match configured dimension {}",
                vector.len(),
                self.dims
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_single(text, "RETRIEVAL_QUERY").await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            match self.embed_batch(batch).await {
                Ok(vectors) => all.extend(vectors),
                Err(e) => {
                    // Per-item fallback isolates which text is failing.
                    eprintln!("Warning: batch embedding failed, retrying per item: {}", e);
                    for text in batch {
                        let vector = self
                            .embed_single(text, "RETRIEVAL_DOCUMENT")
                            .await
                            .with_context(|| {
                                format!("embedding failed for text starting {:?}", truncate(text))
                            })?;
                        all.push(vector);
                    }
                }
            }
        }

        Ok(all)
    }
}

/// Extract `embedding.values` from a single-embed response.
fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .context("Invalid Gemini response: missing embedding.values")?;

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Extract `embeddings[].values` from a batch-embed response, in order.
fn parse_batch_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .context("Invalid Gemini response: missing embeddings array")?;

    let mut vectors = Vec::with_capacity(embeddings.len());
    for item in embeddings {
        let values = item
            .get("values")
            .and_then(|v| v.as_array())
            .context("Invalid Gemini response: missing values")?;
        vectors.push(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(vectors)
}

fn truncate(text: &str) -> String {
    text.chars().take(40).collect()
}
