use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::retriever::OverflowPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_store_name")]
    pub name: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_store_name() -> String {
    "index".to_string()
}
fn default_dimension() -> usize {
    768
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_token_counter")]
    pub token_counter: String,
    /// Path to a tokenizer.json file; only used when token_counter = "exact".
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            token_counter: default_token_counter(),
            tokenizer_path: None,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_token_counter() -> String {
    "heuristic".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// What to do when a block would overflow the context budget:
    /// "stop" drops it and everything after; "skip" drops it and keeps trying.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            max_context_tokens: default_max_context_tokens(),
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_score_threshold() -> f32 {
    0.3
}
fn default_max_context_tokens() -> usize {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_secs() -> u64 {
    2
}
fn default_max_backoff_secs() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            root: default_documents_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_documents_root() -> PathBuf {
    PathBuf::from("data/documents")
}
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.markdown".to_string(),
        "**/*.txt".to_string(),
    ]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate store
    if config.store.dimension == 0 {
        anyhow::bail!("store.dimension must be > 0");
    }
    if config.store.name.trim().is_empty() {
        anyhow::bail!("store.name must not be empty");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    match config.chunking.token_counter.as_str() {
        "heuristic" | "exact" => {}
        other => anyhow::bail!(
            "Unknown token counter: '{}'. Must be heuristic or exact.",
            other
        ),
    }
    if config.chunking.token_counter == "exact" && config.chunking.tokenizer_path.is_none() {
        anyhow::bail!("chunking.tokenizer_path is required when token_counter is 'exact'");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.score_threshold) {
        anyhow::bail!("retrieval.score_threshold must be in [-1.0, 1.0]");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.max_attempts == 0 {
            anyhow::bail!("embedding.max_attempts must be >= 1");
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be >= 1");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("ragkit.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[store]
path = "data/vector_store"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.store.name, "index");
        assert_eq!(config.store.dimension, 768);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.chunk_overlap, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.score_threshold - 0.3).abs() < 1e-6);
        assert_eq!(config.retrieval.max_context_tokens, 3000);
        assert_eq!(config.retrieval.overflow_policy, OverflowPolicy::Stop);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.embedding.max_attempts, 3);
    }

    #[test]
    fn test_overlap_must_be_below_chunk_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[store]
path = "data/vector_store"

[chunking]
chunk_size = 50
chunk_overlap = 50
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_enabled_provider_requires_model() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[store]
path = "data/vector_store"

[embedding]
provider = "gemini"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_overflow_policy_parsed_at_load() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[store]
path = "data/vector_store"

[retrieval]
overflow_policy = "skip"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(
            config.retrieval.overflow_policy,
            OverflowPolicy::SkipAndContinue
        );
    }

    #[test]
    fn test_unknown_overflow_policy_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[store]
path = "data/vector_store"

[retrieval]
overflow_policy = "retry"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}
