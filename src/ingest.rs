//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow: load documents → chunk → batch-embed →
//! index → save. Mutating the store is exclusive to this command; query
//! traffic reads an already-loaded snapshot.

use anyhow::{bail, Context, Result};

use crate::chunker::Chunker;
use crate::config::Config;
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::index::VectorIndex;
use crate::loader;
use crate::models::ChunkPayload;
use crate::tokens::TokenCounter;

pub async fn run_ingest(
    config: &Config,
    clear: bool,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let mut documents = loader::load_documents(config)?;
    if let Some(lim) = limit {
        documents.truncate(lim);
    }

    if documents.is_empty() {
        println!(
            "No documents found in {}",
            config.documents.root.display()
        );
        return Ok(());
    }

    let chunker = Chunker::new(
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        build_token_counter(config)?,
    );

    let mut all_chunks = Vec::new();
    for doc in &documents {
        all_chunks.extend(chunker.chunk(&doc.content, &doc.source_id, &doc.metadata));
    }

    if dry_run {
        println!("ingest (dry-run)");
        println!("  documents found: {}", documents.len());
        println!("  chunks: {}", all_chunks.len());
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        bail!("Ingestion requires embeddings. Set [embedding] provider in config.");
    }

    let embedder = GeminiEmbedder::new(&config.embedding, config.store.dimension)?;
    let mut index = VectorIndex::new(config.store.dimension, &config.store.path)?;

    if !clear {
        match index.load(&config.store.name) {
            Ok(true) => println!("loaded existing store ({} entries)", index.size()),
            Ok(false) => {}
            Err(e) => eprintln!(
                "Warning: existing store could not be loaded, starting empty: {}",
                e
            ),
        }
    }

    let texts: Vec<String> = all_chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder
        .embed_texts(&texts)
        .await
        .context("chunk embedding failed")?;
    let payloads: Vec<ChunkPayload> = all_chunks.iter().map(ChunkPayload::from_chunk).collect();

    index.add(vectors, payloads)?;
    index.save(&config.store.name)?;

    println!("ingest");
    println!("  documents: {}", documents.len());
    println!("  chunks embedded: {}", all_chunks.len());
    println!("  index entries: {}", index.size());
    println!("  store: {}", index.store_path().display());
    println!("ok");
    Ok(())
}

/// Delete the persisted store artifacts. Destructive; requires `--yes`.
pub fn run_clear(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to delete the store without --yes");
    }

    let index = VectorIndex::new(config.store.dimension, &config.store.path)?;
    index.delete_store(&config.store.name)?;

    println!(
        "cleared store '{}' at {}",
        config.store.name,
        config.store.path.display()
    );
    Ok(())
}

/// Resolve the configured token-counting strategy, fixed for the whole run.
fn build_token_counter(config: &Config) -> Result<TokenCounter> {
    match config.chunking.token_counter.as_str() {
        "heuristic" => Ok(TokenCounter::heuristic()),
        "exact" => {
            #[cfg(feature = "exact-tokenizer")]
            {
                let path = config
                    .chunking
                    .tokenizer_path
                    .as_ref()
                    .context("chunking.tokenizer_path required for the exact token counter")?;
                TokenCounter::exact_from_file(path)
            }
            #[cfg(not(feature = "exact-tokenizer"))]
            {
                bail!(
                    "token_counter = \"exact\" requires building with the exact-tokenizer feature"
                )
            }
        }
        other => bail!(
            "Unknown token counter: '{}'. Must be heuristic or exact.",
            other
        ),
    }
}
