//! Query command: retrieve ranked chunks and print the assembled context.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::GeminiEmbedder;
use crate::index::VectorIndex;
use crate::models::SearchResult;
use crate::retriever::Retriever;

pub async fn run_query(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    max_tokens: Option<usize>,
    show_context: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Query requires embeddings. Set [embedding] provider in config.");
    }

    let embedder = GeminiEmbedder::new(&config.embedding, config.store.dimension)?;
    let mut index = VectorIndex::new(config.store.dimension, &config.store.path)?;

    match index.load(&config.store.name) {
        Ok(true) => {}
        Ok(false) => {
            println!("No results. (store is empty — run `ragkit ingest` first)");
            return Ok(());
        }
        Err(e) => {
            eprintln!("Warning: store could not be loaded: {}", e);
            println!("No results.");
            return Ok(());
        }
    }

    let retriever = Retriever::new(
        &embedder,
        &index,
        config.retrieval.top_k,
        config.retrieval.score_threshold,
    )
    .with_overflow_policy(config.retrieval.overflow_policy);

    let max_tokens = max_tokens.unwrap_or(config.retrieval.max_context_tokens);
    let retrieved = retriever.retrieve_and_format(query, top_k, max_tokens).await?;

    if retrieved.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in retrieved.results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, result.score, result.payload.source);
        println!(
            "    excerpt: \"{}\"",
            excerpt(&result.payload.content).trim()
        );
    }

    println!();
    println!("Sources:");
    println!("{}", format_sources(&retrieved.results, 3));

    if show_context {
        println!();
        println!("{}", retrieved.context);
    }

    Ok(())
}

/// Ranked source list for display: basename plus relevance percentage.
fn format_sources(results: &[SearchResult], max_sources: usize) -> String {
    if results.is_empty() {
        return "No sources available".to_string();
    }

    results
        .iter()
        .take(max_sources)
        .enumerate()
        .map(|(i, result)| {
            let name = result
                .payload
                .source
                .rsplit('/')
                .next()
                .unwrap_or(&result.payload.source);
            format!("{}. {} ({:.0}%)", i + 1, name, result.score * 100.0)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn excerpt(content: &str) -> String {
    content.chars().take(240).collect::<String>().replace('\n', " ")
}
