//! Filesystem document loader.
//!
//! Scans the configured documents directory for plain-text files (Markdown
//! and `.txt` by default) and produces [`Document`]s for the chunker.
//! Unreadable files are warned about and skipped; the scan itself only fails
//! when the root directory is missing. Results are sorted by source id for
//! deterministic ingestion order.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::{Document, Metadata};

pub fn load_documents(config: &Config) -> Result<Vec<Document>> {
    let docs_config = &config.documents;

    let root = &docs_config.root;
    if !root.exists() {
        bail!("Documents root does not exist: {}", root.display());
    }

    let include_set = build_globset(&docs_config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(docs_config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        match load_text_file(path, &rel_str) {
            Ok(doc) => documents.push(doc),
            Err(e) => eprintln!("Warning: skipping {}: {}", path.display(), e),
        }
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    Ok(documents)
}

fn load_text_file(path: &Path, source_id: &str) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;

    let file_type = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut metadata = Metadata::new();
    metadata.insert("file_type".to_string(), serde_json::json!(file_type));
    metadata.insert("filename".to_string(), serde_json::json!(filename));

    Ok(Document {
        content,
        source_id: source_id.to_string(),
        metadata,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DocumentsConfig, StoreConfig};
    use tempfile::TempDir;

    fn config_for(root: &Path) -> Config {
        Config {
            store: StoreConfig {
                path: root.join("store"),
                name: "index".to_string(),
                dimension: 4,
            },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: Default::default(),
            documents: DocumentsConfig {
                root: root.join("docs"),
                ..Default::default()
            },
        }
    }

    fn setup_docs(tmp: &TempDir) {
        let docs = tmp.path().join("docs");
        std::fs::create_dir_all(docs.join("sub")).unwrap();
        std::fs::write(docs.join("b.md"), "# Beta\n\nBody.").unwrap();
        std::fs::write(docs.join("a.txt"), "Alpha body.").unwrap();
        std::fs::write(docs.join("sub/c.markdown"), "Gamma body.").unwrap();
        std::fs::write(docs.join("ignore.pdf"), "%PDF").unwrap();
    }

    #[test]
    fn test_loads_supported_extensions_sorted() {
        let tmp = TempDir::new().unwrap();
        setup_docs(&tmp);
        let docs = load_documents(&config_for(tmp.path())).unwrap();

        let sources: Vec<&str> = docs.iter().map(|d| d.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.md", "sub/c.markdown"]);
    }

    #[test]
    fn test_metadata_carries_file_type_and_name() {
        let tmp = TempDir::new().unwrap();
        setup_docs(&tmp);
        let docs = load_documents(&config_for(tmp.path())).unwrap();

        let md = docs.iter().find(|d| d.source_id == "b.md").unwrap();
        assert_eq!(md.metadata["file_type"], serde_json::json!("md"));
        assert_eq!(md.metadata["filename"], serde_json::json!("b.md"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_documents(&config_for(tmp.path())).is_err());
    }

    #[test]
    fn test_exclude_globs_respected() {
        let tmp = TempDir::new().unwrap();
        setup_docs(&tmp);
        let mut config = config_for(tmp.path());
        config.documents.exclude_globs = vec!["**/sub/**".to_string()];

        let docs = load_documents(&config).unwrap();
        assert!(docs.iter().all(|d| !d.source_id.starts_with("sub/")));
    }
}
