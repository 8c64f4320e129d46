//! Store statistics and health overview.
//!
//! Gives a quick summary of what's indexed: entry count, dimension, and
//! on-disk artifact sizes. Used by `ragkit stats` to confirm that ingestion
//! and persistence are working as expected.

use anyhow::Result;

use crate::config::Config;
use crate::index::VectorIndex;

pub fn run_stats(config: &Config) -> Result<()> {
    let mut index = VectorIndex::new(config.store.dimension, &config.store.path)?;

    match index.load(&config.store.name) {
        Ok(_) => {}
        Err(e) => eprintln!("Warning: store could not be loaded: {}", e),
    }

    let stats = index.stats();
    let vec_size = file_size(&index.vec_path(&config.store.name));
    let payload_size = file_size(&index.payload_path(&config.store.name));

    println!("ragkit — Store Stats");
    println!("====================");
    println!();
    println!("  Store:      {}", stats.store_path.display());
    println!("  Name:       {}", config.store.name);
    println!("  Dimension:  {}", stats.dimension);
    println!("  Entries:    {}", stats.entries);
    println!();
    println!("  Vector blob:   {}", format_bytes(vec_size));
    println!("  Payload list:  {}", format_bytes(payload_size));

    Ok(())
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
