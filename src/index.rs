//! Flat vector index with normalized inner-product search and durable
//! persistence.
//!
//! Vectors are stored unit-normalized, so the inner product of a stored
//! vector with a normalized query equals their cosine similarity. Storage is
//! exact and flat — every search scans all entries — which is the right
//! trade-off for the tens of thousands of chunks this pipeline targets.
//!
//! Concurrency: `search` is a read-only operation and is safe to run in
//! parallel against an unchanging index. `add`, `clear`, `save`, and `load`
//! mutate or replace state and must be exclusive; the intended deployment is
//! a single ingestion process that mutates while query traffic reads a
//! separate, already-loaded snapshot.
//!
//! Persistence is two co-located artifacts per store name:
//! - `<name>.vec` — binary header (`dim: u32 LE`, `count: u32 LE`) followed
//!   by `dim * count` little-endian `f32` values;
//! - `<name>.json` — the payload list, in the same order as the vectors.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::{ChunkPayload, SearchResult};

/// Floor applied to L2 norms so the zero vector does not divide by zero.
const NORM_EPSILON: f32 = 1e-10;

/// Typed failures from index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index dimension must be greater than zero")]
    ZeroDimension,

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{vectors} vectors cannot be paired with {payloads} payloads")]
    LengthMismatch { vectors: usize, payloads: usize },

    #[error("corrupt store '{name}': {reason}")]
    CorruptStore { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read-only snapshot of index state.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub entries: usize,
    pub dimension: usize,
    pub store_path: PathBuf,
}

/// An exact, flat vector store pairing unit-normalized vectors with opaque
/// chunk payloads. The two internal lists always have equal length and
/// matching order.
pub struct VectorIndex {
    dimension: usize,
    store_path: PathBuf,
    vectors: Vec<Vec<f32>>,
    payloads: Vec<ChunkPayload>,
}

impl VectorIndex {
    /// Create an empty index of fixed `dimension`, backed by `store_path`.
    ///
    /// The store directory is created if missing. Fails on a zero dimension
    /// or an uncreatable directory.
    pub fn new(dimension: usize, store_path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        let store_path = store_path.into();
        std::fs::create_dir_all(&store_path)?;
        Ok(Self {
            dimension,
            store_path,
            vectors: Vec::new(),
            payloads: Vec::new(),
        })
    }

    /// Append vectors with their payloads.
    ///
    /// Each vector is normalized to unit L2 norm before storage. Existing
    /// entries are never reordered or deduplicated. Empty input is a no-op.
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<ChunkPayload>,
    ) -> Result<(), IndexError> {
        if vectors.len() != payloads.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                payloads: payloads.len(),
            });
        }
        if vectors.is_empty() {
            return Ok(());
        }
        for v in &vectors {
            if v.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: v.len(),
                });
            }
        }

        self.vectors
            .extend(vectors.into_iter().map(|v| normalize(&v)));
        self.payloads.extend(payloads);
        Ok(())
    }

    /// Return up to `k` results ranked by cosine similarity, descending.
    ///
    /// The query is normalized before scoring and `k` is clamped to the
    /// index size. An empty index yields an empty result list, not an
    /// error. Ties rank earlier-inserted entries first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, IndexError> {
        if self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query = normalize(query);
        let k = k.min(self.vectors.len());

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&query, v)))
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult {
                payload: self.payloads[i].clone(),
                score,
            })
            .collect())
    }

    /// Persist the full vector set and payload list under `name`.
    ///
    /// Both artifacts are written; if either write fails the store must be
    /// treated as indeterminate and a full save re-run.
    pub fn save(&self, name: &str) -> Result<(), IndexError> {
        let blob = encode_vectors(self.dimension, &self.vectors);
        std::fs::write(self.vec_path(name), blob)?;

        let json = serde_json::to_vec(&self.payloads).map_err(|e| IndexError::CorruptStore {
            name: name.to_string(),
            reason: format!("payload serialization failed: {}", e),
        })?;
        std::fs::write(self.payload_path(name), json)?;
        Ok(())
    }

    /// Restore the index from a previously saved store.
    ///
    /// Returns `Ok(false)` when no store exists under `name` (the index is
    /// left unchanged). A store with only one of its two artifacts, or with
    /// undecodable contents, is reported as [`IndexError::CorruptStore`];
    /// callers are expected to continue with an empty index.
    pub fn load(&mut self, name: &str) -> Result<bool, IndexError> {
        let vec_path = self.vec_path(name);
        let payload_path = self.payload_path(name);

        match (vec_path.exists(), payload_path.exists()) {
            (false, false) => return Ok(false),
            (true, true) => {}
            _ => {
                return Err(IndexError::CorruptStore {
                    name: name.to_string(),
                    reason: "one of the two store artifacts is missing".to_string(),
                })
            }
        }

        let blob = std::fs::read(&vec_path)?;
        let (dim, vectors) = decode_vectors(&blob).map_err(|reason| IndexError::CorruptStore {
            name: name.to_string(),
            reason,
        })?;
        if dim != self.dimension {
            return Err(IndexError::CorruptStore {
                name: name.to_string(),
                reason: format!(
                    "stored dimension {} does not match configured dimension {}",
                    dim, self.dimension
                ),
            });
        }

        let json = std::fs::read(&payload_path)?;
        let payloads: Vec<ChunkPayload> =
            serde_json::from_slice(&json).map_err(|e| IndexError::CorruptStore {
                name: name.to_string(),
                reason: format!("payload deserialization failed: {}", e),
            })?;

        if payloads.len() != vectors.len() {
            return Err(IndexError::CorruptStore {
                name: name.to_string(),
                reason: format!(
                    "{} vectors but {} payloads on disk",
                    vectors.len(),
                    payloads.len()
                ),
            });
        }

        self.vectors = vectors;
        self.payloads = payloads;
        Ok(true)
    }

    /// Remove the persisted artifacts for `name`, if present.
    pub fn delete_store(&self, name: &str) -> Result<(), IndexError> {
        for path in [self.vec_path(name), self.payload_path(name)] {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Reset to an empty index of the same dimension.
    pub fn clear(&mut self) {
        self.vectors.clear();
        self.payloads.clear();
    }

    pub fn size(&self) -> usize {
        self.payloads.len()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            entries: self.payloads.len(),
            dimension: self.dimension,
            store_path: self.store_path.clone(),
        }
    }

    pub fn vec_path(&self, name: &str) -> PathBuf {
        self.store_path.join(format!("{}.vec", name))
    }

    pub fn payload_path(&self, name: &str) -> PathBuf {
        self.store_path.join(format!("{}.json", name))
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }
}

/// Scale a vector to unit L2 norm, with an epsilon floor for the zero vector.
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(NORM_EPSILON);
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode vectors as a header (`dim`, `count` as `u32` LE) followed by
/// little-endian `f32` values.
fn encode_vectors(dimension: usize, vectors: &[Vec<f32>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + vectors.len() * dimension * 4);
    bytes.extend_from_slice(&(dimension as u32).to_le_bytes());
    bytes.extend_from_slice(&(vectors.len() as u32).to_le_bytes());
    for v in vectors {
        for &x in v {
            bytes.extend_from_slice(&x.to_le_bytes());
        }
    }
    bytes
}

/// Decode the blob written by [`encode_vectors`]. Returns the stored
/// dimension and vectors, or a human-readable reason on malformed input.
fn decode_vectors(blob: &[u8]) -> Result<(usize, Vec<Vec<f32>>), String> {
    if blob.len() < 8 {
        return Err(format!("vector blob too short: {} bytes", blob.len()));
    }
    let dim = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    let count = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]) as usize;

    // The header is untrusted; the expected length must not overflow.
    let expected_len = (dim as u64)
        .checked_mul(count as u64)
        .and_then(|n| n.checked_mul(4))
        .and_then(|n| n.checked_add(8));
    if expected_len != Some(blob.len() as u64) {
        return Err(format!(
            "vector blob length {} does not match header ({} x {})",
            blob.len(),
            count,
            dim
        ));
    }

    let mut vectors = Vec::with_capacity(count);
    let mut offset = 8;
    for _ in 0..count {
        let mut v = Vec::with_capacity(dim);
        for _ in 0..dim {
            v.push(f32::from_le_bytes([
                blob[offset],
                blob[offset + 1],
                blob[offset + 2],
                blob[offset + 3],
            ]));
            offset += 4;
        }
        vectors.push(v);
    }

    Ok((dim, vectors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use tempfile::TempDir;

    fn payload(content: &str) -> ChunkPayload {
        ChunkPayload {
            content: content.to_string(),
            source: format!("{}.txt", content),
            metadata: Metadata::new(),
        }
    }

    fn three_entry_index(tmp: &TempDir) -> VectorIndex {
        let mut index = VectorIndex::new(4, tmp.path().join("store")).unwrap();
        index
            .add(
                vec![
                    vec![1.0, 0.0, 0.0, 0.0],
                    vec![0.0, 1.0, 0.0, 0.0],
                    vec![0.0, 0.0, 1.0, 0.0],
                ],
                vec![payload("cats"), payload("dogs"), payload("birds")],
            )
            .unwrap();
        index
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            VectorIndex::new(0, tmp.path()),
            Err(IndexError::ZeroDimension)
        ));
    }

    #[test]
    fn test_add_and_search_ranking() {
        let tmp = TempDir::new().unwrap();
        let index = three_entry_index(&tmp);
        assert_eq!(index.size(), 3);

        let results = index.search(&[1.0, 0.1, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].payload.content.contains("cats"));
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::new(4, tmp.path()).unwrap();
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_k_clamped_to_index_size() {
        let tmp = TempDir::new().unwrap();
        let index = three_entry_index(&tmp);
        let results = index.search(&[1.0, 0.0, 0.0, 0.0], 50).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_ranking_monotonic() {
        let tmp = TempDir::new().unwrap();
        let index = three_entry_index(&tmp);
        let results = index.search(&[0.5, 0.4, 0.3, 0.0], 3).unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_rank_earlier_insertions_first() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(2, tmp.path()).unwrap();
        index
            .add(
                vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![payload("first"), payload("second"), payload("other")],
            )
            .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(results[0].payload.content, "first");
        assert_eq!(results[1].payload.content, "second");
    }

    #[test]
    fn test_stored_vectors_are_unit_norm() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(3, tmp.path()).unwrap();
        index
            .add(vec![vec![3.0, 4.0, 0.0]], vec![payload("v")])
            .unwrap();

        let norm: f32 = index.vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_vector_does_not_panic() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(3, tmp.path()).unwrap();
        index
            .add(vec![vec![0.0, 0.0, 0.0]], vec![payload("zero")])
            .unwrap();
        let results = index.search(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score.is_finite());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(2, tmp.path()).unwrap();
        let err = index
            .add(vec![vec![1.0, 0.0]], vec![payload("a"), payload("b")])
            .unwrap_err();
        assert!(matches!(err, IndexError::LengthMismatch { .. }));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(4, tmp.path()).unwrap();
        let err = index
            .add(vec![vec![1.0, 0.0]], vec![payload("a")])
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 4,
                actual: 2
            }
        ));

        let err = index.search(&[1.0, 0.0], 1);
        // Empty index short-circuits before validation; add an entry first.
        assert!(err.unwrap().is_empty());
        index
            .add(vec![vec![1.0, 0.0, 0.0, 0.0]], vec![payload("a")])
            .unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1),
            Err(IndexError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_add_is_noop() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(4, tmp.path()).unwrap();
        index.add(Vec::new(), Vec::new()).unwrap();
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn test_save_clear_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut index = three_entry_index(&tmp);
        let probe = [1.0, 0.1, 0.0, 0.0];
        let before = index.search(&probe, 3).unwrap();

        index.save("index").unwrap();
        index.clear();
        assert_eq!(index.size(), 0);

        assert!(index.load("index").unwrap());
        assert_eq!(index.size(), 3);

        let after = index.search(&probe, 3).unwrap();
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(after.iter()) {
            assert_eq!(a.payload, b.payload);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_into_fresh_index() {
        let tmp = TempDir::new().unwrap();
        let index = three_entry_index(&tmp);
        index.save("index").unwrap();

        let mut fresh = VectorIndex::new(4, tmp.path().join("store")).unwrap();
        assert!(fresh.load("index").unwrap());
        assert_eq!(fresh.size(), 3);
        let results = fresh.search(&[1.0, 0.1, 0.0, 0.0], 2).unwrap();
        assert!(results[0].payload.content.contains("cats"));
    }

    #[test]
    fn test_load_missing_store_returns_false() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(4, tmp.path()).unwrap();
        assert!(!index.load("nothing").unwrap());
        assert_eq!(index.size(), 0);
    }

    #[test]
    fn test_load_with_one_artifact_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let mut index = three_entry_index(&tmp);
        index.save("index").unwrap();
        std::fs::remove_file(index.payload_path("index")).unwrap();

        assert!(matches!(
            index.load("index"),
            Err(IndexError::CorruptStore { .. })
        ));
    }

    #[test]
    fn test_load_garbage_blob_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(4, tmp.path()).unwrap();
        std::fs::write(index.vec_path("bad"), b"nonsense").unwrap();
        std::fs::write(index.payload_path("bad"), b"[]").unwrap();

        assert!(matches!(
            index.load("bad"),
            Err(IndexError::CorruptStore { .. })
        ));
    }

    #[test]
    fn test_load_oversized_header_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let mut index = VectorIndex::new(4, tmp.path()).unwrap();

        // An 8-byte blob whose header claims 2^31 x 2^31 entries; the
        // implied length overflows and must be rejected, not trusted.
        let mut blob = Vec::new();
        blob.extend_from_slice(&(1u32 << 31).to_le_bytes());
        blob.extend_from_slice(&(1u32 << 31).to_le_bytes());
        std::fs::write(index.vec_path("bad"), blob).unwrap();
        std::fs::write(index.payload_path("bad"), b"[]").unwrap();

        assert!(matches!(
            index.load("bad"),
            Err(IndexError::CorruptStore { .. })
        ));
    }

    #[test]
    fn test_load_dimension_mismatch_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let index = three_entry_index(&tmp);
        index.save("index").unwrap();

        let mut other = VectorIndex::new(8, tmp.path().join("store")).unwrap();
        assert!(matches!(
            other.load("index"),
            Err(IndexError::CorruptStore { .. })
        ));
    }

    #[test]
    fn test_delete_store_removes_artifacts() {
        let tmp = TempDir::new().unwrap();
        let mut index = three_entry_index(&tmp);
        index.save("index").unwrap();
        index.delete_store("index").unwrap();
        assert!(!index.vec_path("index").exists());
        assert!(!index.payload_path("index").exists());
        assert!(!index.load("index").unwrap());
    }

    #[test]
    fn test_stats() {
        let tmp = TempDir::new().unwrap();
        let index = three_entry_index(&tmp);
        let stats = index.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.dimension, 4);
        assert_eq!(stats.store_path, tmp.path().join("store"));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let vectors = vec![vec![1.0f32, -2.5, 3.125], vec![0.0, 0.5, -0.5]];
        let blob = encode_vectors(3, &vectors);
        let (dim, decoded) = decode_vectors(&blob).unwrap();
        assert_eq!(dim, 3);
        assert_eq!(decoded, vectors);
    }
}
