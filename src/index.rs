//! In-memory vector index over one document's chunks.
//!
//! Built once per upload and never mutated; a new upload builds a new index
//! and the old one is dropped. Queries are brute-force cosine similarity,
//! which is exact and fast enough for the few hundred chunks a resume
//! produces.

use crate::embedding::cosine_similarity;
use crate::error::{AdvisorError, Result};
use crate::models::{Chunk, ScoredChunk};

#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl VectorIndex {
    /// Build an index from parallel chunk and vector sequences.
    ///
    /// # Errors
    ///
    /// - [`AdvisorError::EmptyIndex`] when there is nothing to index.
    /// - [`AdvisorError::Ingestion`] when the sequences differ in length or
    ///   the vectors differ in dimension.
    pub fn build(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.is_empty() || vectors.is_empty() {
            return Err(AdvisorError::EmptyIndex);
        }
        if chunks.len() != vectors.len() {
            return Err(AdvisorError::Ingestion(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let dims = vectors[0].len();
        if dims == 0 {
            return Err(AdvisorError::Ingestion(
                "embedding vectors are empty".to_string(),
            ));
        }
        if let Some(pos) = vectors.iter().position(|v| v.len() != dims) {
            return Err(AdvisorError::Ingestion(format!(
                "vector {} has {} dimensions, expected {}",
                pos,
                vectors[pos].len(),
                dims
            )));
        }

        Ok(Self {
            chunks,
            vectors,
            dims,
        })
    }

    /// The `k` chunks most similar to `query`, best first.
    ///
    /// Returns `min(k, len)` results. Ties keep index order.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();

        // sort_by is stable, so equal scores stay in index order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(i: usize, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_page: 1,
            chunk_index: i,
        }
    }

    fn sample() -> VectorIndex {
        VectorIndex::build(
            vec![
                chunk(0, "north"),
                chunk(1, "east"),
                chunk(2, "north-east"),
                chunk(3, "south"),
            ],
            vec![
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.7, 0.7],
                vec![0.0, -1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn build_rejects_empty_input() {
        let err = VectorIndex::build(Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, AdvisorError::EmptyIndex));
        assert_eq!(err.to_string(), "cannot build empty index");
    }

    #[test]
    fn build_rejects_length_mismatch() {
        let err = VectorIndex::build(vec![chunk(0, "a")], vec![vec![1.0], vec![2.0]]).unwrap_err();
        assert!(matches!(err, AdvisorError::Ingestion(_)));
    }

    #[test]
    fn build_rejects_ragged_vectors() {
        let err = VectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn query_returns_k_best_first() {
        let index = sample();
        let results = index.query(&[0.1, 1.0], 3);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "north");
        assert_eq!(results[1].chunk.text, "north-east");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn query_with_k_above_size_returns_everything() {
        let index = sample();
        let results = index.query(&[1.0, 0.0], 10);
        assert_eq!(results.len(), index.len());
        assert_eq!(results[0].chunk.text, "east");
        // north and south both score 0.0 and keep index order.
        assert_eq!(results[2].chunk.text, "north");
        assert_eq!(results[3].chunk.text, "south");
    }

    #[test]
    fn ties_keep_index_order() {
        let index = VectorIndex::build(
            vec![chunk(0, "first"), chunk(1, "second"), chunk(2, "third")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();
        let results = index.query(&[1.0, 0.0], 3);
        let order: Vec<usize> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn accessors() {
        let index = sample();
        assert_eq!(index.len(), 4);
        assert!(!index.is_empty());
        assert_eq!(index.dims(), 2);
        assert_eq!(index.chunks()[2].text, "north-east");
    }
}
