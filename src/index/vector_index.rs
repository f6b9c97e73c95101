/// HNSW vector index for dense evidence search
use super::{sort_candidates, EmbeddingError, EmbeddingProvider, EvidenceIndex, RetrievalCandidate};
use crate::corpus::EvidenceChunk;
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Upper bound on HNSW layers (hnsw_rs clamps to 16)
const MAX_LAYERS: usize = 16;

/// Extra neighbours fetched beyond the requested limit
const TIE_HEADROOM: usize = 8;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Search failed: {0}")]
    SearchError(String),
}

/// HNSW build and search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Connections per layer
    pub hnsw_m: usize,
    /// Construction beam width (higher = better recall, slower build)
    pub ef_construction: usize,
    /// Search beam width; raised to the requested limit when smaller
    pub ef_search: usize,
    /// Chunks embedded per provider call
    pub batch_size: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            hnsw_m: 16,
            ef_construction: 200,
            ef_search: 64,
            batch_size: 32,
        }
    }
}

/// Dense nearest-neighbour index over evidence chunks
///
/// Similarity is cosine (`1 - distance`). HNSW does not guarantee a stable
/// order for equal similarities, so ties are broken by chunk id.
pub struct VectorIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    chunks: Vec<EvidenceChunk>,
    provider: Arc<dyn EmbeddingProvider>,
    config: VectorIndexConfig,
}

impl VectorIndex {
    /// Embed every chunk and build the index
    pub fn build(
        chunks: Vec<EvidenceChunk>,
        provider: Arc<dyn EmbeddingProvider>,
        config: VectorIndexConfig,
    ) -> Result<Self, VectorIndexError> {
        let hnsw = Hnsw::<f32, DistCosine>::new(
            config.hnsw_m,
            chunks.len().max(1),
            MAX_LAYERS,
            config.ef_construction,
            DistCosine,
        );

        let dimension = provider.dimension();
        let batch_size = config.batch_size.max(1);

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = provider.embed_batch(&texts)?;

            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    embeddings.len()
                ))
                .into());
            }

            for (offset, embedding) in embeddings.iter().enumerate() {
                if embedding.len() != dimension {
                    return Err(VectorIndexError::InvalidDimension {
                        expected: dimension,
                        actual: embedding.len(),
                    });
                }
                hnsw.insert((embedding.as_slice(), batch_no * batch_size + offset));
            }
            tracing::debug!("Indexed vector batch {} ({} chunks)", batch_no, batch.len());
        }

        tracing::info!(
            "Vector index built with {} chunks ({}D, model {})",
            chunks.len(),
            dimension,
            provider.model_name()
        );

        Ok(Self {
            hnsw,
            chunks,
            provider,
            config,
        })
    }

    /// Search for the `limit` chunks most similar to `query`
    pub fn search_chunks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, VectorIndexError> {
        if limit == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.provider.embed(query)?;
        if embedding.len() != self.provider.dimension() {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.provider.dimension(),
                actual: embedding.len(),
            });
        }

        // Widen the fetch while equal scores straddle the cut
        let mut fetch = (limit + TIE_HEADROOM).min(self.chunks.len());
        let mut candidates = loop {
            let candidates = self.nearest(&embedding, fetch)?;
            let exhausted = fetch >= self.chunks.len() || candidates.len() < fetch;
            let tied_at_cut = candidates.len() > limit
                && candidates.last().map(|c| c.raw_score) == Some(candidates[limit - 1].raw_score);
            if exhausted || !tied_at_cut {
                break candidates;
            }
            fetch = (fetch * 2).min(self.chunks.len());
            tracing::debug!("Vector ties at rank {}, widening search to {}", limit, fetch);
        };

        candidates.truncate(limit);

        Ok(candidates)
    }

    /// Up to `fetch` neighbours, sorted by score then chunk id
    fn nearest(
        &self,
        embedding: &[f32],
        fetch: usize,
    ) -> Result<Vec<RetrievalCandidate>, VectorIndexError> {
        let ef_search = self.config.ef_search.max(fetch);
        let neighbours = self.hnsw.search(embedding, fetch, ef_search);

        let mut candidates = neighbours
            .into_iter()
            .map(|n| {
                let chunk = self.chunks.get(n.d_id).ok_or_else(|| {
                    VectorIndexError::SearchError(format!("Unknown vector id {}", n.d_id))
                })?;
                Ok(RetrievalCandidate::new(chunk.clone(), 1.0 - n.distance))
            })
            .collect::<Result<Vec<_>, VectorIndexError>>()?;

        sort_candidates(&mut candidates, |c| c.chunk.id.clone());
        Ok(candidates)
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }
}

impl EvidenceIndex for VectorIndex {
    fn search(&self, query: &str, limit: usize) -> crate::error::Result<Vec<RetrievalCandidate>> {
        Ok(self.search_chunks(query, limit)?)
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn backend(&self) -> &'static str {
        "vector"
    }
}
