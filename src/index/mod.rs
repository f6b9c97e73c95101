/// Evidence index adapters
///
/// Uniform `search(query, limit)` contract over two backends:
/// - KeywordIndex: Tantivy BM25 over lowercase alphanumeric terms
/// - VectorIndex: HNSW cosine search over embeddings from an EmbeddingProvider
///
/// Both return candidates ordered by descending score with deterministic
/// tie-breaking, and both accept limits larger than the final result size so
/// callers can oversample before filtering.
mod cache;
mod keyword_index;
mod provider;
mod vector_index;

pub use cache::CachedEmbedder;
pub use keyword_index::{KeywordIndex, KeywordIndexError};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{VectorIndex, VectorIndexConfig, VectorIndexError};

use crate::corpus::EvidenceChunk;
use crate::error::{ClaimCheckError, Result};

/// A raw search hit before any filtering
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
    pub chunk: EvidenceChunk,
    pub raw_score: f32,
}

impl RetrievalCandidate {
    pub fn new(chunk: EvidenceChunk, raw_score: f32) -> Self {
        Self { chunk, raw_score }
    }
}

/// Read-only nearest-neighbour index over evidence chunks.
///
/// Implementations must be safe to query from many workers at once.
pub trait EvidenceIndex: Send + Sync {
    /// Return at most `limit` candidates ordered by descending score
    fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalCandidate>>;

    /// Number of indexed chunks
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

impl From<KeywordIndexError> for ClaimCheckError {
    fn from(e: KeywordIndexError) -> Self {
        ClaimCheckError::IndexUnavailable(e.to_string())
    }
}

impl From<VectorIndexError> for ClaimCheckError {
    fn from(e: VectorIndexError) -> Self {
        ClaimCheckError::IndexUnavailable(e.to_string())
    }
}

/// Stable descending sort by score; `tie` orders equal scores
pub(crate) fn sort_candidates<K: Ord>(
    candidates: &mut [RetrievalCandidate],
    tie: impl Fn(&RetrievalCandidate) -> K,
) {
    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tie(a).cmp(&tie(b)))
    });
}
