//! Retrieval engine
//!
//! Oversamples the evidence index, then narrows the ranked candidates through
//! independent stages: age filter, per-source cap, truncation to `k`.

mod filters;
mod source;

pub use filters::{cap_per_source, filter_by_age, take_top};
pub use source::{age_cutoff, parse_published_at, source_key, url_domain, UNKNOWN_SOURCE};

use crate::corpus::EvidenceChunk;
use crate::error::{ClaimCheckError, Result};
use crate::index::EvidenceIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Raw candidates requested per final result slot
pub const OVERSAMPLE_FACTOR: usize = 3;

/// Retrieval request parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    /// Maximum number of evidence chunks returned
    pub k: usize,

    /// Drop chunks published more than this many days ago; `None` disables
    pub max_age_days: Option<u32>,

    /// Maximum chunks per source key; must be at least 1
    pub source_diversity_cap: usize,
}

impl RetrievalParams {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn with_max_age_days(mut self, days: Option<u32>) -> Self {
        self.max_age_days = days;
        self
    }

    pub fn with_source_diversity_cap(mut self, cap: usize) -> Self {
        self.source_diversity_cap = cap;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_diversity_cap == 0 {
            return Err(ClaimCheckError::validation(
                "source_diversity_cap",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 8,
            max_age_days: Some(30),
            source_diversity_cap: 3,
        }
    }
}

/// Per-query retrieval statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub k: usize,
    /// Raw candidates that did not make it into the result
    pub filtered: usize,
    #[serde(rename = "latency_s", alias = "latency_seconds")]
    pub latency_seconds: f64,
}

impl RetrievalStats {
    pub fn new(k: usize, filtered: usize, latency_seconds: f64) -> Self {
        Self {
            k,
            filtered,
            latency_seconds,
        }
    }
}

/// Filtered evidence for one claim, in rank order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub items: Vec<EvidenceChunk>,
    pub stats: RetrievalStats,
}

/// Retrieval engine over a shared, read-only evidence index
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn EvidenceIndex>,
}

impl Retriever {
    pub fn new(index: Arc<dyn EvidenceIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &Arc<dyn EvidenceIndex> {
        &self.index
    }

    /// Retrieve evidence for `claim` with the age cutoff measured from now
    pub fn query(&self, claim: &str, params: &RetrievalParams) -> Result<RetrievalResult> {
        self.query_at(claim, params, Utc::now())
    }

    /// Retrieve evidence for `claim` with the age cutoff measured from `now`
    pub fn query_at(
        &self,
        claim: &str,
        params: &RetrievalParams,
        now: DateTime<Utc>,
    ) -> Result<RetrievalResult> {
        let start = Instant::now();
        params.validate()?;

        let requested = params.k.saturating_mul(OVERSAMPLE_FACTOR);
        let mut candidates = if requested == 0 {
            Vec::new()
        } else {
            self.index.search(claim, requested)?
        };
        candidates.truncate(requested);
        let total = candidates.len();

        let cutoff = params.max_age_days.and_then(|days| age_cutoff(now, days));
        let fresh = filter_by_age(candidates, cutoff);
        let after_age = fresh.len();
        let diverse = cap_per_source(fresh, params.source_diversity_cap);
        let after_cap = diverse.len();
        let top = take_top(diverse, params.k);

        let items: Vec<EvidenceChunk> = top.into_iter().map(|c| c.chunk).collect();
        let stats = RetrievalStats::new(
            params.k,
            total - items.len(),
            start.elapsed().as_secs_f64(),
        );

        tracing::debug!(
            backend = self.index.backend(),
            raw = total,
            after_age,
            after_cap,
            kept = items.len(),
            "Retrieval complete"
        );

        Ok(RetrievalResult { items, stats })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::index::RetrievalCandidate;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Index stub returning a fixed ranked list
    pub(crate) struct StaticIndex {
        pub chunks: Vec<EvidenceChunk>,
        pub calls: AtomicUsize,
        pub last_limit: AtomicUsize,
    }

    impl StaticIndex {
        pub(crate) fn new(chunks: Vec<EvidenceChunk>) -> Self {
            Self {
                chunks,
                calls: AtomicUsize::new(0),
                last_limit: AtomicUsize::new(0),
            }
        }
    }

    impl EvidenceIndex for StaticIndex {
        fn search(&self, _query: &str, limit: usize) -> Result<Vec<RetrievalCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_limit.store(limit, Ordering::SeqCst);
            Ok(self
                .chunks
                .iter()
                .take(limit)
                .enumerate()
                .map(|(i, c)| RetrievalCandidate::new(c.clone(), 1.0 / (i as f32 + 1.0)))
                .collect())
        }

        fn len(&self) -> usize {
            self.chunks.len()
        }

        fn backend(&self) -> &'static str {
            "static"
        }
    }

    struct DownIndex;

    impl EvidenceIndex for DownIndex {
        fn search(&self, _query: &str, _limit: usize) -> Result<Vec<RetrievalCandidate>> {
            Err(ClaimCheckError::IndexUnavailable("store offline".to_string()))
        }

        fn len(&self) -> usize {
            0
        }

        fn backend(&self) -> &'static str {
            "down"
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn chunk(id: &str, source: &str, published: &str) -> EvidenceChunk {
        EvidenceChunk::new(id, format!("text {}", id))
            .with_source(source)
            .with_published_at(published)
    }

    fn ids(result: &RetrievalResult) -> Vec<&str> {
        result.items.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_oversamples_three_times_k() {
        let index = Arc::new(StaticIndex::new(Vec::new()));
        let retriever = Retriever::new(index.clone());
        retriever
            .query_at("claim", &RetrievalParams::new(4), now())
            .unwrap();
        assert_eq!(index.last_limit.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn test_filters_compose_in_rank_order() {
        let chunks = vec![
            chunk("1", "A", "2024-05-30"),
            chunk("2", "A", "2024-01-01"), // too old
            chunk("3", "A", "2024-05-29"),
            chunk("4", "A", "2024-05-28"), // over cap
            chunk("5", "B", "not a date"),
            chunk("6", "C", "2024-05-27"),
        ];
        let retriever = Retriever::new(Arc::new(StaticIndex::new(chunks)));
        let params = RetrievalParams::new(3)
            .with_max_age_days(Some(30))
            .with_source_diversity_cap(2);

        let result = retriever.query_at("claim", &params, now()).unwrap();
        assert_eq!(ids(&result), vec!["1", "3", "5"]);
        assert_eq!(result.stats.k, 3);
        assert_eq!(result.stats.filtered, 3);
        assert!(result.stats.latency_seconds >= 0.0);
    }

    #[test]
    fn test_disabled_age_filter_keeps_old_chunks() {
        let chunks = vec![chunk("1", "A", "1990-01-01"), chunk("2", "B", "1991-01-01")];
        let retriever = Retriever::new(Arc::new(StaticIndex::new(chunks)));
        let params = RetrievalParams::new(2).with_max_age_days(None);

        let result = retriever.query_at("claim", &params, now()).unwrap();
        assert_eq!(ids(&result), vec!["1", "2"]);
        assert_eq!(result.stats.filtered, 0);
    }

    #[test]
    fn test_zero_k_returns_empty() {
        let index = Arc::new(StaticIndex::new(vec![chunk("1", "A", "2024-05-30")]));
        let retriever = Retriever::new(index.clone());

        let result = retriever
            .query_at("claim", &RetrievalParams::new(0), now())
            .unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.stats.filtered, 0);
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_cap_rejected_before_index_access() {
        let index = Arc::new(StaticIndex::new(vec![chunk("1", "A", "2024-05-30")]));
        let retriever = Retriever::new(index.clone());
        let params = RetrievalParams::new(5).with_source_diversity_cap(0);

        let err = retriever.query_at("claim", &params, now()).unwrap_err();
        assert!(matches!(err, ClaimCheckError::Validation { .. }));
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_index_failure_is_surfaced() {
        let retriever = Retriever::new(Arc::new(DownIndex));
        let err = retriever
            .query_at("claim", &RetrievalParams::default(), now())
            .unwrap_err();
        assert!(matches!(err, ClaimCheckError::IndexUnavailable(_)));
    }

    #[test]
    fn test_invariants_hold_across_parameters() {
        let sources = ["A", "B", "C"];
        let chunks: Vec<EvidenceChunk> = (0..30)
            .map(|i| {
                let published = if i % 4 == 0 {
                    "2023-01-01".to_string()
                } else {
                    format!("2024-05-{:02}", (i % 28) + 1)
                };
                chunk(&i.to_string(), sources[i % 3], &published)
            })
            .collect();
        let retriever = Retriever::new(Arc::new(StaticIndex::new(chunks)));
        let cutoff = age_cutoff(now(), 45).unwrap();

        for k in 0..12 {
            for cap in 1..5 {
                let params = RetrievalParams::new(k)
                    .with_max_age_days(Some(45))
                    .with_source_diversity_cap(cap);
                let result = retriever.query_at("claim", &params, now()).unwrap();

                assert!(result.items.len() <= k);
                for source in sources {
                    let n = result
                        .items
                        .iter()
                        .filter(|c| c.source.as_deref() == Some(source))
                        .count();
                    assert!(n <= cap);
                }
                for item in &result.items {
                    let published = item.published_at.as_deref().and_then(parse_published_at);
                    assert!(published.map_or(true, |p| p >= cutoff));
                }
            }
        }
    }
}
