//! Retrieval filter stages
//!
//! Each stage takes candidates in rank order and returns the survivors in the
//! same relative order, so stages compose freely and can be checked in
//! isolation.

use super::source::{parse_published_at, source_key};
use crate::index::RetrievalCandidate;
use ahash::{HashMap, HashMapExt};
use chrono::{DateTime, Utc};

/// Drop candidates published before `cutoff`.
///
/// Missing or unparseable dates are kept: absent metadata must not silently
/// exclude evidence. A `None` cutoff disables the stage.
pub fn filter_by_age(
    candidates: Vec<RetrievalCandidate>,
    cutoff: Option<DateTime<Utc>>,
) -> Vec<RetrievalCandidate> {
    let Some(cutoff) = cutoff else {
        return candidates;
    };

    candidates
        .into_iter()
        .filter(|c| {
            c.chunk
                .published_at
                .as_deref()
                .and_then(parse_published_at)
                .map_or(true, |published| published >= cutoff)
        })
        .collect()
}

/// Keep at most `cap` candidates per source key, first come first kept.
///
/// Counts start from zero on every call.
pub fn cap_per_source(candidates: Vec<RetrievalCandidate>, cap: usize) -> Vec<RetrievalCandidate> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    candidates
        .into_iter()
        .filter(|c| {
            let count = seen.entry(source_key(&c.chunk)).or_insert(0);
            *count += 1;
            *count <= cap
        })
        .collect()
}

/// Keep the first `k` candidates
pub fn take_top(mut candidates: Vec<RetrievalCandidate>, k: usize) -> Vec<RetrievalCandidate> {
    candidates.truncate(k);
    candidates
}
