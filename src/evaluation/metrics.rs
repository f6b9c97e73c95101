//! Proxy retrieval-quality metrics
//!
//! Per-record contributions fold into an [`ExtendedAccumulator`]; accumulators
//! merge associatively so partial batches can be combined in any grouping.

use super::Prediction;
use crate::text::{significant_terms, term_overlap};
use crate::verdict::Label;
use serde::{Deserialize, Serialize};

/// Minimum claim-term overlap for a retrieved chunk to count as relevant
pub const RELEVANCE_THRESHOLD: f64 = 0.20;

/// Proxy metrics; `None` means no record qualified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedMetrics {
    pub context_precision: Option<f64>,
    pub answer_relevancy: Option<f64>,
    pub faithfulness: Option<f64>,
    pub false_positive_rate: Option<f64>,
    pub median_latency_seconds: Option<f64>,
    pub n_latency: usize,
    pub records_used: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn merge(&mut self, other: Mean) {
        self.sum += other.sum;
        self.count += other.count;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Running totals for the proxy metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtendedAccumulator {
    context_precision: Mean,
    answer_relevancy: Mean,
    faithfulness: Mean,
    gold_unsupported: usize,
    false_positives: usize,
    latencies: Vec<f64>,
    records_used: usize,
}

impl ExtendedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one prediction matched against its gold label
    pub fn add(&mut self, prediction: &Prediction, gold: Label) {
        if gold == Label::Unsupported {
            self.gold_unsupported += 1;
            if prediction.label == Label::Supported {
                self.false_positives += 1;
            }
        }

        if let Some(stats) = &prediction.retrieval_stats {
            if stats.latency_seconds.is_finite() {
                self.latencies.push(stats.latency_seconds);
            }
        }

        let Some(retrieved) = &prediction.retrieved else {
            return;
        };

        let claim_terms = significant_terms(&prediction.claim);
        let overlaps: Vec<f64> = retrieved
            .iter()
            .map(|item| term_overlap(&claim_terms, item.text()))
            .collect();
        let relevant = overlaps
            .iter()
            .filter(|&&o| o >= RELEVANCE_THRESHOLD)
            .count();

        if matches!(prediction.label, Label::Supported | Label::Mixed) {
            self.faithfulness.push(if relevant > 0 { 1.0 } else { 0.0 });
        }

        if overlaps.is_empty() {
            return;
        }
        self.records_used += 1;
        self.context_precision
            .push(relevant as f64 / overlaps.len() as f64);
        self.answer_relevancy
            .push(overlaps.iter().copied().fold(0.0, f64::max));
    }

    pub fn merge(mut self, other: ExtendedAccumulator) -> Self {
        self.context_precision.merge(other.context_precision);
        self.answer_relevancy.merge(other.answer_relevancy);
        self.faithfulness.merge(other.faithfulness);
        self.gold_unsupported += other.gold_unsupported;
        self.false_positives += other.false_positives;
        self.latencies.extend(other.latencies);
        self.records_used += other.records_used;
        self
    }

    pub fn finish(self) -> ExtendedMetrics {
        let false_positive_rate = (self.gold_unsupported > 0)
            .then(|| self.false_positives as f64 / self.gold_unsupported as f64);
        let n_latency = self.latencies.len();

        ExtendedMetrics {
            context_precision: self.context_precision.value(),
            answer_relevancy: self.answer_relevancy.value(),
            faithfulness: self.faithfulness.value(),
            false_positive_rate,
            median_latency_seconds: median(self.latencies),
            n_latency,
            records_used: self.records_used,
        }
    }
}

/// Median; the mean of the middle pair for even counts
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
