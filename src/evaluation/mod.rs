//! Evaluation engine
//!
//! Scores logged verdicts against gold labels: accuracy, per-label
//! precision/recall/F1, a confusion matrix and, on request, proxy
//! retrieval-quality metrics.

mod metrics;

pub use metrics::{median, ExtendedAccumulator, ExtendedMetrics, RELEVANCE_THRESHOLD};

use crate::retrieval::RetrievalStats;
use crate::verdict::Label;
use ahash::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Gold labels keyed by claim text
pub type GoldLabels = HashMap<String, Label>;

/// Retrieved evidence as logged: bare text or a chunk object with `text`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrievedItem {
    Text(String),
    Chunk { text: String },
}

impl RetrievedItem {
    pub fn text(&self) -> &str {
        match self {
            RetrievedItem::Text(text) | RetrievedItem::Chunk { text } => text,
        }
    }
}

/// One logged verdict as read back for evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub claim: String,
    #[serde(rename = "verdict", alias = "label")]
    pub label: Label,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_stats: Option<RetrievalStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved: Option<Vec<RetrievedItem>>,
}

impl Prediction {
    pub fn new(claim: impl Into<String>, label: Label) -> Self {
        Self {
            claim: claim.into(),
            label,
            retrieval_stats: None,
            retrieved: None,
        }
    }
}

/// One-vs-rest scores for a single label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub n: usize,
    pub per_label: BTreeMap<Label, LabelMetrics>,
    /// gold label -> predicted label -> count
    pub confusion: BTreeMap<Label, BTreeMap<Label, usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedMetrics>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluate predictions against gold labels.
///
/// Predictions whose claim has no gold label are skipped; `n` counts only
/// the matched ones. Confusion rows cover every gold label; predicted labels
/// outside that set appear as extra columns.
pub fn evaluate(predictions: &[Prediction], gold: &GoldLabels, extended: bool) -> EvaluationReport {
    let labels: BTreeSet<Label> = gold.values().copied().collect();

    let mut confusion: BTreeMap<Label, BTreeMap<Label, usize>> = labels
        .iter()
        .map(|&g| (g, labels.iter().map(|&p| (p, 0)).collect()))
        .collect();
    let mut accumulator = ExtendedAccumulator::new();
    let mut n = 0;
    let mut correct = 0;

    for prediction in predictions {
        let Some(&gold_label) = gold.get(&prediction.claim) else {
            continue;
        };
        n += 1;
        if prediction.label == gold_label {
            correct += 1;
        }
        *confusion
            .entry(gold_label)
            .or_default()
            .entry(prediction.label)
            .or_insert(0) += 1;

        if extended {
            accumulator.add(prediction, gold_label);
        }
    }

    let per_label = labels
        .iter()
        .map(|&label| {
            let tp = confusion[&label].get(&label).copied().unwrap_or(0);
            let fp: usize = labels
                .iter()
                .filter(|&&g| g != label)
                .map(|g| confusion[g].get(&label).copied().unwrap_or(0))
                .sum();
            let support: usize = confusion[&label].values().sum();
            let fn_ = support - tp;

            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            (
                label,
                LabelMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                },
            )
        })
        .collect();

    tracing::info!(
        "Evaluated {} of {} predictions ({} correct)",
        n,
        predictions.len(),
        correct
    );

    EvaluationReport {
        accuracy: ratio(correct, n),
        n,
        per_label,
        confusion,
        extended: extended.then(|| accumulator.finish()),
    }
}
