/// Term-overlap heuristic scoring
use super::{cite, Label, Verdict};
use crate::corpus::EvidenceChunk;
use crate::retrieval::RetrievalStats;
use crate::text::{significant_terms, term_overlap};

/// Average overlap strictly above this is SUPPORTED
pub const SUPPORTED_THRESHOLD: f64 = 0.25;

/// Average overlap strictly above this (and not supported) needs more evidence
pub const UNCERTAIN_THRESHOLD: f64 = 0.12;

const SUPPORTED_BASE: f64 = 0.5;
const SUPPORTED_CEILING: f64 = 0.9;
const UNCERTAIN_CONFIDENCE: f64 = 0.5;
const UNSUPPORTED_CONFIDENCE: f64 = 0.6;

/// Numeric outcome of the heuristic
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicScore {
    pub avg_overlap: f64,
    pub label: Label,
    pub confidence: f64,
}

impl HeuristicScore {
    pub fn rationale(&self) -> String {
        format!("heuristic avg_overlap={:.3}", self.avg_overlap)
    }
}

/// Mean claim-term overlap over the evidence, 0.0 without evidence
pub fn average_overlap(claim: &str, evidence: &[EvidenceChunk]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    let claim_terms = significant_terms(claim);
    let total: f64 = evidence
        .iter()
        .map(|chunk| term_overlap(&claim_terms, &chunk.text))
        .sum();
    total / evidence.len() as f64
}

/// Map an average overlap onto a label and confidence
pub fn band(avg_overlap: f64) -> (Label, f64) {
    if avg_overlap > SUPPORTED_THRESHOLD {
        (
            Label::Supported,
            (SUPPORTED_BASE + avg_overlap).min(SUPPORTED_CEILING),
        )
    } else if avg_overlap > UNCERTAIN_THRESHOLD {
        (Label::NeedsMoreEvidence, UNCERTAIN_CONFIDENCE)
    } else {
        (Label::Unsupported, UNSUPPORTED_CONFIDENCE)
    }
}

pub(crate) fn evaluate(claim: &str, evidence: &[EvidenceChunk]) -> HeuristicScore {
    let avg_overlap = average_overlap(claim, evidence);
    let (label, confidence) = band(avg_overlap);
    HeuristicScore {
        avg_overlap,
        label,
        confidence,
    }
}

pub(crate) fn score(claim: &str, evidence: &[EvidenceChunk], stats: &RetrievalStats) -> Verdict {
    let result = evaluate(claim, evidence);
    tracing::debug!(
        avg_overlap = result.avg_overlap,
        label = %result.label,
        "Heuristic verdict"
    );

    Verdict {
        claim: claim.to_string(),
        label: result.label,
        confidence: result.confidence,
        rationale: result.rationale(),
        cited_sources: cite(evidence),
        retrieval_stats: stats.clone(),
    }
}
