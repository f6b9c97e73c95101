//! Verdict engine
//!
//! Turns a retrieved evidence set into a labeled, confidence-scored verdict.
//! Two strategies share the single [`VerdictEngine::score`] contract: the
//! deterministic term-overlap heuristic, and an external classifier that
//! degrades to the heuristic on any failure.

mod classifier;
mod heuristic;
mod openai;

pub use classifier::{
    build_prompt, parse_response, Classifier, ClassifierError, ClassifierResponse,
    ClassifierStrategy, DEFAULT_CLASSIFIER_TIMEOUT, EVIDENCE_CHARS_PER_ITEM,
};
pub use heuristic::{average_overlap, band, HeuristicScore, SUPPORTED_THRESHOLD, UNCERTAIN_THRESHOLD};
pub use openai::OpenAiClassifier;

#[cfg(test)]
pub(crate) use classifier::tests::FakeClassifier;

use crate::corpus::EvidenceChunk;
use crate::retrieval::RetrievalStats;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verdict label
///
/// `TRUE`/`FALSE` are accepted as aliases of SUPPORTED/UNSUPPORTED when
/// reading labeled data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    #[serde(alias = "TRUE")]
    Supported,
    #[serde(alias = "FALSE")]
    Unsupported,
    Mixed,
    NeedsMoreEvidence,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Supported => "SUPPORTED",
            Label::Unsupported => "UNSUPPORTED",
            Label::Mixed => "MIXED",
            Label::NeedsMoreEvidence => "NEEDS_MORE_EVIDENCE",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "SUPPORTED" | "TRUE" => Ok(Label::Supported),
            "UNSUPPORTED" | "FALSE" => Ok(Label::Unsupported),
            "MIXED" => Ok(Label::Mixed),
            "NEEDS_MORE_EVIDENCE" => Ok(Label::NeedsMoreEvidence),
            other => Err(format!("unknown label: {}", other)),
        }
    }
}

/// Display projection of a cited evidence chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl From<&EvidenceChunk> for Source {
    fn from(chunk: &EvidenceChunk) -> Self {
        Self {
            title: chunk.title.clone().unwrap_or_else(|| "(no title)".to_string()),
            url: chunk.url.clone().unwrap_or_default(),
            published_at: chunk.published_at.clone(),
        }
    }
}

/// Sources in evidence order
pub fn cite(evidence: &[EvidenceChunk]) -> Vec<Source> {
    evidence.iter().map(Source::from).collect()
}

/// Labeled judgment about one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub claim: String,
    #[serde(rename = "verdict", alias = "label")]
    pub label: Label,
    pub confidence: f64,
    pub rationale: String,
    pub cited_sources: Vec<Source>,
    pub retrieval_stats: RetrievalStats,
}

/// Scoring strategy selector
pub enum VerdictEngine {
    Heuristic,
    Classifier(ClassifierStrategy),
}

impl VerdictEngine {
    pub fn name(&self) -> &'static str {
        match self {
            VerdictEngine::Heuristic => "heuristic",
            VerdictEngine::Classifier(_) => "classifier",
        }
    }

    /// Score a claim against its evidence. Never fails: classifier problems
    /// fall back to the heuristic.
    pub async fn score(
        &self,
        claim: &str,
        evidence: &[EvidenceChunk],
        stats: &RetrievalStats,
    ) -> Verdict {
        match self {
            VerdictEngine::Heuristic => heuristic::score(claim, evidence, stats),
            VerdictEngine::Classifier(strategy) => strategy.score(claim, evidence, stats).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_serde_and_aliases() {
        assert_eq!(
            serde_json::to_string(&Label::NeedsMoreEvidence).unwrap(),
            "\"NEEDS_MORE_EVIDENCE\""
        );
        let label: Label = serde_json::from_str("\"TRUE\"").unwrap();
        assert_eq!(label, Label::Supported);
        let label: Label = serde_json::from_str("\"FALSE\"").unwrap();
        assert_eq!(label, Label::Unsupported);
        assert!(serde_json::from_str::<Label>("\"MAYBE\"").is_err());
    }

    #[test]
    fn test_label_from_str_is_lenient() {
        assert_eq!("supported".parse::<Label>(), Ok(Label::Supported));
        assert_eq!(" needs more evidence ".parse::<Label>(), Ok(Label::NeedsMoreEvidence));
        assert_eq!("False".parse::<Label>(), Ok(Label::Unsupported));
        assert!("unclear".parse::<Label>().is_err());
    }

    #[test]
    fn test_source_projection_defaults() {
        let bare = EvidenceChunk::new("1", "text");
        let source = Source::from(&bare);
        assert_eq!(source.title, "(no title)");
        assert_eq!(source.url, "");
        assert_eq!(source.published_at, None);

        let full = EvidenceChunk::new("2", "text")
            .with_title("Rates")
            .with_url("https://example.com/a")
            .with_published_at("2024-05-01");
        let source = Source::from(&full);
        assert_eq!(source.title, "Rates");
        assert_eq!(source.published_at.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_verdict_json_shape() {
        let verdict = Verdict {
            claim: "c".to_string(),
            label: Label::Mixed,
            confidence: 0.5,
            rationale: "r".to_string(),
            cited_sources: Vec::new(),
            retrieval_stats: RetrievalStats::new(8, 2, 0.01),
        };
        let value = serde_json::to_value(&verdict).unwrap();
        assert_eq!(value["verdict"], "MIXED");
        assert_eq!(value["retrieval_stats"]["latency_s"], 0.01);

        let back: Verdict = serde_json::from_value(value).unwrap();
        assert_eq!(back, verdict);
    }

    #[tokio::test]
    async fn test_engine_dispatches_heuristic() {
        let engine = VerdictEngine::Heuristic;
        assert_eq!(engine.name(), "heuristic");
        let verdict = engine
            .score("anything", &[], &RetrievalStats::new(8, 0, 0.0))
            .await;
        assert_eq!(verdict.label, Label::Unsupported);
    }
}
