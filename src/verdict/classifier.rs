/// External classifier strategy with heuristic fallback
use super::heuristic;
use super::{cite, Label, Verdict};
use crate::corpus::EvidenceChunk;
use crate::retrieval::RetrievalStats;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Evidence text characters included per item in the prompt
pub const EVIDENCE_CHARS_PER_ITEM: usize = 400;

pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Classifier timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed classifier response: {0}")]
    Malformed(String),

    #[error("Classifier request failed: {0}")]
    Request(String),
}

/// Structured classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierResponse {
    pub label: Label,
    pub confidence: f64,
    pub rationale: String,
}

/// External classifier collaborator
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<ClassifierResponse, ClassifierError>;

    fn name(&self) -> &str;
}

/// Build the classification prompt for a claim and its evidence
pub fn build_prompt(claim: &str, evidence: &[EvidenceChunk]) -> String {
    let chunks = evidence
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[{}] {} :: {}",
                i,
                chunk.title.as_deref().unwrap_or(""),
                truncate_chars(&chunk.text, EVIDENCE_CHARS_PER_ITEM)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a fact verification assistant. Given a CLAIM and EVIDENCE CHUNKS, output a JSON \
         with keys: verdict (SUPPORTED|UNSUPPORTED|NEEDS_MORE_EVIDENCE|MIXED), confidence (0-1), \
         rationale (brief).\nClaim: {}\nEvidence Chunks:\n{}\nRespond with ONLY JSON.",
        claim, chunks
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(alias = "verdict")]
    label: String,
    confidence: f64,
    #[serde(default)]
    rationale: String,
}

/// Parse a JSON classifier reply, tolerating a surrounding Markdown fence
pub fn parse_response(raw: &str) -> Result<ClassifierResponse, ClassifierError> {
    let body = strip_fence(raw.trim());
    let parsed: RawResponse =
        serde_json::from_str(body).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    let label = parsed
        .label
        .parse::<Label>()
        .map_err(ClassifierError::Malformed)?;

    validate(ClassifierResponse {
        label,
        confidence: parsed.confidence,
        rationale: parsed.rationale,
    })
}

fn strip_fence(body: &str) -> &str {
    let Some(inner) = body.strip_prefix("```") else {
        return body;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop an info string such as `json`
    match inner.split_once('\n') {
        Some((info, rest)) if !info.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

fn validate(response: ClassifierResponse) -> Result<ClassifierResponse, ClassifierError> {
    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(ClassifierError::Malformed(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }
    Ok(response)
}

/// Classifier-backed scoring, bounded by a timeout
#[derive(Clone)]
pub struct ClassifierStrategy {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
}

impl ClassifierStrategy {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn classify(&self, prompt: &str) -> Result<ClassifierResponse, ClassifierError> {
        let response = tokio::time::timeout(self.timeout, self.classifier.classify(prompt))
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;
        validate(response)
    }

    pub(crate) async fn score(
        &self,
        claim: &str,
        evidence: &[EvidenceChunk],
        stats: &RetrievalStats,
    ) -> Verdict {
        let prompt = build_prompt(claim, evidence);

        match self.classify(&prompt).await {
            Ok(response) => {
                tracing::debug!(
                    classifier = self.classifier.name(),
                    label = %response.label,
                    "Classifier verdict"
                );
                Verdict {
                    claim: claim.to_string(),
                    label: response.label,
                    confidence: response.confidence,
                    rationale: response.rationale,
                    cited_sources: cite(evidence),
                    retrieval_stats: stats.clone(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    classifier = self.classifier.name(),
                    "Classifier failed, using heuristic: {}",
                    e
                );
                let mut verdict = heuristic::score(claim, evidence, stats);
                verdict.rationale = format!("{} | classifier fallback: {}", verdict.rationale, e);
                verdict
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::verdict::VerdictEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted classifier for tests
    pub(crate) enum FakeClassifier {
        Reply(String),
        Unavailable,
        Slow(Duration),
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(&self, _prompt: &str) -> Result<ClassifierResponse, ClassifierError> {
            match self {
                FakeClassifier::Reply(raw) => parse_response(raw),
                FakeClassifier::Unavailable => {
                    Err(ClassifierError::Unavailable("no API key".to_string()))
                }
                FakeClassifier::Slow(delay) => {
                    tokio::time::sleep(*delay).await;
                    parse_response(r#"{"label":"SUPPORTED","confidence":0.9,"rationale":"late"}"#)
                }
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    /// Returns an out-of-range confidence without going through parsing
    struct OverconfidentClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Classifier for OverconfidentClassifier {
        async fn classify(&self, _prompt: &str) -> Result<ClassifierResponse, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClassifierResponse {
                label: Label::Supported,
                confidence: 1.7,
                rationale: String::new(),
            })
        }

        fn name(&self) -> &str {
            "overconfident"
        }
    }

    fn evidence() -> Vec<EvidenceChunk> {
        vec![
            EvidenceChunk::new("1", "Today the central bank cuts interest rates by 50 basis points.")
                .with_title("Rates cut"),
            EvidenceChunk::new("2", "Analysis: central bank future policy"),
        ]
    }

    fn stats() -> RetrievalStats {
        RetrievalStats::new(8, 1, 0.02)
    }

    const CLAIM: &str = "Central bank cuts interest rates";

    fn engine(classifier: impl Classifier + 'static) -> VerdictEngine {
        VerdictEngine::Classifier(
            ClassifierStrategy::new(Arc::new(classifier)).with_timeout(Duration::from_millis(50)),
        )
    }

    async fn assert_falls_back(engine: VerdictEngine, reason: &str) {
        let expected = heuristic::score(CLAIM, &evidence(), &stats());
        let verdict = engine.score(CLAIM, &evidence(), &stats()).await;

        assert_eq!(verdict.label, expected.label);
        assert_eq!(verdict.confidence.to_bits(), expected.confidence.to_bits());
        assert_eq!(verdict.cited_sources, expected.cited_sources);
        assert_eq!(verdict.retrieval_stats, expected.retrieval_stats);
        assert!(verdict.rationale.starts_with(&expected.rationale));
        assert!(verdict.rationale.contains("classifier fallback"));
        assert!(verdict.rationale.contains(reason), "{}", verdict.rationale);
    }

    #[test]
    fn test_prompt_truncates_evidence() {
        let long = "é".repeat(1000);
        let chunks = vec![
            EvidenceChunk::new("1", long).with_title("Long"),
            EvidenceChunk::new("2", "short"),
        ];
        let prompt = build_prompt("claim text", &chunks);

        assert!(prompt.contains("Claim: claim text"));
        assert!(prompt.contains(&format!("[0] Long :: {}\n", "é".repeat(400))));
        assert!(!prompt.contains(&"é".repeat(401)));
        assert!(prompt.contains("[1]  :: short"));
        assert!(prompt.ends_with("Respond with ONLY JSON."));
    }

    #[test]
    fn test_parse_response_variants() {
        let parsed =
            parse_response(r#"{"verdict":"MIXED","confidence":0.4,"rationale":"split"}"#).unwrap();
        assert_eq!(parsed.label, Label::Mixed);
        assert_eq!(parsed.rationale, "split");

        let fenced = "```json\n{\"label\": \"supported\", \"confidence\": 1}\n```";
        let parsed = parse_response(fenced).unwrap();
        assert_eq!(parsed.label, Label::Supported);
        assert_eq!(parsed.confidence, 1.0);
        assert_eq!(parsed.rationale, "");
    }

    #[test]
    fn test_parse_response_rejects_bad_replies() {
        for raw in [
            "not json",
            r#"{"label":"SUPPORTED"}"#,
            r#"{"label":"PROBABLY","confidence":0.5}"#,
            r#"{"label":"SUPPORTED","confidence":-0.1}"#,
            r#"{"label":"SUPPORTED","confidence":1.5}"#,
        ] {
            assert!(
                matches!(parse_response(raw), Err(ClassifierError::Malformed(_))),
                "{}",
                raw
            );
        }
    }

    #[tokio::test]
    async fn test_classifier_verdict_used_when_valid() {
        let engine = engine(FakeClassifier::Reply(
            r#"{"label":"MIXED","confidence":0.55,"rationale":"conflicting reports"}"#.to_string(),
        ));
        let verdict = engine.score(CLAIM, &evidence(), &stats()).await;

        assert_eq!(verdict.label, Label::Mixed);
        assert_eq!(verdict.confidence, 0.55);
        assert_eq!(verdict.rationale, "conflicting reports");
        assert_eq!(verdict.cited_sources[0].title, "Rates cut");
        assert_eq!(verdict.retrieval_stats, stats());
    }

    #[tokio::test]
    async fn test_malformed_reply_falls_back() {
        assert_falls_back(engine(FakeClassifier::Reply("I think so".to_string())), "Malformed")
            .await;
    }

    #[tokio::test]
    async fn test_unavailable_classifier_falls_back() {
        assert_falls_back(engine(FakeClassifier::Unavailable), "unavailable").await;
    }

    #[tokio::test]
    async fn test_slow_classifier_times_out() {
        assert_falls_back(
            engine(FakeClassifier::Slow(Duration::from_secs(5))),
            "timed out",
        )
        .await;
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_falls_back() {
        let classifier = Arc::new(OverconfidentClassifier {
            calls: AtomicUsize::new(0),
        });
        let engine = VerdictEngine::Classifier(ClassifierStrategy::new(classifier.clone()));
        let verdict = engine.score(CLAIM, &evidence(), &stats()).await;

        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(verdict.label, Label::Supported);
        assert!(verdict.rationale.contains("outside [0, 1]"));
    }
}
