// Claim verification pipeline: retrieval followed by verdict scoring

use crate::corpus::EvidenceChunk;
use crate::error::{ClaimCheckError, Result};
use crate::retrieval::{RetrievalParams, Retriever};
use crate::verdict::{Verdict, VerdictEngine};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Verdict plus the evidence it was scored on
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub retrieved: Vec<EvidenceChunk>,
}

/// Shared, read-only verification pipeline
#[derive(Clone)]
pub struct VerificationPipeline {
    retriever: Retriever,
    engine: Arc<VerdictEngine>,
    params: RetrievalParams,
}

impl VerificationPipeline {
    /// Fails when `params` are invalid
    pub fn new(retriever: Retriever, engine: VerdictEngine, params: RetrievalParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            retriever,
            engine: Arc::new(engine),
            params,
        })
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub fn engine(&self) -> &VerdictEngine {
        &self.engine
    }

    /// Retrieve evidence for one claim and score it
    pub async fn verify(&self, claim: &str) -> Result<VerificationOutcome> {
        let span = tracing::info_span!("verify_claim", request_id = %Uuid::new_v4());
        self.verify_inner(claim).instrument(span).await
    }

    async fn verify_inner(&self, claim: &str) -> Result<VerificationOutcome> {
        let retriever = self.retriever.clone();
        let params = self.params.clone();
        let query = claim.to_string();

        // Index search is blocking work
        let retrieval = tokio::task::spawn_blocking(move || retriever.query(&query, &params))
            .await
            .map_err(|e| ClaimCheckError::Other(anyhow::anyhow!("retrieval task failed: {}", e)))??;

        let verdict = self
            .engine
            .score(claim, &retrieval.items, &retrieval.stats)
            .await;

        tracing::info!(
            label = %verdict.label,
            confidence = verdict.confidence,
            evidence = retrieval.items.len(),
            filtered = retrieval.stats.filtered,
            "Claim verified"
        );

        Ok(VerificationOutcome {
            verdict,
            retrieved: retrieval.items,
        })
    }

    /// Verify claims with at most `concurrency` in flight; results keep input order
    pub async fn verify_batch(
        &self,
        claims: &[String],
        concurrency: usize,
    ) -> Vec<Result<VerificationOutcome>> {
        tracing::info!(
            "Verifying {} claims (concurrency {}, engine {})",
            claims.len(),
            concurrency.max(1),
            self.engine.name()
        );

        stream::iter(claims.iter().map(|claim| self.verify(claim)))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::KeywordIndex;
    use crate::retrieval::tests::StaticIndex;
    use crate::verdict::{ClassifierStrategy, FakeClassifier, Label};
    use std::time::Duration;

    fn corpus() -> Vec<EvidenceChunk> {
        vec![
            EvidenceChunk::new("rates::0", "Today the central bank cuts interest rates by 50 basis points.")
                .with_title("Rates cut")
                .with_source("Reuters"),
            EvidenceChunk::new("rates::1", "Analysis: central bank future policy")
                .with_source("AP"),
            EvidenceChunk::new("sport::0", "The football season opens with surprise results")
                .with_source("BBC"),
        ]
    }

    fn lexical_pipeline(engine: VerdictEngine) -> VerificationPipeline {
        let index = KeywordIndex::build(&corpus(), None).unwrap();
        let params = RetrievalParams::new(2).with_max_age_days(None);
        VerificationPipeline::new(Retriever::new(Arc::new(index)), engine, params).unwrap()
    }

    #[tokio::test]
    async fn test_verify_with_lexical_index() {
        let pipeline = lexical_pipeline(VerdictEngine::Heuristic);
        let outcome = pipeline.verify("Central bank cuts interest rates").await.unwrap();

        assert_eq!(outcome.verdict.label, Label::Supported);
        assert_eq!(outcome.retrieved.len(), 2);
        assert_eq!(outcome.retrieved[0].id, "rates::0");
        assert_eq!(outcome.verdict.cited_sources[0].title, "Rates cut");
        assert_eq!(outcome.verdict.retrieval_stats.k, 2);
    }

    #[tokio::test]
    async fn test_classifier_failure_still_yields_verdict() {
        let strategy = ClassifierStrategy::new(Arc::new(FakeClassifier::Unavailable))
            .with_timeout(Duration::from_millis(50));
        let pipeline = lexical_pipeline(VerdictEngine::Classifier(strategy));

        let outcome = pipeline.verify("Central bank cuts interest rates").await.unwrap();
        assert_eq!(outcome.verdict.label, Label::Supported);
        assert!(outcome.verdict.rationale.contains("classifier fallback"));
    }

    #[tokio::test]
    async fn test_batch_keeps_input_order() {
        let pipeline = lexical_pipeline(VerdictEngine::Heuristic);
        let claims = vec![
            "football season surprise".to_string(),
            "Central bank cuts interest rates".to_string(),
            "volcanic eruption".to_string(),
        ];

        let outcomes = pipeline.verify_batch(&claims, 2).await;
        assert_eq!(outcomes.len(), 3);
        for (claim, outcome) in claims.iter().zip(&outcomes) {
            assert_eq!(&outcome.as_ref().unwrap().verdict.claim, claim);
        }
        let last = outcomes[2].as_ref().unwrap();
        assert!(last.retrieved.is_empty());
        assert_eq!(last.verdict.label, Label::Unsupported);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let index = Arc::new(StaticIndex::new(corpus()));
        let params = RetrievalParams::new(3).with_source_diversity_cap(0);
        let result = VerificationPipeline::new(Retriever::new(index), VerdictEngine::Heuristic, params);
        assert!(matches!(result, Err(ClaimCheckError::Validation { .. })));
    }
}
