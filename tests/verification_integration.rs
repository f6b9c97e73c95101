//! Integration test: ingest -> persisted lexical index -> verification -> evaluation
//!
//! Runs the whole offline flow against a small on-disk corpus.

use claimcheck::batch::{self, VerdictRecord};
use claimcheck::corpus::{ingest_file, load_chunks, DEFAULT_MAX_TOKENS};
use claimcheck::evaluation::evaluate;
use claimcheck::index::{EvidenceIndex, KeywordIndex};
use claimcheck::pipeline::VerificationPipeline;
use claimcheck::retrieval::{RetrievalParams, Retriever};
use claimcheck::verdict::{Label, VerdictEngine};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const ARTICLES: &str = concat!(
    r#"{"id":"rates","title":"Central bank cuts rates","url":"https://www.reuters.com/markets/rates","published_at":"2099-01-10","source":"Reuters","content":"Today the central bank cuts interest rates by 50 basis points. Officials cited slowing inflation."}"#,
    "\n",
    r#"{"id":"policy","title":"Policy outlook","url":"https://apnews.com/article/policy","published_at":"2099-01-11","content":"Analysis: central bank future policy remains uncertain."}"#,
    "\n",
    r#"{"id":"storm","title":"Storm season","url":"https://bbc.co.uk/weather/storm","published_at":"2099-01-12","source":"BBC","content":"A powerful storm battered the northern coast overnight."}"#,
    "\n"
);

fn write_corpus(root: &Path) -> std::path::PathBuf {
    let raw = root.join("raw.jsonl");
    std::fs::write(&raw, ARTICLES).unwrap();

    let processed = root.join("processed");
    let stats = ingest_file(&raw, &processed, DEFAULT_MAX_TOKENS).unwrap();
    assert_eq!(stats.articles, 3);
    processed
}

fn pipeline(index: Arc<dyn EvidenceIndex>) -> VerificationPipeline {
    VerificationPipeline::new(
        Retriever::new(index),
        VerdictEngine::Heuristic,
        RetrievalParams::new(4),
    )
    .unwrap()
}

#[tokio::test]
async fn test_end_to_end_verification_and_evaluation() {
    let temp = TempDir::new().unwrap();
    let processed = write_corpus(temp.path());

    // Build, persist and reopen the lexical index
    let chunks = load_chunks(&processed).unwrap();
    let index_dir = temp.path().join("index/keyword");
    KeywordIndex::build(&chunks, Some(&index_dir)).unwrap();
    let index = KeywordIndex::open(&index_dir).unwrap();
    assert_eq!(index.len(), chunks.len());

    let pipeline = pipeline(Arc::new(index));

    // Single claim
    let outcome = pipeline
        .verify("Central bank cuts interest rates")
        .await
        .unwrap();
    assert_eq!(outcome.verdict.label, Label::Supported);
    assert_eq!(outcome.verdict.cited_sources[0].title, "Central bank cuts rates");
    assert!(outcome.verdict.retrieval_stats.latency_seconds >= 0.0);

    // Batch run written with retrieved evidence and gold labels
    let claims_path = temp.path().join("claims.jsonl");
    std::fs::write(
        &claims_path,
        concat!(
            "{\"claim\":\"Central bank cuts interest rates\",\"label\":\"SUPPORTED\"}\n",
            "{\"text\":\"Volcano erupts near capital\",\"label\":\"FALSE\"}\n",
            "{\"claim\":\"Storm battered northern coast\",\"label\":\"UNSUPPORTED\"}\n"
        ),
    )
    .unwrap();

    let records = batch::read_claims(&claims_path).unwrap();
    let claims: Vec<String> = records.iter().map(|r| r.claim.clone()).collect();
    let outcomes: Vec<_> = pipeline
        .verify_batch(&claims, 2)
        .await
        .into_iter()
        .map(|o| o.unwrap())
        .collect();

    let lines: Vec<VerdictRecord> = records
        .iter()
        .zip(&outcomes)
        .map(|(record, outcome)| VerdictRecord {
            verdict: &outcome.verdict,
            retrieved: Some(outcome.retrieved.as_slice()),
            gold_label: record.label,
        })
        .collect();
    let out = temp.path().join("results/output.jsonl");
    batch::write_jsonl(&out, &lines).unwrap();

    // Evaluate against the same claims as gold
    let predictions = batch::read_predictions(&out).unwrap();
    let gold = batch::read_gold(&claims_path).unwrap();
    let report = evaluate(&predictions, &gold, true);

    assert_eq!(report.n, 3);
    // Storm claim is supported by its evidence but gold says otherwise
    assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-12);

    let extended = report.extended.unwrap();
    assert_eq!(extended.false_positive_rate, Some(0.5));
    assert_eq!(extended.n_latency, 3);
    assert!(extended.median_latency_seconds.is_some());
    // Volcano claim retrieved nothing and is excluded
    assert_eq!(extended.records_used, 2);
    assert_eq!(extended.faithfulness, Some(1.0));
}

#[tokio::test]
async fn test_unknown_claims_do_not_break_evaluation() {
    let temp = TempDir::new().unwrap();
    let processed = write_corpus(temp.path());
    let index = KeywordIndex::build(&load_chunks(&processed).unwrap(), None).unwrap();
    let pipeline = pipeline(Arc::new(index));

    let outcome = pipeline.verify("Storm coast").await.unwrap();
    let predictions = vec![claimcheck::evaluation::Prediction::new(
        outcome.verdict.claim.clone(),
        outcome.verdict.label,
    )];

    let report = evaluate(&predictions, &Default::default(), true);
    assert_eq!(report.n, 0);
    assert_eq!(report.accuracy, 0.0);
    assert!(report.per_label.is_empty());

    let extended = report.extended.unwrap();
    assert_eq!(extended.context_precision, None);
    assert_eq!(extended.false_positive_rate, None);
    assert_eq!(extended.median_latency_seconds, None);
}
