// Newline-delimited JSON record I/O for batch verification and evaluation

use crate::corpus::EvidenceChunk;
use crate::error::{ClaimCheckError, Result};
use crate::evaluation::{GoldLabels, Prediction};
use crate::verdict::{Label, Verdict};
use ahash::HashMapExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Claim to verify, with an optional gold label
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimRecord {
    pub claim: String,
    pub label: Option<Label>,
}

#[derive(Deserialize)]
struct RawClaimRecord {
    claim: Option<String>,
    text: Option<String>,
    label: Option<String>,
}

/// One batch output line
#[derive(Debug, Serialize)]
pub struct VerdictRecord<'a> {
    #[serde(flatten)]
    pub verdict: &'a Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved: Option<&'a [EvidenceChunk]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_label: Option<Label>,
}

/// Read every non-blank line of a JSONL file as `T`
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to open {:?}", path)))?;

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ClaimCheckError::io(e, format!("Failed to read {:?}", path)))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| ClaimCheckError::Json {
            source: e,
            context: format!("{:?} line {}", path, line_no + 1),
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write records as JSONL, creating parent directories
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| ClaimCheckError::io(e, format!("Failed to create {:?}", parent)))?;
    }
    let file = File::create(path)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to create {:?}", path)))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record).map_err(|e| ClaimCheckError::Json {
            source: e,
            context: format!("Failed to serialize record for {:?}", path),
        })?;
        writer
            .write_all(b"\n")
            .map_err(|e| ClaimCheckError::io(e, format!("Failed to write {:?}", path)))?;
    }
    writer
        .flush()
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to flush {:?}", path)))?;
    Ok(())
}

fn parse_label(raw: Option<String>, line: usize) -> Option<Label> {
    let raw = raw?;
    match raw.parse() {
        Ok(label) => Some(label),
        Err(e) => {
            tracing::warn!("Line {}: ignoring label: {}", line, e);
            None
        }
    }
}

/// Read batch claims; `text` is accepted in place of `claim`
pub fn read_claims(path: &Path) -> Result<Vec<ClaimRecord>> {
    let raw: Vec<RawClaimRecord> = read_jsonl(path)?;

    let mut records = Vec::with_capacity(raw.len());
    for (i, record) in raw.into_iter().enumerate() {
        let claim = record
            .claim
            .or(record.text)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let Some(claim) = claim else {
            tracing::warn!("Record {} has no claim, skipping", i + 1);
            continue;
        };
        records.push(ClaimRecord {
            claim,
            label: parse_label(record.label, i + 1),
        });
    }
    Ok(records)
}

/// Read gold labels keyed by claim; records without a usable label are skipped
pub fn read_gold(path: &Path) -> Result<GoldLabels> {
    let mut gold = GoldLabels::new();
    for record in read_claims(path)? {
        if let Some(label) = record.label {
            gold.insert(record.claim, label);
        }
    }
    tracing::debug!("Loaded {} gold labels from {:?}", gold.len(), path);
    Ok(gold)
}

/// Read logged verdicts for evaluation.
///
/// Lines that do not decode as a verdict are skipped with a warning.
pub fn read_predictions(path: &Path) -> Result<Vec<Prediction>> {
    let file = File::open(path)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to open {:?}", path)))?;

    let mut predictions = Vec::new();
    let mut skipped = 0;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ClaimCheckError::io(e, format!("Failed to read {:?}", path)))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Prediction>(&line) {
            Ok(prediction) => predictions.push(prediction),
            Err(e) => {
                skipped += 1;
                tracing::warn!("{:?} line {}: skipping prediction: {}", path, line_no + 1, e);
            }
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} undecodable predictions in {:?}", skipped, path);
    }
    Ok(predictions)
}
