//! Raw article cleaning and sentence-packed chunking

use super::{EvidenceChunk, CHUNK_FILE_SUFFIX};
use crate::error::{ClaimCheckError, Result};
use regex::Regex;
use serde_json::Value;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default token budget per chunk
pub const DEFAULT_MAX_TOKENS: usize = 350;

fn whitespace_regex() -> &'static Regex {
    static WS_RE: OnceLock<Regex> = OnceLock::new();
    WS_RE.get_or_init(|| Regex::new(r"\s+").expect("static whitespace regex"))
}

fn sentence_end_regex() -> &'static Regex {
    static END_RE: OnceLock<Regex> = OnceLock::new();
    END_RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("static sentence regex"))
}

/// Replace non-breaking spaces, collapse whitespace runs and trim
pub fn clean_text(text: &str) -> String {
    let text = text.replace('\u{00a0}', " ");
    whitespace_regex().replace_all(&text, " ").trim().to_string()
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in sentence_end_regex().find_iter(text) {
        // punctuation is a single byte, keep it with its sentence
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

/// Rough token count: words / 0.75, at least 1
fn estimate_tokens(sentence: &str) -> usize {
    let words = sentence.split_whitespace().count() as f64;
    ((words / 0.75).floor() as usize).max(1)
}

/// Pack sentences into chunks of at most `max_tokens` estimated tokens.
///
/// A single sentence longer than the budget becomes its own chunk.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    for sentence in split_sentences(text) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let tokens = estimate_tokens(sentence);
        if current_tokens + tokens > max_tokens && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_tokens = 0;
        }
        current.push(sentence);
        current_tokens += tokens;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// Statistics from one ingestion run
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub articles: usize,
    pub chunks: usize,
    pub output: PathBuf,
}

fn non_empty_str(record: &Value, key: &str) -> Option<String> {
    match record.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn article_id(record: &Value, fallback: &str) -> String {
    match record.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// Turn a raw article JSONL file into `<stem>_chunks.jsonl` inside `out_dir`
pub fn ingest_file(input: &Path, out_dir: &Path, max_tokens: usize) -> Result<IngestStats> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to create {:?}", out_dir)))?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ClaimCheckError::validation("input", "input path has no file stem"))?
        .to_string();
    let output = out_dir.join(format!("{}{}", stem, CHUNK_FILE_SUFFIX));

    let reader = std::fs::File::open(input)
        .map(BufReader::new)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to open {:?}", input)))?;
    let mut writer = std::fs::File::create(&output)
        .map(BufWriter::new)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to create {:?}", output)))?;

    let mut stats = IngestStats {
        output: output.clone(),
        ..Default::default()
    };

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ClaimCheckError::io(e, format!("Failed to read {:?}", input)))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Value = serde_json::from_str(&line).map_err(|e| ClaimCheckError::Json {
            source: e,
            context: format!("Invalid article in {:?} line {}", input, line_no + 1),
        })?;

        let body = non_empty_str(&record, "content")
            .or_else(|| non_empty_str(&record, "text"))
            .unwrap_or_default();
        let body = clean_text(&body);
        let id = article_id(&record, &stem);

        for (i, text) in chunk_text(&body, max_tokens).into_iter().enumerate() {
            let chunk = EvidenceChunk {
                id: format!("{}::{}", id, i),
                text,
                title: non_empty_str(&record, "title"),
                url: non_empty_str(&record, "url"),
                published_at: non_empty_str(&record, "published_at"),
                source: non_empty_str(&record, "source"),
            };
            let json = serde_json::to_string(&chunk).map_err(|e| ClaimCheckError::Json {
                source: e,
                context: "Failed to serialize chunk".to_string(),
            })?;
            writeln!(writer, "{}", json)
                .map_err(|e| ClaimCheckError::io(e, format!("Failed to write {:?}", output)))?;
            stats.chunks += 1;
        }
        stats.articles += 1;
    }

    writer
        .flush()
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to flush {:?}", output)))?;

    tracing::info!(
        "Ingested {} articles into {} chunks -> {:?}",
        stats.articles,
        stats.chunks,
        stats.output
    );
    Ok(stats)
}
