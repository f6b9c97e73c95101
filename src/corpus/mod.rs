//! Evidence corpus: chunk records and chunk-file loading
//!
//! Chunks are produced once by ingestion and never mutated afterwards; every
//! index backend owns its own copy.

mod ingest;

pub use ingest::{chunk_text, clean_text, ingest_file, IngestStats, DEFAULT_MAX_TOKENS};

use crate::error::{ClaimCheckError, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// File name suffix of processed chunk files
pub const CHUNK_FILE_SUFFIX: &str = "_chunks.jsonl";

/// A bounded span of article text with provenance metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceChunk {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Raw publish date as ingested; may be missing or unparseable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EvidenceChunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            title: None,
            url: None,
            published_at: None,
            source: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// List chunk files in a processed directory, sorted by file name
pub fn chunk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to read corpus dir: {:?}", dir)))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ClaimCheckError::io(e, "Failed to read dir entry"))?;
        let path = entry.path();
        let is_chunk_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(CHUNK_FILE_SUFFIX));
        if path.is_file() && is_chunk_file {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every chunk from the `*_chunks.jsonl` files in `dir`
pub fn load_chunks(dir: &Path) -> Result<Vec<EvidenceChunk>> {
    let mut chunks = Vec::new();
    for path in chunk_files(dir)? {
        chunks.extend(read_chunk_file(&path)?);
    }
    tracing::info!("Loaded {} evidence chunks from {:?}", chunks.len(), dir);
    Ok(chunks)
}

fn read_chunk_file(path: &Path) -> Result<Vec<EvidenceChunk>> {
    let file = std::fs::File::open(path)
        .map_err(|e| ClaimCheckError::io(e, format!("Failed to open chunk file: {:?}", path)))?;

    let mut chunks = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            ClaimCheckError::io(e, format!("Failed to read {:?} line {}", path, line_no + 1))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: EvidenceChunk =
            serde_json::from_str(&line).map_err(|e| ClaimCheckError::Json {
                source: e,
                context: format!("Invalid chunk in {:?} line {}", path, line_no + 1),
            })?;
        chunks.push(chunk);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_chunks_reads_only_chunk_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("b_chunks.jsonl"),
            "{\"id\":\"b::0\",\"text\":\"second file\"}\n\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("a_chunks.jsonl"),
            "{\"id\":\"a::0\",\"text\":\"first file\",\"source\":\"Reuters\"}\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("raw.jsonl"), "{\"id\":\"x\"}\n").unwrap();

        let chunks = load_chunks(temp.path()).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "a::0");
        assert_eq!(chunks[0].source.as_deref(), Some("Reuters"));
        assert_eq!(chunks[1].id, "b::0");
        assert!(chunks[1].published_at.is_none());
    }

    #[test]
    fn test_malformed_chunk_line_reports_location() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("bad_chunks.jsonl"), "{not json}\n").unwrap();

        let err = load_chunks(temp.path()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
