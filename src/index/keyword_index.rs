/// Tantivy keyword index for lexical evidence search
use super::{EvidenceIndex, RetrievalCandidate};
use crate::corpus::EvidenceChunk;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError};
use thiserror::Error;

/// Writer heap; a single indexing thread keeps document order stable
const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

#[derive(Debug, Clone, Copy)]
struct ChunkFields {
    id: Field,
    text: Field,
    title: Field,
    url: Field,
    published_at: Field,
    source: Field,
    ord: Field,
}

impl ChunkFields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            id: builder.add_text_field("id", STRING | STORED),
            text: builder.add_text_field("text", TEXT | STORED),
            title: builder.add_text_field("title", STORED),
            url: builder.add_text_field("url", STORED),
            published_at: builder.add_text_field("published_at", STORED),
            source: builder.add_text_field("source", STORED),
            ord: builder.add_u64_field("ord", STORED),
        };
        (builder.build(), fields)
    }

    fn from_schema(schema: &Schema) -> Result<Self, KeywordIndexError> {
        let get = |name: &str| {
            schema.get_field(name).map_err(|_| {
                KeywordIndexError::InitializationError(format!(
                    "Missing '{}' field in schema",
                    name
                ))
            })
        };
        Ok(Self {
            id: get("id")?,
            text: get("text")?,
            title: get("title")?,
            url: get("url")?,
            published_at: get("published_at")?,
            source: get("source")?,
            ord: get("ord")?,
        })
    }
}

/// Make `dir` an empty directory ready for a new index.
///
/// Only a directory holding a previous index (`meta.json`) is cleared.
fn prepare_index_dir(dir: &Path) -> Result<(), KeywordIndexError> {
    if dir.join("meta.json").exists() {
        tracing::debug!("Replacing keyword index at {:?}", dir);
        std::fs::remove_dir_all(dir)?;
    } else if dir.exists() {
        if !dir.is_dir() {
            return Err(KeywordIndexError::InitializationError(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        if std::fs::read_dir(dir)?.next().is_some() {
            return Err(KeywordIndexError::InitializationError(format!(
                "{} is not empty and does not hold a keyword index",
                dir.display()
            )));
        }
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// BM25 keyword index over evidence chunks.
///
/// Built once from a chunk list and read-only afterwards. Equal scores are
/// ordered by insertion order.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    fields: ChunkFields,
}

impl KeywordIndex {
    /// Build an index from chunks, in memory or persisted to `dir`.
    ///
    /// An existing index in `dir` is replaced. Any other non-empty directory
    /// is refused and left untouched.
    pub fn build(chunks: &[EvidenceChunk], dir: Option<&Path>) -> Result<Self, KeywordIndexError> {
        let (schema, fields) = ChunkFields::schema();

        let index = match dir {
            Some(dir) => {
                prepare_index_dir(dir)?;
                Index::create_in_dir(dir, schema)
                    .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?
            }
            None => Index::create_in_ram(schema),
        };

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        for (ord, chunk) in chunks.iter().enumerate() {
            let mut doc = TantivyDocument::new();
            doc.add_text(fields.id, &chunk.id);
            doc.add_text(fields.text, &chunk.text);
            if let Some(title) = &chunk.title {
                doc.add_text(fields.title, title);
            }
            if let Some(url) = &chunk.url {
                doc.add_text(fields.url, url);
            }
            if let Some(published_at) = &chunk.published_at {
                doc.add_text(fields.published_at, published_at);
            }
            if let Some(source) = &chunk.source {
                doc.add_text(fields.source, source);
            }
            doc.add_u64(fields.ord, ord as u64);

            writer
                .add_document(doc)
                .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        }

        writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        writer.wait_merging_threads()?;

        tracing::info!("Keyword index built with {} chunks", chunks.len());
        Self::with_reader(index, fields)
    }

    /// Open a persisted index
    pub fn open(dir: &Path) -> Result<Self, KeywordIndexError> {
        if !dir.join("meta.json").exists() {
            return Err(KeywordIndexError::IndexNotFound(dir.display().to_string()));
        }

        let index = Index::open_in_dir(dir)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;
        let fields = ChunkFields::from_schema(&index.schema())?;

        Self::with_reader(index, fields)
    }

    fn with_reader(index: Index, fields: ChunkFields) -> Result<Self, KeywordIndexError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Search the index, returning candidates with BM25 scores
    pub fn search_chunks(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, KeywordIndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        // Claims are free text; never fail on query syntax
        let query_parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (query, parse_errors) = query_parser.parse_query_lenient(query);
        if !parse_errors.is_empty() {
            tracing::debug!("Ignored {} query parse errors", parse_errors.len());
        }

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let ord = doc
                .get_first(self.fields.ord)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid ord field".to_string())
                })?;

            hits.push((ord, RetrievalCandidate::new(self.to_chunk(&doc)?, score)));
        }

        hits.sort_by(|(ord_a, a), (ord_b, b)| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ord_a.cmp(ord_b))
        });
        let candidates = hits.into_iter().map(|(_, candidate)| candidate).collect();

        Ok(candidates)
    }

    fn to_chunk(&self, doc: &TantivyDocument) -> Result<EvidenceChunk, KeywordIndexError> {
        let text_of = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };

        let id = text_of(self.fields.id).ok_or_else(|| {
            KeywordIndexError::SearchError("Missing or invalid id field".to_string())
        })?;

        Ok(EvidenceChunk {
            id,
            text: text_of(self.fields.text).unwrap_or_default(),
            title: text_of(self.fields.title),
            url: text_of(self.fields.url),
            published_at: text_of(self.fields.published_at),
            source: text_of(self.fields.source),
        })
    }

    /// Get the number of documents in the index
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

impl EvidenceIndex for KeywordIndex {
    fn search(&self, query: &str, limit: usize) -> crate::error::Result<Vec<RetrievalCandidate>> {
        Ok(self.search_chunks(query, limit)?)
    }

    fn len(&self) -> usize {
        self.num_docs() as usize
    }

    fn backend(&self) -> &'static str {
        "lexical"
    }
}
