/// Content-addressed embedding cache
///
/// Keys are BLAKE3 digests of the embedded text; the cache file is
/// zstd-compressed JSON tagged with the model name so a model switch starts
/// from an empty cache.
use super::{EmbeddingError, EmbeddingProvider};
use crate::error::{ClaimCheckError, Result};
use ahash::{HashMap, HashMapExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    model: String,
    entries: HashMap<String, Vec<f32>>,
}

/// Embedding provider wrapper that memoizes embeddings by text digest
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    entries: RwLock<HashMap<String, Vec<f32>>>,
    path: Option<PathBuf>,
    dirty: AtomicBool,
}

fn digest(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn poisoned() -> EmbeddingError {
    EmbeddingError::GenerationError("embedding cache lock poisoned".to_string())
}

impl CachedEmbedder {
    /// In-memory cache only
    pub fn new(inner: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Cache backed by `path`; loads existing entries for the same model
    pub fn with_file(inner: Arc<dyn EmbeddingProvider>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match Self::load(&path)? {
            Some(file) if file.model == inner.model_name() => file.entries,
            Some(file) => {
                tracing::warn!(
                    "Embedding cache {:?} was built with {}, ignoring it",
                    path,
                    file.model
                );
                HashMap::new()
            }
            None => HashMap::new(),
        };
        tracing::debug!("Embedding cache loaded with {} entries", entries.len());

        Ok(Self {
            inner,
            entries: RwLock::new(entries),
            path: Some(path),
            dirty: AtomicBool::new(false),
        })
    }

    fn load(path: &Path) -> Result<Option<CacheFile>> {
        if !path.exists() {
            return Ok(None);
        }
        let compressed = std::fs::read(path)
            .map_err(|e| ClaimCheckError::io(e, format!("Failed to read cache: {:?}", path)))?;
        let raw = zstd::decode_all(&compressed[..])
            .map_err(|e| ClaimCheckError::io(e, format!("Failed to decompress cache: {:?}", path)))?;
        let file = serde_json::from_slice(&raw).map_err(|e| ClaimCheckError::Json {
            source: e,
            context: format!("Invalid embedding cache: {:?}", path),
        })?;
        Ok(Some(file))
    }

    /// Persist new entries, if any, to the cache file
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }

        let entries = self
            .entries
            .read()
            .map_err(|_| ClaimCheckError::Config("embedding cache lock poisoned".to_string()))?;
        let file = CacheFile {
            model: self.inner.model_name().to_string(),
            entries: entries.clone(),
        };
        drop(entries);

        let raw = serde_json::to_vec(&file).map_err(|e| ClaimCheckError::Json {
            source: e,
            context: "Failed to serialize embedding cache".to_string(),
        })?;
        let compressed = zstd::encode_all(&raw[..], ZSTD_LEVEL)
            .map_err(|e| ClaimCheckError::io(e, "Failed to compress embedding cache"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClaimCheckError::io(e, format!("Failed to create {:?}", parent)))?;
        }
        std::fs::write(path, compressed)
            .map_err(|e| ClaimCheckError::io(e, format!("Failed to write cache: {:?}", path)))?;

        self.dirty.store(false, Ordering::Release);
        tracing::info!("Embedding cache saved with {} entries", file.entries.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmbeddingProvider for CachedEmbedder {
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        let key = digest(text);
        if let Some(hit) = self.entries.read().map_err(|_| poisoned())?.get(&key) {
            return Ok(hit.clone());
        }

        let embedding = self.inner.embed(text)?;
        self.entries
            .write()
            .map_err(|_| poisoned())?
            .insert(key, embedding.clone());
        self.dirty.store(true, Ordering::Release);
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        let keys: Vec<String> = texts.iter().map(|t| digest(t)).collect();

        let mut out: Vec<Option<Vec<f32>>> = {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            keys.iter().map(|k| entries.get(k).cloned()).collect()
        };

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&batch)?;
            if fresh.len() != batch.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    fresh.len()
                )));
            }

            let mut entries = self.entries.write().map_err(|_| poisoned())?;
            for (&i, embedding) in missing.iter().zip(fresh) {
                entries.insert(keys[i].clone(), embedding.clone());
                out[i] = Some(embedding);
            }
            self.dirty.store(true, Ordering::Release);
        }

        Ok(out.into_iter().flatten().collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
