//! Configuration management for claimcheck
//!
//! Configuration is loaded from TOML, adjusted by environment overrides and an
//! optional profile, validated, and then passed explicitly into constructors.

use crate::error::{ClaimCheckError, Result};
use crate::index::VectorIndexConfig;
use crate::retrieval::RetrievalParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Prefix of environment overrides, e.g. `CLAIMCHECK_RETRIEVAL__TOP_K=5`
pub const ENV_PREFIX: &str = "CLAIMCHECK_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub retrieval: RetrievalConfig,
    pub verdict: VerdictConfig,
    pub llm: LlmConfig,
    pub batch: BatchConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Processed corpus location and ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub processed_dir: PathBuf,
    /// Token budget per chunk at ingestion
    pub chunk_max_tokens: usize,
}

/// Evidence index backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Lexical,
    Vector,
}

impl fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexBackend::Lexical => f.write_str("lexical"),
            IndexBackend::Vector => f.write_str("vector"),
        }
    }
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lexical" => Ok(IndexBackend::Lexical),
            "vector" => Ok(IndexBackend::Vector),
            other => Err(format!("unknown index backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    /// Persisted lexical index; rebuilt in memory when absent
    pub keyword_dir: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
}

/// HNSW parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    pub hnsw_m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

/// Retrieval defaults; CLI flags override per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    /// Omit to disable the age filter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
    pub source_diversity_cap: usize,
}

/// Verdict strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VerdictMode {
    Heuristic,
    Classifier,
}

impl fmt::Display for VerdictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictMode::Heuristic => f.write_str("heuristic"),
            VerdictMode::Classifier => f.write_str("classifier"),
        }
    }
}

impl FromStr for VerdictMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" => Ok(VerdictMode::Heuristic),
            // accepted for older configs
            "classifier" | "llm" => Ok(VerdictMode::Classifier),
            other => Err(format!("unknown verdict mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictConfig {
    pub mode: VerdictMode,
}

/// LLM classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key_env: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Supported classifier providers; all speak the OpenAI chat completion API
pub const LLM_PROVIDERS: [&str; 3] = ["openai", "groq", "ollama"];

/// OpenAI-compatible endpoint of Groq
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible endpoint of a local Ollama server
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Placeholder key; a local Ollama server ignores it
const OLLAMA_API_KEY: &str = "ollama";

impl LlmConfig {
    /// API key from the configured environment variable, if set and non-empty
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Key sent to the provider; Ollama works without a configured one
    pub fn credentials(&self) -> Option<String> {
        self.api_key()
            .or_else(|| (self.provider == "ollama").then(|| OLLAMA_API_KEY.to_string()))
    }

    /// Explicit `base_url`, else the provider's default endpoint.
    ///
    /// `None` means the client default (api.openai.com).
    pub fn endpoint(&self) -> Option<String> {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Some(url.to_string());
        }
        match self.provider.as_str() {
            "groq" => Some(GROQ_BASE_URL.to_string()),
            "ollama" => Some(OLLAMA_BASE_URL.to_string()),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Claims verified concurrently
    pub concurrency: usize,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<IndexBackend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict_mode: Option<VerdictMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_model: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClaimCheckError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ClaimCheckError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ClaimCheckError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| ClaimCheckError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(backend) = overrides.backend {
            self.index.backend = backend;
        }
        if let Some(mode) = overrides.verdict_mode {
            self.verdict.mode = mode;
        }
        if let Some(top_k) = overrides.top_k {
            self.retrieval.top_k = top_k;
        }
        if let Some(model) = overrides.embedding_model {
            self.embedding.model = model;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        tracing::debug!("Applied profile {}", profile);
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: CLAIMCHECK_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `CLAIMCHECK_`-prefixed overrides from arbitrary key/value pairs
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "CORPUS__PROCESSED_DIR" => self.corpus.processed_dir = PathBuf::from(value),
            "INDEX__BACKEND" => self.index.backend = parse_value(path, value)?,
            "INDEX__KEYWORD_DIR" => self.index.keyword_dir = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "EMBEDDING__BATCH_SIZE" => self.embedding.batch_size = parse_value(path, value)?,
            "RETRIEVAL__TOP_K" => self.retrieval.top_k = parse_value(path, value)?,
            "RETRIEVAL__MAX_AGE_DAYS" => {
                self.retrieval.max_age_days = match value.trim() {
                    "" | "none" | "off" => None,
                    days => Some(parse_value(path, days)?),
                };
            }
            "RETRIEVAL__SOURCE_DIVERSITY_CAP" => {
                self.retrieval.source_diversity_cap = parse_value(path, value)?;
            }
            "VERDICT__MODE" => self.verdict.mode = parse_value(path, value)?,
            "LLM__PROVIDER" => self.llm.provider = value.trim().to_lowercase(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = Some(value.to_string()),
            "LLM__TIMEOUT_SECS" => self.llm.timeout_secs = parse_value(path, value)?,
            "BATCH__CONCURRENCY" => self.batch.concurrency = parse_value(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Retrieval parameters from the `retrieval` section.
    ///
    /// `max_age_days = 0` disables the age filter, the same as on the command line.
    pub fn retrieval_params(&self) -> RetrievalParams {
        RetrievalParams {
            k: self.retrieval.top_k,
            max_age_days: self.retrieval.max_age_days.filter(|&days| days > 0),
            source_diversity_cap: self.retrieval.source_diversity_cap,
        }
    }

    /// HNSW build parameters from the `vector` and `embedding` sections
    pub fn vector_index_config(&self) -> VectorIndexConfig {
        VectorIndexConfig {
            hnsw_m: self.vector.hnsw_m,
            ef_construction: self.vector.ef_construction,
            ef_search: self.vector.ef_search,
            batch_size: self.embedding.batch_size,
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ClaimCheckError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("claimcheck").join("config.toml"))
    }
}

fn parse_value<T: FromStr>(path: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ClaimCheckError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}': {}", value, e),
        })
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        let defaults = RetrievalParams::default();
        let vector = VectorIndexConfig::default();

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            corpus: CorpusConfig {
                processed_dir: data_dir.join("processed"),
                chunk_max_tokens: crate::corpus::DEFAULT_MAX_TOKENS,
            },
            index: IndexConfig {
                backend: IndexBackend::Lexical,
                keyword_dir: data_dir.join("index").join("keyword"),
            },
            embedding: EmbeddingConfig {
                model: "bge-base-en".to_string(),
                batch_size: vector.batch_size,
                cache_file: Some(data_dir.join("index").join("embeddings.json.zst")),
            },
            vector: VectorConfig {
                hnsw_m: vector.hnsw_m,
                ef_construction: vector.ef_construction,
                ef_search: vector.ef_search,
            },
            retrieval: RetrievalConfig {
                top_k: defaults.k,
                max_age_days: defaults.max_age_days,
                source_diversity_cap: defaults.source_diversity_cap,
            },
            verdict: VerdictConfig {
                mode: VerdictMode::Heuristic,
            },
            llm: LlmConfig {
                provider: "openai".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                model: "gpt-4o-mini".to_string(),
                base_url: None,
                temperature: 0.2,
                timeout_secs: 30,
            },
            batch: BatchConfig { concurrency: 4 },
            profiles: HashMap::new(),
        }
    }
}
