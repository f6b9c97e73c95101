use crate::config::{Config, VerdictMode, LLM_PROVIDERS, SCHEMA_VERSION};
use crate::error::{ClaimCheckError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every violation
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_paths(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_vector(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_llm(config, &mut errors);

        if config.batch.concurrency == 0 {
            errors.push(ValidationError::new(
                "batch.concurrency",
                "Concurrency must be greater than 0",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClaimCheckError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_paths(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the corpus is loaded
        if config.corpus.processed_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "corpus.processed_dir",
                "Processed corpus path cannot be empty",
            ));
        }

        if config.corpus.chunk_max_tokens == 0 {
            errors.push(ValidationError::new(
                "corpus.chunk_max_tokens",
                "Chunk token budget must be greater than 0",
            ));
        }

        if config.index.keyword_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "index.keyword_dir",
                "Keyword index path cannot be empty",
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_vector(config: &Config, errors: &mut Vec<ValidationError>) {
        let vector = &config.vector;
        for (path, value) in [
            ("vector.hnsw_m", vector.hnsw_m),
            ("vector.ef_construction", vector.ef_construction),
            ("vector.ef_search", vector.ef_search),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(path, "Must be greater than 0"));
            }
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.source_diversity_cap == 0 {
            errors.push(ValidationError::new(
                "retrieval.source_diversity_cap",
                "Source diversity cap must be at least 1",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // A missing key is not an error: the classifier falls back to the heuristic
        if config.verdict.mode == VerdictMode::Classifier
            && config.llm.provider != "ollama"
            && config.llm.api_key_env.is_empty()
        {
            errors.push(ValidationError::new(
                "llm.api_key_env",
                "API key environment variable name cannot be empty",
            ));
        }

        let temp = config.llm.temperature;
        if !(0.0..=2.0).contains(&temp) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", temp),
            ));
        }

        let provider = &config.llm.provider;
        if !LLM_PROVIDERS.contains(&provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!(
                    "Provider must be one of {:?}, got '{}'",
                    LLM_PROVIDERS, provider
                ),
            ));
        }

        if config.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }
    }
}
