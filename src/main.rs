use claimcheck::batch::{self, VerdictRecord};
use claimcheck::cli::{Cli, Commands, ConfigAction, IndexAction};
use claimcheck::config::{Config, IndexBackend, VerdictMode};
use claimcheck::corpus::{chunk_files, ingest_file, load_chunks};
use claimcheck::error::{ClaimCheckError, Result};
use claimcheck::evaluation::evaluate;
use claimcheck::index::{
    CachedEmbedder, EmbeddingProvider, EvidenceIndex, FastEmbedProvider, KeywordIndex, VectorIndex,
};
use claimcheck::pipeline::VerificationPipeline;
use claimcheck::retrieval::Retriever;
use claimcheck::verdict::{ClassifierStrategy, OpenAiClassifier, VerdictEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Verify {
            claim,
            batch,
            out,
            k,
            max_age_days,
            diversity_cap,
            mode,
            backend,
            store_retrieved,
        } => {
            let mut config = load_config(cli.config, cli.profile)?;
            if let Some(k) = k {
                config.retrieval.top_k = k;
            }
            if let Some(days) = max_age_days {
                config.retrieval.max_age_days = (days > 0).then_some(days);
            }
            if let Some(cap) = diversity_cap {
                config.retrieval.source_diversity_cap = cap;
            }
            if let Some(mode) = mode {
                config.verdict.mode = mode;
            }
            if let Some(backend) = backend {
                config.index.backend = backend;
            }

            let pipeline = build_pipeline(&config).await?;
            match (claim, batch) {
                (Some(claim), _) => cmd_verify_claim(&pipeline, &claim).await?,
                (None, Some(batch)) => {
                    cmd_verify_batch(&pipeline, &config, &batch, &out, store_retrieved).await?
                }
                (None, None) => {
                    return Err(ClaimCheckError::validation(
                        "claim",
                        "either --claim or --batch is required",
                    ))
                }
            }
        }
        Commands::Evaluate {
            pred,
            gold,
            report,
            extended,
        } => {
            cmd_evaluate(&pred, &gold, report.as_deref(), extended)?;
        }
        Commands::Ingest {
            input,
            out_dir,
            max_tokens,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, &input, out_dir, max_tokens)?;
        }
        Commands::Index { action } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_index(&config, action)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose {
        "claimcheck=debug"
    } else {
        "claimcheck=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries verdict and report JSON
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_index(config: &Config) -> Result<Arc<dyn EvidenceIndex>> {
    match config.index.backend {
        IndexBackend::Lexical => {
            let keyword_dir = expand_path(&config.index.keyword_dir)?;
            if keyword_dir.join("meta.json").exists() {
                tracing::info!("Opening keyword index at {:?}", keyword_dir);
                return Ok(Arc::new(KeywordIndex::open(&keyword_dir)?));
            }

            let chunks = load_chunks(&expand_path(&config.corpus.processed_dir)?)?;
            tracing::info!(
                "No persisted keyword index, indexing {} chunks in memory",
                chunks.len()
            );
            Ok(Arc::new(KeywordIndex::build(&chunks, None)?))
        }
        IndexBackend::Vector => {
            let chunks = load_chunks(&expand_path(&config.corpus.processed_dir)?)?;
            let provider: Arc<dyn EmbeddingProvider> = Arc::new(
                FastEmbedProvider::new(&config.embedding.model)
                    .map_err(|e| ClaimCheckError::IndexUnavailable(e.to_string()))?,
            );

            let cache = match &config.embedding.cache_file {
                Some(path) => CachedEmbedder::with_file(provider, expand_path(path)?)?,
                None => CachedEmbedder::new(provider),
            };
            let cache = Arc::new(cache);

            let index = VectorIndex::build(chunks, cache.clone(), config.vector_index_config())?;
            if let Err(e) = cache.save() {
                tracing::warn!("Failed to save embedding cache: {}", e);
            }
            Ok(Arc::new(index))
        }
    }
}

fn build_engine(config: &Config) -> VerdictEngine {
    match config.verdict.mode {
        VerdictMode::Heuristic => VerdictEngine::Heuristic,
        VerdictMode::Classifier => {
            let api_key = config.llm.credentials();
            if api_key.is_none() {
                tracing::warn!(
                    "{} is not set, classifier verdicts will fall back to the heuristic",
                    config.llm.api_key_env
                );
            }
            let endpoint = config.llm.endpoint();
            tracing::info!(
                "Classifier: {} via {} ({})",
                config.llm.model,
                config.llm.provider,
                endpoint.as_deref().unwrap_or("default endpoint")
            );
            let classifier = OpenAiClassifier::new(
                config.llm.model.clone(),
                endpoint,
                api_key,
                config.llm.temperature,
            );
            VerdictEngine::Classifier(
                ClassifierStrategy::new(Arc::new(classifier)).with_timeout(config.llm.timeout()),
            )
        }
    }
}

async fn build_pipeline(config: &Config) -> Result<VerificationPipeline> {
    let index_config = config.clone();
    let index = tokio::task::spawn_blocking(move || open_index(&index_config))
        .await
        .map_err(|e| ClaimCheckError::Other(anyhow::anyhow!("index task failed: {}", e)))??;

    tracing::info!(
        "Evidence index ready ({} backend, {} chunks, {} verdicts)",
        index.backend(),
        index.len(),
        config.verdict.mode
    );

    VerificationPipeline::new(
        Retriever::new(index),
        build_engine(config),
        config.retrieval_params(),
    )
}

async fn cmd_verify_claim(pipeline: &VerificationPipeline, claim: &str) -> Result<()> {
    let outcome = pipeline.verify(claim).await?;
    let json = serde_json::to_string_pretty(&outcome.verdict).map_err(|e| ClaimCheckError::Json {
        source: e,
        context: "Failed to serialize verdict".to_string(),
    })?;
    println!("{}", json);
    Ok(())
}

async fn cmd_verify_batch(
    pipeline: &VerificationPipeline,
    config: &Config,
    batch_path: &Path,
    out: &Path,
    store_retrieved: bool,
) -> Result<()> {
    let records = batch::read_claims(batch_path)?;
    let claims: Vec<String> = records.iter().map(|r| r.claim.clone()).collect();

    let outcomes = pipeline
        .verify_batch(&claims, config.batch.concurrency)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let lines: Vec<VerdictRecord> = records
        .iter()
        .zip(&outcomes)
        .map(|(record, outcome)| VerdictRecord {
            verdict: &outcome.verdict,
            retrieved: store_retrieved.then_some(outcome.retrieved.as_slice()),
            gold_label: record.label,
        })
        .collect();
    batch::write_jsonl(out, &lines)?;

    println!("✓ Wrote {} verdicts to {}", lines.len(), out.display());
    Ok(())
}

fn cmd_evaluate(pred: &Path, gold: &Path, report_path: Option<&Path>, extended: bool) -> Result<()> {
    let predictions = batch::read_predictions(pred)?;
    let gold = batch::read_gold(gold)?;
    let report = evaluate(&predictions, &gold, extended);

    let json = serde_json::to_string_pretty(&report).map_err(|e| ClaimCheckError::Json {
        source: e,
        context: "Failed to serialize evaluation report".to_string(),
    })?;

    if let Some(path) = report_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClaimCheckError::io(e, format!("Failed to create {:?}", parent)))?;
        }
        std::fs::write(path, &json)
            .map_err(|e| ClaimCheckError::io(e, format!("Failed to write report: {:?}", path)))?;
        tracing::info!("Report written to {:?}", path);
    }

    println!("{}", json);
    Ok(())
}

fn cmd_ingest(
    config: &Config,
    input: &Path,
    out_dir: Option<PathBuf>,
    max_tokens: Option<usize>,
) -> Result<()> {
    let out_dir = match out_dir {
        Some(dir) => dir,
        None => expand_path(&config.corpus.processed_dir)?,
    };
    let stats = ingest_file(
        input,
        &out_dir,
        max_tokens.unwrap_or(config.corpus.chunk_max_tokens),
    )?;

    println!("✓ Ingested {} articles", stats.articles);
    println!("  Chunks: {}", stats.chunks);
    println!("  Output: {}", stats.output.display());
    Ok(())
}

fn cmd_index(config: &Config, action: IndexAction) -> Result<()> {
    let processed_dir = expand_path(&config.corpus.processed_dir)?;
    let keyword_dir = expand_path(&config.index.keyword_dir)?;

    match action {
        IndexAction::Build => {
            let chunks = load_chunks(&processed_dir)?;
            let index = KeywordIndex::build(&chunks, Some(&keyword_dir))?;

            println!("✓ Keyword index built");
            println!("  Documents: {}", index.num_docs());
            println!("  Location: {}", keyword_dir.display());
        }
        IndexAction::Stats => {
            let files = chunk_files(&processed_dir)?;
            let chunks = load_chunks(&processed_dir)?;

            println!("Corpus: {}", processed_dir.display());
            println!("  Chunk files: {}", files.len());
            println!("  Chunks: {}", chunks.len());

            match KeywordIndex::open(&keyword_dir) {
                Ok(index) => println!("Keyword index: {} documents", index.num_docs()),
                Err(_) => println!("Keyword index: not built (run 'claimcheck index build')"),
            }
        }
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show { section } => {
            let config = load_config(config_path, profile)?;
            let value = toml::Value::try_from(&config)?;

            let shown = match section {
                Some(name) => {
                    let table = value.get(&name).ok_or_else(|| {
                        ClaimCheckError::Config(format!("Unknown config section: {}", name))
                    })?;
                    toml::to_string_pretty(table)?
                }
                None => toml::to_string_pretty(&value)?,
            };
            println!("{}", shown);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ClaimCheckError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let explicit = config_path.is_some();
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        if explicit {
            return Err(ClaimCheckError::ConfigNotFound { path });
        }
        tracing::debug!(
            "Config file not found, using defaults. Run 'claimcheck config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        if let Some(profile) = profile {
            config.apply_profile(&profile)?;
        }
        claimcheck::config::ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    if let Some(profile) = profile {
        Config::load_with_profile(&path, &profile)
    } else {
        Config::load(&path)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ClaimCheckError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| {
            ClaimCheckError::Config("Cannot determine home directory".to_string())
        })?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
