//! CLI command definitions and parsing
use crate::config::{IndexBackend, VerdictMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "claimcheck",
    version,
    author = "neur0map",
    about = "Evidence-grounded claim verification over a news corpus",
    long_about = "Claimcheck retrieves recent, source-diverse evidence for a natural-language claim \
                  from an indexed news corpus, produces a labeled verdict with confidence and \
                  citations, and evaluates logged verdicts against gold labels."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/claimcheck/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify a single claim or a batch of claims
    Verify {
        /// Claim text to verify
        #[arg(long, conflicts_with = "batch", required_unless_present = "batch")]
        claim: Option<String>,

        /// JSONL file of claims ({"claim": ..., "label"?: ...})
        #[arg(long, value_name = "FILE")]
        batch: Option<PathBuf>,

        /// Output JSONL path for batch results
        #[arg(long, default_value = "results/output.jsonl")]
        out: PathBuf,

        /// Number of evidence chunks to keep
        #[arg(short, long)]
        k: Option<usize>,

        /// Drop evidence older than this many days (0 disables the filter)
        #[arg(long)]
        max_age_days: Option<u32>,

        /// Maximum evidence chunks per source
        #[arg(long)]
        diversity_cap: Option<usize>,

        /// Verdict strategy
        #[arg(long, value_enum)]
        mode: Option<VerdictMode>,

        /// Evidence index backend
        #[arg(long, value_enum)]
        backend: Option<IndexBackend>,

        /// Store retrieved chunks with each batch result
        #[arg(long)]
        store_retrieved: bool,
    },

    /// Evaluate logged verdicts against gold labels
    Evaluate {
        /// Verdict JSONL produced by `verify --batch`
        #[arg(long, value_name = "FILE")]
        pred: PathBuf,

        /// Gold label JSONL ({"claim": ..., "label": ...})
        #[arg(long, value_name = "FILE")]
        gold: PathBuf,

        /// Write the report JSON to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,

        /// Include proxy retrieval-quality metrics
        #[arg(long)]
        extended: bool,
    },

    /// Clean and chunk raw article JSONL into the processed corpus
    Ingest {
        /// Raw article JSONL file
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Output directory (defaults to the configured processed dir)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Token budget per chunk
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Manage the evidence index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Build and persist the lexical index from the processed corpus
    Build,

    /// Show corpus and index statistics
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
