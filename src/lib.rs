//! Claimcheck - evidence-grounded claim verification
//!
//! Retrieves recent, source-diverse evidence for a natural-language claim from
//! an indexed news corpus, turns it into a labeled and confidence-scored
//! verdict with citations, and evaluates logged verdicts against gold labels.

pub mod batch;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod pipeline;
pub mod retrieval;
pub mod text;
pub mod verdict;

pub use error::{ClaimCheckError, Result};
