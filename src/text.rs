//! Significant-term tokenization shared by the heuristic verdict and the
//! proxy retrieval metrics.
//!
//! Terms are whitespace-separated tokens kept verbatim apart from case, so
//! `rates.` and `rates` are distinct terms.

use std::collections::HashSet;

/// Terms must be strictly longer than this many characters to count
pub const MIN_TERM_CHARS: usize = 3;

/// Guards the overlap ratio when a claim has no significant terms
pub const OVERLAP_EPSILON: f64 = 1e-9;

/// Lowercase whitespace tokens longer than three characters, deduplicated
pub fn significant_terms(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .filter(|t| t.chars().count() > MIN_TERM_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// `|C ∩ T| / (|C| + ε)` where `C` are the claim terms and `T` the text terms
pub fn term_overlap(claim_terms: &HashSet<String>, text: &str) -> f64 {
    let text_terms = significant_terms(text);
    let shared = claim_terms.intersection(&text_terms).count();
    shared as f64 / (claim_terms.len() as f64 + OVERLAP_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significant_terms_filters_short_words() {
        let terms = significant_terms("The Central bank cuts its rates");
        assert!(terms.contains("central"));
        assert!(terms.contains("bank"));
        assert!(terms.contains("cuts"));
        assert!(terms.contains("rates"));
        assert!(!terms.contains("the"));
        assert!(!terms.contains("its"));
    }

    #[test]
    fn test_punctuation_stays_attached() {
        let terms = significant_terms("Analysis: central-bank policy. U.S. tariffs,");
        assert!(terms.contains("analysis:"));
        assert!(terms.contains("central-bank"));
        assert!(terms.contains("policy."));
        assert!(terms.contains("u.s."));
        assert!(terms.contains("tariffs,"));
        assert!(!terms.contains("policy"));
    }

    #[test]
    fn test_punctuated_claim_does_not_match_bare_words() {
        let claim = significant_terms("tariffs, taxes.");
        assert_eq!(term_overlap(&claim, "tariffs taxes"), 0.0);
        assert!((term_overlap(&claim, "new tariffs, taxes. today") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_overlap_with_empty_claim_is_zero() {
        let claim = significant_terms("a an to");
        assert!(claim.is_empty());
        assert_eq!(term_overlap(&claim, "anything at all here"), 0.0);
    }

    #[test]
    fn test_overlap_ratio() {
        let claim = significant_terms("Central bank cuts interest rates");
        let overlap = term_overlap(&claim, "Analysis: central bank future policy");
        assert!((overlap - 0.4).abs() < 1e-6);
    }
}
