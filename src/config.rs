//! Configuration types for indexing, ranking, and autocomplete.
//!
//! All tunables are explicit data: the indexer takes an [`IndexConfig`],
//! the query executor a [`RankerConfig`], and the autocomplete builder an
//! [`AutocompleteConfig`]. Nothing is read from process-wide state, so
//! every build and every test is deterministic.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SedgeError};

/// Configuration for the indexing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of posting shards (barrel files) to split the index into.
    pub n_shards: u32,

    /// In-memory budget for one block, in bytes. A block is flushed to disk
    /// once its estimated footprint exceeds this.
    pub block_budget_bytes: usize,

    /// Drop tokens that consist entirely of ASCII digits.
    pub drop_numeric_terms: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            n_shards: 4,
            block_budget_bytes: 256 * 1024 * 1024,
            drop_numeric_terms: false,
        }
    }
}

impl IndexConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.n_shards == 0 {
            return Err(SedgeError::config("n_shards must be at least 1"));
        }
        if self.block_budget_bytes == 0 {
            return Err(SedgeError::config("block_budget_bytes must be non-zero"));
        }
        Ok(())
    }
}

/// Configuration for scoring and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    /// K1 parameter for BM25 (term frequency saturation).
    pub k1: f64,

    /// B parameter for BM25 (document length normalization).
    pub b: f64,

    /// Boost applied when a term's first occurrence falls in the title region.
    pub title_boost: f64,

    /// Boost applied when a term's first occurrence falls in the abstract region.
    pub abstract_boost: f64,

    /// Boost applied to body occurrences.
    pub body_boost: f64,

    /// Fractional document offset below which an occurrence counts as title.
    pub title_fraction: f64,

    /// Fractional document offset below which an occurrence counts as abstract.
    pub abstract_fraction: f64,

    /// Weight of the recency component in the final score blend.
    pub recency_weight: f64,

    /// Scale factor that lifts the recency score into the BM25 range.
    pub recency_scale: f64,

    /// Exponential decay rate applied to document age in years.
    pub recency_decay: f64,

    /// Recency score assigned when no publication year can be parsed.
    pub recency_unknown: f64,

    /// Year against which document age is computed.
    pub current_year: i32,

    /// Flat base score for an exact phrase match.
    pub phrase_score: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        RankerConfig {
            k1: 1.2,
            b: 0.75,
            title_boost: 3.0,
            abstract_boost: 2.0,
            body_boost: 1.0,
            title_fraction: 0.10,
            abstract_fraction: 0.30,
            recency_weight: 0.1,
            recency_scale: 10.0,
            recency_decay: 0.1,
            recency_unknown: 0.5,
            current_year: chrono::Utc::now().year(),
            phrase_score: 100.0,
        }
    }
}

/// Configuration for the autocomplete index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutocompleteConfig {
    /// Minimum term length (in characters) for a term to be suggestible.
    pub min_term_len: usize,

    /// Maximum prefix length (in characters) indexed per term.
    pub max_prefix_len: usize,

    /// Number of suggestions kept per prefix.
    pub top_k_per_prefix: usize,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        AutocompleteConfig {
            min_term_len: 2,
            max_prefix_len: 15,
            top_k_per_prefix: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_config_default() {
        let config = IndexConfig::default();
        assert_eq!(config.n_shards, 4);
        assert_eq!(config.block_budget_bytes, 256 * 1024 * 1024);
        assert!(!config.drop_numeric_terms);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_config_validation() {
        let config = IndexConfig {
            n_shards: 0,
            ..IndexConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ranker_config_default() {
        let config = RankerConfig::default();
        assert_eq!(config.k1, 1.2);
        assert_eq!(config.b, 0.75);
        assert_eq!(config.title_boost, 3.0);
        assert_eq!(config.recency_weight, 0.1);
        assert!(config.current_year >= 2024);
    }

    #[test]
    fn test_autocomplete_config_default() {
        let config = AutocompleteConfig::default();
        assert_eq!(config.min_term_len, 2);
        assert_eq!(config.max_prefix_len, 15);
        assert_eq!(config.top_k_per_prefix, 20);
    }
}
