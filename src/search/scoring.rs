//! Scoring: BM25, positional field boosting, and recency blending.
//!
//! Token streams carry no field tags, so an occurrence is classified by the
//! fractional offset of its first position within the document: the leading
//! slice counts as title, the next as abstract, the rest as body. This is a
//! stated approximation of field-weighted BM25F; the thresholds and weights
//! are plain config so a field-tagged upgrade changes only data.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::RankerConfig;

/// Inverse document frequency.
pub fn idf(n_docs: u64, doc_freq: u32) -> f64 {
    let n = n_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// BM25 contribution of one term occurrence set in one document.
pub fn bm25(
    tf: u32,
    doc_len: u32,
    avg_doc_len: f64,
    doc_freq: u32,
    n_docs: u64,
    config: &RankerConfig,
) -> f64 {
    if n_docs == 0 || doc_freq == 0 {
        return 0.0;
    }
    let tf = tf as f64;
    let norm = if avg_doc_len > 0.0 {
        doc_len as f64 / avg_doc_len
    } else {
        1.0
    };
    let tf_component =
        tf * (config.k1 + 1.0) / (tf + config.k1 * (1.0 - config.b + config.b * norm));
    idf(n_docs, doc_freq) * tf_component
}

/// Field boost for an occurrence whose first position is `first_pos` in a
/// document of `doc_len` tokens.
pub fn field_boost(first_pos: u32, doc_len: u32, config: &RankerConfig) -> f64 {
    let ratio = if doc_len == 0 {
        1.0
    } else {
        first_pos as f64 / doc_len as f64
    };
    if ratio < config.title_fraction {
        config.title_boost
    } else if ratio < config.abstract_fraction {
        config.abstract_boost
    } else {
        config.body_boost
    }
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year regex"))
}

/// First 4-digit year in `[1900, 2099]` found in a free-form date string.
pub fn extract_year(pub_date: &str) -> Option<i32> {
    year_regex()
        .find(pub_date)
        .and_then(|m| m.as_str().parse().ok())
}

/// Exponential-decay recency score; documents with no parseable year get a
/// neutral default.
pub fn recency_score(pub_date: Option<&str>, config: &RankerConfig) -> f64 {
    match pub_date.and_then(extract_year) {
        Some(year) => {
            let age = (config.current_year - year).max(0);
            (-config.recency_decay * age as f64).exp()
        }
        None => config.recency_unknown,
    }
}

/// Blend a BM25 sum with the recency score into the final ranking score.
pub fn blend(bm25_sum: f64, recency: f64, config: &RankerConfig) -> f64 {
    (1.0 - config.recency_weight) * bm25_sum
        + config.recency_weight * config.recency_scale * recency
}
