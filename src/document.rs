//! Input document model.
//!
//! The indexer consumes a stream of *cleaned* documents: tokenization,
//! stemming, and stop-wording have already happened upstream. Each record
//! carries an opaque external key, per-field token lists with 0-based
//! positions, and optional bibliographic metadata.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// One token occurrence within a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The term text. Lowercased again at ingest for safety.
    pub term: String,
    /// 0-based token offset within the document.
    pub pos: u32,
}

/// A named field with its token stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTokens {
    /// Field name (e.g. "title", "body"). Informational only; positions are
    /// document-global.
    pub name: String,
    /// Tokens of this field.
    pub tokens: Vec<Token>,
}

/// A cleaned, pre-tokenized document ready for indexing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanedDocument {
    /// Opaque external document key (e.g. `PMC1234`).
    pub doc_key: String,

    /// Token streams, one per field.
    #[serde(default)]
    pub fields: Vec<FieldTokens>,

    /// Optional document title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Optional author list, free-form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,

    /// Optional publication date, free-form; a 4-digit year is parsed from
    /// it at query time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
}

impl CleanedDocument {
    /// Create a document with a single unnamed field from `(term, pos)` pairs.
    /// Convenience for tests and simple callers.
    pub fn from_terms<S: Into<String>>(doc_key: S, terms: &[(&str, u32)]) -> Self {
        CleanedDocument {
            doc_key: doc_key.into(),
            fields: vec![FieldTokens {
                name: "body".to_string(),
                tokens: terms
                    .iter()
                    .map(|(term, pos)| Token {
                        term: (*term).to_string(),
                        pos: *pos,
                    })
                    .collect(),
            }],
            title: None,
            authors: None,
            pub_date: None,
        }
    }

    /// Aggregate the document's tokens into `term -> sorted unique positions`.
    ///
    /// Terms are lowercased, empty terms are skipped, and all-digit terms
    /// are dropped when `drop_numeric` is set. Positions are merged across
    /// fields, sorted, and deduplicated.
    pub fn aggregate_terms(&self, drop_numeric: bool) -> Vec<(String, Vec<u32>)> {
        let mut agg: AHashMap<String, Vec<u32>> = AHashMap::new();

        for field in &self.fields {
            for token in &field.tokens {
                if token.term.is_empty() {
                    continue;
                }
                if drop_numeric && token.term.bytes().all(|b| b.is_ascii_digit()) {
                    continue;
                }
                let term = token.term.to_lowercase();
                if term.is_empty() {
                    continue;
                }
                agg.entry(term).or_default().push(token.pos);
            }
        }

        let mut terms: Vec<(String, Vec<u32>)> = agg.into_iter().collect();
        for (_, positions) in terms.iter_mut() {
            positions.sort_unstable();
            positions.dedup();
        }
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        terms
    }

    /// Total number of term occurrences (sum of per-term frequencies after
    /// aggregation). This is the document length used by BM25.
    pub fn doc_len(&self, drop_numeric: bool) -> u32 {
        self.aggregate_terms(drop_numeric)
            .iter()
            .map(|(_, positions)| positions.len() as u32)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_lowercases_and_merges() {
        let doc = CleanedDocument {
            doc_key: "d1".to_string(),
            fields: vec![
                FieldTokens {
                    name: "title".to_string(),
                    tokens: vec![
                        Token {
                            term: "Machine".to_string(),
                            pos: 0,
                        },
                        Token {
                            term: "learning".to_string(),
                            pos: 1,
                        },
                    ],
                },
                FieldTokens {
                    name: "body".to_string(),
                    tokens: vec![Token {
                        term: "machine".to_string(),
                        pos: 5,
                    }],
                },
            ],
            ..Default::default()
        };

        let terms = doc.aggregate_terms(false);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].0, "learning");
        assert_eq!(terms[0].1, vec![1]);
        assert_eq!(terms[1].0, "machine");
        assert_eq!(terms[1].1, vec![0, 5]);
        assert_eq!(doc.doc_len(false), 3);
    }

    #[test]
    fn test_aggregate_drops_empty_and_numeric() {
        let doc = CleanedDocument::from_terms("d1", &[("", 0), ("2024", 1), ("covid", 2)]);

        let kept = doc.aggregate_terms(true);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, "covid");

        let with_numeric = doc.aggregate_terms(false);
        assert_eq!(with_numeric.len(), 2);
    }

    #[test]
    fn test_positions_sorted_and_deduped() {
        let doc = CleanedDocument::from_terms("d1", &[("a", 7), ("a", 2), ("a", 7)]);
        let terms = doc.aggregate_terms(false);
        assert_eq!(terms[0].1, vec![2, 7]);
    }

    #[test]
    fn test_jsonl_round_trip() {
        let doc = CleanedDocument {
            doc_key: "PMC42".to_string(),
            fields: vec![FieldTokens {
                name: "body".to_string(),
                tokens: vec![Token {
                    term: "virus".to_string(),
                    pos: 0,
                }],
            }],
            title: Some("A Study".to_string()),
            authors: None,
            pub_date: Some("2024-01-15".to_string()),
        };

        let line = serde_json::to_string(&doc).unwrap();
        let parsed: CleanedDocument = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.doc_key, "PMC42");
        assert_eq!(parsed.title.as_deref(), Some("A Study"));
        assert!(parsed.authors.is_none());
    }
}
