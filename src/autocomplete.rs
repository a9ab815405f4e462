//! Precomputed prefix autocomplete index.
//!
//! Built once from the lexicon after a merge: every term of at least two
//! characters contributes its prefixes, each prefix keeps its suggestions
//! ranked by popularity and pruned to a fixed top-K, and the whole map is
//! persisted as a little-endian binary file. A lookup at query time is one
//! hash probe into a small bounded list.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ahash::AHashMap;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::AutocompleteConfig;
use crate::error::{Result, SedgeError};
use crate::lexicon::LexiconEntry;

/// Minimum query prefix length in characters.
const MIN_PREFIX_CHARS: usize = 2;

/// One ranked completion for a prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// The completed term.
    pub term: String,
    /// Ranking score: `ln(1 + doc_freq) * ln(1 + term_freq)`.
    pub popularity: f64,
    /// Global word ID of the term.
    pub word_id: u32,
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Total occurrences across the corpus.
    pub term_freq: u64,
}

/// Popularity score for a term: frequent in many documents ranks first.
fn popularity(doc_freq: u32, term_freq: u64) -> f64 {
    (1.0 + doc_freq as f64).ln() * (1.0 + term_freq as f64).ln()
}

/// Prefix → ranked suggestions map.
#[derive(Debug, Default)]
pub struct AutocompleteIndex {
    map: AHashMap<String, Vec<Suggestion>>,
    max_prefix_chars: usize,
}

impl AutocompleteIndex {
    /// Build the index from lexicon entries.
    pub fn build<'a, I>(entries: I, config: &AutocompleteConfig) -> Self
    where
        I: IntoIterator<Item = &'a LexiconEntry>,
    {
        let mut map: AHashMap<String, Vec<Suggestion>> = AHashMap::new();

        for entry in entries {
            let char_count = entry.term.chars().count();
            if char_count < config.min_term_len || entry.term.len() > u16::MAX as usize {
                continue;
            }

            let score = popularity(entry.doc_freq, entry.term_freq);
            let max_len = char_count.min(config.max_prefix_len);

            for len in config.min_term_len.max(MIN_PREFIX_CHARS)..=max_len {
                let prefix: String = entry.term.chars().take(len).collect::<String>().to_lowercase();
                map.entry(prefix).or_default().push(Suggestion {
                    term: entry.term.clone(),
                    popularity: score,
                    word_id: entry.word_id,
                    doc_freq: entry.doc_freq,
                    term_freq: entry.term_freq,
                });
            }
        }

        // Per-prefix ranking is independent work; parallelize it. Ties break
        // by term so the file bytes are deterministic.
        let mut buckets: Vec<(String, Vec<Suggestion>)> = map.into_iter().collect();
        buckets.par_iter_mut().for_each(|(_, list)| {
            list.sort_unstable_by(|a, b| {
                b.popularity
                    .partial_cmp(&a.popularity)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.term.cmp(&b.term))
            });
            list.truncate(config.top_k_per_prefix);
        });

        AutocompleteIndex {
            map: buckets.into_iter().collect(),
            max_prefix_chars: config.max_prefix_len,
        }
    }

    /// Number of distinct prefixes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Top completions for `prefix`, at most `limit`. Prefixes shorter than
    /// two characters return nothing; longer than the indexed maximum are
    /// truncated before lookup.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<Suggestion> {
        let prefix = prefix.to_lowercase();
        let char_count = prefix.chars().count();
        if char_count < MIN_PREFIX_CHARS {
            return Vec::new();
        }

        let key: String = prefix.chars().take(self.max_prefix_chars).collect();
        match self.map.get(&key) {
            Some(list) => list.iter().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Persist as the binary autocomplete file, prefixes in sorted order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        writer.write_u32::<LittleEndian>(self.map.len() as u32)?;

        let mut prefixes: Vec<&String> = self.map.keys().collect();
        prefixes.sort_unstable();

        for prefix in prefixes {
            let list = &self.map[prefix];
            writer.write_u16::<LittleEndian>(prefix.len() as u16)?;
            writer.write_all(prefix.as_bytes())?;
            writer.write_u16::<LittleEndian>(list.len() as u16)?;

            for suggestion in list {
                writer.write_u16::<LittleEndian>(suggestion.term.len() as u16)?;
                writer.write_all(suggestion.term.as_bytes())?;
                writer.write_f64::<LittleEndian>(suggestion.popularity)?;
                writer.write_u32::<LittleEndian>(suggestion.word_id)?;
                writer.write_u32::<LittleEndian>(suggestion.doc_freq)?;
                writer.write_u64::<LittleEndian>(suggestion.term_freq)?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    /// Load a previously saved index. The file does not carry the build
    /// parameters, so `config` must be the one the index was built with;
    /// query truncation then behaves identically before and after a reload.
    pub fn load(path: &Path, config: &AutocompleteConfig) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SedgeError::corrupt(format!(
                "cannot open autocomplete index {}: {e}",
                path.display()
            ))
        })?;
        let mut reader = BufReader::new(file);

        let n_prefixes = reader.read_u32::<LittleEndian>()?;
        let mut map = AHashMap::with_capacity(n_prefixes as usize);

        for _ in 0..n_prefixes {
            let prefix = read_string(&mut reader)?;

            let n_terms = reader.read_u16::<LittleEndian>()?;
            let mut list = Vec::with_capacity(n_terms as usize);
            for _ in 0..n_terms {
                let term = read_string(&mut reader)?;
                let popularity = reader.read_f64::<LittleEndian>()?;
                let word_id = reader.read_u32::<LittleEndian>()?;
                let doc_freq = reader.read_u32::<LittleEndian>()?;
                let term_freq = reader.read_u64::<LittleEndian>()?;
                list.push(Suggestion {
                    term,
                    popularity,
                    word_id,
                    doc_freq,
                    term_freq,
                });
            }
            map.insert(prefix, list);
        }

        Ok(AutocompleteIndex {
            map,
            max_prefix_chars: config.max_prefix_len,
        })
    }
}

fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u16::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|_| SedgeError::corrupt("autocomplete index contains invalid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(word_id: u32, term: &str, doc_freq: u32, term_freq: u64) -> LexiconEntry {
        LexiconEntry {
            word_id,
            term: term.to_string(),
            doc_freq,
            term_freq,
            offset: 0,
            bytes: 1,
            shard_id: 0,
        }
    }

    fn sample_entries() -> Vec<LexiconEntry> {
        vec![
            entry(1, "machine", 50, 400),
            entry(2, "macro", 5, 9),
            entry(3, "magnet", 2, 2),
            entry(4, "x", 1, 1),
        ]
    }

    #[test]
    fn test_build_ranks_by_popularity() {
        let entries = sample_entries();
        let index = AutocompleteIndex::build(&entries, &AutocompleteConfig::default());

        let suggestions = index.suggest("ma", 10);
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].term, "machine");
        assert!(suggestions[0].popularity > suggestions[1].popularity);

        // Single-character terms are not suggestible.
        assert!(index.suggest("x", 10).is_empty());
    }

    #[test]
    fn test_suggest_prefix_rules() {
        let entries = sample_entries();
        let index = AutocompleteIndex::build(&entries, &AutocompleteConfig::default());

        assert!(index.suggest("m", 10).is_empty());
        assert_eq!(index.suggest("Machine", 10), index.suggest("machine", 10));
        assert_eq!(index.suggest("mac", 1).len(), 1);

        for suggestion in index.suggest("mac", 10) {
            assert!(suggestion.term.starts_with("mac"));
        }
    }

    #[test]
    fn test_top_k_pruning() {
        let entries: Vec<LexiconEntry> = (0..30)
            .map(|i| entry(i + 1, &format!("pre{i:02}"), i + 1, (i + 1) as u64))
            .collect();
        let config = AutocompleteConfig {
            top_k_per_prefix: 5,
            ..AutocompleteConfig::default()
        };
        let index = AutocompleteIndex::build(&entries, &config);

        let suggestions = index.suggest("pre", 100);
        assert_eq!(suggestions.len(), 5);
        // Highest doc/term frequencies survive the pruning.
        assert_eq!(suggestions[0].term, "pre29");
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autocomplete.idx");

        let config = AutocompleteConfig::default();
        let entries = sample_entries();
        let index = AutocompleteIndex::build(&entries, &config);
        index.save(&path).unwrap();

        let loaded = AutocompleteIndex::load(&path, &config).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.suggest("mac", 10), index.suggest("mac", 10));
        assert_eq!(loaded.suggest("machin", 10), index.suggest("machin", 10));
    }

    #[test]
    fn test_reload_keeps_truncation_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autocomplete.idx");

        // Longest indexed term is "machine" (7 chars), well under the
        // configured maximum of 15.
        let config = AutocompleteConfig::default();
        let entries = sample_entries();
        let index = AutocompleteIndex::build(&entries, &config);
        index.save(&path).unwrap();

        let loaded = AutocompleteIndex::load(&path, &config).unwrap();

        // A query longer than every indexed term but shorter than the
        // configured maximum must not truncate down to a stored prefix:
        // "machine" is not a completion of "machinery".
        assert!(index.suggest("machinery", 5).is_empty());
        assert_eq!(loaded.suggest("machinery", 5), index.suggest("machinery", 5));

        for suggestion in loaded.suggest("machinery", 5) {
            assert!(suggestion.term.starts_with("machinery"));
        }
    }

    #[test]
    fn test_max_prefix_len_truncation() {
        let config = AutocompleteConfig {
            max_prefix_len: 4,
            ..AutocompleteConfig::default()
        };
        let entries = vec![entry(1, "machine", 3, 3)];
        let index = AutocompleteIndex::build(&entries, &config);

        // Queries longer than the indexed maximum truncate and still match.
        let suggestions = index.suggest("machine", 10);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].term, "machine");
    }

    #[test]
    fn test_popularity_formula() {
        let expected = (1.0f64 + 50.0).ln() * (1.0f64 + 400.0).ln();
        assert!((popularity(50, 400) - expected).abs() < 1e-12);
    }
}
