//! The global term dictionary.
//!
//! Each term merged into the index gets one [`LexiconEntry`] recording its
//! corpus statistics and the byte range of its posting blob inside a shard.
//! The lexicon is persisted as a flat tab-separated text file and loaded
//! wholesale into a hash map at service start.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;
use log::warn;

use crate::error::{Result, SedgeError};

/// One lexicon row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    /// Global term ID, assigned during merge (starting at 1).
    pub word_id: u32,
    /// The term text.
    pub term: String,
    /// Number of documents containing the term.
    pub doc_freq: u32,
    /// Total occurrences across the corpus.
    pub term_freq: u64,
    /// Byte offset of the posting blob inside its shard.
    pub offset: u64,
    /// Length of the posting blob in bytes.
    pub bytes: u64,
    /// Shard (barrel) holding the blob.
    pub shard_id: u32,
}

impl LexiconEntry {
    /// Serialize as one lexicon.txt row. Control characters that would break
    /// the tab-separated format are replaced with spaces.
    pub fn to_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.word_id,
            sanitize_term(&self.term),
            self.doc_freq,
            self.term_freq,
            self.offset,
            self.bytes,
            self.shard_id
        )
    }

    /// Parse one lexicon.txt row.
    pub fn parse_row(line: &str) -> Result<Self> {
        let mut parts = line.split('\t');
        let mut next = |name: &str| {
            parts
                .next()
                .ok_or_else(|| SedgeError::corrupt(format!("lexicon row missing {name}")))
        };

        let word_id = parse_field(next("word_id")?, "word_id")?;
        let term = next("term")?.to_string();
        let doc_freq = parse_field(next("doc_freq")?, "doc_freq")?;
        let term_freq = parse_field(next("term_freq")?, "term_freq")?;
        let offset = parse_field(next("offset")?, "offset")?;
        let bytes = parse_field(next("bytes")?, "bytes")?;
        let shard_id = parse_field(next("shard_id")?, "shard_id")?;

        Ok(LexiconEntry {
            word_id,
            term,
            doc_freq,
            term_freq,
            offset,
            bytes,
            shard_id,
        })
    }
}

fn parse_field<T: std::str::FromStr>(s: &str, name: &str) -> Result<T> {
    s.parse()
        .map_err(|_| SedgeError::corrupt(format!("lexicon row has invalid {name}: {s:?}")))
}

/// Replace tab/newline characters so a term cannot break the row format.
pub fn sanitize_term(term: &str) -> String {
    term.replace(['\t', '\n', '\r'], " ")
}

/// In-memory lexicon: `term -> entry`.
#[derive(Debug, Default)]
pub struct Lexicon {
    entries: AHashMap<String, LexiconEntry>,
}

impl Lexicon {
    /// Load a lexicon file. Malformed rows are fatal: an inconsistent
    /// lexicon means the index build was corrupted.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SedgeError::corrupt(format!("cannot open lexicon {}: {e}", path.display()))
        })?;
        let reader = BufReader::new(file);

        let mut entries = AHashMap::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let entry = LexiconEntry::parse_row(&line).map_err(|e| {
                SedgeError::corrupt(format!("lexicon line {}: {e}", line_no + 1))
            })?;
            if let Some(prev) = entries.insert(entry.term.clone(), entry) {
                warn!("duplicate lexicon term {:?} (word_id {})", prev.term, prev.word_id);
            }
        }

        Ok(Lexicon { entries })
    }

    /// Look up a term.
    pub fn get(&self, term: &str) -> Option<&LexiconEntry> {
        self.entries.get(term)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &LexiconEntry> {
        self.entries.values()
    }
}
