//! The long-lived query service.
//!
//! [`SearchIndex::open`] loads the lexicon, doc-id map, document table, and
//! autocomplete index into memory and maps the posting shards. After open
//! everything is read-only; handles can be shared freely across threads and
//! queries run without locks (the LRU shard variant takes one mutex around
//! its cache).

pub mod collector;
mod executor;
pub mod scoring;

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::autocomplete::{AutocompleteIndex, Suggestion};
use crate::config::{AutocompleteConfig, RankerConfig};
use crate::error::{Result, SedgeError};
use crate::index::docmap::DocIdMap;
use crate::index::forward::DocTable;
use crate::index::{barrel_file, AUTOCOMPLETE_FILE, DOCID_MAP_FILE, LEXICON_FILE};
use crate::lexicon::Lexicon;
use crate::reader::{LruShards, PostingReader, ResidentShards, ShardSet};

/// How a query combines its terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Any matching document scores.
    Or,
    /// A document must contain every query term.
    And,
    /// The terms must occur contiguously, in order.
    Phrase,
}

/// Shard residency policy for the posting reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardResidency {
    /// Map every shard at open (default; right for small corpora).
    AllResident,
    /// Keep at most `max_resident` shards mapped, LRU-evicted.
    Lru { max_resident: usize },
}

/// One ranked result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// External document key.
    pub doc_key: String,
    /// Stored title, when the metadata carried one.
    pub title: Option<String>,
    /// Final blended score.
    pub score: f64,
    /// BM25 component before the recency blend.
    pub bm25: f64,
    /// Recency component in `[0, 1]`.
    pub recency: f64,
    /// Term frequency per query term in this document.
    pub per_term_tf: HashMap<String, u32>,
}

/// A ranked, possibly truncated result list.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Hits ordered by score descending, ties by ascending doc id.
    pub hits: Vec<SearchHit>,
    /// Wall-clock execution time in milliseconds.
    pub time_ms: f64,
    /// True when the deadline expired and the hits are best-effort.
    pub truncated: bool,
    /// Soft failures encountered (unknown terms, unreadable postings).
    pub warnings: Vec<String>,
}

/// Corpus-level statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    pub n_docs: u32,
    pub n_terms: usize,
    pub avg_doc_len: f64,
    pub n_shards: u32,
}

/// An opened, immutable index.
#[derive(Debug)]
pub struct SearchIndex {
    pub(crate) lexicon: Lexicon,
    pub(crate) docmap: DocIdMap,
    pub(crate) docs: DocTable,
    pub(crate) reader: PostingReader,
    pub(crate) ranker: RankerConfig,
    autocomplete: AutocompleteIndex,
    n_shards: u32,
}

impl SearchIndex {
    /// Open an index directory with default ranking and all shards resident.
    pub fn open(dir: &Path) -> Result<Self> {
        Self::open_with(dir, RankerConfig::default(), ShardResidency::AllResident)
    }

    /// Open with explicit ranking parameters and shard residency.
    pub fn open_with(dir: &Path, ranker: RankerConfig, residency: ShardResidency) -> Result<Self> {
        if !dir.is_dir() {
            return Err(SedgeError::config(format!(
                "index directory {} does not exist",
                dir.display()
            )));
        }

        let lexicon = Lexicon::load(&dir.join(LEXICON_FILE))?;
        let docmap = DocIdMap::load(&dir.join(DOCID_MAP_FILE))?;
        let docs = DocTable::load(dir, &docmap)?;
        // The autocomplete file carries no build parameters; reloading with
        // the builder's defaults keeps query truncation identical to build
        // time. Builds with a custom AutocompleteConfig reload through
        // AutocompleteIndex::load with that config.
        let autocomplete =
            AutocompleteIndex::load(&dir.join(AUTOCOMPLETE_FILE), &AutocompleteConfig::default())?;

        let n_shards = count_shards(dir)?;
        validate_lexicon(&lexicon, dir, n_shards)?;

        let shards: Box<dyn ShardSet> = match residency {
            ShardResidency::AllResident => Box::new(ResidentShards::open(dir, n_shards)?),
            ShardResidency::Lru { max_resident } => {
                Box::new(LruShards::open(dir, n_shards, max_resident)?)
            }
        };
        let reader = PostingReader::new(shards, docmap.len() as u32);

        Ok(SearchIndex {
            lexicon,
            docmap,
            docs,
            reader,
            ranker,
            autocomplete,
            n_shards,
        })
    }

    /// Execute a query. Terms are lowercased with the ingest rule; empty
    /// terms are dropped, and a query with no terms at all is an error.
    /// Unknown terms degrade per mode instead of failing.
    pub fn search(
        &self,
        terms: &[&str],
        mode: QueryMode,
        top_k: usize,
        deadline: Option<Instant>,
    ) -> Result<SearchResponse> {
        let normalized: Vec<String> = terms
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if normalized.is_empty() {
            return Err(SedgeError::query("query has no usable terms"));
        }

        let started = Instant::now();
        let evaluation = executor::execute(self, &normalized, mode, top_k, deadline)?;
        let time_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(SearchResponse {
            hits: evaluation.hits,
            time_ms,
            truncated: evaluation.truncated,
            warnings: evaluation.warnings,
        })
    }

    /// Prefix completions, ranked by popularity.
    pub fn autocomplete(&self, prefix: &str, limit: usize) -> Vec<Suggestion> {
        self.autocomplete.suggest(prefix, limit)
    }

    /// Corpus statistics.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            n_docs: self.docmap.len() as u32,
            n_terms: self.lexicon.len(),
            avg_doc_len: self.docs.avg_doc_len(),
            n_shards: self.n_shards,
        }
    }
}

/// Count consecutive `barrel_N.bin` files in the directory.
fn count_shards(dir: &Path) -> Result<u32> {
    let mut n = 0u32;
    while dir.join(barrel_file(n)).exists() {
        n += 1;
    }
    if n == 0 {
        return Err(SedgeError::corrupt(format!(
            "no posting shards found in {}",
            dir.display()
        )));
    }
    Ok(n)
}

/// Check every lexicon entry against the shard files; a reference outside a
/// shard means the build is corrupt, which is fatal at open.
fn validate_lexicon(lexicon: &Lexicon, dir: &Path, n_shards: u32) -> Result<()> {
    let mut shard_sizes = Vec::with_capacity(n_shards as usize);
    for shard_id in 0..n_shards {
        shard_sizes.push(std::fs::metadata(dir.join(barrel_file(shard_id)))?.len());
    }

    for entry in lexicon.iter() {
        if entry.shard_id >= n_shards {
            return Err(SedgeError::corrupt(format!(
                "term {:?} references shard {} of {}",
                entry.term, entry.shard_id, n_shards
            )));
        }
        let end = entry.offset.checked_add(entry.bytes).ok_or_else(|| {
            SedgeError::corrupt(format!("term {:?}: shard range overflows", entry.term))
        })?;
        if end > shard_sizes[entry.shard_id as usize] {
            return Err(SedgeError::corrupt(format!(
                "term {:?}: range {}..{} exceeds shard {} ({} bytes)",
                entry.term, entry.offset, end, entry.shard_id, shard_sizes[entry.shard_id as usize]
            )));
        }
        if entry.doc_freq == 0 || entry.bytes == 0 {
            return Err(SedgeError::corrupt(format!(
                "term {:?} has empty postings",
                entry.term
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchIndex>();
    }

    #[test]
    fn test_open_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-index");
        assert!(matches!(
            SearchIndex::open(&missing),
            Err(SedgeError::Config(_))
        ));
    }

    #[test]
    fn test_open_rejects_dangling_lexicon_range() {
        use crate::document::CleanedDocument;
        use crate::index::IndexWriter;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("index");

        let mut writer = IndexWriter::new(&out, crate::config::IndexConfig::default()).unwrap();
        writer
            .add_document(&CleanedDocument::from_terms("d1", &[("hello", 0)]))
            .unwrap();
        writer.finish().unwrap();

        // Grow a lexicon range past its shard: the build is now inconsistent
        // and open must refuse it.
        let lexicon_path = out.join(LEXICON_FILE);
        let text = std::fs::read_to_string(&lexicon_path).unwrap();
        let mut entry = crate::lexicon::LexiconEntry::parse_row(text.trim_end()).unwrap();
        entry.bytes += 4096;
        std::fs::write(&lexicon_path, format!("{}\n", entry.to_row())).unwrap();

        assert!(matches!(
            SearchIndex::open(&out),
            Err(SedgeError::CorruptIndex(_))
        ));
    }
}
