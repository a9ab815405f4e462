//! Forward index remapping and the query-time document table.
//!
//! After the merge has fixed global word IDs, every block forward run is
//! rewritten to reference terms by `word_id` instead of text. The combined
//! file doubles as the source of document lengths and metadata for the
//! query service.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SedgeError};
use crate::index::block::ForwardRecord;
use crate::index::{block_fwd_file, FORWARD_INDEX_FILE, TERMS_LIST_FILE};
use crate::index::docmap::DocIdMap;

/// A term's occurrences within one document, keyed by global word ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemappedPosting {
    pub word_id: u32,
    pub freq: u32,
    pub positions: Vec<u32>,
}

/// One document's record in the combined forward index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardIndexRecord {
    pub doc_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    pub postings: Vec<RemappedPosting>,
}

/// Summary of one remap pass.
#[derive(Debug, Clone)]
pub struct RemapStats {
    /// Documents written to the combined forward index.
    pub n_docs: u64,
    /// Term occurrences dropped because the merge produced no word_id.
    pub dropped_terms: u64,
}

/// Load `terms_list.txt` into a `term -> word_id` map.
pub fn load_term_ids(dir: &Path) -> Result<AHashMap<String, u32>> {
    let path = dir.join(TERMS_LIST_FILE);
    let file = File::open(&path).map_err(|e| {
        SedgeError::corrupt(format!("cannot open terms list {}: {e}", path.display()))
    })?;

    let mut map = AHashMap::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (term, id_str) = line.rsplit_once('\t').ok_or_else(|| {
            SedgeError::corrupt(format!("terms list line {} has no tab", line_no + 1))
        })?;
        let word_id: u32 = id_str.parse().map_err(|_| {
            SedgeError::corrupt(format!("terms list line {}: bad id {id_str:?}", line_no + 1))
        })?;
        map.insert(term.to_string(), word_id);
    }
    Ok(map)
}

/// Rewrite every block forward run into the combined `forward_index` file,
/// replacing term text with global word IDs. Terms missing from the map are
/// logged and dropped; document order within each block is preserved.
pub fn remap_forward(dir: &Path, num_blocks: usize) -> Result<RemapStats> {
    let term_ids = load_term_ids(dir)?;
    let mut writer = BufWriter::new(File::create(dir.join(FORWARD_INDEX_FILE))?);

    let mut n_docs = 0u64;
    let mut dropped_terms = 0u64;

    for block_id in 0..num_blocks {
        let path = dir.join(block_fwd_file(block_id));
        let file = File::open(&path).map_err(|e| {
            SedgeError::corrupt(format!("cannot open block forward {}: {e}", path.display()))
        })?;

        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record: ForwardRecord = serde_json::from_str(&line)?;

            let mut postings = Vec::with_capacity(record.postings.len());
            for posting in record.postings {
                match term_ids.get(&posting.term) {
                    Some(&word_id) => postings.push(RemappedPosting {
                        word_id,
                        freq: posting.positions.len() as u32,
                        positions: posting.positions,
                    }),
                    None => {
                        warn!(
                            "term {:?} in doc {} has no word_id; dropping",
                            posting.term, record.doc_key
                        );
                        dropped_terms += 1;
                    }
                }
            }

            let out = ForwardIndexRecord {
                doc_key: record.doc_key,
                title: record.title,
                authors: record.authors,
                pub_date: record.pub_date,
                postings,
            };
            serde_json::to_writer(&mut writer, &out)?;
            writer.write_all(b"\n")?;
            n_docs += 1;
        }
    }

    writer.flush()?;
    Ok(RemapStats {
        n_docs,
        dropped_terms,
    })
}

/// Per-document info held by the query service.
#[derive(Debug, Clone)]
pub struct DocInfo {
    pub doc_key: String,
    pub doc_len: u32,
    pub title: Option<String>,
    pub pub_date: Option<String>,
}

/// Document table: lengths and metadata for every document, derived from the
/// combined forward index. Read-only after load.
#[derive(Debug)]
pub struct DocTable {
    docs: AHashMap<u32, DocInfo>,
    avg_doc_len: f64,
}

// Length assumed for a document whose forward record is missing or empty.
const FALLBACK_DOC_LEN: u32 = 100;

impl DocTable {
    /// Build the table from the combined forward index file.
    pub fn load(dir: &Path, docmap: &DocIdMap) -> Result<Self> {
        let path = dir.join(FORWARD_INDEX_FILE);
        let file = File::open(&path).map_err(|e| {
            SedgeError::corrupt(format!("cannot open forward index {}: {e}", path.display()))
        })?;

        let mut docs = AHashMap::new();
        let mut total_len = 0u64;

        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let record: ForwardIndexRecord = serde_json::from_str(&line)?;

            let Some(doc_id) = docmap.id(&record.doc_key) else {
                warn!("forward record for unknown doc {:?}; skipping", record.doc_key);
                continue;
            };

            let doc_len: u32 = record.postings.iter().map(|p| p.freq).sum();
            let doc_len = if doc_len > 0 { doc_len } else { FALLBACK_DOC_LEN };
            total_len += doc_len as u64;

            docs.insert(
                doc_id,
                DocInfo {
                    doc_key: record.doc_key,
                    doc_len,
                    title: record.title,
                    pub_date: record.pub_date,
                },
            );
        }

        let avg_doc_len = if docs.is_empty() {
            FALLBACK_DOC_LEN as f64
        } else {
            total_len as f64 / docs.len() as f64
        };

        Ok(DocTable { docs, avg_doc_len })
    }

    /// Mean document length across the corpus.
    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    /// Info for a document, if its forward record was present.
    pub fn get(&self, doc_id: u32) -> Option<&DocInfo> {
        self.docs.get(&doc_id)
    }

    /// Length of a document, falling back to the corpus average.
    pub fn doc_len(&self, doc_id: u32) -> u32 {
        self.docs
            .get(&doc_id)
            .map(|info| info.doc_len)
            .unwrap_or(self.avg_doc_len as u32)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
