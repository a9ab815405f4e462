//! SPIMI block builder and flusher.
//!
//! Documents are accumulated into an in-memory inverted map plus a
//! per-document forward record until the estimated footprint exceeds the
//! configured budget, then flushed as a sorted run. The merger relies on
//! terms being written in lexicographic order, so the flush sorts; it never
//! needs a whole block in memory again afterwards.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::document::CleanedDocument;
use crate::error::Result;
use crate::index::{block_fwd_file, block_inv_file};

// Rough per-entry heap costs for the flush-policy estimate.
const TERM_COST: usize = 64;
const POSTING_COST: usize = 48;
const POSITION_COST: usize = 4;

/// One in-block posting: a document's positions for a term.
#[derive(Debug, Clone)]
struct BlockPosting {
    doc_id: u32,
    positions: Vec<u32>,
}

/// A term's positions within one document, as written to the forward run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardPosting {
    pub term: String,
    pub positions: Vec<u32>,
}

/// One document's forward record, as written to `block_N.fwd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardRecord {
    pub doc_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    pub postings: Vec<ForwardPosting>,
}

/// Accumulates one block of documents in memory.
#[derive(Debug)]
pub struct BlockBuilder {
    drop_numeric_terms: bool,
    dict: AHashMap<String, Vec<BlockPosting>>,
    forward: Vec<ForwardRecord>,
    mem_estimate: usize,
}

impl BlockBuilder {
    pub fn new(drop_numeric_terms: bool) -> Self {
        BlockBuilder {
            drop_numeric_terms,
            dict: AHashMap::new(),
            forward: Vec::new(),
            mem_estimate: 0,
        }
    }

    /// Add one document under its assigned internal ID.
    pub fn add_document(&mut self, doc: &CleanedDocument, doc_id: u32) {
        let terms = doc.aggregate_terms(self.drop_numeric_terms);
        let mut fwd_postings = Vec::with_capacity(terms.len());

        for (term, positions) in terms {
            self.mem_estimate += POSITION_COST * positions.len();
            fwd_postings.push(ForwardPosting {
                term: term.clone(),
                positions: positions.clone(),
            });

            if !self.dict.contains_key(&term) {
                self.mem_estimate += TERM_COST + term.len();
            }
            let list = self.dict.entry(term).or_default();
            // The same doc_key may appear twice in the stream; merge rather
            // than emit a second posting for the same doc_id.
            match list.last_mut() {
                Some(last) if last.doc_id == doc_id => {
                    last.positions.extend(positions);
                    last.positions.sort_unstable();
                    last.positions.dedup();
                }
                _ => {
                    self.mem_estimate += POSTING_COST;
                    list.push(BlockPosting { doc_id, positions });
                }
            }
        }

        self.forward.push(ForwardRecord {
            doc_key: doc.doc_key.clone(),
            title: doc.title.clone(),
            authors: doc.authors.clone(),
            pub_date: doc.pub_date.clone(),
            postings: fwd_postings,
        });
    }

    /// Estimated in-memory footprint in bytes.
    pub fn mem_estimate(&self) -> usize {
        self.mem_estimate
    }

    /// Whether the block has outgrown `budget_bytes`.
    pub fn should_flush(&self, budget_bytes: usize) -> bool {
        self.mem_estimate >= budget_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of documents in the current block.
    pub fn doc_count(&self) -> usize {
        self.forward.len()
    }

    /// Write the block as a sorted run (`block_N.inv` + `block_N.fwd`) and
    /// reset the builder for the next block.
    pub fn flush(&mut self, dir: &Path, block_id: usize) -> Result<()> {
        self.write_inverted(&dir.join(block_inv_file(block_id)))?;
        self.write_forward(&dir.join(block_fwd_file(block_id)))?;

        self.dict.clear();
        self.forward.clear();
        self.mem_estimate = 0;
        Ok(())
    }

    fn write_inverted(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        // Ordered flush: the merger streams runs line-by-line and relies on
        // lexicographic term order.
        let mut terms: Vec<&String> = self.dict.keys().collect();
        terms.sort_unstable();

        for term in terms {
            let postings = &self.dict[term];
            write!(writer, "{term}\t")?;
            for (i, posting) in postings.iter().enumerate() {
                if i > 0 {
                    write!(writer, ";")?;
                }
                write!(writer, "{}:", posting.doc_id)?;
                for (j, pos) in posting.positions.iter().enumerate() {
                    if j > 0 {
                        write!(writer, ",")?;
                    }
                    write!(writer, "{pos}")?;
                }
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_forward(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for record in &self.forward {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}
