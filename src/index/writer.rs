//! Build pipeline driver.
//!
//! An [`IndexWriter`] owns one build: it assigns document IDs, feeds the
//! block builder, flushes blocks when the memory budget is hit, and on
//! `finish` runs the merge, the forward remap, and the autocomplete build.
//! Everything is written into a staging directory that is atomically
//! renamed to the target on success, so a crashed build leaves no partially
//! visible index.

use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::autocomplete::AutocompleteIndex;
use crate::config::{AutocompleteConfig, IndexConfig};
use crate::document::CleanedDocument;
use crate::error::{Result, SedgeError};
use crate::index::block::BlockBuilder;
use crate::index::docmap::DocIdMap;
use crate::index::forward::remap_forward;
use crate::index::merge::merge_blocks;
use crate::index::{
    block_fwd_file, block_inv_file, AUTOCOMPLETE_FILE, DOCID_MAP_FILE, LEXICON_FILE,
};
use crate::lexicon::Lexicon;

/// Summary of a completed build.
#[derive(Debug, Clone)]
pub struct BuildStats {
    /// Documents indexed.
    pub n_docs: u64,
    /// Distinct terms in the lexicon.
    pub n_terms: u64,
    /// Blocks flushed during the build.
    pub n_blocks: usize,
    /// Input records skipped as malformed.
    pub skipped_malformed: u64,
    /// Forward-index term occurrences dropped during remapping.
    pub dropped_forward_terms: u64,
}

/// Single-writer, offline index builder.
pub struct IndexWriter {
    target_dir: PathBuf,
    staging_dir: PathBuf,
    config: IndexConfig,
    autocomplete_config: AutocompleteConfig,
    docmap: DocIdMap,
    block: BlockBuilder,
    next_block_id: usize,
    skipped_malformed: u64,
}

impl IndexWriter {
    /// Start a build targeting `output_dir`, which must not yet exist. A
    /// stale staging directory from a crashed build is removed.
    pub fn new(output_dir: &Path, config: IndexConfig) -> Result<Self> {
        config.validate()?;

        if output_dir.exists() {
            return Err(SedgeError::config(format!(
                "output directory {} already exists",
                output_dir.display()
            )));
        }

        let staging_dir = staging_path(output_dir)?;
        if staging_dir.exists() {
            warn!("removing stale staging directory {}", staging_dir.display());
            fs::remove_dir_all(&staging_dir)?;
        }
        fs::create_dir_all(&staging_dir)?;

        let block = BlockBuilder::new(config.drop_numeric_terms);
        Ok(IndexWriter {
            target_dir: output_dir.to_path_buf(),
            staging_dir,
            config,
            autocomplete_config: AutocompleteConfig::default(),
            docmap: DocIdMap::new(),
            block,
            next_block_id: 0,
            skipped_malformed: 0,
        })
    }

    /// Override the autocomplete build parameters.
    pub fn with_autocomplete_config(mut self, config: AutocompleteConfig) -> Self {
        self.autocomplete_config = config;
        self
    }

    /// Index one cleaned document.
    pub fn add_document(&mut self, doc: &CleanedDocument) -> Result<()> {
        if doc.doc_key.is_empty() {
            return Err(SedgeError::input("document has an empty doc_key"));
        }

        let doc_id = self.docmap.get_or_assign(&doc.doc_key);
        self.block.add_document(doc, doc_id);

        if self.block.should_flush(self.config.block_budget_bytes) {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Index a stream of JSON-lines cleaned records. Malformed lines are
    /// skipped with a warning; returns the number of documents ingested.
    pub fn ingest_jsonl<R: BufRead>(&mut self, reader: R) -> Result<u64> {
        let mut ingested = 0u64;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let doc: CleanedDocument = match serde_json::from_str(&line) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("skipping malformed input line {}: {e}", line_no + 1);
                    self.skipped_malformed += 1;
                    continue;
                }
            };
            match self.add_document(&doc) {
                Ok(()) => ingested += 1,
                Err(SedgeError::InputMalformed(msg)) => {
                    warn!("skipping input line {}: {msg}", line_no + 1);
                    self.skipped_malformed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ingested)
    }

    fn flush_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }
        info!(
            "flushing block {} ({} docs, ~{} bytes)",
            self.next_block_id,
            self.block.doc_count(),
            self.block.mem_estimate()
        );
        self.block.flush(&self.staging_dir, self.next_block_id)?;
        self.next_block_id += 1;
        Ok(())
    }

    /// Run the merge, remap, and autocomplete stages, then atomically
    /// publish the staging directory as the target.
    pub fn finish(mut self) -> Result<BuildStats> {
        self.flush_block()?;
        let n_blocks = self.next_block_id;

        let merge_stats = merge_blocks(&self.staging_dir, n_blocks, self.config.n_shards)?;
        let remap_stats = remap_forward(&self.staging_dir, n_blocks)?;
        self.docmap.save(&self.staging_dir.join(DOCID_MAP_FILE))?;

        let lexicon = Lexicon::load(&self.staging_dir.join(LEXICON_FILE))?;
        let autocomplete = AutocompleteIndex::build(lexicon.iter(), &self.autocomplete_config);
        autocomplete.save(&self.staging_dir.join(AUTOCOMPLETE_FILE))?;

        // Block runs are temporary; drop them before publishing.
        for block_id in 0..n_blocks {
            fs::remove_file(self.staging_dir.join(block_inv_file(block_id)))?;
            fs::remove_file(self.staging_dir.join(block_fwd_file(block_id)))?;
        }

        fs::rename(&self.staging_dir, &self.target_dir)?;
        info!(
            "index published to {} ({} docs, {} terms)",
            self.target_dir.display(),
            self.docmap.len(),
            merge_stats.n_terms
        );

        Ok(BuildStats {
            n_docs: self.docmap.len() as u64,
            n_terms: merge_stats.n_terms,
            n_blocks,
            skipped_malformed: self.skipped_malformed,
            dropped_forward_terms: remap_stats.dropped_terms,
        })
    }
}

fn staging_path(output_dir: &Path) -> Result<PathBuf> {
    let name = output_dir
        .file_name()
        .ok_or_else(|| SedgeError::config("output directory has no name"))?;
    let mut staging_name = name.to_os_string();
    staging_name.push(".staging");
    Ok(output_dir.with_file_name(staging_name))
}
