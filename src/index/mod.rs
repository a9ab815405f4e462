//! Offline indexing pipeline.
//!
//! The pipeline is strictly sequential: the block builder accumulates
//! bounded-memory inverted blocks and flushes sorted runs ([`block`]), the
//! external merger folds the runs into compressed posting shards plus a
//! global lexicon ([`merge`]), the forward remapper rewrites per-document
//! term lists to word IDs ([`forward`]), and [`writer`] drives the whole
//! build into a staging directory that is atomically published on success.

pub mod block;
pub mod docmap;
pub mod forward;
pub mod merge;
pub mod writer;

pub use docmap::DocIdMap;
pub use writer::{BuildStats, IndexWriter};

/// Global term table file.
pub const LEXICON_FILE: &str = "lexicon.txt";

/// `term \t word_id` file consumed by the forward remapper.
pub const TERMS_LIST_FILE: &str = "terms_list.txt";

/// `doc_key \t doc_id` file.
pub const DOCID_MAP_FILE: &str = "docid_map.txt";

/// Combined forward index, one JSON record per document.
pub const FORWARD_INDEX_FILE: &str = "forward_index";

/// Binary prefix-completion index.
pub const AUTOCOMPLETE_FILE: &str = "autocomplete.idx";

/// Posting shard file name for `shard_id`.
pub fn barrel_file(shard_id: u32) -> String {
    format!("barrel_{shard_id}.bin")
}

/// Temporary inverted run for block `block_id`.
pub fn block_inv_file(block_id: usize) -> String {
    format!("block_{block_id}.inv")
}

/// Temporary forward run for block `block_id`.
pub fn block_fwd_file(block_id: usize) -> String {
    format!("block_{block_id}.fwd")
}
