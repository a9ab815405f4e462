//! # Sedge
//!
//! A disk-backed full-text search engine core for academic document
//! corpora.
//!
//! ## Features
//!
//! - SPIMI-style blocked indexing in bounded memory
//! - External k-way merge into compressed, sharded posting files
//! - Delta + variable-byte posting compression with positions
//! - Boolean (OR, AND) and exact-phrase queries
//! - Field-weighted BM25 ranking blended with publication recency
//! - Precomputed, frequency-ranked prefix autocomplete
//!
//! The crate consumes cleaned, pre-tokenized documents and exposes
//! in-process search primitives; extraction, tokenization, and transport
//! layers live with the caller.
//!
//! ## Usage
//!
//! ```ignore
//! use sedge::{CleanedDocument, IndexConfig, IndexWriter, QueryMode, SearchIndex};
//!
//! let mut writer = IndexWriter::new(out_dir, IndexConfig::default())?;
//! writer.add_document(&doc)?;
//! writer.finish()?;
//!
//! let index = SearchIndex::open(out_dir)?;
//! let response = index.search(&["machine", "learning"], QueryMode::Or, 10, None)?;
//! ```

pub mod autocomplete;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod lexicon;
pub mod reader;
pub mod search;
pub mod shard;

pub use autocomplete::{AutocompleteIndex, Suggestion};
pub use config::{AutocompleteConfig, IndexConfig, RankerConfig};
pub use document::{CleanedDocument, FieldTokens, Token};
pub use error::{Result, SedgeError};
pub use index::{BuildStats, IndexWriter};
pub use search::{IndexStats, QueryMode, SearchHit, SearchIndex, SearchResponse, ShardResidency};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
