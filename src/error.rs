//! Error types for the sedge library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`SedgeError`] enum. Ingestion and query paths prefer soft failures
//! (skip, warn, degrade); structural corruption of the on-disk index is
//! loud and fatal.

use std::io;

use thiserror::Error;

/// The main error type for sedge operations.
#[derive(Error, Debug)]
pub enum SedgeError {
    /// I/O errors (file creation, reads, renames).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Missing or invalid configuration (output directory, shard count, ...).
    #[error("Config error: {0}")]
    Config(String),

    /// A cleaned input record could not be parsed.
    #[error("Malformed input: {0}")]
    InputMalformed(String),

    /// Index files are inconsistent with each other.
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A posting byte range could not be decoded.
    #[error("Corrupt posting data: {0}")]
    CorruptPosting(String),

    /// A term has no lexicon entry.
    #[error("Term not found: {0}")]
    TermNotFound(String),

    /// A lexicon entry points outside its shard.
    #[error("Shard out of range: {0}")]
    ShardOutOfRange(String),

    /// Invalid query (e.g. no usable terms).
    #[error("Query error: {0}")]
    Query(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error.
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with SedgeError.
pub type Result<T> = std::result::Result<T, SedgeError>;

impl SedgeError {
    /// Create a new config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SedgeError::Config(msg.into())
    }

    /// Create a new malformed-input error.
    pub fn input<S: Into<String>>(msg: S) -> Self {
        SedgeError::InputMalformed(msg.into())
    }

    /// Create a new corrupt-index error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        SedgeError::CorruptIndex(msg.into())
    }

    /// Create a new corrupt-posting error.
    pub fn corrupt_posting<S: Into<String>>(msg: S) -> Self {
        SedgeError::CorruptPosting(msg.into())
    }

    /// Create a new term-not-found error.
    pub fn term_not_found<S: Into<String>>(term: S) -> Self {
        SedgeError::TermNotFound(term.into())
    }

    /// Create a new shard-out-of-range error.
    pub fn shard_out_of_range<S: Into<String>>(msg: S) -> Self {
        SedgeError::ShardOutOfRange(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        SedgeError::Query(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SedgeError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = SedgeError::config("missing output dir");
        assert_eq!(error.to_string(), "Config error: missing output dir");

        let error = SedgeError::corrupt("lexicon offset past shard end");
        assert_eq!(
            error.to_string(),
            "Corrupt index: lexicon offset past shard end"
        );

        let error = SedgeError::term_not_found("quantum");
        assert_eq!(error.to_string(), "Term not found: quantum");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let sedge_error = SedgeError::from(io_error);

        match sedge_error {
            SedgeError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
