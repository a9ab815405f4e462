//! Compressed posting codec.
//!
//! Posting lists are stored delta-encoded (docID gaps, position gaps) and
//! then variable-byte-encoded. The [`vbyte`] module holds the integer
//! codec; [`posting`] holds the posting-list blob layout built on top of it.

pub mod posting;
pub mod vbyte;

pub use posting::{decode_posting_list, encode_posting_list, Posting, PostingList};
