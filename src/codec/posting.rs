//! Posting lists and their on-disk blob encoding.
//!
//! For one term the blob layout is:
//!
//! ```text
//! vbyte(doc_count)
//! for each posting, in increasing doc_id:
//!     vbyte(doc_id_delta)      // first delta against 0
//!     vbyte(tf)
//!     tf × vbyte(position_delta) // first delta against 0
//! ```
//!
//! There is no per-posting length prefix; positions are consumed until `tf`
//! values have been decoded.

use crate::codec::vbyte;
use crate::error::{Result, SedgeError};

/// A single posting: one document containing the term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Internal document ID.
    pub doc_id: u32,
    /// Term frequency in the document.
    pub tf: u32,
    /// 0-based token offsets, strictly increasing.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting from sorted positions; `tf` is the position count.
    pub fn new(doc_id: u32, positions: Vec<u32>) -> Self {
        Posting {
            doc_id,
            tf: positions.len() as u32,
            positions,
        }
    }
}

/// All postings for one term, sorted by ascending doc_id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    /// The postings, sorted by doc_id.
    pub postings: Vec<Posting>,
}

impl PostingList {
    /// Number of documents containing the term.
    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    /// Total occurrences of the term across the corpus.
    pub fn term_freq(&self) -> u64 {
        self.postings.iter().map(|p| p.tf as u64).sum()
    }

    /// Doc ids in list order.
    pub fn doc_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.postings.iter().map(|p| p.doc_id)
    }

    /// Binary-search the posting for `doc_id`.
    pub fn find(&self, doc_id: u32) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|idx| &self.postings[idx])
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Encode a term's postings into the compressed blob.
///
/// `postings` must be sorted by ascending doc_id with strictly increasing
/// positions inside each posting; the merger guarantees this.
pub fn encode_posting_list(postings: &[Posting]) -> Vec<u8> {
    let mut out = Vec::new();
    vbyte::encode_into(postings.len() as u32, &mut out);

    let mut last_doc_id = 0u32;
    for posting in postings {
        vbyte::encode_into(posting.doc_id - last_doc_id, &mut out);
        last_doc_id = posting.doc_id;

        vbyte::encode_into(posting.tf, &mut out);

        let mut last_pos = 0u32;
        for &pos in &posting.positions {
            vbyte::encode_into(pos - last_pos, &mut out);
            last_pos = pos;
        }
    }

    out
}

/// Decode a posting blob previously produced by [`encode_posting_list`].
///
/// `bytes` must be exactly the byte range recorded in the lexicon;
/// `max_doc_count` is a sanity bound on the leading document count.
pub fn decode_posting_list(bytes: &[u8], max_doc_count: u32) -> Result<PostingList> {
    let mut pos = 0usize;

    let doc_count = vbyte::decode(bytes, &mut pos)?;
    if doc_count > max_doc_count {
        return Err(SedgeError::corrupt_posting(format!(
            "doc_count {doc_count} exceeds sanity bound {max_doc_count}"
        )));
    }

    let mut postings = Vec::with_capacity(doc_count as usize);
    let mut last_doc_id = 0u32;

    for _ in 0..doc_count {
        let delta = vbyte::decode(bytes, &mut pos)?;
        let doc_id = last_doc_id + delta;
        last_doc_id = doc_id;

        let tf = vbyte::decode(bytes, &mut pos)?;

        let mut positions = Vec::with_capacity(tf as usize);
        let mut last_pos = 0u32;
        for _ in 0..tf {
            let pos_delta = vbyte::decode(bytes, &mut pos)?;
            let position = last_pos + pos_delta;
            positions.push(position);
            last_pos = position;
        }

        postings.push(Posting {
            doc_id,
            tf,
            positions,
        });
    }

    if pos != bytes.len() {
        return Err(SedgeError::corrupt_posting(format!(
            "posting blob has {} trailing bytes",
            bytes.len() - pos
        )));
    }

    Ok(PostingList { postings })
}
