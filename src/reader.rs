//! Random-access posting reads over memory-mapped shards.
//!
//! A [`ShardSet`] hands out the bytes of one barrel file. The default
//! [`ResidentShards`] maps every shard once at service start; [`LruShards`]
//! bounds residency to at most `max_resident` shards with least-recently-used
//! eviction. Both are safe to share across query threads: the maps are
//! read-only and handed out as `Arc`s, so an evicted shard stays valid for
//! readers still holding it.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use memmap2::Mmap;
use parking_lot::Mutex;

use crate::codec::posting::{decode_posting_list, PostingList};
use crate::error::{Result, SedgeError};
use crate::index::barrel_file;
use crate::lexicon::LexiconEntry;

/// Read-only bytes of one shard. Empty shards (no terms hashed to them)
/// cannot be mmapped and are represented as `None`.
#[derive(Debug, Clone)]
pub struct ShardData(Option<Arc<Mmap>>);

impl ShardData {
    pub fn bytes(&self) -> &[u8] {
        match &self.0 {
            Some(mmap) => &mmap[..],
            None => &[],
        }
    }
}

fn map_shard(path: &Path) -> Result<ShardData> {
    let file = File::open(path).map_err(|e| {
        SedgeError::corrupt(format!("cannot open shard {}: {e}", path.display()))
    })?;
    if file.metadata()?.len() == 0 {
        return Ok(ShardData(None));
    }
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
        SedgeError::corrupt(format!("cannot mmap shard {}: {e}", path.display()))
    })?;
    Ok(ShardData(Some(Arc::new(mmap))))
}

/// Capability interface over the posting shards.
pub trait ShardSet: Send + Sync + std::fmt::Debug {
    /// Bytes of shard `shard_id`.
    fn shard(&self, shard_id: u32) -> Result<ShardData>;

    /// Number of shards in the set.
    fn n_shards(&self) -> u32;
}

/// All shards mapped up front. Default for small corpora.
#[derive(Debug)]
pub struct ResidentShards {
    shards: Vec<ShardData>,
}

impl ResidentShards {
    /// Map every `barrel_*.bin` in `dir`.
    pub fn open(dir: &Path, n_shards: u32) -> Result<Self> {
        let mut shards = Vec::with_capacity(n_shards as usize);
        for shard_id in 0..n_shards {
            shards.push(map_shard(&dir.join(barrel_file(shard_id)))?);
        }
        Ok(ResidentShards { shards })
    }
}

impl ShardSet for ResidentShards {
    fn shard(&self, shard_id: u32) -> Result<ShardData> {
        self.shards
            .get(shard_id as usize)
            .cloned()
            .ok_or_else(|| SedgeError::shard_out_of_range(format!("no shard {shard_id}")))
    }

    fn n_shards(&self) -> u32 {
        self.shards.len() as u32
    }
}

/// At most `max_resident` shards mapped at a time, LRU-evicted. One mutex
/// guards the cache; a hot hit only rotates the recency order.
#[derive(Debug)]
pub struct LruShards {
    dir: PathBuf,
    n_shards: u32,
    max_resident: usize,
    cache: Mutex<LruState>,
}

#[derive(Debug, Default)]
struct LruState {
    resident: AHashMap<u32, ShardData>,
    // Most recently used first.
    order: Vec<u32>,
}

impl LruShards {
    pub fn open(dir: &Path, n_shards: u32, max_resident: usize) -> Result<Self> {
        if max_resident == 0 {
            return Err(SedgeError::config("max_resident must be at least 1"));
        }
        Ok(LruShards {
            dir: dir.to_path_buf(),
            n_shards,
            max_resident,
            cache: Mutex::new(LruState::default()),
        })
    }

    /// Number of shards currently resident.
    pub fn resident_count(&self) -> usize {
        self.cache.lock().resident.len()
    }
}

impl ShardSet for LruShards {
    fn shard(&self, shard_id: u32) -> Result<ShardData> {
        if shard_id >= self.n_shards {
            return Err(SedgeError::shard_out_of_range(format!(
                "no shard {shard_id}"
            )));
        }

        let mut state = self.cache.lock();
        if let Some(data) = state.resident.get(&shard_id) {
            let data = data.clone();
            state.order.retain(|&id| id != shard_id);
            state.order.insert(0, shard_id);
            return Ok(data);
        }

        let data = map_shard(&self.dir.join(barrel_file(shard_id)))?;
        if state.resident.len() >= self.max_resident {
            if let Some(evicted) = state.order.pop() {
                state.resident.remove(&evicted);
            }
        }
        state.resident.insert(shard_id, data.clone());
        state.order.insert(0, shard_id);
        Ok(data)
    }

    fn n_shards(&self) -> u32 {
        self.n_shards
    }
}

/// Decodes a term's posting list from its shard byte range. Stateless and
/// safe to call concurrently.
#[derive(Debug)]
pub struct PostingReader {
    shards: Box<dyn ShardSet>,
    max_doc_count: u32,
}

impl PostingReader {
    /// `max_doc_count` is the sanity bound handed to the codec; typically
    /// the corpus document count plus slack.
    pub fn new(shards: Box<dyn ShardSet>, max_doc_count: u32) -> Self {
        PostingReader {
            shards,
            max_doc_count,
        }
    }

    pub fn n_shards(&self) -> u32 {
        self.shards.n_shards()
    }

    /// Decode the posting list a lexicon entry points at.
    pub fn read(&self, entry: &LexiconEntry) -> Result<PostingList> {
        let data = self.shards.shard(entry.shard_id)?;
        let bytes = data.bytes();

        let start = entry.offset as usize;
        let end = entry
            .offset
            .checked_add(entry.bytes)
            .ok_or_else(|| SedgeError::shard_out_of_range("offset overflow"))?
            as usize;
        if end > bytes.len() {
            return Err(SedgeError::shard_out_of_range(format!(
                "term {:?}: range {}..{} exceeds shard {} ({} bytes)",
                entry.term,
                start,
                end,
                entry.shard_id,
                bytes.len()
            )));
        }

        let list = decode_posting_list(&bytes[start..end], self.max_doc_count)?;
        if list.doc_freq() != entry.doc_freq {
            return Err(SedgeError::corrupt(format!(
                "term {:?}: decoded doc count {} != lexicon doc_freq {}",
                entry.term,
                list.doc_freq(),
                entry.doc_freq
            )));
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::posting::{encode_posting_list, Posting};

    fn write_barrel(dir: &Path, shard_id: u32, postings: &[Posting]) -> LexiconEntry {
        let blob = encode_posting_list(postings);
        std::fs::write(dir.join(barrel_file(shard_id)), &blob).unwrap();
        LexiconEntry {
            word_id: 1,
            term: "test".to_string(),
            doc_freq: postings.len() as u32,
            term_freq: postings.iter().map(|p| p.tf as u64).sum(),
            offset: 0,
            bytes: blob.len() as u64,
            shard_id,
        }
    }

    fn fill_missing_barrels(dir: &Path, n_shards: u32) {
        for shard_id in 0..n_shards {
            let path = dir.join(barrel_file(shard_id));
            if !path.exists() {
                std::fs::write(path, b"").unwrap();
            }
        }
    }

    #[test]
    fn test_resident_read() {
        let dir = tempfile::tempdir().unwrap();
        let postings = vec![Posting::new(1, vec![0, 3]), Posting::new(4, vec![1])];
        let entry = write_barrel(dir.path(), 2, &postings);
        fill_missing_barrels(dir.path(), 4);

        let shards = ResidentShards::open(dir.path(), 4).unwrap();
        let reader = PostingReader::new(Box::new(shards), 100);

        let list = reader.read(&entry).unwrap();
        assert_eq!(list.postings, postings);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let postings = vec![Posting::new(1, vec![0])];
        let mut entry = write_barrel(dir.path(), 0, &postings);
        fill_missing_barrels(dir.path(), 1);

        let shards = ResidentShards::open(dir.path(), 1).unwrap();
        let reader = PostingReader::new(Box::new(shards), 100);

        entry.bytes += 1000;
        match reader.read(&entry) {
            Err(SedgeError::ShardOutOfRange(_)) => {}
            other => panic!("expected ShardOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_doc_freq_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let postings = vec![Posting::new(1, vec![0])];
        let mut entry = write_barrel(dir.path(), 0, &postings);
        fill_missing_barrels(dir.path(), 1);

        let shards = ResidentShards::open(dir.path(), 1).unwrap();
        let reader = PostingReader::new(Box::new(shards), 100);

        entry.doc_freq = 9;
        assert!(matches!(
            reader.read(&entry),
            Err(SedgeError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_empty_shard() {
        let dir = tempfile::tempdir().unwrap();
        fill_missing_barrels(dir.path(), 2);

        let shards = ResidentShards::open(dir.path(), 2).unwrap();
        assert_eq!(shards.shard(1).unwrap().bytes().len(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let dir = tempfile::tempdir().unwrap();
        for shard_id in 0..3 {
            write_barrel(dir.path(), shard_id, &[Posting::new(1, vec![0])]);
        }

        let shards = LruShards::open(dir.path(), 3, 2).unwrap();
        shards.shard(0).unwrap();
        shards.shard(1).unwrap();
        assert_eq!(shards.resident_count(), 2);

        // Touch 0 so shard 1 is the LRU victim when 2 loads.
        shards.shard(0).unwrap();
        shards.shard(2).unwrap();
        assert_eq!(shards.resident_count(), 2);

        // Evicted shards are still readable; they reload on demand.
        let data = shards.shard(1).unwrap();
        assert!(!data.bytes().is_empty());
        assert_eq!(shards.resident_count(), 2);
    }

    #[test]
    fn test_lru_rejects_zero_capacity() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LruShards::open(dir.path(), 1, 0).is_err());
    }
}
