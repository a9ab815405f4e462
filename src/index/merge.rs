//! External k-way merge of sorted block runs.
//!
//! Each block run (`block_N.inv`) holds its terms in lexicographic order.
//! The merger keeps one line reader per run, repeatedly takes the smallest
//! pending term across readers, folds all fragments of that term into one
//! posting list, encodes it, and appends the blob to the term's shard.
//! A malformed run line is fatal: there is no recoverable state.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use log::{debug, info};

use crate::codec::posting::{encode_posting_list, Posting};
use crate::error::{Result, SedgeError};
use crate::index::{barrel_file, block_inv_file, LEXICON_FILE, TERMS_LIST_FILE};
use crate::lexicon::{sanitize_term, LexiconEntry};
use crate::shard::shard_for_term;

/// Summary of one merge pass.
#[derive(Debug, Clone)]
pub struct MergeStats {
    /// Number of distinct terms written to the lexicon.
    pub n_terms: u64,
    /// Total encoded posting bytes across all shards.
    pub posting_bytes: u64,
}

/// Line reader over one sorted block run.
struct RunReader {
    lines: std::io::Lines<BufReader<File>>,
    current: Option<(String, String)>,
    label: String,
}

impl RunReader {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SedgeError::corrupt(format!("cannot open block run {}: {e}", path.display()))
        })?;
        let mut reader = RunReader {
            lines: BufReader::new(file).lines(),
            current: None,
            label: path.display().to_string(),
        };
        reader.advance()?;
        Ok(reader)
    }

    /// Move to the next non-empty line, splitting off the term.
    fn advance(&mut self) -> Result<()> {
        loop {
            match self.lines.next() {
                None => {
                    self.current = None;
                    return Ok(());
                }
                Some(line) => {
                    let line = line?;
                    if line.is_empty() {
                        continue;
                    }
                    let (term, rest) = line.split_once('\t').ok_or_else(|| {
                        SedgeError::corrupt(format!("{}: run line has no tab", self.label))
                    })?;
                    self.current = Some((term.to_string(), rest.to_string()));
                    return Ok(());
                }
            }
        }
    }
}

/// Parse one run fragment (`docid:pos,pos;docid:pos,pos`) into `merged`.
fn parse_fragment(fragment: &str, merged: &mut AHashMap<u32, Vec<u32>>) -> Result<()> {
    for entry in fragment.split(';') {
        if entry.is_empty() {
            continue;
        }
        let (doc_id_str, pos_str) = entry
            .split_once(':')
            .ok_or_else(|| SedgeError::corrupt(format!("run posting entry {entry:?} has no colon")))?;
        let doc_id: u32 = doc_id_str
            .parse()
            .map_err(|_| SedgeError::corrupt(format!("bad doc id {doc_id_str:?} in run")))?;

        let positions = merged.entry(doc_id).or_default();
        for pos in pos_str.split(',') {
            if pos.is_empty() {
                return Err(SedgeError::corrupt(format!(
                    "empty position for doc {doc_id} in run"
                )));
            }
            let pos: u32 = pos
                .parse()
                .map_err(|_| SedgeError::corrupt(format!("bad position {pos:?} in run")))?;
            positions.push(pos);
        }
    }
    Ok(())
}

/// Merge `num_blocks` sorted runs in `dir` into `n_shards` barrel files,
/// `lexicon.txt`, and `terms_list.txt`, all written inside `dir`.
pub fn merge_blocks(dir: &Path, num_blocks: usize, n_shards: u32) -> Result<MergeStats> {
    let mut readers = Vec::with_capacity(num_blocks);
    for block_id in 0..num_blocks {
        readers.push(RunReader::open(&dir.join(block_inv_file(block_id)))?);
    }

    let mut shard_writers = Vec::with_capacity(n_shards as usize);
    let mut shard_offsets = vec![0u64; n_shards as usize];
    for shard_id in 0..n_shards {
        let file = File::create(dir.join(barrel_file(shard_id)))?;
        shard_writers.push(BufWriter::new(file));
    }

    let mut lexicon_out = BufWriter::new(File::create(dir.join(LEXICON_FILE))?);
    let mut terms_out = BufWriter::new(File::create(dir.join(TERMS_LIST_FILE))?);

    let mut next_word_id = 0u32;
    let mut posting_bytes = 0u64;

    loop {
        // Smallest pending term across all runs.
        let min_term = match readers
            .iter()
            .filter_map(|r| r.current.as_ref().map(|(term, _)| term))
            .min()
        {
            Some(term) => term.clone(),
            None => break,
        };

        // Fold every run's fragment for this term.
        let mut merged: AHashMap<u32, Vec<u32>> = AHashMap::new();
        for reader in readers.iter_mut() {
            match reader.current.take() {
                Some((term, fragment)) if term == min_term => {
                    parse_fragment(&fragment, &mut merged)?;
                    reader.advance()?;
                }
                other => reader.current = other,
            }
        }

        let mut postings: Vec<Posting> = merged
            .into_iter()
            .map(|(doc_id, mut positions)| {
                positions.sort_unstable();
                positions.dedup();
                Posting::new(doc_id, positions)
            })
            .collect();
        postings.sort_unstable_by_key(|p| p.doc_id);

        let blob = encode_posting_list(&postings);
        let shard_id = shard_for_term(&min_term, n_shards);
        let offset = shard_offsets[shard_id as usize];
        shard_writers[shard_id as usize].write_all(&blob)?;
        shard_offsets[shard_id as usize] += blob.len() as u64;
        posting_bytes += blob.len() as u64;

        next_word_id += 1;
        let entry = LexiconEntry {
            word_id: next_word_id,
            term: min_term.clone(),
            doc_freq: postings.len() as u32,
            term_freq: postings.iter().map(|p| p.tf as u64).sum(),
            offset,
            bytes: blob.len() as u64,
            shard_id,
        };
        writeln!(lexicon_out, "{}", entry.to_row())?;
        writeln!(terms_out, "{}\t{}", sanitize_term(&min_term), next_word_id)?;

        if next_word_id % 100_000 == 0 {
            debug!("merged {} terms", next_word_id);
        }
    }

    for writer in shard_writers.iter_mut() {
        writer.flush()?;
    }
    lexicon_out.flush()?;
    terms_out.flush()?;

    info!(
        "merge complete: {} terms, {} posting bytes across {} shards",
        next_word_id, posting_bytes, n_shards
    );

    Ok(MergeStats {
        n_terms: next_word_id as u64,
        posting_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::posting::decode_posting_list;
    use crate::lexicon::Lexicon;

    fn write_run(dir: &Path, block_id: usize, lines: &[&str]) {
        std::fs::write(
            dir.join(block_inv_file(block_id)),
            lines.join("\n") + "\n",
        )
        .unwrap();
    }

    #[test]
    fn test_merge_two_runs() {
        let dir = tempfile::tempdir().unwrap();

        write_run(dir.path(), 0, &["apple\t1:0,4", "pear\t1:2"]);
        write_run(dir.path(), 1, &["apple\t2:1", "zebra\t3:0"]);

        let stats = merge_blocks(dir.path(), 2, 4).unwrap();
        assert_eq!(stats.n_terms, 3);

        let lexicon = Lexicon::load(&dir.path().join(LEXICON_FILE)).unwrap();
        assert_eq!(lexicon.len(), 3);

        // word_ids follow lexicographic merge order, starting at 1.
        assert_eq!(lexicon.get("apple").unwrap().word_id, 1);
        assert_eq!(lexicon.get("pear").unwrap().word_id, 2);
        assert_eq!(lexicon.get("zebra").unwrap().word_id, 3);

        let apple = lexicon.get("apple").unwrap();
        assert_eq!(apple.doc_freq, 2);
        assert_eq!(apple.term_freq, 3);
        assert_eq!(apple.shard_id, shard_for_term("apple", 4));

        let shard = std::fs::read(dir.path().join(barrel_file(apple.shard_id))).unwrap();
        let range = &shard[apple.offset as usize..(apple.offset + apple.bytes) as usize];
        let list = decode_posting_list(range, 100).unwrap();
        assert_eq!(list.doc_freq(), 2);
        assert_eq!(list.postings[0].doc_id, 1);
        assert_eq!(list.postings[0].positions, vec![0, 4]);
        assert_eq!(list.postings[1].doc_id, 2);
    }

    #[test]
    fn test_merge_dedupes_same_doc_fragments() {
        let dir = tempfile::tempdir().unwrap();

        // The same doc appears for the same term in two runs; positions are
        // concatenated, sorted, and deduplicated.
        write_run(dir.path(), 0, &["covid\t7:3,1"]);
        write_run(dir.path(), 1, &["covid\t7:1,9"]);

        merge_blocks(dir.path(), 2, 1).unwrap();

        let lexicon = Lexicon::load(&dir.path().join(LEXICON_FILE)).unwrap();
        let entry = lexicon.get("covid").unwrap();
        assert_eq!(entry.doc_freq, 1);
        assert_eq!(entry.term_freq, 3);

        let shard = std::fs::read(dir.path().join(barrel_file(0))).unwrap();
        let list = decode_posting_list(
            &shard[entry.offset as usize..(entry.offset + entry.bytes) as usize],
            100,
        )
        .unwrap();
        assert_eq!(list.postings[0].positions, vec![1, 3, 9]);
    }

    #[test]
    fn test_terms_list_written() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), 0, &["alpha\t1:0", "beta\t1:1"]);

        merge_blocks(dir.path(), 1, 2).unwrap();

        let terms = std::fs::read_to_string(dir.path().join(TERMS_LIST_FILE)).unwrap();
        assert_eq!(terms, "alpha\t1\nbeta\t2\n");
    }

    #[test]
    fn test_malformed_run_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), 0, &["broken\tno-colon-here"]);
        assert!(merge_blocks(dir.path(), 1, 1).is_err());

        write_run(dir.path(), 0, &["broken\t1:2,notanumber"]);
        assert!(merge_blocks(dir.path(), 1, 1).is_err());
    }

    #[test]
    fn test_shard_ranges_do_not_overlap() {
        let dir = tempfile::tempdir().unwrap();
        write_run(
            dir.path(),
            0,
            &["a\t1:0", "b\t1:1", "c\t1:2", "d\t1:3", "e\t1:4"],
        );

        merge_blocks(dir.path(), 1, 2).unwrap();
        let lexicon = Lexicon::load(&dir.path().join(LEXICON_FILE)).unwrap();

        for shard_id in 0..2 {
            let mut ranges: Vec<(u64, u64)> = lexicon
                .iter()
                .filter(|e| e.shard_id == shard_id)
                .map(|e| (e.offset, e.offset + e.bytes))
                .collect();
            ranges.sort_unstable();
            let shard_len =
                std::fs::metadata(dir.path().join(barrel_file(shard_id))).unwrap().len();
            let mut prev_end = 0;
            for (start, end) in ranges {
                assert_eq!(start, prev_end);
                assert!(end <= shard_len);
                prev_end = end;
            }
            assert_eq!(prev_end, shard_len);
        }
    }
}
