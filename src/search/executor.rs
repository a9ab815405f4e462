//! Query evaluation for the three query modes.
//!
//! OR unions posting lists and accumulates per-term BM25 contributions; AND
//! intersects doc-id streams rarest-term-first; PHRASE intersects and then
//! verifies positional adjacency. All modes honor an optional deadline and
//! return best-effort results when it expires.

use std::collections::HashMap;
use std::time::Instant;

use ahash::AHashMap;
use log::warn;

use crate::codec::posting::PostingList;
use crate::error::Result;
use crate::lexicon::LexiconEntry;
use crate::search::collector::TopKCollector;
use crate::search::scoring;
use crate::search::{QueryMode, SearchHit, SearchIndex};

/// Outcome of query evaluation, before timing is attached.
pub(crate) struct Evaluation {
    pub hits: Vec<SearchHit>,
    pub truncated: bool,
    pub warnings: Vec<String>,
}

impl Evaluation {
    fn empty(warnings: Vec<String>) -> Self {
        Evaluation {
            hits: Vec::new(),
            truncated: false,
            warnings,
        }
    }
}

/// One resolved query term with its decoded postings.
struct TermPostings {
    term: String,
    entry: LexiconEntry,
    list: PostingList,
}

/// Per-document scoring state accumulated before the final blend.
#[derive(Default)]
struct DocScore {
    bm25_sum: f64,
    // (term index, tf) pairs for the response.
    term_tfs: Vec<(usize, u32)>,
}

fn deadline_expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Evaluate `terms` (already lowercased, non-empty) against the index.
pub(crate) fn execute(
    index: &SearchIndex,
    terms: &[String],
    mode: QueryMode,
    top_k: usize,
    deadline: Option<Instant>,
) -> Result<Evaluation> {
    let mut warnings = Vec::new();

    // Resolve lexicon entries. Unknown terms are soft for OR and empty the
    // result for AND/phrase; neither aborts the query.
    let mut resolved = Vec::with_capacity(terms.len());
    for term in terms {
        match index.lexicon.get(term) {
            Some(entry) => resolved.push((term.clone(), entry.clone())),
            None => {
                warn!("query term not in index: {term:?}");
                warnings.push(format!("term not in index: {term}"));
                if !matches!(mode, QueryMode::Or) {
                    return Ok(Evaluation::empty(warnings));
                }
            }
        }
    }
    if resolved.is_empty() {
        return Ok(Evaluation::empty(warnings));
    }

    // Decode posting lists. A corrupt or unreadable list degrades the same
    // way an unknown term does.
    let mut term_postings = Vec::with_capacity(resolved.len());
    for (term, entry) in resolved {
        match index.reader.read(&entry) {
            Ok(list) => term_postings.push(TermPostings { term, entry, list }),
            Err(e) => {
                warn!("cannot read postings for {term:?}: {e}");
                warnings.push(format!("postings unavailable for term: {term}"));
                if !matches!(mode, QueryMode::Or) {
                    return Ok(Evaluation::empty(warnings));
                }
            }
        }
    }
    if term_postings.is_empty() {
        return Ok(Evaluation::empty(warnings));
    }

    let (scores, truncated) = match mode {
        QueryMode::Or => score_union(index, &term_postings, deadline),
        QueryMode::And => score_intersection(index, &term_postings, deadline),
        QueryMode::Phrase => score_phrase(index, &term_postings, deadline),
    };

    let hits = rank(index, &term_postings, scores, top_k);
    Ok(Evaluation {
        hits,
        truncated,
        warnings,
    })
}

/// OR: every posting of every term contributes.
fn score_union(
    index: &SearchIndex,
    term_postings: &[TermPostings],
    deadline: Option<Instant>,
) -> (AHashMap<u32, DocScore>, bool) {
    let n_docs = index.docmap.len() as u64;
    let avg_doc_len = index.docs.avg_doc_len();
    let mut scores: AHashMap<u32, DocScore> = AHashMap::new();
    let mut truncated = false;

    for (term_idx, tp) in term_postings.iter().enumerate() {
        if deadline_expired(deadline) {
            truncated = true;
            break;
        }
        for posting in &tp.list.postings {
            let doc_len = index.docs.doc_len(posting.doc_id);
            let first_pos = posting.positions.first().copied().unwrap_or(0);
            let boost = scoring::field_boost(first_pos, doc_len, &index.ranker);
            let contribution = scoring::bm25(
                posting.tf,
                doc_len,
                avg_doc_len,
                tp.entry.doc_freq,
                n_docs,
                &index.ranker,
            ) * boost;

            let entry = scores.entry(posting.doc_id).or_default();
            entry.bm25_sum += contribution;
            entry.term_tfs.push((term_idx, posting.tf));
        }
    }

    (scores, truncated)
}

/// Doc ids shared by every term, intersecting rarest-first.
fn intersect_doc_ids(
    term_postings: &[TermPostings],
    deadline: Option<Instant>,
) -> (Vec<u32>, bool) {
    let mut order: Vec<usize> = (0..term_postings.len()).collect();
    order.sort_unstable_by_key(|&i| term_postings[i].entry.doc_freq);

    let mut candidates: Vec<u32> = term_postings[order[0]].list.doc_ids().collect();
    for &i in &order[1..] {
        if deadline_expired(deadline) {
            return (Vec::new(), true);
        }
        if candidates.is_empty() {
            break;
        }
        let list = &term_postings[i].list;
        let mut kept = Vec::with_capacity(candidates.len());
        let mut cursor = list.postings.iter().map(|p| p.doc_id).peekable();
        for &doc_id in &candidates {
            while let Some(&next) = cursor.peek() {
                if next < doc_id {
                    cursor.next();
                } else {
                    break;
                }
            }
            if cursor.peek() == Some(&doc_id) {
                kept.push(doc_id);
                cursor.next();
            }
        }
        candidates = kept;
    }
    (candidates, false)
}

/// AND: only documents containing every term are scored.
fn score_intersection(
    index: &SearchIndex,
    term_postings: &[TermPostings],
    deadline: Option<Instant>,
) -> (AHashMap<u32, DocScore>, bool) {
    let (candidates, truncated) = intersect_doc_ids(term_postings, deadline);
    let n_docs = index.docmap.len() as u64;
    let avg_doc_len = index.docs.avg_doc_len();

    let mut scores: AHashMap<u32, DocScore> = AHashMap::with_capacity(candidates.len());
    for &doc_id in &candidates {
        scores.insert(doc_id, DocScore::default());
    }

    for (term_idx, tp) in term_postings.iter().enumerate() {
        for &doc_id in &candidates {
            // Candidates all appear in every list by construction.
            let Some(posting) = tp.list.find(doc_id) else {
                continue;
            };
            let doc_len = index.docs.doc_len(doc_id);
            let first_pos = posting.positions.first().copied().unwrap_or(0);
            let boost = scoring::field_boost(first_pos, doc_len, &index.ranker);
            let contribution = scoring::bm25(
                posting.tf,
                doc_len,
                avg_doc_len,
                tp.entry.doc_freq,
                n_docs,
                &index.ranker,
            ) * boost;

            let entry = scores.entry(doc_id).or_default();
            entry.bm25_sum += contribution;
            entry.term_tfs.push((term_idx, posting.tf));
        }
    }

    (scores, truncated)
}

/// PHRASE: intersect, then verify that term `i` occurs at `start + i` for
/// some start position of term 0. The first match per document wins.
fn score_phrase(
    index: &SearchIndex,
    term_postings: &[TermPostings],
    deadline: Option<Instant>,
) -> (AHashMap<u32, DocScore>, bool) {
    let (candidates, mut truncated) = intersect_doc_ids(term_postings, deadline);
    let mut scores: AHashMap<u32, DocScore> = AHashMap::new();

    for &doc_id in &candidates {
        if deadline_expired(deadline) {
            truncated = true;
            break;
        }

        let postings: Vec<_> = term_postings
            .iter()
            .filter_map(|tp| tp.list.find(doc_id))
            .collect();
        if postings.len() != term_postings.len() {
            continue;
        }

        let match_pos = postings[0].positions.iter().copied().find(|&start| {
            postings[1..]
                .iter()
                .enumerate()
                .all(|(i, posting)| {
                    let want = start + i as u32 + 1;
                    posting.positions.binary_search(&want).is_ok()
                })
        });

        // Multiple phrase occurrences in one document do not compound: only
        // the first match position contributes.
        if let Some(start) = match_pos {
            let doc_len = index.docs.doc_len(doc_id);
            let boost = scoring::field_boost(start, doc_len, &index.ranker);
            scores.insert(
                doc_id,
                DocScore {
                    bm25_sum: index.ranker.phrase_score * boost,
                    term_tfs: postings
                        .iter()
                        .enumerate()
                        .map(|(i, p)| (i, p.tf))
                        .collect(),
                },
            );
        }
    }

    (scores, truncated)
}

/// Blend recency, select top-K, and materialize response hits.
fn rank(
    index: &SearchIndex,
    term_postings: &[TermPostings],
    scores: AHashMap<u32, DocScore>,
    top_k: usize,
) -> Vec<SearchHit> {
    let mut collector = TopKCollector::new(top_k);
    let mut blended: AHashMap<u32, (f64, f64)> = AHashMap::with_capacity(scores.len());

    for (&doc_id, doc_score) in &scores {
        let pub_date = index
            .docs
            .get(doc_id)
            .and_then(|info| info.pub_date.as_deref());
        let recency = scoring::recency_score(pub_date, &index.ranker);
        let final_score = scoring::blend(doc_score.bm25_sum, recency, &index.ranker);
        blended.insert(doc_id, (recency, final_score));
        collector.collect(doc_id, final_score);
    }

    collector
        .into_sorted()
        .into_iter()
        .map(|scored| {
            let doc_score = &scores[&scored.doc_id];
            let (recency, _) = blended[&scored.doc_id];
            let info = index.docs.get(scored.doc_id);

            let per_term_tf: HashMap<String, u32> = doc_score
                .term_tfs
                .iter()
                .map(|&(term_idx, tf)| (term_postings[term_idx].term.clone(), tf))
                .collect();

            SearchHit {
                doc_key: index
                    .docmap
                    .key(scored.doc_id)
                    .unwrap_or_default()
                    .to_string(),
                title: info.and_then(|i| i.title.clone()),
                score: scored.score,
                bm25: doc_score.bm25_sum,
                recency,
                per_term_tf,
            }
        })
        .collect()
}
