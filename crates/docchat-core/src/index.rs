//! In-memory TF-IDF vector index over chunks.
//!
//! The index holds one sparse, L2-normalized weight row per chunk, so the
//! cosine similarity between a query and a chunk is a plain dot product.
//! Vocabulary and IDF weights are corpus-global, which is why the only way
//! to change the indexed set is a full [`TfIdfIndex::rebuild`].
//!
//! # Weighting
//!
//! - **Terms:** lowercased runs of alphanumeric characters; everything else
//!   separates tokens. No stemming.
//! - **TF:** `count / chunk_tokens`, or `1 + ln(count)` when
//!   `sublinear_tf` is set.
//! - **IDF:** `ln((1 + N) / (1 + df)) + 1`, with `N` chunks in the corpus and
//!   `df` chunks containing the term.
//! - **Row:** `tf × idf`, L2-normalized.
//!
//! Columns are assigned in lexical term order, so two rebuilds over the same
//! chunks produce bit-identical rows and rankings.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::models::{Chunk, ChunkId, DocumentId};

/// Common English function words, dropped when `stop_words` is enabled.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Index tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexParams {
    /// Keep only the `n` terms most frequent across the corpus.
    pub max_features: Option<usize>,
    /// Use `1 + ln(count)` instead of `count / chunk_tokens`.
    pub sublinear_tf: bool,
    /// Drop common English stop words from chunks and queries.
    pub stop_words: bool,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            max_features: Some(5000),
            sublinear_tf: false,
            stop_words: false,
        }
    }
}

/// Location of an indexed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChunkRef {
    pub document_id: DocumentId,
    pub chunk_id: ChunkId,
    pub ordinal: usize,
}

/// One ranked search result; `score` is cosine similarity in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: ChunkRef,
    pub score: f64,
}

struct Row {
    chunk: ChunkRef,
    /// Position of the owning document in insertion order.
    doc_rank: usize,
    /// `(column, weight)` sorted by column.
    weights: Vec<(usize, f64)>,
}

/// TF-IDF vector store.
pub struct TfIdfIndex {
    params: IndexParams,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    rows: Vec<Row>,
}

impl TfIdfIndex {
    pub fn new(params: IndexParams) -> Self {
        Self {
            params,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Recompute vocabulary, IDF, and every row from `chunks`.
    ///
    /// Chunks are expected grouped by document in insertion order; that
    /// order breaks score ties in [`search`](Self::search).
    pub fn rebuild<'a, I>(&mut self, chunks: I)
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        let chunks: Vec<&Chunk> = chunks.into_iter().collect();
        let tokenized: Vec<Vec<String>> = chunks
            .iter()
            .map(|c| tokenize_filtered(&c.text, self.params.stop_words))
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for t in tokens {
                *corpus_freq.entry(t.as_str()).or_insert(0) += 1;
                if seen.insert(t.as_str()) {
                    *doc_freq.entry(t.as_str()).or_insert(0) += 1;
                }
            }
        }

        let mut terms: Vec<&str> = corpus_freq.keys().copied().collect();
        if let Some(max) = self.params.max_features {
            if terms.len() > max {
                terms.sort_by(|a, b| corpus_freq[b].cmp(&corpus_freq[a]).then(a.cmp(b)));
                terms.truncate(max);
            }
        }
        terms.sort_unstable();

        let n = chunks.len() as f64;
        self.idf = terms
            .iter()
            .map(|t| ((1.0 + n) / (1.0 + doc_freq[t] as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = terms
            .iter()
            .enumerate()
            .map(|(col, t)| (t.to_string(), col))
            .collect();

        let mut doc_ranks: HashMap<DocumentId, usize> = HashMap::new();
        let mut rows = Vec::with_capacity(chunks.len());
        for (chunk, tokens) in chunks.iter().zip(&tokenized) {
            let next_rank = doc_ranks.len();
            let doc_rank = *doc_ranks.entry(chunk.document_id).or_insert(next_rank);
            rows.push(Row {
                chunk: ChunkRef {
                    document_id: chunk.document_id,
                    chunk_id: chunk.id,
                    ordinal: chunk.ordinal,
                },
                doc_rank,
                weights: self.weigh(tokens),
            });
        }
        self.rows = rows;

        debug!(
            chunks = self.rows.len(),
            documents = doc_ranks.len(),
            vocabulary = self.vocabulary.len(),
            "rebuilt tf-idf index"
        );
    }

    /// Rank chunks by cosine similarity to `query`.
    ///
    /// Out-of-vocabulary query terms contribute nothing. Results are sorted
    /// by score (descending), then chunk ordinal, then document insertion
    /// order, and may include zero-score chunks when fewer than `top_k`
    /// chunks match.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        if self.rows.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_vec = self.weigh(&tokenize_filtered(query, self.params.stop_words));

        let mut scored: Vec<(usize, f64)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i, sparse_dot(&query_vec, &row.weights).clamp(0.0, 1.0)))
            .collect();

        scored.sort_by(|&(a, sa), &(b, sb)| {
            sb.total_cmp(&sa)
                .then(self.rows[a].chunk.ordinal.cmp(&self.rows[b].chunk.ordinal))
                .then(self.rows[a].doc_rank.cmp(&self.rows[b].doc_rank))
                .then(a.cmp(&b))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: self.rows[i].chunk,
                score,
            })
            .collect()
    }

    /// Project tokens onto the vocabulary as a normalized TF-IDF vector.
    fn weigh(&self, tokens: &[String]) -> Vec<(usize, f64)> {
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for t in tokens {
            if let Some(&col) = self.vocabulary.get(t) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }

        let len = tokens.len() as f64;
        let mut weights: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(col, count)| {
                let tf = if self.params.sublinear_tf {
                    1.0 + (count as f64).ln()
                } else {
                    count as f64 / len
                };
                (col, tf * self.idf[col])
            })
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm < f64::EPSILON {
            return Vec::new();
        }
        for (_, w) in &mut weights {
            *w /= norm;
        }
        weights
    }
}

impl Default for TfIdfIndex {
    fn default() -> Self {
        Self::new(IndexParams::default())
    }
}

/// Split text into lowercased alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn tokenize_filtered(text: &str, stop_words: bool) -> Vec<String> {
    let mut tokens = tokenize(text);
    if stop_words {
        tokens.retain(|t| !STOP_WORDS.contains(&t.as_str()));
    }
    tokens
}

/// Dot product of two column-sorted sparse vectors.
fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
