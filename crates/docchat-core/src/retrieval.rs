//! Retrieval and context assembly.
//!
//! [`RetrievalPipeline::retrieve`] asks the corpus index for the `top_k`
//! best chunks, drops those below `min_relevance_score`, and concatenates
//! the rest (best first) into a context string no longer than
//! `max_context_chars`. A `[From <filename>]` marker opens every run of
//! chunks from the same document.
//!
//! Finding nothing relevant is a normal outcome: the result is then an
//! empty context with no citations.

use serde::Serialize;
use tracing::debug;

use crate::corpus::Corpus;
use crate::error::ConfigError;
use crate::models::{Citation, DocumentId};

/// Separator between consecutive chunks in the context.
const CHUNK_SEPARATOR: &str = "\n\n";

/// Retrieval tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub max_context_chars: usize,
    pub min_relevance_score: f64,
}

impl RetrievalParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::Zero { field: "top_k" });
        }
        if self.max_context_chars == 0 {
            return Err(ConfigError::Zero {
                field: "max_context_chars",
            });
        }
        if !(0.0..=1.0).contains(&self.min_relevance_score) {
            return Err(ConfigError::OutOfRange {
                field: "min_relevance_score",
                value: self.min_relevance_score,
            });
        }
        Ok(())
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_context_chars: 3000,
            min_relevance_score: 0.05,
        }
    }
}

/// Assembled context plus the chunks that went into it, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Retrieval {
    pub context: String,
    pub citations: Vec<Citation>,
}

impl Retrieval {
    /// True when no chunk was relevant enough to include.
    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }
}

pub struct RetrievalPipeline {
    params: RetrievalParams,
}

impl RetrievalPipeline {
    pub fn new(params: RetrievalParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    pub fn retrieve(&self, query: &str, corpus: &Corpus) -> Retrieval {
        let hits = corpus.search(query, self.params.top_k);
        let max = self.params.max_context_chars;

        let mut context = String::new();
        let mut used = 0usize;
        let mut citations = Vec::new();
        let mut last_doc: Option<DocumentId> = None;

        for hit in hits {
            if hit.score <= 0.0 || hit.score < self.params.min_relevance_score {
                continue;
            }
            let Some((doc, chunk)) = corpus.resolve(&hit.chunk) else {
                continue;
            };

            let mut piece = String::new();
            if !context.is_empty() {
                piece.push_str(CHUNK_SEPARATOR);
            }
            if last_doc != Some(doc.id) {
                piece.push_str(&format!("[From {}]\n", doc.filename));
            }
            let header_len = piece.chars().count();
            let text = chunk.text.trim();
            let text_len = text.chars().count();

            if used + header_len + text_len > max {
                // The best chunk alone may exceed the budget; keep what fits of it.
                let room = max.saturating_sub(used + header_len);
                if citations.is_empty() && room > 0 {
                    piece.extend(text.chars().take(room));
                    context.push_str(&piece);
                    citations.push(citation(doc.filename.clone(), &hit.chunk, hit.score));
                }
                break;
            }

            piece.push_str(text);
            used += header_len + text_len;
            context.push_str(&piece);
            citations.push(citation(doc.filename.clone(), &hit.chunk, hit.score));
            last_doc = Some(doc.id);
        }

        debug!(
            query,
            citations = citations.len(),
            context_chars = context.chars().count(),
            "retrieved context"
        );

        Retrieval { context, citations }
    }
}

fn citation(filename: String, chunk: &crate::index::ChunkRef, score: f64) -> Citation {
    Citation {
        document_id: chunk.document_id,
        chunk_id: chunk.chunk_id,
        filename,
        ordinal: chunk.ordinal,
        score,
    }
}
