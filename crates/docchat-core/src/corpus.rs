//! The live document set of one session and its derived index.
//!
//! [`Corpus`] keeps documents in insertion order and rebuilds the
//! [`TfIdfIndex`] on every add or remove, so the index always covers
//! exactly the chunks of the live documents.

use tracing::info;

use crate::error::IngestionError;
use crate::index::{ChunkRef, IndexParams, SearchHit, TfIdfIndex};
use crate::models::{Chunk, Document, DocumentId};

pub struct Corpus {
    documents: Vec<Document>,
    index: TfIdfIndex,
}

impl Corpus {
    pub fn new(params: IndexParams) -> Self {
        Self {
            documents: Vec::new(),
            index: TfIdfIndex::new(params),
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn index(&self) -> &TfIdfIndex {
        &self.index
    }

    pub fn total_chunks(&self) -> usize {
        self.documents.iter().map(|d| d.chunks.len()).sum()
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn find_by_filename(&self, filename: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.filename == filename)
    }

    /// Add a document and rebuild the index.
    ///
    /// Filenames are unique within a corpus; a second upload of the same
    /// name is rejected rather than silently replacing the first.
    pub fn add(&mut self, doc: Document) -> Result<DocumentId, IngestionError> {
        if self.find_by_filename(&doc.filename).is_some() || self.get(doc.id).is_some() {
            return Err(IngestionError::Duplicate(doc.filename));
        }
        let id = doc.id;
        info!(
            filename = %doc.filename,
            chunks = doc.chunks.len(),
            "adding document"
        );
        self.documents.push(doc);
        self.rebuild();
        Ok(id)
    }

    /// Add several documents with a single rebuild. Duplicates are skipped
    /// and reported.
    pub fn extend(&mut self, docs: Vec<Document>) -> Vec<IngestionError> {
        let mut rejected = Vec::new();
        for doc in docs {
            if self.find_by_filename(&doc.filename).is_some() || self.get(doc.id).is_some() {
                rejected.push(IngestionError::Duplicate(doc.filename));
            } else {
                self.documents.push(doc);
            }
        }
        self.rebuild();
        rejected
    }

    /// Remove a document and rebuild the index.
    pub fn remove(&mut self, id: DocumentId) -> Option<Document> {
        let pos = self.documents.iter().position(|d| d.id == id)?;
        let doc = self.documents.remove(pos);
        info!(filename = %doc.filename, "removed document");
        self.rebuild();
        Some(doc)
    }

    /// Resolve an index hit back to its document and chunk.
    pub fn resolve(&self, chunk: &ChunkRef) -> Option<(&Document, &Chunk)> {
        let doc = self.get(chunk.document_id)?;
        let found = doc
            .chunks
            .get(chunk.ordinal)
            .filter(|c| c.id == chunk.chunk_id)
            .or_else(|| doc.chunks.iter().find(|c| c.id == chunk.chunk_id))?;
        Some((doc, found))
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<SearchHit> {
        self.index.search(query, top_k)
    }

    fn rebuild(&mut self) {
        self.index
            .rebuild(self.documents.iter().flat_map(|d| d.chunks.iter()));
        debug_assert_eq!(self.index.len(), self.total_chunks());
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new(IndexParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkParams;
    use crate::ingest::build_document;
    use crate::models::DocumentFormat;

    fn doc(name: &str, text: &str) -> Document {
        build_document(name, DocumentFormat::Text, text, ChunkParams::new(40, 10).unwrap())
            .unwrap()
    }

    #[test]
    fn test_row_count_tracks_documents() {
        let mut corpus = Corpus::default();
        let a = corpus
            .add(doc("a.txt", "The dog ran home. It was late. Everyone was asleep already."))
            .unwrap();
        corpus.add(doc("b.txt", "Birds fly south.")).unwrap();
        assert_eq!(corpus.index().len(), corpus.total_chunks());

        corpus.remove(a).unwrap();
        assert_eq!(corpus.index().len(), corpus.total_chunks());
        assert_eq!(corpus.documents().len(), 1);
    }

    #[test]
    fn test_removed_document_not_searchable() {
        let mut corpus = Corpus::default();
        let a = corpus.add(doc("a.txt", "The dog ran home.")).unwrap();
        corpus.add(doc("b.txt", "Birds fly south.")).unwrap();
        assert!(corpus.search("dog", 5).iter().any(|h| h.chunk.document_id == a));

        corpus.remove(a);
        let hits = corpus.search("dog", 5);
        assert!(hits.iter().all(|h| h.chunk.document_id != a));
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_duplicate_filename_rejected() {
        let mut corpus = Corpus::default();
        corpus.add(doc("a.txt", "First.")).unwrap();
        let err = corpus.add(doc("a.txt", "Second.")).unwrap_err();
        assert_eq!(err, IngestionError::Duplicate("a.txt".to_string()));
        assert_eq!(corpus.documents().len(), 1);
    }

    #[test]
    fn test_extend_skips_duplicates() {
        let mut corpus = Corpus::default();
        let rejected = corpus.extend(vec![doc("a.txt", "One."), doc("a.txt", "Two."), doc("b.txt", "Three.")]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(corpus.documents().len(), 2);
        assert_eq!(corpus.index().len(), 2);
    }

    #[test]
    fn test_resolve_hit() {
        let mut corpus = Corpus::default();
        corpus.add(doc("a.txt", "Unique marmalade sentence.")).unwrap();
        let hits = corpus.search("marmalade", 1);
        let (d, c) = corpus.resolve(&hits[0].chunk).unwrap();
        assert_eq!(d.filename, "a.txt");
        assert!(c.text.contains("marmalade"));
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut corpus = Corpus::default();
        assert!(corpus.remove(DocumentId::new()).is_none());
    }
}
