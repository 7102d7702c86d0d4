//! Document construction at the ingestion boundary.
//!
//! Turning uploaded bytes into text is delegated to a [`TextExtractor`]
//! supplied by the application; everything after that (normalization,
//! chunking, hashing) happens here.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::chunk::{chunk_text, ChunkParams};
use crate::error::IngestionError;
use crate::models::{Document, DocumentFormat, DocumentId};
use crate::normalize::normalize;

/// Extracts raw text from file bytes given a format hint.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], format: DocumentFormat) -> Result<String, IngestionError>;
}

/// Normalize and chunk `raw_text` into a new [`Document`].
///
/// Fails with [`IngestionError::EmptyDocument`] when nothing but whitespace
/// and control characters remains after normalization.
pub fn build_document(
    filename: &str,
    format: DocumentFormat,
    raw_text: &str,
    params: ChunkParams,
) -> Result<Document, IngestionError> {
    let text = normalize(raw_text);
    if text.is_empty() {
        return Err(IngestionError::EmptyDocument(filename.to_string()));
    }

    let id = DocumentId::new();
    let chunks = chunk_text(id, &text, params);

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    debug!(
        filename,
        chars = text.len(),
        chunks = chunks.len(),
        "built document"
    );

    Ok(Document {
        id,
        filename: filename.to_string(),
        format,
        raw_text: text,
        chunks,
        content_hash,
        created_at: Utc::now(),
    })
}

/// Detect the format from `filename`, extract, and build the document.
pub fn ingest_bytes(
    extractor: &dyn TextExtractor,
    filename: &str,
    bytes: &[u8],
    params: ChunkParams,
) -> Result<Document, IngestionError> {
    let format = DocumentFormat::from_filename(filename)?;
    let raw = extractor.extract(bytes, format)?;
    build_document(filename, format, &raw, params)
}
