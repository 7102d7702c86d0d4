//! Core data models used throughout docchat.
//!
//! These types represent the documents, chunks, and chat messages that flow
//! through the ingestion and question-answering pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GenerationError, IngestionError};

/// Opaque handle of a loaded [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle of a [`Chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(Uuid);

impl ChunkId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// File formats accepted at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Text,
    Markdown,
}

impl DocumentFormat {
    /// Detect the format from a filename extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, IngestionError> {
        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "pptx" => Ok(DocumentFormat::Pptx),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "txt" | "text" | "log" | "csv" => Ok(DocumentFormat::Text),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            _ => Err(IngestionError::UnsupportedFormat(filename.to_string())),
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "Word Document",
            DocumentFormat::Pptx => "PowerPoint Presentation",
            DocumentFormat::Xlsx => "Excel Workbook",
            DocumentFormat::Text => "Text File",
            DocumentFormat::Markdown => "Markdown File",
        }
    }
}

/// A contiguous span of a document's text; the unit of indexing and retrieval.
///
/// `char_span` is a half-open `(start, end)` range measured in characters
/// of the owning document's text. Consecutive chunks may overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub ordinal: usize,
    pub text: String,
    pub char_span: (usize, usize),
}

/// One ingested file: its normalized text and the chunks cut from it.
///
/// Chunks are generated once at ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub filename: String,
    pub format: DocumentFormat,
    pub raw_text: String,
    pub chunks: Vec<Chunk>,
    /// SHA-256 of `raw_text`, hex-encoded.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn word_count(&self) -> usize {
        self.raw_text.split_whitespace().count()
    }

    pub fn char_count(&self) -> usize {
        self.raw_text.chars().count()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Per-document statistics for display.
    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            id: self.id,
            filename: self.filename.clone(),
            format: self.format.label().to_string(),
            word_count: self.word_count(),
            char_count: self.char_count(),
            chunk_count: self.chunk_count(),
        }
    }
}

/// Summary line for one loaded document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentStats {
    pub id: DocumentId,
    pub filename: String,
    pub format: String,
    pub word_count: usize,
    pub char_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Reference from an answer back to a chunk that informed it.
///
/// Holds ids only; the chunk may since have been removed from the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: DocumentId,
    pub chunk_id: ChunkId,
    pub filename: String,
    pub ordinal: usize,
    pub score: f64,
}

/// A single turn in a chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Set when an assistant turn stands in for a failed generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerationError>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            citations: Vec::new(),
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            citations,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Assistant turn carrying a user-visible apology for `error`.
    pub fn failed(error: GenerationError) -> Self {
        Self {
            role: Role::Assistant,
            text: error.user_message(),
            citations: Vec::new(),
            error: Some(error),
            created_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
