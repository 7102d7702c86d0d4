//! Error types for docchat.
//!
//! Each failure class has its own type so callers can tell a bad
//! configuration apart from a bad file or a flaky generation backend:
//!
//! | Type | Raised by | Recovery |
//! |------|-----------|----------|
//! | [`ConfigError`] | parameter validation | fatal at startup |
//! | [`IngestionError`] | extraction / document creation | reported per document |
//! | [`GenerationError`] | the generation backend | converted to an assistant message |
//!
//! An empty corpus is not an error: search and retrieval simply return
//! empty results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid chunking, index, or retrieval parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("chunk target_size must be > 0")]
    ZeroTargetSize,

    #[error("chunk overlap ({overlap}) must be smaller than target_size ({target_size})")]
    OverlapTooLarge { overlap: usize, target_size: usize },

    #[error("{field} must be > 0")]
    Zero { field: &'static str },

    #[error("{field} must be in [0.0, 1.0], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("unknown personality: '{0}'")]
    UnknownPersonality(String),

    #[error("unknown analysis kind: '{0}'")]
    UnknownAnalysis(String),
}

/// Failure to turn one uploaded file into a [`Document`](crate::models::Document).
///
/// Always scoped to a single file: a batch keeps going when one entry fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestionError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt file: {0}")]
    CorruptFile(String),

    #[error("no text could be extracted from {0}")]
    EmptyDocument(String),

    #[error("document {0} is already loaded")]
    Duplicate(String),

    #[error("{filename} is {size} bytes, limit is {limit}")]
    TooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },
}

/// Failure reported by the generation backend.
///
/// Serializable so that a failed turn can carry its reason in chat history.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationError {
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("generation rate limited: {0}")]
    RateLimited(String),

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("generation request rejected: {0}")]
    Rejected(String),
}

impl GenerationError {
    /// User-facing explanation shown in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::ServiceUnavailable(_) => {
                "Sorry, the language model service is unavailable right now. Please try again shortly."
                    .to_string()
            }
            GenerationError::RateLimited(_) => {
                "Sorry, the language model is rate limiting requests. Please wait a moment and try again."
                    .to_string()
            }
            GenerationError::Timeout(secs) => format!(
                "Sorry, generation timed out after {} seconds. Please try again.",
                secs
            ),
            GenerationError::Rejected(detail) => {
                format!("Sorry, the language model rejected the request: {}", detail)
            }
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, GenerationError::Rejected(_))
    }
}
