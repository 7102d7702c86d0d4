//! Sentence-aware sliding-window text chunker.
//!
//! Splits normalized document text into overlapping [`Chunk`]s of at most
//! `target_size` characters. Each window is cut just after the last
//! sentence terminator (`.`, `!`, `?`) it contains, so sentences stay whole
//! whenever they fit; windows without a usable terminator are hard-cut at
//! `target_size`.
//!
//! # Algorithm
//!
//! 1. Start a window at cursor `0`, ending at `cursor + target_size`.
//! 2. If the window reaches the end of the text, emit it and stop.
//! 3. Otherwise search backward for a terminator whose cut lies beyond
//!    `cursor + overlap`; cut after it, or at the window end if none.
//! 4. Emit `[cursor, cut)` and move the cursor to `cut - overlap`
//!    (always strictly forward).
//!
//! All positions are character offsets, never byte offsets, so multi-byte
//! text is never split inside a code point.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::split;
//!
//! let pieces = split("The cat sat. The dog ran. Birds fly south.", 20, 5).unwrap();
//! assert_eq!(pieces[0], "The cat sat.");
//! ```

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkId, DocumentId};

/// Characters that end a sentence.
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Validated chunking parameters, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    target_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Rejects `target_size == 0` and `overlap >= target_size`.
    pub fn new(target_size: usize, overlap: usize) -> Result<Self, ConfigError> {
        if target_size == 0 {
            return Err(ConfigError::ZeroTargetSize);
        }
        if overlap >= target_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap,
                target_size,
            });
        }
        Ok(Self {
            target_size,
            overlap,
        })
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_size: 800,
            overlap: 150,
        }
    }
}

/// Split `text` into overlapping pieces.
///
/// Returns no pieces for empty text and a single piece for text no longer
/// than `target_size`. A terminator within the first `overlap` characters
/// of a window is not used as a cut point, since the next window would
/// start at or before the current one; such windows are hard-cut at
/// `target_size`, possibly mid-word.
pub fn split(text: &str, target_size: usize, overlap: usize) -> Result<Vec<String>, ConfigError> {
    let params = ChunkParams::new(target_size, overlap)?;
    let chars: Vec<char> = text.chars().collect();
    Ok(split_spans(&chars, params)
        .into_iter()
        .map(|(start, end)| chars[start..end].iter().collect())
        .collect())
}

/// Compute the `[start, end)` character spans of each chunk.
pub fn split_spans(chars: &[char], params: ChunkParams) -> Vec<(usize, usize)> {
    let total = chars.len();
    let mut spans = Vec::new();
    if total == 0 {
        return spans;
    }

    let mut start = 0;
    loop {
        let window_end = (start + params.target_size).min(total);
        let cut = if window_end == total {
            total
        } else {
            find_sentence_cut(chars, start, window_end, params.overlap).unwrap_or(window_end)
        };
        spans.push((start, cut));

        if cut >= total {
            break;
        }
        start = cut.saturating_sub(params.overlap).max(start + 1);
    }

    spans
}

/// Position just after the last terminator in `chars[start..end]`, provided
/// the next window would still begin past `start`.
fn find_sentence_cut(chars: &[char], start: usize, end: usize, overlap: usize) -> Option<usize> {
    chars[start..end]
        .iter()
        .rposition(|c| SENTENCE_TERMINATORS.contains(c))
        .map(|i| start + i + 1)
        .filter(|&cut| cut > start + overlap)
}

/// Chunk a document's normalized text into [`Chunk`]s with contiguous
/// ordinals starting at 0.
pub fn chunk_text(document_id: DocumentId, text: &str, params: ChunkParams) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    split_spans(&chars, params)
        .into_iter()
        .enumerate()
        .map(|(ordinal, (start, end))| Chunk {
            id: ChunkId::new(),
            document_id,
            ordinal,
            text: chars[start..end].iter().collect(),
            char_span: (start, end),
        })
        .collect()
}
