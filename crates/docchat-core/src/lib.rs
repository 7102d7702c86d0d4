//! # docchat-core
//!
//! Core library for docchat: chat with your own documents.
//!
//! Everything here is pure computation with no I/O: the document model,
//! text normalization, sentence-aware chunking, a TF-IDF index, retrieval
//! with context assembly, prompt construction, and the per-user
//! [`ChatSession`](session::ChatSession). File extraction and the HTTP
//! generation backend live in the `docchat` application crate and plug in
//! through [`TextExtractor`](ingest::TextExtractor) and
//! [`Generator`](generation::Generator).
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, messages, citations |
//! | [`normalize`] | Clean extracted text |
//! | [`chunk`] | Overlapping, sentence-aware chunking |
//! | [`index`] | TF-IDF vectors and cosine search |
//! | [`corpus`] | A session's document set plus its index |
//! | [`ingest`] | Build documents from extracted text |
//! | [`retrieval`] | Top-k selection and context assembly |
//! | [`personality`] | Assistant personas |
//! | [`prompt`] | Chat and analysis prompts |
//! | [`mindmap`] | Mind-map parsing and export |
//! | [`generation`] | Generation backend trait |
//! | [`session`] | Chat session state and flows |
//! | [`error`] | Error types |

pub mod chunk;
pub mod corpus;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod mindmap;
pub mod models;
pub mod normalize;
pub mod personality;
pub mod prompt;
pub mod retrieval;
pub mod session;
