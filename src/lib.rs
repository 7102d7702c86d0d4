//! # docchat
//!
//! Chat with your own documents from the command line.
//!
//! docchat loads PDF, Office and plain-text files, splits them into
//! overlapping chunks, indexes the chunks with TF-IDF, and answers questions
//! by sending the best-matching passages with the question to a language
//! model. The retrieval pipeline lives in [`docchat_core`]; this crate adds
//! file extraction, the HTTP generation backend, configuration, session
//! files and the CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Files    │──▶│   Extract    │──▶│ ChatSession  │
//! │ PDF/Office │   │ pdf/zip/xml  │   │ chunk+TF-IDF │
//! └────────────┘   └──────────────┘   └──────┬───────┘
//!                                            │ retrieve
//!                                            ▼
//!                                     ┌──────────────┐
//!                                     │  Generator   │
//!                                     │ chat/complete│
//!                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat inspect ./reports --chunks
//! docchat search "quarterly revenue" ./reports
//! docchat ask "What drove revenue growth?" ./reports --personality business
//! docchat chat ./reports --session ./reports.session.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction from PDF, DOCX, PPTX, XLSX, text |
//! | [`ingest`] | Batch loading of files and directories |
//! | [`generation`] | OpenAI-compatible generation backend |
//! | [`session_store`] | Session snapshot files |
//! | [`repl`] | Interactive chat loop |
//! | [`commands`] | CLI subcommands |

pub mod commands;
pub mod config;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod repl;
pub mod session_store;
