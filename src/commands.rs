//! Implementations of the `docchat` subcommands.
//!
//! Every command builds a fresh [`ChatSession`] (optionally restored from a
//! session file), loads the given paths into it, and then does its work.
//! Files that fail to load are reported on stderr and skipped; a command
//! fails only when no document at all could be loaded.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use docchat_core::error::IngestionError;
use docchat_core::personality::Personality;
use docchat_core::prompt::AnalysisKind;
use docchat_core::session::ChatSession;

use crate::config::Config;
use crate::extract::FileExtractor;
use crate::generation::create_generator;
use crate::ingest::{ingest_paths, FailedFile, IngestReport};
use crate::repl::{run_repl, write_reply};
use crate::session_store::{open_session, save_snapshot};

/// Longest chunk excerpt shown by `search` and `inspect`.
const EXCERPT_CHARS: usize = 160;

/// Failures worth showing the user. Files already restored from a session
/// file come back as duplicates on every run and are left out.
fn reportable_failures(report: &IngestReport, restored: bool) -> Vec<&FailedFile> {
    report
        .failed
        .iter()
        .filter(|f| !(restored && matches!(f.error, IngestionError::Duplicate(_))))
        .collect()
}

/// Open or create the session, apply `personality`, and load `paths`.
pub fn prepare_session(
    config: &Config,
    paths: &[PathBuf],
    session_file: Option<&Path>,
    personality: Option<&str>,
) -> Result<ChatSession> {
    let mut session = open_session(session_file, config.session_settings()?)?;
    if let Some(key) = personality {
        session.set_personality(key.parse::<Personality>()?);
    }

    if !paths.is_empty() {
        let restored = !session.documents().is_empty();
        let report = ingest_paths(&mut session, &FileExtractor, paths, &config.ingest)?;
        for failed in reportable_failures(&report, restored) {
            eprintln!("Skipped {}: {}", failed.path.display(), failed.error);
        }
    }
    if session.documents().is_empty() {
        bail!("No documents loaded. Pass one or more files or directories.");
    }
    Ok(session)
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}

pub fn run_inspect(config: &Config, paths: &[PathBuf], show_chunks: bool) -> Result<()> {
    let session = prepare_session(config, paths, None, None)?;

    for doc in session.documents() {
        let s = doc.stats();
        println!(
            "{} [{}] words: {}, chars: {}, chunks: {}",
            s.filename, s.format, s.word_count, s.char_count, s.chunk_count
        );
        println!("    sha256: {}", doc.content_hash);
        if show_chunks {
            for chunk in &doc.chunks {
                println!(
                    "    #{} {}..{} \"{}\"",
                    chunk.ordinal,
                    chunk.char_span.0,
                    chunk.char_span.1,
                    excerpt(&chunk.text)
                );
            }
        }
    }

    let stats = session.stats();
    println!(
        "Total: {} documents, {} chunks, {} terms",
        stats.documents, stats.chunks, stats.vocabulary
    );
    Ok(())
}

pub fn run_search(config: &Config, query: &str, paths: &[PathBuf], limit: Option<usize>) -> Result<()> {
    let session = prepare_session(config, paths, None, None)?;
    let limit = limit.unwrap_or(config.retrieval.top_k);
    if limit == 0 {
        bail!("--limit must be >= 1");
    }

    let hits: Vec<_> = session
        .search(query, limit)
        .into_iter()
        .filter(|hit| hit.score > 0.0)
        .collect();
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let Some((doc, chunk)) = session.corpus().resolve(&hit.chunk) else {
            continue;
        };
        println!("{}. [{:.2}] {} (chunk {})", i + 1, hit.score, doc.filename, chunk.ordinal);
        println!("    excerpt: \"{}\"", excerpt(&chunk.text));
        println!();
    }
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    paths: &[PathBuf],
    personality: Option<&str>,
    session_file: Option<&Path>,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }
    let mut session = prepare_session(config, paths, session_file, personality)?;
    let generator = create_generator(&config.generation)?;

    let reply = session.ask(question, generator.as_ref()).await;
    if let Some(err) = &reply.error {
        eprintln!("Generation failed: {}", err);
    }
    write_reply(&mut std::io::stdout().lock(), &reply)?;

    if let Some(path) = session_file {
        save_snapshot(path, &session)?;
    }
    Ok(())
}

pub async fn run_chat(
    config: &Config,
    paths: &[PathBuf],
    personality: Option<&str>,
    session_file: Option<&Path>,
) -> Result<()> {
    let mut session = prepare_session(config, paths, session_file, personality)?;
    let generator = create_generator(&config.generation)?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_repl(&mut session, generator.as_ref(), stdin, &mut stdout).await?;

    if let Some(path) = session_file {
        save_snapshot(path, &session)?;
    }
    Ok(())
}

pub async fn run_analyze(
    config: &Config,
    kind: &str,
    paths: &[PathBuf],
    personality: Option<&str>,
    mermaid: bool,
) -> Result<()> {
    let kind = kind.parse::<AnalysisKind>()?;
    if mermaid && kind != AnalysisKind::MindMap {
        bail!("--mermaid only applies to mind_map");
    }
    let mut session = prepare_session(config, paths, None, personality)?;
    let generator = create_generator(&config.generation)?;

    let result = match kind {
        AnalysisKind::MindMap => session.mind_map(generator.as_ref()).await.map(|map| {
            if mermaid {
                map.to_mermaid()
            } else {
                map.to_markdown()
            }
        }),
        _ => session.analyze(kind, generator.as_ref()).await,
    };
    match result {
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            bail!("{} analysis failed: {}", kind, e)
        }
    }
}

pub fn run_personalities(config: &Config) -> Result<()> {
    let current = config.personality()?;
    for p in Personality::ALL {
        let marker = if p == current { "*" } else { " " };
        println!("{} {:<10} {}", marker, p.key(), p.name());
        println!("    {}", p.description());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_on_chars() {
        let long = "é".repeat(400);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), EXCERPT_CHARS + 3);
        assert_eq!(excerpt(" short\ntext "), "short text");
    }

    #[test]
    fn test_prepare_session_requires_documents() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = prepare_session(&Config::default(), &[tmp.path().to_path_buf()], None, None)
            .err()
            .expect("an empty directory must not produce a session");
        assert!(err.to_string().contains("No documents loaded"));
    }

    #[test]
    fn test_restored_duplicates_not_reported() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "Tides follow the moon.").unwrap();
        let session_file = tmp.path().join("session.json");
        let paths = [tmp.path().join("a.txt")];

        let session = prepare_session(&Config::default(), &paths, None, None).unwrap();
        save_snapshot(&session_file, &session).unwrap();

        let mut session =
            prepare_session(&Config::default(), &paths, Some(&session_file), None).unwrap();
        assert_eq!(session.documents().len(), 1);
        let report = ingest_paths(&mut session, &FileExtractor, &paths, &Config::default().ingest).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(reportable_failures(&report, true).is_empty());
        assert_eq!(reportable_failures(&report, false).len(), 1);
    }

    #[test]
    fn test_prepare_session_personality() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "Tides follow the moon.").unwrap();
        let session = prepare_session(
            &Config::default(),
            &[tmp.path().to_path_buf()],
            None,
            Some("business"),
        )
        .unwrap();
        assert_eq!(session.personality(), Personality::Business);
        assert!(prepare_session(&Config::default(), &[tmp.path().to_path_buf()], None, Some("pirate")).is_err());
    }
}
