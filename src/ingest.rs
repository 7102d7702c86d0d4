//! Batch ingestion of files and directories into a session.
//!
//! Command-line paths may name files or directories. Directories are walked
//! recursively and filtered through `[ingest].include_globs` and
//! `[ingest].exclude_globs` (matched against the path relative to that
//! directory). Files named explicitly are always attempted.
//!
//! Every file succeeds or fails on its own: a corrupt PDF in a folder of
//! twenty documents leaves the other nineteen loaded, and the failure is
//! listed in the returned [`IngestReport`].

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use docchat_core::error::IngestionError;
use docchat_core::ingest::TextExtractor;
use docchat_core::models::DocumentStats;
use docchat_core::session::ChatSession;

use crate::config::IngestConfig;

/// Directories never descended into.
const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub stats: DocumentStats,
}

#[derive(Debug)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: IngestionError,
}

/// Outcome of one batch, in file order.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub loaded: Vec<LoadedFile>,
    pub failed: Vec<FailedFile>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty() && self.failed.is_empty()
    }
}

/// Expand `paths` into the ordered list of files to ingest.
///
/// Fails only for paths that do not exist or for invalid glob patterns.
pub fn collect_files(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Path does not exist: {}", root.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();
            if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
                continue;
            }
            found.push(path.to_path_buf());
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

/// Ingest every file under `paths` into `session`.
pub fn ingest_paths(
    session: &mut ChatSession,
    extractor: &dyn TextExtractor,
    paths: &[PathBuf],
    config: &IngestConfig,
) -> Result<IngestReport> {
    let files = collect_files(paths, config)?;
    let mut report = IngestReport::default();

    for path in files {
        match ingest_file(session, extractor, &path, config.max_file_bytes) {
            Ok(stats) => {
                info!(
                    file = %path.display(),
                    words = stats.word_count,
                    chunks = stats.chunk_count,
                    "loaded document"
                );
                report.loaded.push(LoadedFile { path, stats });
            }
            Err(error) => {
                match error {
                    IngestionError::Duplicate(_) => {
                        debug!(file = %path.display(), "document already in session")
                    }
                    _ => warn!(file = %path.display(), %error, "skipping file"),
                }
                report.failed.push(FailedFile { path, error });
            }
        }
    }

    info!(
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "ingestion finished"
    );
    Ok(report)
}

fn ingest_file(
    session: &mut ChatSession,
    extractor: &dyn TextExtractor,
    path: &Path,
    max_bytes: u64,
) -> Result<DocumentStats, IngestionError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let size = std::fs::metadata(path)
        .map_err(|e| IngestionError::CorruptFile(format!("{}: {}", filename, e)))?
        .len();
    if size > max_bytes {
        return Err(IngestionError::TooLarge {
            filename,
            size,
            limit: max_bytes,
        });
    }

    let bytes = std::fs::read(path)
        .map_err(|e| IngestionError::CorruptFile(format!("{}: {}", filename, e)))?;
    let id = session.add_file(extractor, &filename, &bytes)?;
    session
        .corpus()
        .get(id)
        .map(|doc| doc.stats())
        .ok_or(IngestionError::EmptyDocument(filename))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FileExtractor;
    use docchat_core::session::SessionSettings;
    use std::fs;
    use tempfile::TempDir;

    fn config() -> IngestConfig {
        IngestConfig::default()
    }

    #[test]
    fn test_collect_files_filters_and_sorts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.md"), "a").unwrap();
        fs::write(tmp.path().join("image.png"), "x").unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/notes.txt"), "x").unwrap();

        let files = collect_files(&[tmp.path().to_path_buf()], &config()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn test_missing_path_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(collect_files(&[tmp.path().join("nope")], &config()).is_err());
    }

    #[test]
    fn test_bad_file_does_not_abort_batch() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.txt"), "Solar panels convert light.").unwrap();
        fs::write(tmp.path().join("broken.docx"), "not a zip").unwrap();
        fs::write(tmp.path().join("blank.txt"), "   \n\t ").unwrap();

        let mut session = ChatSession::new(SessionSettings::default()).unwrap();
        let report = ingest_paths(
            &mut session,
            &FileExtractor,
            &[tmp.path().to_path_buf()],
            &config(),
        )
        .unwrap();

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .any(|f| matches!(f.error, IngestionError::CorruptFile(_))));
        assert!(report
            .failed
            .iter()
            .any(|f| matches!(f.error, IngestionError::EmptyDocument(_))));
        assert_eq!(session.documents().len(), 1);
    }

    #[test]
    fn test_too_large_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.txt");
        fs::write(&path, "x".repeat(100)).unwrap();

        let mut session = ChatSession::new(SessionSettings::default()).unwrap();
        let cfg = IngestConfig {
            max_file_bytes: 10,
            ..IngestConfig::default()
        };
        let report = ingest_paths(&mut session, &FileExtractor, &[path], &cfg).unwrap();
        assert!(matches!(
            report.failed[0].error,
            IngestionError::TooLarge { size: 100, limit: 10, .. }
        ));
    }
}
