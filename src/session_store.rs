//! Session snapshots on disk.
//!
//! A snapshot file is JSON holding the documents (with their chunks), the
//! message history and the active personality. The TF-IDF index is not
//! stored: [`ChatSession::restore`] rebuilds it from the documents.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use docchat_core::session::{ChatSession, SessionSettings, SessionSnapshot};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoredSession {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(flatten)]
    snapshot: SessionSnapshot,
}

pub fn save_snapshot(path: &Path, session: &ChatSession) -> Result<()> {
    let stored = StoredSession {
        version: FORMAT_VERSION,
        saved_at: Utc::now(),
        snapshot: session.snapshot(),
    };
    let json = serde_json::to_string_pretty(&stored)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write session file: {}", path.display()))?;
    info!(path = %path.display(), "saved session");
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<SessionSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;
    let stored: StoredSession = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse session file: {}", path.display()))?;
    if stored.version != FORMAT_VERSION {
        bail!(
            "Unsupported session file version {} (expected {})",
            stored.version,
            FORMAT_VERSION
        );
    }
    Ok(stored.snapshot)
}

/// Restore the session at `path`, or start a fresh one if the file does
/// not exist yet.
pub fn open_session(path: Option<&Path>, settings: SessionSettings) -> Result<ChatSession> {
    match path {
        Some(p) if p.exists() => {
            let snapshot = load_snapshot(p)?;
            Ok(ChatSession::restore(settings, snapshot)?)
        }
        _ => Ok(ChatSession::new(settings)?),
    }
}
