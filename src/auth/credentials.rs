// Session persistence between CLI runs

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::types::StoredSession;

/// Default session file location: `<config dir>/agentos/session.json`
pub fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentos")
        .join("session.json")
}

/// Load a stored session, `None` when the user has not logged in
pub fn load_session(path: &Path) -> Result<Option<StoredSession>> {
    if !path.exists() {
        tracing::debug!("No session file at {}", path.display());
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file: {}", path.display()))?;

    let session: StoredSession = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse session file: {}", path.display()))?;

    Ok(Some(session))
}

/// Write the session, creating parent directories as needed
pub fn save_session(path: &Path, session: &StoredSession) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }
    }

    let raw = serde_json::to_string_pretty(session).context("Failed to serialize session")?;
    std::fs::write(path, raw)
        .with_context(|| format!("Failed to write session file: {}", path.display()))?;

    tracing::debug!("Session saved to {}", path.display());
    Ok(())
}

/// Remove the session file; a missing file is not an error
pub fn clear_session(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e)
            .with_context(|| format!("Failed to remove session file: {}", path.display())),
    }
}
