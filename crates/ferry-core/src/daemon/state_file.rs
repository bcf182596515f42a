//! Persisted daemon state.
//!
//! A small JSON file under the daemon's runtime directory binds it to its
//! secondary AI session across restarts. Writes go through a temp file and
//! rename so a crash mid-write never leaves a torn file. Unknown fields are
//! preserved on rewrite for forward compatibility.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::DaemonError;

/// File name within the daemon's runtime directory.
pub const STATE_FILE_NAME: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DaemonStateFile {
    pub bridge_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pane_id: Option<String>,
    pub updated_at: String,
    /// Fields written by newer versions survive a rewrite by this one.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Load persisted state. A missing file is `None`; a corrupt file is
/// logged and treated as missing so a bad write never blocks a start.
pub fn load(path: &Path) -> Result<Option<DaemonStateFile>, DaemonError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&content) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            warn!(
                event = "core.daemon.state_file_corrupt",
                path = %path.display(),
                error = %e,
            );
            Ok(None)
        }
    }
}

/// Write state atomically (temp file + rename).
pub fn save(path: &Path, state: &DaemonStateFile) -> Result<(), DaemonError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(state)?;
    let temp = path.with_extension("json.tmp");

    if let Err(e) = std::fs::write(&temp, format!("{json}\n")) {
        cleanup_temp_file(&temp, &e);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        cleanup_temp_file(&temp, &e);
        return Err(e.into());
    }
    Ok(())
}

fn cleanup_temp_file(temp: &Path, original_error: &std::io::Error) {
    if let Err(cleanup_err) = std::fs::remove_file(temp) {
        warn!(
            event = "core.daemon.temp_file_cleanup_failed",
            temp_file = %temp.display(),
            original_error = %original_error,
            cleanup_error = %cleanup_err,
        );
    }
}
