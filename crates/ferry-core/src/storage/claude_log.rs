//! Adapter for the single-file append-only session format.
//!
//! One JSON record per line. Records carry a `type` discriminator and a
//! message payload with a `role` and a `content` array of typed blocks;
//! only text-carrying blocks contribute to `Message.content`. Tool calls,
//! images, and other record types are ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use super::errors::StorageError;
use super::traits::StorageAdapter;
use super::types::{Message, Role};

pub struct ClaudeLogAdapter {
    root: PathBuf,
}

impl ClaudeLogAdapter {
    /// Adapter rooted at the tool's default project-log tree.
    pub fn new() -> Self {
        let root = dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".claude")
            .join("projects");
        Self { root }
    }

    /// Adapter rooted at an explicit directory (tests, relocated installs).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A session id is either a full path to the log file or a bare
    /// identifier resolved to `<id>.jsonl` somewhere under the root.
    fn session_file(&self, session_id: &str) -> PathBuf {
        let direct = Path::new(session_id);
        if direct.is_absolute() {
            return direct.to_path_buf();
        }

        let file_name = format!("{session_id}.jsonl");
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if entry.file_name().to_string_lossy() == file_name.as_str() {
                return entry.into_path();
            }
        }
        self.root.join(file_name)
    }

    /// Parse one JSONL record into a normalized message.
    ///
    /// `index` provides a stable fallback id for records without one; the
    /// file is append-only, so a line's index never changes.
    fn parse_line(line: &str, index: usize) -> Option<Message> {
        let value: Value = serde_json::from_str(line).ok()?;

        let record_type = value.get("type")?.as_str()?;
        if !matches!(record_type, "user" | "assistant" | "system") {
            return None;
        }

        let payload = value.get("message")?;
        let role_str = payload
            .get("role")
            .and_then(|r| r.as_str())
            .unwrap_or(record_type);
        let role = Role::parse(role_str)?;

        let content = match payload.get("content") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(blocks)) => {
                let texts: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                    .collect();
                if texts.is_empty() {
                    return None;
                }
                texts.join("\n")
            }
            _ => return None,
        };
        if content.trim().is_empty() {
            return None;
        }

        let id = value
            .get("uuid")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("line-{index}"));

        let timestamp = value
            .get("timestamp")
            .and_then(|t| t.as_str())
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH);

        Some(Message {
            id,
            role,
            content,
            timestamp,
        })
    }
}

impl Default for ClaudeLogAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageAdapter for ClaudeLogAdapter {
    fn read_session(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        let path = self.session_file(session_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .enumerate()
            .filter_map(|(index, line)| Self::parse_line(line, index))
            .collect())
    }

    /// Newest log file under the root whose contents reference the project
    /// path. Files are visited in modification-time descending order so the
    /// active session wins over stale ones.
    fn resolve_session(&self, project_path: &Path) -> Result<Option<String>, StorageError> {
        let needle = project_path.display().to_string();

        let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|e| {
                let mtime = e.metadata().ok()?.modified().ok()?;
                Some((mtime, e.into_path()))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, path) in candidates {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            if content.contains(&needle) {
                debug!(
                    event = "core.storage.session_resolved",
                    adapter = "claude-log",
                    path = %path.display(),
                );
                return Ok(Some(path.display().to_string()));
            }
        }
        Ok(None)
    }

    fn watch_path(&self, session_id: &str) -> Option<PathBuf> {
        Some(self.session_file(session_id))
    }
}
