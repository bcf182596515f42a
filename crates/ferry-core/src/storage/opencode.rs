//! Adapter for the multi-file session format keyed by project.
//!
//! On-disk layout under the storage root:
//!
//! ```text
//! project/<projectId>.json          { id, worktree }
//! session/<projectKey>/<id>.json    session metadata (+ optional order list)
//! message/<sessionId>/<id>.json     { id, role, time: { created } }
//! part/<messageId>/<id>.json        { type: "text", text }
//! ```
//!
//! Reading a session joins message files with their part files. Ordering
//! uses the session's explicit order list when present, otherwise message
//! creation timestamps with filenames as tie-breakers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::errors::StorageError;
use super::traits::StorageAdapter;
use super::types::{Message, Role};

pub struct OpenCodeAdapter {
    root: PathBuf,
}

impl OpenCodeAdapter {
    pub fn new() -> Self {
        let root = dirs::home_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(".local")
            .join("share")
            .join("opencode")
            .join("storage");
        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_json(path: &Path) -> Option<Value> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// All JSON files directly inside `dir`, sorted by filename.
    fn json_files(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    }

    fn parse_timestamp(value: &Value) -> DateTime<Utc> {
        // time.created is epoch milliseconds in newer files, seconds in
        // older ones.
        value
            .get("time")
            .and_then(|t| t.get("created"))
            .and_then(|c| c.as_i64())
            .and_then(|n| {
                if n > 1_000_000_000_000 {
                    DateTime::<Utc>::from_timestamp_millis(n)
                } else {
                    DateTime::<Utc>::from_timestamp(n, 0)
                }
            })
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Concatenated text parts for one message.
    fn message_text(&self, message_id: &str) -> String {
        let parts_dir = self.root.join("part").join(message_id);
        let mut texts = Vec::new();
        for path in Self::json_files(&parts_dir) {
            let Some(part) = Self::read_json(&path) else {
                continue;
            };
            if part.get("type").and_then(|t| t.as_str()) != Some("text") {
                continue;
            }
            if let Some(text) = part.get("text").and_then(|t| t.as_str())
                && !text.is_empty()
            {
                texts.push(text.to_string());
            }
        }
        texts.join("\n")
    }

    /// Explicit message order stored with the session, if any.
    fn session_order(&self, session_id: &str) -> Option<Vec<String>> {
        let sessions_root = self.root.join("session");
        let Ok(project_dirs) = std::fs::read_dir(&sessions_root) else {
            return None;
        };
        for project_dir in project_dirs.filter_map(|e| e.ok()) {
            let candidate = project_dir.path().join(format!("{session_id}.json"));
            if let Some(session) = Self::read_json(&candidate) {
                let order = session
                    .get("order")
                    .or_else(|| session.get("messages"))
                    .and_then(|o| o.as_array())?;
                return Some(
                    order
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                );
            }
        }
        None
    }

    /// Normalize a worktree path for comparison: trailing separators do not
    /// distinguish projects.
    fn normalize_worktree(path: &str) -> String {
        let trimmed = path.trim_end_matches(['/', '\\']);
        if trimmed.is_empty() { path } else { trimmed }.to_string()
    }
}

impl Default for OpenCodeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageAdapter for OpenCodeAdapter {
    fn read_session(&self, session_id: &str) -> Result<Vec<Message>, StorageError> {
        let messages_dir = self.root.join("message").join(session_id);
        if !messages_dir.exists() {
            return Ok(Vec::new());
        }

        struct Raw {
            file_name: String,
            message: Message,
        }

        let mut raw: Vec<Raw> = Vec::new();
        for path in Self::json_files(&messages_dir) {
            let Some(value) = Self::read_json(&path) else {
                continue;
            };
            let Some(id) = value.get("id").and_then(|i| i.as_str()) else {
                continue;
            };
            let Some(role) = value
                .get("role")
                .and_then(|r| r.as_str())
                .and_then(Role::parse)
            else {
                continue;
            };

            let content = self.message_text(id);
            if content.trim().is_empty() {
                continue;
            }

            raw.push(Raw {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                message: Message {
                    id: id.to_string(),
                    role,
                    content,
                    timestamp: Self::parse_timestamp(&value),
                },
            });
        }

        if let Some(order) = self.session_order(session_id) {
            raw.sort_by_key(|r| {
                order
                    .iter()
                    .position(|id| *id == r.message.id)
                    .unwrap_or(usize::MAX)
            });
        } else {
            raw.sort_by(|a, b| {
                a.message
                    .timestamp
                    .cmp(&b.message.timestamp)
                    .then_with(|| a.file_name.cmp(&b.file_name))
            });
        }

        Ok(raw.into_iter().map(|r| r.message).collect())
    }

    /// Match the project index on its normalized worktree, then pick the
    /// newest session for that project key.
    fn resolve_session(&self, project_path: &Path) -> Result<Option<String>, StorageError> {
        let needle = Self::normalize_worktree(&project_path.display().to_string());

        let mut project_key = None;
        for path in Self::json_files(&self.root.join("project")) {
            let Some(project) = Self::read_json(&path) else {
                continue;
            };
            let worktree = project
                .get("worktree")
                .and_then(|w| w.as_str())
                .map(Self::normalize_worktree);
            if worktree.as_deref() == Some(&needle) {
                project_key = project
                    .get("id")
                    .and_then(|i| i.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        path.file_stem().map(|s| s.to_string_lossy().to_string())
                    });
                break;
            }
        }
        let Some(key) = project_key else {
            return Ok(None);
        };

        let sessions_dir = self.root.join("session").join(&key);
        let mut newest: Option<(DateTime<Utc>, String)> = None;
        for path in Self::json_files(&sessions_dir) {
            let Some(session) = Self::read_json(&path) else {
                continue;
            };
            let Some(id) = session
                .get("id")
                .and_then(|i| i.as_str())
                .map(str::to_string)
                .or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()))
            else {
                continue;
            };
            let updated = session
                .get("time")
                .and_then(|t| t.get("updated"))
                .and_then(|u| u.as_i64())
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or_else(|| Self::parse_timestamp(&session));
            if newest.as_ref().is_none_or(|(t, _)| updated >= *t) {
                newest = Some((updated, id));
            }
        }

        if let Some((_, id)) = &newest {
            debug!(
                event = "core.storage.session_resolved",
                adapter = "opencode",
                project_key = %key,
                session_id = %id,
            );
        }
        Ok(newest.map(|(_, id)| id))
    }

    fn watch_path(&self, session_id: &str) -> Option<PathBuf> {
        Some(self.root.join("message").join(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::TempDir::new().unwrap();
            let root = dir.path().to_path_buf();
            Self { _dir: dir, root }
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn adapter(&self) -> OpenCodeAdapter {
            OpenCodeAdapter::with_root(&self.root)
        }
    }

    fn seed_session(fx: &Fixture) {
        fx.write(
            "message/ses_1/msg_a.json",
            r#"{"id":"msg_a","role":"user","time":{"created":1740000000000}}"#,
        );
        fx.write("part/msg_a/prt_1.json", r#"{"type":"text","text":"question"}"#);
        fx.write(
            "message/ses_1/msg_b.json",
            r#"{"id":"msg_b","role":"assistant","time":{"created":1740000001000}}"#,
        );
        fx.write("part/msg_b/prt_1.json", r#"{"type":"text","text":"answer "}"#);
        fx.write("part/msg_b/prt_2.json", r#"{"type":"text","text":"continued"}"#);
    }

    #[test]
    fn test_read_session_joins_parts() {
        let fx = Fixture::new();
        seed_session(&fx);

        let messages = fx.adapter().read_session("ses_1").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg_a");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].id, "msg_b");
        assert_eq!(messages[1].content, "answer \ncontinued");
    }

    #[test]
    fn test_read_session_orders_by_timestamp() {
        let fx = Fixture::new();
        // Written out of order; timestamps must win.
        fx.write(
            "message/ses_2/later.json",
            r#"{"id":"m2","role":"assistant","time":{"created":2000000000000}}"#,
        );
        fx.write("part/m2/p.json", r#"{"type":"text","text":"second"}"#);
        fx.write(
            "message/ses_2/earlier.json",
            r#"{"id":"m1","role":"user","time":{"created":1000000000000}}"#,
        );
        fx.write("part/m1/p.json", r#"{"type":"text","text":"first"}"#);

        let messages = fx.adapter().read_session("ses_2").unwrap();
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[1].id, "m2");
    }

    #[test]
    fn test_explicit_order_list_wins() {
        let fx = Fixture::new();
        seed_session(&fx);
        fx.write(
            "session/proj_1/ses_1.json",
            r#"{"id":"ses_1","order":["msg_b","msg_a"]}"#,
        );

        let messages = fx.adapter().read_session("ses_1").unwrap();
        assert_eq!(messages[0].id, "msg_b");
        assert_eq!(messages[1].id, "msg_a");
    }

    #[test]
    fn test_non_text_parts_and_bad_roles_skipped() {
        let fx = Fixture::new();
        fx.write(
            "message/ses_3/m.json",
            r#"{"id":"m1","role":"assistant","time":{"created":1}}"#,
        );
        fx.write("part/m1/p1.json", r#"{"type":"tool","tool":"bash"}"#);
        fx.write("part/m1/p2.json", r#"{"type":"text","text":"visible"}"#);
        fx.write(
            "message/ses_3/t.json",
            r#"{"id":"t1","role":"tool","time":{"created":2}}"#,
        );
        fx.write("part/t1/p.json", r#"{"type":"text","text":"hidden"}"#);

        let messages = fx.adapter().read_session("ses_3").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "visible");
    }

    #[test]
    fn test_missing_session_is_empty() {
        let fx = Fixture::new();
        assert!(fx.adapter().read_session("nope").unwrap().is_empty());
    }

    #[test]
    fn test_resolve_session_via_project_index() {
        let fx = Fixture::new();
        fx.write(
            "project/proj_1.json",
            r#"{"id":"proj_1","worktree":"/work/app/"}"#,
        );
        fx.write(
            "session/proj_1/ses_old.json",
            r#"{"id":"ses_old","time":{"created":1000000000000,"updated":1000000000000}}"#,
        );
        fx.write(
            "session/proj_1/ses_new.json",
            r#"{"id":"ses_new","time":{"created":1000000000000,"updated":2000000000000}}"#,
        );

        // Trailing-slash differences must not matter.
        let resolved = fx
            .adapter()
            .resolve_session(Path::new("/work/app"))
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("ses_new"));
    }

    #[test]
    fn test_resolve_session_unknown_project() {
        let fx = Fixture::new();
        fx.write(
            "project/proj_1.json",
            r#"{"id":"proj_1","worktree":"/work/app"}"#,
        );
        assert!(fx
            .adapter()
            .resolve_session(Path::new("/somewhere/else"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_read_is_pure() {
        let fx = Fixture::new();
        seed_session(&fx);
        let adapter = fx.adapter();
        assert_eq!(
            adapter.read_session("ses_1").unwrap(),
            adapter.read_session("ses_1").unwrap()
        );
    }
}
