//! WezTerm terminal backend, driving the first-party `wezterm cli`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::terminal::command::{run_checked, run_query};
use crate::terminal::errors::TerminalError;
use crate::terminal::keys;
use crate::terminal::text::normalize_payload;
use crate::terminal::traits::TerminalBackend;
use crate::terminal::types::{PaneInfo, SpawnOptions, SplitDirection, TerminalKind};

/// Pane record from `wezterm cli list --format json`.
#[derive(Debug, Deserialize)]
struct WezTermPane {
    pane_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    tab_title: String,
}

pub struct WezTermBackend;

impl WezTermBackend {
    fn list_raw(&self) -> Result<Vec<WezTermPane>, TerminalError> {
        let output = run_query("wezterm", &["cli", "list", "--format", "json"])?;
        serde_json::from_str(&output).map_err(|e| TerminalError::CommandFailed {
            message: format!("failed to parse wezterm pane list: {e}"),
        })
    }

    /// Send raw bytes into a pane as keystrokes.
    ///
    /// `--no-paste` is required: pasted input is wrapped in bracketed-paste
    /// markers, which the receiving TUI buffers rather than executes.
    fn send_bytes(&self, pane_id: &str, bytes: &[u8]) -> Result<(), TerminalError> {
        let text = String::from_utf8_lossy(bytes).to_string();
        run_checked(
            "wezterm",
            &[
                "cli",
                "send-text",
                "--pane-id",
                pane_id,
                "--no-paste",
                "--",
                &text,
            ],
        )
        .map_err(|e| self.map_pane_error(e, pane_id))
    }

    /// Translate a failed pane-targeted command into `PaneNotFound` when
    /// the pane no longer shows up in the CLI listing. The CLI's own error
    /// wording is not stable across versions, so the listing is the signal.
    fn map_pane_error(&self, error: TerminalError, pane_id: &str) -> TerminalError {
        if matches!(error, TerminalError::CommandFailed { .. })
            && matches!(self.is_pane_alive(pane_id), Ok(false))
        {
            return TerminalError::PaneNotFound {
                pane_id: pane_id.to_string(),
            };
        }
        error
    }
}

impl TerminalBackend for WezTermBackend {
    fn name(&self) -> &'static str {
        "wezterm"
    }

    fn display_name(&self) -> &'static str {
        "WezTerm"
    }

    fn kind(&self) -> TerminalKind {
        TerminalKind::WezTerm
    }

    fn is_available(&self) -> bool {
        which::which("wezterm").is_ok()
    }

    fn install_hint(&self) -> &'static str {
        "install WezTerm from https://wezterm.org/installation (the `wezterm` CLI must be on PATH)"
    }

    fn probe(&self) -> Result<(), TerminalError> {
        run_query("wezterm", &["cli", "list"]).map(|_| ())
    }

    fn create_pane(
        &self,
        name: &str,
        startup_command: &str,
        opts: &SpawnOptions,
    ) -> Result<String, TerminalError> {
        if !self.is_available() {
            return Err(TerminalError::BackendNotAvailable {
                backend: self.name(),
                message: "wezterm not found on PATH".to_string(),
            });
        }

        let cwd;
        let percent;
        let mut args: Vec<&str> = match opts.split {
            SplitDirection::NewWindow => vec!["cli", "spawn"],
            SplitDirection::Horizontal | SplitDirection::Vertical => {
                let mut a = vec!["cli", "split-pane"];
                if let Some(target) = &opts.target_pane {
                    a.push("--pane-id");
                    a.push(target);
                }
                if opts.split == SplitDirection::Horizontal {
                    a.push("--horizontal");
                }
                if let Some(p) = opts.percent {
                    percent = p.to_string();
                    a.push("--percent");
                    a.push(&percent);
                }
                a
            }
        };

        if let Some(dir) = &opts.working_directory {
            cwd = dir.display().to_string();
            args.push("--cwd");
            args.push(&cwd);
        }

        // Wrap in sh -c so a command string with arguments works unchanged.
        args.extend_from_slice(&["--", "sh", "-c", startup_command]);

        debug!(
            event = "core.terminal.wezterm_spawn_started",
            pane_name = name,
            split = opts.split.as_str(),
        );

        let pane_id = run_query("wezterm", &args).map_err(|e| TerminalError::SpawnFailed {
            message: format!("wezterm pane spawn failed (name='{name}'): {e}"),
        })?;

        if pane_id.parse::<u64>().is_err() {
            return Err(TerminalError::SpawnFailed {
                message: format!("wezterm returned a non-numeric pane id: '{pane_id}'"),
            });
        }

        if let Err(e) = run_checked(
            "wezterm",
            &["cli", "set-tab-title", "--pane-id", &pane_id, name],
        ) {
            warn!(
                event = "core.terminal.wezterm_set_title_failed",
                pane_id = %pane_id,
                error = %e,
            );
        }

        debug!(
            event = "core.terminal.wezterm_spawn_completed",
            pane_name = name,
            pane_id = %pane_id,
        );
        Ok(pane_id)
    }

    fn close_pane(&self, pane_id: &str) -> Result<(), TerminalError> {
        match run_checked("wezterm", &["cli", "kill-pane", "--pane-id", pane_id])
            .map_err(|e| self.map_pane_error(e, pane_id))
        {
            Ok(()) => {
                debug!(event = "core.terminal.wezterm_pane_closed", pane_id = %pane_id);
                Ok(())
            }
            // Closing an already-dead pane is not an error.
            Err(TerminalError::PaneNotFound { .. }) => {
                debug!(
                    event = "core.terminal.wezterm_pane_already_gone",
                    pane_id = %pane_id,
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn list_panes(&self) -> Result<Vec<PaneInfo>, TerminalError> {
        let panes = self.list_raw()?;
        Ok(panes
            .into_iter()
            .map(|p| PaneInfo {
                id: p.pane_id.to_string(),
                name: if p.tab_title.is_empty() {
                    p.title.clone()
                } else {
                    p.tab_title
                },
                command: p.title,
                // The CLI listing carries no creation time.
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            })
            .collect())
    }

    fn inject_text(&self, pane_id: &str, text: &str) -> Result<(), TerminalError> {
        let payload = normalize_payload(text);

        // Two separate invocations are mandatory here: embedding the
        // carriage return in the same send makes the TUI treat it as part
        // of multi-line input, not as submission. `--no-paste` keeps
        // interior `\n` bytes as plain newlines the TUI inserts without
        // submitting; only the trailing `\r` submits.
        run_checked(
            "wezterm",
            &[
                "cli",
                "send-text",
                "--pane-id",
                pane_id,
                "--no-paste",
                "--",
                &payload,
            ],
        )
        .map_err(|e| self.map_pane_error(e, pane_id))?;
        run_checked(
            "wezterm",
            &[
                "cli",
                "send-text",
                "--pane-id",
                pane_id,
                "--no-paste",
                "--",
                "\r",
            ],
        )
        .map_err(|e| self.map_pane_error(e, pane_id))?;

        debug!(
            event = "core.terminal.wezterm_inject_completed",
            pane_id = %pane_id,
            bytes = payload.len(),
        );
        Ok(())
    }

    fn send_keys(&self, pane_id: &str, keys_spec: &str) -> Result<(), TerminalError> {
        let parsed = keys::parse_sequence(keys_spec)?;
        let mut bytes = Vec::new();
        for key in &parsed {
            bytes.extend_from_slice(&key.to_bytes());
        }
        self.send_bytes(pane_id, &bytes)
    }

    fn is_pane_alive(&self, pane_id: &str) -> Result<bool, TerminalError> {
        let id: u64 = match pane_id.parse() {
            Ok(id) => id,
            Err(_) => return Ok(false),
        };
        Ok(self.list_raw()?.iter().any(|p| p.pane_id == id))
    }

    fn pane_output(&self, pane_id: &str, lines: usize) -> Result<String, TerminalError> {
        let output = run_query("wezterm", &["cli", "get-text", "--pane-id", pane_id])
            .map_err(|e| self.map_pane_error(e, pane_id))?;
        let all: Vec<&str> = output.lines().collect();
        let tail = if all.len() > lines {
            &all[all.len() - lines..]
        } else {
            &all[..]
        };
        Ok(tail.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_identity() {
        let backend = WezTermBackend;
        assert_eq!(backend.name(), "wezterm");
        assert_eq!(backend.display_name(), "WezTerm");
        assert_eq!(backend.kind(), TerminalKind::WezTerm);
    }

    #[test]
    fn test_pane_list_parsing() {
        let json = r#"[
            {"window_id": 0, "tab_id": 1, "pane_id": 4, "workspace": "default",
             "title": "claude", "tab_title": "ferry-claude", "cwd": "file:///tmp",
             "cursor_x": 0, "cursor_y": 0, "is_active": true, "is_zoomed": false}
        ]"#;
        let panes: Vec<WezTermPane> = serde_json::from_str(json).unwrap();
        assert_eq!(panes.len(), 1);
        assert_eq!(panes[0].pane_id, 4);
        assert_eq!(panes[0].tab_title, "ferry-claude");
        assert_eq!(panes[0].title, "claude");
    }

    #[test]
    fn test_pane_list_parsing_minimal_fields() {
        // Unknown fields ignored, optional titles default to empty.
        let json = r#"[{"pane_id": 9}]"#;
        let panes: Vec<WezTermPane> = serde_json::from_str(json).unwrap();
        assert_eq!(panes[0].pane_id, 9);
        assert_eq!(panes[0].title, "");
    }

    #[test]
    fn test_is_pane_alive_rejects_non_numeric_id() {
        let backend = WezTermBackend;
        // A non-numeric id can never belong to this backend; no subprocess
        // call is made, so this is safe without wezterm installed.
        assert_eq!(backend.is_pane_alive("%1").unwrap(), false);
    }

    #[test]
    fn test_map_pane_error_translates_dead_pane() {
        let backend = WezTermBackend;
        let failure = TerminalError::CommandFailed {
            message: "wezterm exited with 1".to_string(),
        };
        // A non-numeric id is known-dead without a subprocess call, so the
        // mapping is observable even without wezterm installed.
        match backend.map_pane_error(failure, "%1") {
            TerminalError::PaneNotFound { pane_id } => assert_eq!(pane_id, "%1"),
            other => panic!("expected PaneNotFound, got {other}"),
        }
    }

    #[test]
    fn test_map_pane_error_preserves_non_command_failures() {
        let backend = WezTermBackend;
        let spawn = TerminalError::SpawnFailed {
            message: "boom".to_string(),
        };
        assert_eq!(backend.map_pane_error(spawn, "%1").error_code(), "spawn_failed");
    }
}
