//! tmux terminal backend.
//!
//! When ferry itself runs inside a tmux client (the `TMUX` environment
//! variable is set), new panes become windows of the enclosing session so
//! the user can see them. Outside tmux, a dedicated detached session hosts
//! all ferry panes.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::terminal::command::{run_checked, run_query, run_with_stdin};
use crate::terminal::errors::TerminalError;
use crate::terminal::keys;
use crate::terminal::text::{build_cd_command, is_multiline, normalize_payload};
use crate::terminal::traits::TerminalBackend;
use crate::terminal::types::{PaneInfo, SpawnOptions, SplitDirection, TerminalKind};

/// Name of the detached session created when running outside tmux.
const HOST_SESSION: &str = "ferry";

/// Format string for pane listing: id, title, command, window activity epoch.
const LIST_FORMAT: &str = "#{pane_id}\t#{pane_title}\t#{pane_current_command}\t#{window_activity}";

pub struct TmuxBackend;

impl TmuxBackend {
    /// Whether this process is running inside a tmux client.
    fn inside_session() -> bool {
        std::env::var("TMUX").is_ok_and(|v| !v.is_empty())
    }

    /// Make sure the dedicated detached session exists.
    fn ensure_host_session(&self) -> Result<(), TerminalError> {
        if run_checked("tmux", &["has-session", "-t", HOST_SESSION]).is_ok() {
            return Ok(());
        }
        debug!(
            event = "core.terminal.tmux_host_session_create",
            session = HOST_SESSION,
        );
        run_checked("tmux", &["new-session", "-d", "-s", HOST_SESSION]).map_err(|e| {
            TerminalError::SpawnFailed {
                message: format!("failed to create detached session '{HOST_SESSION}': {e}"),
            }
        })
    }

    /// Translate a failed pane-targeted command into `PaneNotFound` when
    /// tmux reports the target is gone.
    fn map_pane_error(error: TerminalError, pane_id: &str) -> TerminalError {
        match error {
            TerminalError::CommandFailed { ref message }
                if message.contains("can't find pane") || message.contains("can't find window") =>
            {
                TerminalError::PaneNotFound {
                    pane_id: pane_id.to_string(),
                }
            }
            other => other,
        }
    }

    fn parse_pane_line(line: &str) -> Option<PaneInfo> {
        let mut fields = line.splitn(4, '\t');
        let id = fields.next()?.trim();
        if id.is_empty() {
            return None;
        }
        let name = fields.next().unwrap_or("").to_string();
        let command = fields.next().unwrap_or("").to_string();
        let created_at = fields
            .next()
            .and_then(|epoch| epoch.trim().parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Some(PaneInfo {
            id: id.to_string(),
            name,
            command,
            created_at,
        })
    }
}

impl TerminalBackend for TmuxBackend {
    fn name(&self) -> &'static str {
        "tmux"
    }

    fn display_name(&self) -> &'static str {
        "tmux"
    }

    fn kind(&self) -> TerminalKind {
        TerminalKind::Tmux
    }

    fn is_available(&self) -> bool {
        which::which("tmux").is_ok()
    }

    fn install_hint(&self) -> &'static str {
        "install tmux via your package manager (e.g. `apt install tmux`, `brew install tmux`)"
    }

    // `tmux -V` works without a running server; `list-panes` does not.
    fn probe(&self) -> Result<(), TerminalError> {
        run_query("tmux", &["-V"]).map(|_| ())
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
                message: "tmux not found on PATH".to_string(),
            });
        }

        let command = match &opts.working_directory {
            Some(dir) => build_cd_command(dir, startup_command),
            None => startup_command.to_string(),
        };

        let inside = Self::inside_session();
        if !inside {
            self.ensure_host_session()?;
        }

        let percent_arg;
        let target;
        let mut args: Vec<&str> = match opts.split {
            SplitDirection::NewWindow => {
                let mut a = vec!["new-window", "-P", "-F", "#{pane_id}", "-n", name];
                if !inside {
                    target = format!("{HOST_SESSION}:");
                    a.push("-t");
                    a.push(&target);
                }
                a
            }
            SplitDirection::Horizontal | SplitDirection::Vertical => {
                let dir_flag = if opts.split == SplitDirection::Horizontal {
                    "-h"
                } else {
                    "-v"
                };
                let mut a = vec!["split-window", dir_flag, "-P", "-F", "#{pane_id}"];
                match &opts.target_pane {
                    Some(pane) => {
                        target = pane.clone();
                        a.push("-t");
                        a.push(&target);
                    }
                    // Outside tmux there is no current pane to split from.
                    None if !inside => {
                        target = format!("{HOST_SESSION}:");
                        a.push("-t");
                        a.push(&target);
                    }
                    None => {}
                }
                if let Some(p) = opts.percent {
                    percent_arg = format!("{p}%");
                    a.push("-l");
                    a.push(&percent_arg);
                }
                a
            }
        };
        args.push("sh");
        args.push("-c");
        args.push(&command);

        debug!(
            event = "core.terminal.tmux_spawn_started",
            pane_name = name,
            split = opts.split.as_str(),
            inside_session = inside,
        );

        let pane_id = run_query("tmux", &args).map_err(|e| TerminalError::SpawnFailed {
            message: format!("tmux pane spawn failed (name='{name}'): {e}"),
        })?;

        if pane_id.is_empty() {
            return Err(TerminalError::SpawnFailed {
                message: format!("tmux returned an empty pane id for '{name}'"),
            });
        }

        debug!(
            event = "core.terminal.tmux_spawn_completed",
            pane_name = name,
            pane_id = %pane_id,
        );
        Ok(pane_id)
    }

    fn close_pane(&self, pane_id: &str) -> Result<(), TerminalError> {
        match run_checked("tmux", &["kill-pane", "-t", pane_id])
            .map_err(|e| Self::map_pane_error(e, pane_id))
        {
            Ok(()) => {
                debug!(event = "core.terminal.tmux_pane_closed", pane_id = %pane_id);
                Ok(())
            }
            // Closing an already-dead pane is not an error.
            Err(TerminalError::PaneNotFound { .. }) => {
                debug!(
                    event = "core.terminal.tmux_pane_already_gone",
                    pane_id = %pane_id,
                );
                Ok(())
            }
            Err(e) => match self.is_pane_alive(pane_id) {
                Ok(false) => {
                    debug!(
                        event = "core.terminal.tmux_pane_already_gone",
                        pane_id = %pane_id,
                    );
                    Ok(())
                }
                _ => Err(e),
            },
        }
    }

    fn list_panes(&self) -> Result<Vec<PaneInfo>, TerminalError> {
        let output = match run_query("tmux", &["list-panes", "-a", "-F", LIST_FORMAT]) {
            Ok(out) => out,
            // No server running means no panes, not a failure.
            Err(TerminalError::CommandFailed { message })
                if message.contains("no server") || message.contains("error connecting") =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        Ok(output.lines().filter_map(Self::parse_pane_line).collect())
    }

    fn inject_text(&self, pane_id: &str, text: &str) -> Result<(), TerminalError> {
        let payload = normalize_payload(text);

        if is_multiline(&payload) {
            // Load-buffer + paste-buffer delivers the whole block as one
            // bracketed paste, so the target TUI sees a single multi-line
            // input instead of line-by-line submissions.
            run_with_stdin("tmux", &["load-buffer", "-"], payload.as_bytes())?;
            if let Err(e) = run_checked("tmux", &["paste-buffer", "-d", "-p", "-t", pane_id]) {
                warn!(
                    event = "core.terminal.tmux_paste_failed",
                    pane_id = %pane_id,
                    error = %e,
                    message = "paste-buffer failed, falling back to literal send-keys",
                );
                run_checked("tmux", &["send-keys", "-t", pane_id, "-l", "--", &payload])
                    .map_err(|e| Self::map_pane_error(e, pane_id))?;
            }
        } else {
            run_checked("tmux", &["send-keys", "-t", pane_id, "-l", "--", &payload])
                .map_err(|e| Self::map_pane_error(e, pane_id))?;
        }

        // One real Enter keystroke submits, regardless of payload newlines.
        run_checked("tmux", &["send-keys", "-t", pane_id, "Enter"])
            .map_err(|e| Self::map_pane_error(e, pane_id))?;

        debug!(
            event = "core.terminal.tmux_inject_completed",
            pane_id = %pane_id,
            bytes = payload.len(),
            multiline = is_multiline(&payload),
        );
        Ok(())
    }

    fn send_keys(&self, pane_id: &str, keys_spec: &str) -> Result<(), TerminalError> {
        let parsed = keys::parse_sequence(keys_spec)?;
        let tokens: Vec<String> = parsed.iter().map(|k| k.tmux_token()).collect();
        let mut args = vec!["send-keys", "-t", pane_id];
        args.extend(tokens.iter().map(String::as_str));
        run_checked("tmux", &args).map_err(|e| Self::map_pane_error(e, pane_id))
    }

    fn is_pane_alive(&self, pane_id: &str) -> Result<bool, TerminalError> {
        Ok(self.list_panes()?.iter().any(|p| p.id == pane_id))
    }

    fn pane_output(&self, pane_id: &str, lines: usize) -> Result<String, TerminalError> {
        let start = format!("-{lines}");
        let output = run_query(
            "tmux",
            &["capture-pane", "-p", "-t", pane_id, "-S", &start],
        )
        .map_err(|e| Self::map_pane_error(e, pane_id))?;
        // capture-pane may return more history than asked for; keep the tail.
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
        let backend = TmuxBackend;
        assert_eq!(backend.name(), "tmux");
        assert_eq!(backend.kind(), TerminalKind::Tmux);
        assert!(!backend.install_hint().is_empty());
    }

    #[test]
    fn test_parse_pane_line() {
        let info = TmuxBackend::parse_pane_line("%3\tferry-claude\tnode\t1735689600").unwrap();
        assert_eq!(info.id, "%3");
        assert_eq!(info.name, "ferry-claude");
        assert_eq!(info.command, "node");
        assert_eq!(info.created_at.timestamp(), 1735689600);
    }

    #[test]
    fn test_parse_pane_line_missing_fields() {
        let info = TmuxBackend::parse_pane_line("%7").unwrap();
        assert_eq!(info.id, "%7");
        assert_eq!(info.name, "");
        assert_eq!(info.created_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_pane_line_empty() {
        assert!(TmuxBackend::parse_pane_line("").is_none());
    }

    #[test]
    fn test_parse_pane_line_bad_epoch_falls_back() {
        let info = TmuxBackend::parse_pane_line("%1\tname\tsh\tnot-a-number").unwrap();
        assert_eq!(info.created_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_map_pane_error_translates_missing_pane() {
        let missing = TerminalError::CommandFailed {
            message: "tmux exited with 1: can't find pane: %9".to_string(),
        };
        match TmuxBackend::map_pane_error(missing, "%9") {
            TerminalError::PaneNotFound { pane_id } => assert_eq!(pane_id, "%9"),
            other => panic!("expected PaneNotFound, got {other}"),
        }
    }

    #[test]
    fn test_map_pane_error_passes_through_other_failures() {
        let unrelated = TerminalError::CommandFailed {
            message: "tmux exited with 1: lost server".to_string(),
        };
        assert_eq!(
            TmuxBackend::map_pane_error(unrelated, "%9").error_code(),
            "command_failed"
        );
    }

    #[test]
    fn test_inside_session_reflects_env() {
        // Can only assert consistency with the actual environment here.
        let expected = std::env::var("TMUX").is_ok_and(|v| !v.is_empty());
        assert_eq!(TmuxBackend::inside_session(), expected);
    }
}
