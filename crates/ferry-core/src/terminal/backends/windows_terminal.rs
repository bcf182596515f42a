//! Windows Terminal backend.
//!
//! Panes are tabs of the host `wt.exe` window, addressed by tab title.
//! Windows Terminal has no API for injecting text into a tab, so delivery
//! goes through the OS scripting layer: put the text on the clipboard,
//! activate the tab by window title, send the paste accelerator, then send
//! a symbolic Enter. Scrollback is not readable, so `pane_output` fails
//! with `Unsupported` and daemons on this backend rely on storage adapters.

use tracing::{debug, warn};

use crate::terminal::command::{run_checked, run_query};
use crate::terminal::errors::TerminalError;
use crate::terminal::keys::{self, Key};
use crate::terminal::text::{normalize_payload, powershell_quote};
use crate::terminal::traits::TerminalBackend;
use crate::terminal::types::{PaneInfo, SpawnOptions, TerminalKind};

pub struct WindowsTerminalBackend;

impl WindowsTerminalBackend {
    fn ensure_platform(&self) -> Result<(), TerminalError> {
        if cfg!(windows) {
            Ok(())
        } else {
            Err(TerminalError::BackendNotAvailable {
                backend: self.name(),
                message: "Windows Terminal is only available on Windows".to_string(),
            })
        }
    }

    fn run_powershell(&self, script: &str) -> Result<(), TerminalError> {
        run_checked(
            "powershell.exe",
            &["-NoProfile", "-NonInteractive", "-Command", script],
        )
    }

    /// Activate the tab's window and send a `SendKeys` sequence.
    fn activate_and_send(&self, title: &str, sendkeys: &str) -> Result<(), TerminalError> {
        let script = format!(
            "$ws = New-Object -ComObject WScript.Shell; \
             if (-not $ws.AppActivate({title})) {{ throw 'window not found' }}; \
             Start-Sleep -Milliseconds 150; \
             $ws.SendKeys({keys})",
            title = powershell_quote(title),
            keys = powershell_quote(sendkeys),
        );
        self.run_powershell(&script)
            .map_err(|e| Self::map_window_error(e, title))
    }

    /// Translate a script failure into `PaneNotFound` when activation threw
    /// because the tab's window no longer exists.
    fn map_window_error(error: TerminalError, pane_id: &str) -> TerminalError {
        match error {
            TerminalError::CommandFailed { ref message } if message.contains("window not found") => {
                TerminalError::PaneNotFound {
                    pane_id: pane_id.to_string(),
                }
            }
            other => other,
        }
    }

    fn sendkeys_token(key: &Key) -> String {
        match key {
            Key::Enter => "{ENTER}".to_string(),
            Key::Tab => "{TAB}".to_string(),
            Key::Escape => "{ESC}".to_string(),
            Key::Space => " ".to_string(),
            Key::Backspace => "{BACKSPACE}".to_string(),
            Key::Up => "{UP}".to_string(),
            Key::Down => "{DOWN}".to_string(),
            Key::Left => "{LEFT}".to_string(),
            Key::Right => "{RIGHT}".to_string(),
            Key::Ctrl(c) => format!("^{c}"),
            Key::Meta(c) => format!("%{c}"),
            Key::Char(c) => match c {
                // SendKeys metacharacters must be braced.
                '+' | '^' | '%' | '~' | '(' | ')' | '{' | '}' | '[' | ']' => format!("{{{c}}}"),
                _ => c.to_string(),
            },
        }
    }
}

impl TerminalBackend for WindowsTerminalBackend {
    fn name(&self) -> &'static str {
        "windows-terminal"
    }

    fn display_name(&self) -> &'static str {
        "Windows Terminal"
    }

    fn kind(&self) -> TerminalKind {
        TerminalKind::WindowsTerminal
    }

    fn is_available(&self) -> bool {
        cfg!(windows) && which::which("wt.exe").or_else(|_| which::which("wt")).is_ok()
    }

    fn install_hint(&self) -> &'static str {
        "install Windows Terminal from the Microsoft Store (the `wt` launcher must be on PATH)"
    }

    // `wt` offers no tab enumeration; availability is the whole probe.
    fn probe(&self) -> Result<(), TerminalError> {
        self.ensure_platform()?;
        if self.is_available() {
            Ok(())
        } else {
            Err(TerminalError::BackendNotAvailable {
                backend: self.name(),
                message: "wt.exe not found on PATH".to_string(),
            })
        }
    }

    fn create_pane(
        &self,
        name: &str,
        startup_command: &str,
        opts: &SpawnOptions,
    ) -> Result<String, TerminalError> {
        self.ensure_platform()?;

        let mut args: Vec<&str> = vec!["-w", "0", "new-tab", "--title", name];
        let dir;
        if let Some(d) = &opts.working_directory {
            dir = d.display().to_string();
            args.push("-d");
            args.push(&dir);
        }
        args.extend_from_slice(&["cmd", "/k", startup_command]);

        debug!(
            event = "core.terminal.wt_spawn_started",
            tab_title = name,
        );

        run_query("wt", &args).map_err(|e| TerminalError::SpawnFailed {
            message: format!("wt new-tab failed (title='{name}'): {e}"),
        })?;

        // Tabs have no queryable id; the title is the handle used for
        // activation and teardown.
        Ok(name.to_string())
    }

    fn close_pane(&self, pane_id: &str) -> Result<(), TerminalError> {
        if self.ensure_platform().is_err() {
            return Ok(());
        }
        // Kill the process tree hosted by the tab, matched by window title.
        // Best-effort: the tab may already be gone.
        let filter = format!("WINDOWTITLE eq {pane_id}*");
        match run_checked("taskkill", &["/FI", &filter, "/T", "/F"]) {
            Ok(()) => {
                debug!(event = "core.terminal.wt_tab_closed", tab_title = %pane_id);
            }
            Err(e) => {
                warn!(
                    event = "core.terminal.wt_close_no_match",
                    tab_title = %pane_id,
                    error = %e,
                    message = "no matching window, tab may have been closed manually",
                );
            }
        }
        Ok(())
    }

    fn list_panes(&self) -> Result<Vec<PaneInfo>, TerminalError> {
        self.ensure_platform()?;
        // Windows Terminal exposes no tab enumeration API.
        Ok(Vec::new())
    }

    fn inject_text(&self, pane_id: &str, text: &str) -> Result<(), TerminalError> {
        self.ensure_platform()?;
        let payload = normalize_payload(text);

        // Clipboard carries the payload so multi-line text arrives as one
        // paste. SendKeys types the accelerator and the final Enter only.
        let script = format!(
            "Set-Clipboard -Value {value}; \
             $ws = New-Object -ComObject WScript.Shell; \
             if (-not $ws.AppActivate({title})) {{ throw 'window not found' }}; \
             Start-Sleep -Milliseconds 150; \
             $ws.SendKeys('^v'); \
             Start-Sleep -Milliseconds 150; \
             $ws.SendKeys('{{ENTER}}')",
            value = powershell_quote(&payload),
            title = powershell_quote(pane_id),
        );

        self.run_powershell(&script)
            .map_err(|e| Self::map_window_error(e, pane_id))
            .map_err(|e| match e {
                found @ TerminalError::PaneNotFound { .. } => found,
                other => TerminalError::CommandFailed {
                    message: format!("clipboard injection into tab '{pane_id}' failed: {other}"),
                },
            })?;

        debug!(
            event = "core.terminal.wt_inject_completed",
            tab_title = %pane_id,
            bytes = payload.len(),
        );
        Ok(())
    }

    fn send_keys(&self, pane_id: &str, keys_spec: &str) -> Result<(), TerminalError> {
        self.ensure_platform()?;
        let parsed = keys::parse_sequence(keys_spec)?;
        let sequence: String = parsed.iter().map(|k| Self::sendkeys_token(k)).collect();
        self.activate_and_send(pane_id, &sequence)
    }

    fn is_pane_alive(&self, pane_id: &str) -> Result<bool, TerminalError> {
        self.ensure_platform()?;
        // tasklist filters by window title; a hit means the tab's shell
        // process is still running.
        let filter = format!("WINDOWTITLE eq {pane_id}*");
        let output = run_query("tasklist", &["/FI", &filter, "/NH"])?;
        Ok(!output.to_lowercase().contains("no tasks"))
    }

    fn pane_output(&self, _pane_id: &str, _lines: usize) -> Result<String, TerminalError> {
        Err(TerminalError::Unsupported {
            backend: self.name(),
            operation: "pane_output",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_identity() {
        let backend = WindowsTerminalBackend;
        assert_eq!(backend.name(), "windows-terminal");
        assert_eq!(backend.kind(), TerminalKind::WindowsTerminal);
    }

    #[test]
    fn test_pane_output_unsupported() {
        let backend = WindowsTerminalBackend;
        let err = backend.pane_output("ferry-claude", 50).unwrap_err();
        assert_eq!(err.error_code(), "unsupported");
    }

    #[test]
    fn test_sendkeys_tokens() {
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Enter), "{ENTER}");
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Ctrl('c')), "^c");
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Meta('x')), "%x");
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Char('a')), "a");
    }

    #[test]
    fn test_map_window_error_translates_missing_window() {
        let thrown = TerminalError::CommandFailed {
            message: "powershell.exe exited with 1: window not found".to_string(),
        };
        match WindowsTerminalBackend::map_window_error(thrown, "ferry-claude") {
            TerminalError::PaneNotFound { pane_id } => assert_eq!(pane_id, "ferry-claude"),
            other => panic!("expected PaneNotFound, got {other}"),
        }
    }

    #[test]
    fn test_map_window_error_passes_through_other_failures() {
        let unrelated = TerminalError::CommandFailed {
            message: "powershell.exe exited with 1: clipboard locked".to_string(),
        };
        assert_eq!(
            WindowsTerminalBackend::map_window_error(unrelated, "t").error_code(),
            "command_failed"
        );
    }

    #[test]
    fn test_sendkeys_braces_metacharacters() {
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Char('+')), "{+}");
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Char('%')), "{%}");
        assert_eq!(WindowsTerminalBackend::sendkeys_token(&Key::Char('{')), "{{}");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unavailable_off_windows() {
        let backend = WindowsTerminalBackend;
        assert!(!backend.is_available());
        let err = backend.create_pane("t", "cmd", &SpawnOptions::new()).unwrap_err();
        assert_eq!(err.error_code(), "backend_not_available");
        // close_pane stays idempotent even off-platform
        assert!(backend.close_pane("t").is_ok());
    }
}
