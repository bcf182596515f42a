//! The terminal backend contract.

use super::errors::TerminalError;
use super::types::{PaneInfo, SpawnOptions, TerminalKind};

/// A pane-granular interface over a host terminal program.
///
/// Implementations shell out to the host's own CLI (tmux, `wezterm cli`,
/// `wt` + PowerShell) rather than owning PTYs: the secondary AI must stay
/// visible and interactable in the user's terminal of choice.
///
/// Pane identifiers are backend-specific opaque strings. Callers must never
/// pass a pane id obtained from one backend into another.
pub trait TerminalBackend: Send + Sync {
    /// Canonical lowercase backend name.
    fn name(&self) -> &'static str;

    /// Human-readable backend name.
    fn display_name(&self) -> &'static str;

    /// Which backend this is.
    fn kind(&self) -> TerminalKind;

    /// Whether the host terminal program is installed.
    fn is_available(&self) -> bool;

    /// One-line installation hint shown when backend selection fails.
    fn install_hint(&self) -> &'static str;

    /// Cheap no-op capability call used by the selection registry.
    ///
    /// Default probes by listing panes; backends that work without a live
    /// server override this with something weaker (e.g. a version check).
    fn probe(&self) -> Result<(), TerminalError> {
        self.list_panes().map(|_| ())
    }

    /// Spawn a new pane running `startup_command`, returning its id.
    fn create_pane(
        &self,
        name: &str,
        startup_command: &str,
        opts: &SpawnOptions,
    ) -> Result<String, TerminalError>;

    /// Close a pane. Idempotent: closing an already-dead pane succeeds.
    fn close_pane(&self, pane_id: &str) -> Result<(), TerminalError>;

    /// List known panes. May include panes created by other processes when
    /// the backend is shared; every entry carries a parseable pane id.
    fn list_panes(&self) -> Result<Vec<PaneInfo>, TerminalError>;

    /// Deliver `text` into the pane as though typed by a user.
    ///
    /// Multi-line content is delivered as one bracketed paste, followed by
    /// exactly one real Enter keystroke. `\r\n` is normalized to `\n` and
    /// trailing newlines are stripped before the final Enter.
    fn inject_text(&self, pane_id: &str, text: &str) -> Result<(), TerminalError>;

    /// Send a whitespace-separated sequence of symbolic keys
    /// (`Enter`, `Tab`, `Esc`, `C-x`, `M-x`, printable characters).
    fn send_keys(&self, pane_id: &str, keys: &str) -> Result<(), TerminalError>;

    /// Whether the pane still exists.
    fn is_pane_alive(&self, pane_id: &str) -> Result<bool, TerminalError>;

    /// Last `lines` lines of visible scrollback. Backends may saturate at
    /// their own scrollback limit; backends without output access fail with
    /// `TerminalError::Unsupported`.
    fn pane_output(&self, pane_id: &str, lines: usize) -> Result<String, TerminalError>;
}
