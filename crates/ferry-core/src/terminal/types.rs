//! Terminal backend type definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported terminal backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalKind {
    Tmux,
    WezTerm,
    WindowsTerminal,
}

impl TerminalKind {
    /// Get the canonical string name for this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalKind::Tmux => "tmux",
            TerminalKind::WezTerm => "wezterm",
            TerminalKind::WindowsTerminal => "windows-terminal",
        }
    }

    /// Parse a backend kind from a string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tmux" => Some(TerminalKind::Tmux),
            "wezterm" => Some(TerminalKind::WezTerm),
            "windows-terminal" | "wt" => Some(TerminalKind::WindowsTerminal),
            _ => None,
        }
    }

    /// Get all supported backend kinds.
    pub fn all() -> &'static [TerminalKind] {
        &[
            TerminalKind::Tmux,
            TerminalKind::WezTerm,
            TerminalKind::WindowsTerminal,
        ]
    }
}

impl std::fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a new pane is placed relative to existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitDirection {
    Horizontal,
    Vertical,
    #[default]
    NewWindow,
}

impl SplitDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitDirection::Horizontal => "horizontal",
            SplitDirection::Vertical => "vertical",
            SplitDirection::NewWindow => "new-window",
        }
    }
}

/// Options for spawning a new pane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnOptions {
    /// Working directory for the spawned command.
    pub working_directory: Option<PathBuf>,
    /// Placement relative to `target_pane` (or the current window).
    pub split: SplitDirection,
    /// Pane to split from. Ignored for `SplitDirection::NewWindow`.
    pub target_pane: Option<String>,
    /// Split size as a percentage of the target pane.
    pub percent: Option<u8>,
}

impl SpawnOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_split(mut self, split: SplitDirection) -> Self {
        self.split = split;
        self
    }

    pub fn with_target_pane(mut self, pane_id: impl Into<String>) -> Self {
        self.target_pane = Some(pane_id.into());
        self
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent = Some(percent);
        self
    }
}

/// A pane known to a terminal backend.
///
/// `id` is backend-specific and opaque to callers; it is only ever passed
/// back into the same backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaneInfo {
    pub id: String,
    pub name: String,
    pub command: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_kind_as_str() {
        assert_eq!(TerminalKind::Tmux.as_str(), "tmux");
        assert_eq!(TerminalKind::WezTerm.as_str(), "wezterm");
        assert_eq!(TerminalKind::WindowsTerminal.as_str(), "windows-terminal");
    }

    #[test]
    fn test_terminal_kind_parse() {
        assert_eq!(TerminalKind::parse("tmux"), Some(TerminalKind::Tmux));
        assert_eq!(TerminalKind::parse("WezTerm"), Some(TerminalKind::WezTerm));
        assert_eq!(
            TerminalKind::parse("windows-terminal"),
            Some(TerminalKind::WindowsTerminal)
        );
        assert_eq!(TerminalKind::parse("wt"), Some(TerminalKind::WindowsTerminal));
        assert_eq!(TerminalKind::parse("unknown"), None);
        assert_eq!(TerminalKind::parse(""), None);
    }

    #[test]
    fn test_terminal_kind_all_round_trips() {
        for kind in TerminalKind::all() {
            assert_eq!(TerminalKind::parse(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn test_split_direction_default_is_new_window() {
        assert_eq!(SplitDirection::default(), SplitDirection::NewWindow);
    }

    #[test]
    fn test_spawn_options_builder() {
        let opts = SpawnOptions::new()
            .with_working_directory("/tmp/project")
            .with_split(SplitDirection::Horizontal)
            .with_target_pane("%3")
            .with_percent(40);
        assert_eq!(opts.working_directory, Some(PathBuf::from("/tmp/project")));
        assert_eq!(opts.split, SplitDirection::Horizontal);
        assert_eq!(opts.target_pane.as_deref(), Some("%3"));
        assert_eq!(opts.percent, Some(40));
    }

    #[test]
    fn test_pane_info_serde_roundtrip() {
        let info = PaneInfo {
            id: "%1".to_string(),
            name: "ferry-claude".to_string(),
            command: "claude".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&info).unwrap();
        let parsed: PaneInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, parsed);
    }
}
