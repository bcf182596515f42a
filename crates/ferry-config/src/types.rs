//! TOML configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration, assembled from the file hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    /// Runtime directory for daemon state and IPC endpoints. Defaults to a
    /// per-user directory under the system temp dir.
    pub run_dir: Option<PathBuf>,
    /// Diagnostic verbosity: debug, info, warn, error.
    pub log_level: String,
    pub terminal: TerminalSettings,
    pub daemon: DaemonSettings,
    /// AIs registered at startup.
    pub ais: Vec<AiEntry>,
}

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            run_dir: None,
            log_level: "info".to_string(),
            terminal: TerminalSettings::default(),
            daemon: DaemonSettings::default(),
            ais: Vec::new(),
        }
    }
}

impl FerryConfig {
    /// The effective runtime directory.
    pub fn effective_run_dir(&self) -> PathBuf {
        self.run_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ferry"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    /// tmux, wezterm, windows-terminal, or auto.
    pub backend: String,
    pub auto_create_panes: bool,
    /// horizontal, vertical, or grid.
    pub pane_layout: String,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            auto_create_panes: true,
            pane_layout: "vertical".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Zero means the built-in 60 s default.
    pub idle_timeout_ms: u64,
    pub max_retries: u32,
    pub request_timeout_ms: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 0,
            max_retries: 2,
            request_timeout_ms: 30_000,
        }
    }
}

/// One AI to register at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiEntry {
    pub name: String,
    /// CLI executable; defaults to the base name before any `:` suffix.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    /// Per-AI overrides of the `[daemon]` defaults.
    #[serde(default)]
    pub idle_timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl AiEntry {
    /// The CLI command with the base-name default applied.
    pub fn effective_command(&self) -> String {
        match &self.command {
            Some(command) => command.clone(),
            None => self
                .name
                .split_once(':')
                .map(|(base, _)| base)
                .unwrap_or(&self.name)
                .to_string(),
        }
    }
}
