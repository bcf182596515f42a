//! Configuration loading and merging.
//!
//! Configuration is assembled from (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. User config: `~/.ferry/config.toml`
//! 3. Project config: `./.ferry/config.toml`
//!
//! Missing files are not errors; unreadable or invalid ones are.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::ConfigError;
use crate::types::{AiEntry, DaemonSettings, FerryConfig, TerminalSettings};
use crate::validation::validate_config;

/// A partially-specified config file. Sections a file leaves out do not
/// override the layer below it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    run_dir: Option<PathBuf>,
    log_level: Option<String>,
    terminal: Option<TerminalSettings>,
    daemon: Option<DaemonSettings>,
    ais: Option<Vec<AiEntry>>,
}

/// Load and validate the full hierarchy.
pub fn load_hierarchy() -> Result<FerryConfig, ConfigError> {
    let mut config = FerryConfig::default();

    if let Some(home) = dirs::home_dir() {
        let path = home.join(".ferry").join("config.toml");
        if let Some(file) = load_config_file(&path)? {
            debug!(event = "config.layer_merged", layer = "user", path = %path.display());
            merge(&mut config, file);
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join(".ferry").join("config.toml");
        if let Some(file) = load_config_file(&path)? {
            debug!(event = "config.layer_merged", layer = "project", path = %path.display());
            merge(&mut config, file);
        }
    }

    validate_config(&config).inspect_err(|e| {
        warn!(event = "config.validation_failed", error = %e);
    })?;
    Ok(config)
}

/// Load and validate one explicit config file.
pub fn load_file(path: &Path) -> Result<FerryConfig, ConfigError> {
    let file = load_config_file(path)?.ok_or_else(|| ConfigError::ReadFailed {
        path: path.display().to_string(),
        message: "file not found".to_string(),
    })?;

    let mut config = FerryConfig::default();
    merge(&mut config, file);
    validate_config(&config)?;
    Ok(config)
}

/// Read one file; `Ok(None)` when it does not exist.
fn load_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            warn!(event = "config.read_failed", path = %path.display(), error = %e);
            return Err(ConfigError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    let file: ConfigFile = toml::from_str(&content).map_err(|e| {
        warn!(event = "config.parse_failed", path = %path.display(), error = %e);
        ConfigError::ParseFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })?;
    Ok(Some(file))
}

/// Overlay one file's specified sections onto the accumulated config.
fn merge(config: &mut FerryConfig, file: ConfigFile) {
    if let Some(run_dir) = file.run_dir {
        config.run_dir = Some(run_dir);
    }
    if let Some(log_level) = file.log_level {
        config.log_level = log_level;
    }
    if let Some(terminal) = file.terminal {
        config.terminal = terminal;
    }
    if let Some(daemon) = file.daemon {
        config.daemon = daemon;
    }
    if let Some(ais) = file.ais {
        config.ais = ais;
    }
}
