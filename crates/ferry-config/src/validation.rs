//! Configuration validation.

use crate::errors::ConfigError;
use crate::types::FerryConfig;

/// Valid terminal backend names.
pub const VALID_BACKENDS: [&str; 4] = ["tmux", "wezterm", "windows-terminal", "auto"];

/// Valid pane layout names.
pub const VALID_PANE_LAYOUTS: [&str; 3] = ["horizontal", "vertical", "grid"];

/// Valid log levels.
pub const VALID_LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

const MAX_RETRIES_LIMIT: u32 = 10;
const MIN_REQUEST_TIMEOUT_MS: u64 = 1000;

/// Validate a config, returning the first problem found.
pub fn validate_config(config: &FerryConfig) -> Result<(), ConfigError> {
    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "invalid log_level '{}'. Valid options: {}",
                config.log_level,
                VALID_LOG_LEVELS.join(", ")
            ),
        });
    }

    if !VALID_BACKENDS.contains(&config.terminal.backend.as_str()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "invalid terminal backend '{}'. Valid options: {}",
                config.terminal.backend,
                VALID_BACKENDS.join(", ")
            ),
        });
    }

    if !VALID_PANE_LAYOUTS.contains(&config.terminal.pane_layout.as_str()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "invalid pane_layout '{}'. Valid options: {}",
                config.terminal.pane_layout,
                VALID_PANE_LAYOUTS.join(", ")
            ),
        });
    }

    validate_daemon_limits(
        "daemon",
        config.daemon.max_retries,
        config.daemon.request_timeout_ms,
    )?;

    let mut seen = std::collections::HashSet::new();
    for entry in &config.ais {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "AI entries must have a non-empty name".to_string(),
            });
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::Invalid {
                message: format!("duplicate AI name '{}'", entry.name),
            });
        }
        validate_daemon_limits(
            &entry.name,
            entry.max_retries.unwrap_or(config.daemon.max_retries),
            entry
                .request_timeout_ms
                .unwrap_or(config.daemon.request_timeout_ms),
        )?;
    }

    Ok(())
}

fn validate_daemon_limits(
    scope: &str,
    max_retries: u32,
    request_timeout_ms: u64,
) -> Result<(), ConfigError> {
    if max_retries > MAX_RETRIES_LIMIT {
        return Err(ConfigError::Invalid {
            message: format!(
                "{scope}: max_retries {max_retries} exceeds the limit of {MAX_RETRIES_LIMIT}"
            ),
        });
    }
    if request_timeout_ms < MIN_REQUEST_TIMEOUT_MS {
        return Err(ConfigError::Invalid {
            message: format!(
                "{scope}: request_timeout_ms {request_timeout_ms} is below the minimum of {MIN_REQUEST_TIMEOUT_MS}"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AiEntry;

    fn ai(name: &str) -> AiEntry {
        AiEntry {
            name: name.to_string(),
            command: None,
            args: vec![],
            project_path: None,
            idle_timeout_ms: None,
            max_retries: None,
            request_timeout_ms: None,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&FerryConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let mut config = FerryConfig::default();
        config.terminal.backend = "kitty".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("kitty"));
        assert!(err.to_string().contains("tmux"));
    }

    #[test]
    fn test_invalid_pane_layout_rejected() {
        let mut config = FerryConfig::default();
        config.terminal.pane_layout = "stacked".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = FerryConfig::default();
        config.log_level = "trace".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_retry_limit_enforced() {
        let mut config = FerryConfig::default();
        config.daemon.max_retries = 11;
        assert!(validate_config(&config).is_err());
        config.daemon.max_retries = 10;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_request_timeout_minimum() {
        let mut config = FerryConfig::default();
        config.daemon.request_timeout_ms = 999;
        assert!(validate_config(&config).is_err());
        config.daemon.request_timeout_ms = 1000;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_per_ai_overrides_validated() {
        let mut config = FerryConfig::default();
        let mut entry = ai("claude");
        entry.request_timeout_ms = Some(10);
        config.ais.push(entry);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("claude"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = FerryConfig::default();
        config.ais.push(ai("claude"));
        config.ais.push(ai("claude"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut config = FerryConfig::default();
        config.ais.push(ai("  "));
        assert!(validate_config(&config).is_err());
    }
}
