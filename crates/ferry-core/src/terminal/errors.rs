/// All error types for the terminal subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("terminal backend '{backend}' is not available: {message}")]
    BackendNotAvailable {
        backend: &'static str,
        message: String,
    },

    #[error("failed to spawn pane: {message}")]
    SpawnFailed { message: String },

    #[error("terminal command failed: {message}")]
    CommandFailed { message: String },

    #[error("pane '{pane_id}' not found")]
    PaneNotFound { pane_id: String },

    #[error("'{operation}' is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("no terminal backend available:\n{}", .diagnostics.join("\n"))]
    NoBackendAvailable { diagnostics: Vec<String> },

    #[error("invalid key token '{token}'")]
    InvalidKey { token: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TerminalError {
    /// Error code string for event payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            TerminalError::BackendNotAvailable { .. } => "backend_not_available",
            TerminalError::SpawnFailed { .. } => "spawn_failed",
            TerminalError::CommandFailed { .. } => "command_failed",
            TerminalError::PaneNotFound { .. } => "pane_not_found",
            TerminalError::Unsupported { .. } => "unsupported",
            TerminalError::NoBackendAvailable { .. } => "no_backend_available",
            TerminalError::InvalidKey { .. } => "invalid_key",
            TerminalError::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TerminalError::SpawnFailed {
            message: "tmux exited with code 1".to_string(),
        };
        assert_eq!(err.to_string(), "failed to spawn pane: tmux exited with code 1");
        assert_eq!(err.error_code(), "spawn_failed");
    }

    #[test]
    fn test_no_backend_available_lists_diagnostics() {
        let err = TerminalError::NoBackendAvailable {
            diagnostics: vec![
                "tmux: not installed (install via your package manager)".to_string(),
                "wezterm: not installed (https://wezterm.org/installation)".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("tmux: not installed"));
        assert!(msg.contains("wezterm: not installed"));
        assert_eq!(err.error_code(), "no_backend_available");
    }

    #[test]
    fn test_unsupported_names_backend_and_operation() {
        let err = TerminalError::Unsupported {
            backend: "windows-terminal",
            operation: "pane_output",
        };
        assert_eq!(
            err.to_string(),
            "'pane_output' is not supported by the windows-terminal backend"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: TerminalError = io_err.into();
        assert_eq!(err.error_code(), "io_error");
    }
}
