use crate::daemon::DaemonError;
use crate::terminal::TerminalError;

/// All error types for the bridge orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("unknown AI '{name}'")]
    UnknownAi { name: String },

    #[error("AI '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("no daemon factory for '{name}' (tried base name '{base}')")]
    NoFactory { name: String, base: String },

    #[error("orchestrator is not running")]
    NotRunning,

    #[error("daemon error: {0}")]
    Daemon(#[from] DaemonError),

    #[error("terminal error: {0}")]
    Terminal(#[from] TerminalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::UnknownAi { .. } => "unknown_ai",
            BridgeError::AlreadyRegistered { .. } => "already_registered",
            BridgeError::NoFactory { .. } => "no_factory",
            BridgeError::NotRunning => "not_running",
            BridgeError::Daemon(_) => "daemon_error",
            BridgeError::Terminal(_) => "terminal_error",
            BridgeError::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::UnknownAi {
            name: "ghost".to_string(),
        };
        assert_eq!(err.to_string(), "unknown AI 'ghost'");
        assert_eq!(err.error_code(), "unknown_ai");
    }

    #[test]
    fn test_no_factory_names_base() {
        let err = BridgeError::NoFactory {
            name: "cc:2".to_string(),
            base: "cc".to_string(),
        };
        assert!(err.to_string().contains("cc:2"));
        assert!(err.to_string().contains("'cc'"));
    }
}
