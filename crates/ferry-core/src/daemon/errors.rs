use crate::ipc::IpcError;
use crate::storage::StorageError;
use crate::terminal::TerminalError;

/// All error types for the daemon subsystem.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("secondary CLI '{command}' is not installed: {message}")]
    InstallationMissing { command: String, message: String },

    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("injected text was never submitted")]
    StuckInput,

    #[error("secondary AI reported an error: {line}")]
    AgentError { line: String },

    #[error("daemon failed to start: {message}")]
    StartFailed { message: String },

    #[error("daemon is not running")]
    NotRunning,

    #[error("terminal error: {0}")]
    Terminal(#[from] TerminalError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DaemonError {
    /// Error code string for event payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            DaemonError::InstallationMissing { .. } => "installation_missing",
            DaemonError::Timeout { .. } => "timeout",
            DaemonError::StuckInput => "stuck_input",
            DaemonError::AgentError { .. } => "agent_error",
            DaemonError::StartFailed { .. } => "start_failed",
            DaemonError::NotRunning => "not_running",
            DaemonError::Terminal(_) => "terminal_error",
            DaemonError::Storage(_) => "storage_error",
            DaemonError::Ipc(_) => "ipc_error",
            DaemonError::Io(_) => "io_error",
            DaemonError::Serde(_) => "serialization_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaemonError::InstallationMissing {
            command: "claude".to_string(),
            message: "not found on PATH".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "secondary CLI 'claude' is not installed: not found on PATH"
        );
        assert_eq!(err.error_code(), "installation_missing");
    }

    #[test]
    fn test_retriable_codes_are_distinct() {
        // Timeout and stuck-input are the two retriable attempt failures;
        // their codes must stay distinguishable on error events.
        assert_eq!(DaemonError::Timeout { timeout_ms: 500 }.error_code(), "timeout");
        assert_eq!(DaemonError::StuckInput.error_code(), "stuck_input");
    }

    #[test]
    fn test_conversions() {
        let terminal: DaemonError = TerminalError::SpawnFailed {
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(terminal.error_code(), "terminal_error");

        let io: DaemonError = std::io::Error::new(std::io::ErrorKind::Other, "x").into();
        assert_eq!(io.error_code(), "io_error");
    }
}
