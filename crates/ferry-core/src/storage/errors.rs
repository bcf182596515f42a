/// All error types for the storage subsystem.
///
/// Unparseable individual records are skipped rather than surfaced, so
/// `Parse` only appears when an entire structure is unreadable.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to parse session data: {message}")]
    Parse { message: String },

    #[error("file watcher failed: {message}")]
    WatcherFailed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Parse { .. } => "parse_error",
            StorageError::WatcherFailed { .. } => "watcher_failed",
            StorageError::Io(_) => "io_error",
        }
    }
}
