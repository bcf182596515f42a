#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    ReadFailed { path: String, message: String },

    #[error("failed to parse config file '{path}': {message}")]
    ParseFailed { path: String, message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::ReadFailed { .. } => "config_read_failed",
            ConfigError::ParseFailed { .. } => "config_parse_failed",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }

    /// Whether the user can fix this by editing the file.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ConfigError::ParseFailed { .. } | ConfigError::Invalid { .. }
        )
    }
}
