//! Daemon type definitions and core data structures.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::terminal::SpawnOptions;

/// Default idle timeout applied when a config leaves it at zero.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 60_000;

/// Request priority. Lower weight wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn weight(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" => Some(Priority::High),
            "normal" => Some(Priority::Normal),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// One inbound unit of work. Immutable once queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub message: String,
    /// Optional context prepended to the message with a blank line.
    pub context: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

impl Request {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            priority: Priority::Normal,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// The text actually delivered to the secondary AI.
    pub fn serialized_message(&self) -> String {
        match &self.context {
            Some(context) => format!("{}\n\n{}", context, self.message),
            None => self.message.clone(),
        }
    }
}

/// A queued request with its assigned id and enqueue timestamp.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub id: String,
    pub request: Request,
    pub enqueued_at: DateTime<Utc>,
    /// Insertion counter breaking timestamp ties deterministically.
    pub(crate) seq: u64,
}

/// Daemon lifecycle state.
///
/// `Error` is terminal: a daemon that failed to start stays failed until it
/// is unregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl DaemonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonStatus::Stopped => "stopped",
            DaemonStatus::Starting => "starting",
            DaemonStatus::Running => "running",
            DaemonStatus::Stopping => "stopping",
            DaemonStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static per-AI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    pub name: String,
    /// The secondary AI's CLI executable.
    pub cli_command: String,
    #[serde(default)]
    pub cli_args: Vec<String>,
    /// Zero means the 60 s default.
    #[serde(default)]
    pub idle_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    /// Project the AI works on; used for session resolution and as the
    /// pane's default working directory.
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    /// Pane placement preferences.
    #[serde(skip)]
    pub pane: SpawnOptions,
}

impl AiConfig {
    pub fn new(name: impl Into<String>, cli_command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cli_command: cli_command.into(),
            cli_args: Vec::new(),
            idle_timeout_ms: 0,
            request_timeout_ms: 30_000,
            max_retries: 2,
            project_path: None,
            pane: SpawnOptions::default(),
        }
    }

    /// Idle timeout with the zero-means-default rule applied.
    pub fn effective_idle_timeout_ms(&self) -> u64 {
        if self.idle_timeout_ms == 0 {
            DEFAULT_IDLE_TIMEOUT_MS
        } else {
            self.idle_timeout_ms
        }
    }

    /// The full startup command line for the pane.
    pub fn command_line(&self) -> String {
        use crate::terminal::text::shell_quote;

        let mut parts = vec![shell_quote(&self.cli_command)];
        parts.extend(self.cli_args.iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

/// A response captured from a secondary AI.
#[derive(Debug, Clone, PartialEq)]
pub struct Captured {
    /// Source message id when the response came from a storage adapter.
    pub message_id: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_weights() {
        assert_eq!(Priority::High.weight(), 0);
        assert_eq!(Priority::Normal.weight(), 1);
        assert_eq!(Priority::Low.weight(), 2);
    }

    #[test]
    fn test_priority_default_is_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("high"), Some(Priority::High));
        assert_eq!(Priority::parse("NORMAL"), Some(Priority::Normal));
        assert_eq!(Priority::parse("low"), Some(Priority::Low));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn test_request_serialized_message_with_context() {
        let req = Request::new("do the task").with_context("you are reviewing PR 7");
        assert_eq!(
            req.serialized_message(),
            "you are reviewing PR 7\n\ndo the task"
        );
    }

    #[test]
    fn test_request_serialized_message_without_context() {
        assert_eq!(Request::new("just this").serialized_message(), "just this");
    }

    #[test]
    fn test_request_priority_serde_default() {
        let req: Request = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.priority, Priority::Normal);
        assert!(req.context.is_none());
    }

    #[test]
    fn test_daemon_status_display() {
        assert_eq!(DaemonStatus::Running.to_string(), "running");
        assert_eq!(DaemonStatus::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_effective_idle_timeout_zero_is_default() {
        let mut cfg = AiConfig::new("alpha", "claude");
        assert_eq!(cfg.effective_idle_timeout_ms(), DEFAULT_IDLE_TIMEOUT_MS);
        cfg.idle_timeout_ms = 200;
        assert_eq!(cfg.effective_idle_timeout_ms(), 200);
    }

    #[test]
    fn test_command_line_quotes_args() {
        let mut cfg = AiConfig::new("alpha", "claude");
        cfg.cli_args = vec!["--model".to_string(), "opus 4".to_string()];
        assert_eq!(cfg.command_line(), "claude --model 'opus 4'");
    }
}
