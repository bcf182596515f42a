//! Bridge-level type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::daemon::{DaemonStatus, ErrorCause};

/// Lifecycle of one tracked request as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Queued,
    Processing,
    Completed,
    Error,
    /// Returned for ids the bridge has never seen.
    Unknown,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Error => "error",
            RequestStatus::Unknown => "unknown",
        }
    }

    /// Whether the request has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Error)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal tracking record for one delegated request.
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    pub ai_name: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub error: Option<ErrorCause>,
}

impl TrackedRequest {
    pub fn queued(ai_name: impl Into<String>) -> Self {
        Self {
            ai_name: ai_name.into(),
            status: RequestStatus::Queued,
            created_at: Utc::now(),
            completed_at: None,
            content: None,
            error: None,
        }
    }
}

/// A completed delegation handed back to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub request_id: String,
    pub ai_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// Coarse daemon health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Degraded => "degraded",
            Health::Unhealthy => "unhealthy",
        }
    }
}

/// The queue depth at which a running daemon stops being `Healthy`.
pub const HEALTHY_QUEUE_LIMIT: usize = 5;

/// Result of `ping`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub ai_name: String,
    pub health: Health,
    pub daemon_status: DaemonStatus,
    pub queue_length: usize,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthStatus {
    /// Apply the health classification rules to a daemon snapshot.
    pub fn classify(daemon_status: DaemonStatus, queue_length: usize) -> (Health, Option<String>) {
        match daemon_status {
            DaemonStatus::Running if queue_length < HEALTHY_QUEUE_LIMIT => (Health::Healthy, None),
            DaemonStatus::Running => (
                Health::Degraded,
                Some("queue depth exceeds healthy threshold".to_string()),
            ),
            DaemonStatus::Starting => (
                Health::Degraded,
                Some("daemon is still starting".to_string()),
            ),
            _ => (Health::Unhealthy, None),
        }
    }
}

/// One row of `list_ais`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiStatus {
    pub name: String,
    pub status: DaemonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_request: Option<String>,
    pub queue_length: usize,
    pub last_activity: DateTime<Utc>,
}

/// Orchestrator-wide snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub running: bool,
    pub bridge_session_id: String,
    pub ai_count: usize,
    pub total_queued: usize,
    pub tracked_requests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_status_terminal() {
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Error.is_terminal());
        assert!(!RequestStatus::Queued.is_terminal());
        assert!(!RequestStatus::Processing.is_terminal());
        assert!(!RequestStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_health_classification() {
        let (health, detail) = HealthStatus::classify(DaemonStatus::Running, 0);
        assert_eq!(health, Health::Healthy);
        assert!(detail.is_none());

        let (health, detail) = HealthStatus::classify(DaemonStatus::Running, HEALTHY_QUEUE_LIMIT);
        assert_eq!(health, Health::Degraded);
        assert_eq!(detail.as_deref(), Some("queue depth exceeds healthy threshold"));

        let (health, detail) = HealthStatus::classify(DaemonStatus::Starting, 0);
        assert_eq!(health, Health::Degraded);
        assert_eq!(detail.as_deref(), Some("daemon is still starting"));

        for status in [DaemonStatus::Stopped, DaemonStatus::Stopping, DaemonStatus::Error] {
            let (health, _) = HealthStatus::classify(status, 0);
            assert_eq!(health, Health::Unhealthy);
        }
    }

    #[test]
    fn test_tracked_request_starts_queued() {
        let tracked = TrackedRequest::queued("alpha");
        assert_eq!(tracked.status, RequestStatus::Queued);
        assert!(tracked.completed_at.is_none());
        assert!(tracked.content.is_none());
    }
}
