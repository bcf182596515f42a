//! Per-AI daemon supervision.
//!
//! An [`AiDaemon`] owns one secondary AI: the pane it lives in, the queue
//! of requests addressed to it, the capture source that recovers its
//! answers, and the idle timer that tears it down when nobody is talking
//! to it. Consumers observe daemons exclusively through [`DaemonEvent`]s.

pub mod errors;
pub mod events;
pub mod queue;
pub mod sources;
pub mod state_file;
pub mod supervisor;
pub mod types;

pub use errors::DaemonError;
pub use events::{DaemonEvent, ErrorCause, EventBus};
pub use sources::{CaptureSource, LogSource, PaneHandle, ScrapeSource};
pub use state_file::DaemonStateFile;
pub use supervisor::{AiDaemon, DaemonRuntime};
pub use types::{AiConfig, Captured, DaemonStatus, Priority, QueuedRequest, Request};
