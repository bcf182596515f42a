//! Response capture sources.
//!
//! A daemon owns exactly one capture source: log-backed for secondary AIs
//! that persist a session log, pane-scrape for those that do not. The
//! log-backed source can additionally carry a scrape fallback so the pane
//! covers the gap when the log lags behind the screen.

mod log;
mod scrape;

pub use log::LogSource;
pub use scrape::ScrapeSource;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::terminal::TerminalBackend;

use super::errors::DaemonError;
use super::types::Captured;

/// The pane a source may read from.
#[derive(Clone)]
pub struct PaneHandle {
    pub terminal: Arc<dyn TerminalBackend>,
    pub pane_id: String,
}

/// One daemon's capture strategy.
pub enum CaptureSource {
    Log(LogSource),
    Scrape(ScrapeSource),
}

impl CaptureSource {
    /// Called once when the daemon starts: resolve the session and install
    /// a watcher where the strategy needs one. Returns the session id to
    /// persist, if any.
    pub fn on_started(
        &mut self,
        project_path: Option<&Path>,
        persisted_session: Option<String>,
    ) -> Result<Option<String>, DaemonError> {
        match self {
            CaptureSource::Log(source) => source.start(project_path, persisted_session),
            CaptureSource::Scrape(_) => Ok(None),
        }
    }

    /// Called at the start of every send attempt.
    pub fn begin_attempt(&mut self, message: &str) {
        match self {
            CaptureSource::Log(source) => source.begin(message),
            CaptureSource::Scrape(source) => source.begin(message),
        }
    }

    /// One response poll. `None` while the AI is still working.
    pub fn check(&mut self, pane: Option<&PaneHandle>) -> Result<Option<Captured>, DaemonError> {
        match self {
            CaptureSource::Log(source) => source.check(pane),
            CaptureSource::Scrape(source) => match pane {
                Some(pane) => source.check(pane),
                None => Err(DaemonError::NotRunning),
            },
        }
    }

    /// The session id currently bound, if the strategy tracks one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            CaptureSource::Log(source) => source.session_id(),
            CaptureSource::Scrape(_) => None,
        }
    }

    /// The project path the source resolves sessions against.
    pub fn project_path(&self) -> Option<PathBuf> {
        match self {
            CaptureSource::Log(source) => source.project_path(),
            CaptureSource::Scrape(_) => None,
        }
    }

    /// Release watcher resources.
    pub fn close(&mut self) {
        if let CaptureSource::Log(source) = self {
            source.close();
        }
    }
}
