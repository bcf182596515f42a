//! Log-backed capture source.
//!
//! A storage adapter plus a watcher keep a message cache fresh; a poll
//! returns the newest assistant message exactly once, deduplicated by
//! `(id, content)`. When the session cannot be found (sessions rotate), the
//! source re-resolves once per attempt. An optional pane-scrape fallback
//! covers secondary AIs whose log lags behind their screen.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::daemon::errors::DaemonError;
use crate::daemon::types::Captured;
use crate::storage::{Message, SessionWatcher, StorageAdapter};

use super::{PaneHandle, ScrapeSource};

/// Prefix marking a response recovered from the pane instead of the log.
const PANE_FALLBACK_TAG: &str = "[From terminal output]";

pub struct LogSource {
    adapter: Arc<dyn StorageAdapter>,
    project_path: Option<PathBuf>,
    session_id: Option<String>,
    cache: Arc<RwLock<Vec<Message>>>,
    watcher: Option<SessionWatcher>,
    /// `(id, content)` of the last emitted response.
    last_seen: Option<(String, String)>,
    fallback: Option<ScrapeSource>,
    /// One session re-resolution allowed per attempt.
    resolved_this_attempt: bool,
    /// Pane text held back one poll cycle so the log can catch up.
    pane_text_pending: Option<String>,
}

impl LogSource {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            project_path: None,
            session_id: None,
            cache: Arc::new(RwLock::new(Vec::new())),
            watcher: None,
            last_seen: None,
            fallback: None,
            resolved_this_attempt: false,
            pane_text_pending: None,
        }
    }

    /// Attach a pane-scrape fallback for the storage-first composition.
    pub fn with_scrape_fallback(mut self, fallback: ScrapeSource) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn project_path(&self) -> Option<PathBuf> {
        self.project_path.clone()
    }

    /// Resolve the session and install the watcher. The persisted session
    /// id wins over a fresh resolution so a restarted daemon rebinds to the
    /// session it was using before.
    pub fn start(
        &mut self,
        project_path: Option<&Path>,
        persisted_session: Option<String>,
    ) -> Result<Option<String>, DaemonError> {
        self.project_path = project_path.map(Path::to_path_buf);

        let session_id = match persisted_session {
            Some(id) => Some(id),
            None => match project_path {
                Some(path) => self.adapter.resolve_session(path)?,
                None => None,
            },
        };

        if let Some(id) = &session_id {
            self.bind_session(id.clone());
        } else {
            debug!(event = "core.daemon.log_source_no_session_yet");
        }

        Ok(session_id)
    }

    /// Point cache and watcher at a session.
    fn bind_session(&mut self, session_id: String) {
        if let Some(watcher) = self.watcher.take() {
            watcher.close();
        }

        // Synchronous first read so the cache is valid before the watcher's
        // initial tick.
        match self.adapter.read_session(&session_id) {
            Ok(messages) => *write_lock(&self.cache) = messages,
            Err(e) => {
                warn!(
                    event = "core.daemon.log_source_initial_read_failed",
                    session_id = %session_id,
                    error = %e,
                );
            }
        }

        let cache = Arc::clone(&self.cache);
        self.watcher = Some(SessionWatcher::spawn(
            Arc::clone(&self.adapter),
            session_id.clone(),
            Arc::new(move |messages| {
                *write_lock(&cache) = messages;
            }),
        ));

        debug!(event = "core.daemon.log_source_bound", session_id = %session_id);
        self.session_id = Some(session_id);
    }

    /// Reset per-attempt state.
    pub fn begin(&mut self, message: &str) {
        self.resolved_this_attempt = false;
        self.pane_text_pending = None;

        if let Some(fallback) = &mut self.fallback {
            fallback.begin(message);
        }
    }

    pub fn check(&mut self, pane: Option<&PaneHandle>) -> Result<Option<Captured>, DaemonError> {
        if let Some(captured) = self.check_adapter()? {
            self.pane_text_pending = None;
            return Ok(Some(captured));
        }

        // The pane said the AI finished a cycle ago and the log still has
        // nothing new: surface the scraped text as a last resort.
        if let Some(text) = self.pane_text_pending.take() {
            debug!(event = "core.daemon.log_source_pane_fallback_used");
            return Ok(Some(Captured {
                message_id: None,
                text: format!("{PANE_FALLBACK_TAG}\n{text}"),
                timestamp: chrono::Utc::now(),
            }));
        }

        // No assistant message at all: the session may have rotated since
        // start. Re-resolve once per attempt and retry the read.
        if self.session_has_no_assistant() && !self.resolved_this_attempt {
            self.resolved_this_attempt = true;
            if let Some(project) = self.project_path.clone()
                && let Ok(Some(resolved)) = self.adapter.resolve_session(&project)
                && Some(resolved.as_str()) != self.session_id.as_deref()
            {
                debug!(
                    event = "core.daemon.log_source_session_rotated",
                    new_session = %resolved,
                );
                self.bind_session(resolved);
                if let Some(captured) = self.check_adapter()? {
                    return Ok(Some(captured));
                }
            }
        }

        // Storage-first composition: consult the pane only after the
        // adapter came up empty.
        if let (Some(fallback), Some(pane)) = (&mut self.fallback, pane)
            && let Some(captured) = fallback.check(pane)?
        {
            debug!(event = "core.daemon.log_source_pane_fallback_pending");
            self.pane_text_pending = Some(captured.text);
        }

        Ok(None)
    }

    fn check_adapter(&mut self) -> Result<Option<Captured>, DaemonError> {
        // Without a live watcher the cache would go stale; re-read instead.
        if self.watcher.is_none()
            && let Some(session_id) = &self.session_id
        {
            *write_lock(&self.cache) = self.adapter.read_session(session_id)?;
        }

        let cache = read_lock(&self.cache);
        let Some(latest) = Message::latest_assistant(&cache) else {
            return Ok(None);
        };

        let pair = (latest.id.clone(), latest.content.clone());
        if self.last_seen.as_ref() == Some(&pair) {
            return Ok(None);
        }

        let captured = Captured {
            message_id: Some(latest.id.clone()),
            text: latest.content.clone(),
            timestamp: latest.timestamp,
        };
        drop(cache);
        self.last_seen = Some(pair);
        Ok(Some(captured))
    }

    fn session_has_no_assistant(&self) -> bool {
        Message::latest_assistant(&read_lock(&self.cache)).is_none()
    }

    pub fn close(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.close();
        }
    }
}

/// Poison-tolerant lock helpers: a panicked watcher callback must not take
/// the daemon down with it.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}
