//! Pane-scrape capture source.
//!
//! Runs the activity state machine against the pane's scrollback each poll.
//! A candidate response must read back identically on two consecutive polls
//! before it is accepted, so an intermediate render is never returned.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::debug;

use crate::capture::{ActivityTracker, CaptureExit, ExtractOptions, IndicatorCatalog, extract_response};
use crate::daemon::errors::DaemonError;
use crate::daemon::types::Captured;
use crate::terminal::TerminalKind;

use super::PaneHandle;

/// Scrollback lines fetched per poll.
const SCROLLBACK_LINES: usize = 80;

/// Minimum spacing between two real pane reads. The daemon polls faster;
/// intermediate calls return `None` without touching the pane.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Watching for the processing→idle transition.
    Tracking,
    /// Prompt is back; waiting for the extracted text to stabilize.
    Confirming,
}

pub struct ScrapeSource {
    catalog: IndicatorCatalog,
    extract_opts: ExtractOptions,
    poll_interval: Duration,
    tracker: ActivityTracker,
    sent_message: String,
    phase: Phase,
    pending: Option<String>,
    last_poll: Option<Instant>,
}

impl ScrapeSource {
    pub fn new(catalog: IndicatorCatalog) -> Self {
        Self {
            catalog,
            extract_opts: ExtractOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            tracker: ActivityTracker::default(),
            sent_message: String::new(),
            phase: Phase::Tracking,
            pending: None,
            last_poll: None,
        }
    }

    /// Apply per-backend extraction tweaks.
    pub fn for_backend(mut self, kind: TerminalKind) -> Self {
        if kind == TerminalKind::WezTerm {
            self.extract_opts.strip_left_border = true;
        }
        self
    }

    /// Shrink the poll interval (tests).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reset tracking for a freshly sent message.
    pub fn begin(&mut self, message: &str) {
        self.tracker = ActivityTracker::begin(message);
        self.sent_message = message.to_string();
        self.phase = Phase::Tracking;
        self.pending = None;
        self.last_poll = None;
    }

    pub fn check(&mut self, pane: &PaneHandle) -> Result<Option<Captured>, DaemonError> {
        if let Some(last) = self.last_poll
            && last.elapsed() < self.poll_interval
        {
            return Ok(None);
        }
        self.last_poll = Some(Instant::now());

        let screen = pane
            .terminal
            .pane_output(&pane.pane_id, SCROLLBACK_LINES)?;

        match self.phase {
            Phase::Tracking => match self.tracker.observe(&screen, &self.catalog) {
                None => Ok(None),
                Some(CaptureExit::PromptReturned) | Some(CaptureExit::FastIdle) => {
                    debug!(
                        event = "core.daemon.scrape_prompt_returned",
                        pane_id = %pane.pane_id,
                    );
                    self.phase = Phase::Confirming;
                    self.pending = extract_response(
                        &screen,
                        &self.sent_message,
                        &self.catalog,
                        self.extract_opts,
                    );
                    Ok(None)
                }
                Some(CaptureExit::ErrorDetected { line }) => {
                    Err(DaemonError::AgentError { line })
                }
                Some(CaptureExit::StuckInput) => Err(DaemonError::StuckInput),
            },
            Phase::Confirming => {
                let extracted = extract_response(
                    &screen,
                    &self.sent_message,
                    &self.catalog,
                    self.extract_opts,
                );
                match (&self.pending, extracted) {
                    (Some(previous), Some(current)) if *previous == current => {
                        debug!(
                            event = "core.daemon.scrape_response_stable",
                            pane_id = %pane.pane_id,
                            bytes = current.len(),
                        );
                        Ok(Some(Captured {
                            message_id: None,
                            text: current,
                            timestamp: Utc::now(),
                        }))
                    }
                    (_, current) => {
                        self.pending = current;
                        Ok(None)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::terminal::errors::TerminalError;
    use crate::terminal::types::{PaneInfo, SpawnOptions};
    use crate::terminal::TerminalBackend;

    /// Backend whose pane output replays a scripted sequence of screens,
    /// repeating the last one.
    struct ScriptedBackend {
        screens: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(screens: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                screens: Mutex::new(screens.iter().rev().map(|s| s.to_string()).collect()),
            })
        }
    }

    impl TerminalBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }
        fn display_name(&self) -> &'static str {
            "Scripted"
        }
        fn kind(&self) -> TerminalKind {
            TerminalKind::Tmux
        }
        fn is_available(&self) -> bool {
            true
        }
        fn install_hint(&self) -> &'static str {
            ""
        }
        fn create_pane(
            &self,
            _name: &str,
            _cmd: &str,
            _opts: &SpawnOptions,
        ) -> Result<String, TerminalError> {
            Ok("pane-0".to_string())
        }
        fn close_pane(&self, _pane_id: &str) -> Result<(), TerminalError> {
            Ok(())
        }
        fn list_panes(&self) -> Result<Vec<PaneInfo>, TerminalError> {
            Ok(vec![])
        }
        fn inject_text(&self, _pane_id: &str, _text: &str) -> Result<(), TerminalError> {
            Ok(())
        }
        fn send_keys(&self, _pane_id: &str, _keys: &str) -> Result<(), TerminalError> {
            Ok(())
        }
        fn is_pane_alive(&self, _pane_id: &str) -> Result<bool, TerminalError> {
            Ok(true)
        }
        fn pane_output(&self, _pane_id: &str, _lines: usize) -> Result<String, TerminalError> {
            let mut screens = self.screens.lock().unwrap();
            if screens.len() > 1 {
                Ok(screens.pop().unwrap())
            } else {
                Ok(screens.last().cloned().unwrap_or_default())
            }
        }
    }

    fn handle(backend: Arc<ScriptedBackend>) -> PaneHandle {
        PaneHandle {
            terminal: backend,
            pane_id: "pane-0".to_string(),
        }
    }

    fn fast_source() -> ScrapeSource {
        ScrapeSource::new(IndicatorCatalog::new())
            .with_poll_interval(Duration::from_millis(0))
    }

    #[test]
    fn test_prompt_returned_with_stable_extraction() {
        let done = "❯ summarize this\nthe summary text\n❯ ";
        let backend = ScriptedBackend::new(&["⠋ thinking hard", done, done]);
        let pane = handle(backend);

        let mut source = fast_source();
        source.begin("summarize this");

        // Poll 1: processing.
        assert!(source.check(&pane).unwrap().is_none());
        // Poll 2: prompt returned, extraction pending.
        assert!(source.check(&pane).unwrap().is_none());
        // Poll 3: stable across two reads.
        let captured = source.check(&pane).unwrap().unwrap();
        assert_eq!(captured.text, "the summary text");
        assert!(captured.message_id.is_none());
    }

    #[test]
    fn test_unstable_render_not_returned() {
        let backend = ScriptedBackend::new(&[
            "⠋ thinking",
            "❯ the question\npartial ans\n❯ ",
            "❯ the question\npartial answer now longer\n❯ ",
            "❯ the question\npartial answer now longer\n❯ ",
        ]);
        let pane = handle(backend);

        let mut source = fast_source();
        source.begin("the question");

        assert!(source.check(&pane).unwrap().is_none()); // processing
        assert!(source.check(&pane).unwrap().is_none()); // first extraction
        assert!(source.check(&pane).unwrap().is_none()); // changed, re-pend
        let captured = source.check(&pane).unwrap().unwrap();
        assert_eq!(captured.text, "partial answer now longer");
    }

    #[test]
    fn test_error_detected_surfaces_line() {
        let backend = ScriptedBackend::new(&["generating", "Error: connection refused"]);
        let pane = handle(backend);

        let mut source = fast_source();
        source.begin("do something");

        assert!(source.check(&pane).unwrap().is_none());
        match source.check(&pane) {
            Err(DaemonError::AgentError { line }) => {
                assert!(line.contains("connection refused"));
            }
            other => panic!("expected AgentError, got {other:?}"),
        }
    }

    #[test]
    fn test_stuck_input_surfaces() {
        let stuck = "chrome\n> exactly what was sent";
        let backend = ScriptedBackend::new(&[stuck]);
        let pane = handle(backend);

        let mut source = fast_source();
        source.begin("exactly what was sent");

        let mut result = Ok(None);
        for _ in 0..5 {
            result = source.check(&pane);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(DaemonError::StuckInput)));
    }

    #[test]
    fn test_poll_interval_rate_limits_reads() {
        let backend = ScriptedBackend::new(&["⠋ one", "❯ "]);
        let pane = handle(Arc::clone(&backend));

        let mut source =
            ScrapeSource::new(IndicatorCatalog::new()).with_poll_interval(Duration::from_secs(60));
        source.begin("msg");

        assert!(source.check(&pane).unwrap().is_none());
        // Second call inside the interval must not consume a screen.
        assert!(source.check(&pane).unwrap().is_none());
        assert_eq!(backend.screens.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_begin_resets_phase() {
        let done = "❯ q one\nanswer one\n❯ ";
        let backend = ScriptedBackend::new(&["⠋ spin", done, done]);
        let pane = handle(backend);

        let mut source = fast_source();
        source.begin("q one");
        assert!(source.check(&pane).unwrap().is_none());
        assert!(source.check(&pane).unwrap().is_none());
        assert!(source.check(&pane).unwrap().is_some());

        // New request starts clean: same screen, no spurious completion
        // before a processing phase is seen again.
        source.begin("q two");
        assert!(source.check(&pane).unwrap().is_none());
    }
}
