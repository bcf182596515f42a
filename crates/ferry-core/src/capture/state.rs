//! Pane activity state machine.
//!
//! Classifies successive scrollback snapshots into a processing/idle
//! lifecycle and signals when (and why) polling can stop early.

use super::patterns::IndicatorCatalog;

/// How many trailing lines are scanned for a lingering input echo.
const STUCK_SCAN_LINES: usize = 5;

/// Consecutive echo-visible polls before the input is declared stuck. The
/// echo legitimately lingers for the first polls right after injection.
const STUCK_THRESHOLD: u8 = 3;

/// Consecutive idle-hint sightings that mean the reply came back faster
/// than the processing window.
const FAST_IDLE_THRESHOLD: u8 = 2;

/// Classified pane activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaneActivity {
    #[default]
    Unknown,
    Processing,
    Idle,
}

/// Why polling stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureExit {
    /// The AI finished and its input prompt is back.
    PromptReturned,
    /// The reply was so quick the processing window was missed entirely.
    FastIdle,
    /// An error indicator surfaced while the AI was working.
    ErrorDetected { line: String },
    /// The injected text never left the input line; it was not submitted.
    StuckInput,
}

/// Tracks one request's pane activity across polls.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    state: PaneActivity,
    sent_prefix: Option<String>,
    saw_processing: bool,
    idle_hint_streak: u8,
    stuck_streak: u8,
}

impl ActivityTracker {
    /// Start tracking a freshly sent message.
    pub fn begin(sent_message: &str) -> Self {
        let prefix: String = sent_message.chars().take(40).collect();
        Self {
            sent_prefix: (!prefix.is_empty()).then_some(prefix),
            ..Self::default()
        }
    }

    pub fn state(&self) -> PaneActivity {
        self.state
    }

    /// Feed one scrollback snapshot; returns an exit when polling can stop.
    pub fn observe(&mut self, screen: &str, catalog: &IndicatorCatalog) -> Option<CaptureExit> {
        let lines: Vec<&str> = screen.lines().collect();

        if lines.iter().any(|l| catalog.is_processing_line(l)) {
            self.state = PaneActivity::Processing;
            self.saw_processing = true;
            self.idle_hint_streak = 0;
            self.stuck_streak = 0;
            return None;
        }

        if self.state == PaneActivity::Processing {
            if let Some(line) = lines.iter().find(|l| catalog.is_error_line(l)) {
                self.state = PaneActivity::Idle;
                return Some(CaptureExit::ErrorDetected {
                    line: line.trim().to_string(),
                });
            }
            if lines.iter().any(|l| catalog.is_prompt_line(l)) {
                self.state = PaneActivity::Idle;
                return Some(CaptureExit::PromptReturned);
            }
        }

        // The sent text still sitting in the input line means it was never
        // submitted.
        if !self.saw_processing
            && let Some(prefix) = &self.sent_prefix
        {
            let tail_start = lines.len().saturating_sub(STUCK_SCAN_LINES);
            if lines[tail_start..].iter().any(|l| l.contains(prefix.as_str())) {
                self.stuck_streak += 1;
                if self.stuck_streak >= STUCK_THRESHOLD {
                    return Some(CaptureExit::StuckInput);
                }
                return None;
            }
            self.stuck_streak = 0;
        }

        // Fast-response path: the app-specific idle footer seen twice in a
        // row without any processing in between.
        if matches!(self.state, PaneActivity::Unknown | PaneActivity::Idle)
            && catalog.has_idle_hint(&lines)
        {
            self.idle_hint_streak += 1;
            if self.idle_hint_streak >= FAST_IDLE_THRESHOLD {
                self.state = PaneActivity::Idle;
                return Some(CaptureExit::FastIdle);
            }
        } else {
            self.idle_hint_streak = 0;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> IndicatorCatalog {
        IndicatorCatalog::new()
            .with_idle_hint(r"\d+% context left")
            .unwrap()
    }

    #[test]
    fn test_processing_then_prompt_returns() {
        let mut tracker = ActivityTracker::begin("summarize the repo");
        let catalog = catalog();

        assert_eq!(tracker.observe("⠋ thinking hard", &catalog), None);
        assert_eq!(tracker.state(), PaneActivity::Processing);

        let exit = tracker.observe("the answer\n❯ ", &catalog);
        assert_eq!(exit, Some(CaptureExit::PromptReturned));
        assert_eq!(tracker.state(), PaneActivity::Idle);
    }

    #[test]
    fn test_prompt_without_processing_does_not_exit() {
        let mut tracker = ActivityTracker::begin("hello");
        // Idle prompt on the very first poll: the request has not visibly
        // started, so this is not a completion signal.
        assert_eq!(tracker.observe("❯ ", &catalog()), None);
    }

    #[test]
    fn test_error_while_processing() {
        let mut tracker = ActivityTracker::begin("do the thing");
        let catalog = catalog();

        tracker.observe("generating...", &catalog);
        let exit = tracker.observe("Error: connection refused", &catalog);
        assert_eq!(
            exit,
            Some(CaptureExit::ErrorDetected {
                line: "Error: connection refused".to_string()
            })
        );
    }

    #[test]
    fn test_error_words_ignored_when_never_processing() {
        let mut tracker = ActivityTracker::begin("hello");
        assert_eq!(tracker.observe("previous error in scrollback", &catalog()), None);
    }

    #[test]
    fn test_fast_idle_needs_two_sightings() {
        let mut tracker = ActivityTracker::begin("quick one");
        let catalog = catalog();

        assert_eq!(tracker.observe("98% context left", &catalog), None);
        assert_eq!(
            tracker.observe("98% context left", &catalog),
            Some(CaptureExit::FastIdle)
        );
    }

    #[test]
    fn test_fast_idle_streak_broken_by_processing() {
        let mut tracker = ActivityTracker::begin("quick one");
        let catalog = catalog();

        tracker.observe("98% context left", &catalog);
        tracker.observe("⠙ thinking", &catalog);
        // Streak reset; one more sighting is not enough.
        assert_eq!(tracker.observe("97% context left", &catalog), None);
    }

    #[test]
    fn test_stuck_input_after_threshold() {
        let mut tracker = ActivityTracker::begin("this text was typed");
        let catalog = IndicatorCatalog::new();

        let screen = "some chrome\n> this text was typed";
        assert_eq!(tracker.observe(screen, &catalog), None);
        assert_eq!(tracker.observe(screen, &catalog), None);
        assert_eq!(tracker.observe(screen, &catalog), Some(CaptureExit::StuckInput));
    }

    #[test]
    fn test_stuck_streak_resets_when_echo_clears() {
        let mut tracker = ActivityTracker::begin("this text was typed");
        let catalog = IndicatorCatalog::new();

        let echo = "> this text was typed";
        tracker.observe(echo, &catalog);
        tracker.observe(echo, &catalog);
        tracker.observe("submitted, screen cleared", &catalog);
        // Streak restarted from zero.
        assert_eq!(tracker.observe(echo, &catalog), None);
    }

    #[test]
    fn test_echo_scan_limited_to_tail() {
        let mut tracker = ActivityTracker::begin("this text was typed");
        let catalog = IndicatorCatalog::new();

        // Echo deep in scrollback, not on the input line.
        let mut screen = String::from("> this text was typed\n");
        for _ in 0..10 {
            screen.push_str("output line\n");
        }
        for _ in 0..STUCK_THRESHOLD + 1 {
            assert_eq!(tracker.observe(&screen, &catalog), None);
        }
    }

    #[test]
    fn test_long_message_prefix_is_40_chars() {
        let message = "x".repeat(100);
        let tracker = ActivityTracker::begin(&message);
        assert_eq!(tracker.sent_prefix.as_ref().unwrap().len(), 40);
    }
}
