//! The indicator vocabulary for pane-scrape classification.
//!
//! All regexes used to read a secondary AI's screen live here as one named
//! catalog. Per-AI customization is limited to a single idle-hint regex;
//! everything else is the shared vocabulary.

use std::sync::LazyLock;

use regex::Regex;

static PROCESSING_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(thinking|loading|processing|generating)\b").unwrap()
});

/// Braille spinner glyphs used by most TUI progress animations.
static SPINNER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[⠀-⣿]").unwrap());

static INTERRUPT_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)esc to interrupt").unwrap());

/// Long dotted progress runs.
static PROGRESS_DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[·.]{8,}").unwrap());

/// A line containing only a prompt glyph and whitespace.
static PROMPT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[>❯›$]\s*$").unwrap());

static ERROR_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(error|fatal|exception|panic|refused|denied|failed)\b").unwrap()
});

/// Catalog of screen indicators, optionally extended with one app-specific
/// idle hint per secondary AI (e.g. `\d+% context left`).
#[derive(Debug, Clone, Default)]
pub struct IndicatorCatalog {
    idle_hint: Option<Regex>,
}

impl IndicatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the app-specific idle-footer regex for one secondary AI.
    pub fn with_idle_hint(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.idle_hint = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Whether a line shows the AI is actively working.
    pub fn is_processing_line(&self, line: &str) -> bool {
        PROCESSING_WORDS.is_match(line)
            || SPINNER.is_match(line)
            || INTERRUPT_HINT.is_match(line)
            || PROGRESS_DOTS.is_match(line)
    }

    /// Whether a line is an input prompt waiting for the user.
    pub fn is_prompt_line(&self, line: &str) -> bool {
        PROMPT_LINE.is_match(line)
    }

    /// Whether a line contains a stand-alone error word.
    pub fn is_error_line(&self, line: &str) -> bool {
        ERROR_WORDS.is_match(line)
    }

    /// Whether the app-specific idle hint appears anywhere on screen.
    pub fn has_idle_hint(&self, lines: &[&str]) -> bool {
        match &self.idle_hint {
            Some(hint) => lines.iter().any(|l| hint.is_match(l)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_words() {
        let catalog = IndicatorCatalog::new();
        assert!(catalog.is_processing_line("Thinking about your request"));
        assert!(catalog.is_processing_line("loading context"));
        assert!(catalog.is_processing_line("Generating response"));
        assert!(!catalog.is_processing_line("done"));
    }

    #[test]
    fn test_spinner_glyphs() {
        let catalog = IndicatorCatalog::new();
        assert!(catalog.is_processing_line("⠋ working"));
        assert!(catalog.is_processing_line("⣾"));
    }

    #[test]
    fn test_interrupt_hint() {
        let catalog = IndicatorCatalog::new();
        assert!(catalog.is_processing_line("(esc to interrupt)"));
        assert!(catalog.is_processing_line("Press Esc to Interrupt"));
    }

    #[test]
    fn test_progress_dots() {
        let catalog = IndicatorCatalog::new();
        assert!(catalog.is_processing_line("··········"));
        assert!(catalog.is_processing_line("working........"));
        assert!(!catalog.is_processing_line("end of sentence."));
    }

    #[test]
    fn test_prompt_lines() {
        let catalog = IndicatorCatalog::new();
        assert!(catalog.is_prompt_line("> "));
        assert!(catalog.is_prompt_line("  ❯"));
        assert!(catalog.is_prompt_line("›  "));
        assert!(catalog.is_prompt_line("$ "));
        assert!(!catalog.is_prompt_line("> partial input"));
        assert!(!catalog.is_prompt_line("echo $HOME"));
    }

    #[test]
    fn test_error_words() {
        let catalog = IndicatorCatalog::new();
        assert!(catalog.is_error_line("Error: connection refused"));
        assert!(catalog.is_error_line("panic: index out of range"));
        assert!(catalog.is_error_line("request failed"));
        assert!(!catalog.is_error_line("all good"));
        // Only stand-alone words count.
        assert!(!catalog.is_error_line("thread panicked"));
    }

    #[test]
    fn test_idle_hint_optional() {
        let plain = IndicatorCatalog::new();
        assert!(!plain.has_idle_hint(&["42% context left"]));

        let tuned = IndicatorCatalog::new()
            .with_idle_hint(r"\d+% context left")
            .unwrap();
        assert!(tuned.has_idle_hint(&["42% context left"]));
        assert!(!tuned.has_idle_hint(&["no footer here"]));
    }

    #[test]
    fn test_idle_hint_bad_regex_rejected() {
        assert!(IndicatorCatalog::new().with_idle_hint("([unclosed").is_err());
    }
}
