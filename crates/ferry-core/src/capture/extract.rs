//! Response extraction from pane scrollback.
//!
//! Once the state machine reports the prompt is back, the reply is the text
//! between the echoed request and the new prompt line, minus the TUI's
//! decorative chrome.

use std::sync::LazyLock;

use regex::Regex;

use super::patterns::IndicatorCatalog;

/// Characters of the sent message used to locate its echo in scrollback.
const MARKER_LEN: usize = 40;

/// A run of whitespace this long separates main content from a sidebar.
const SIDEBAR_GAP: usize = 10;

/// Whole-line bracketed markers (memory notes, status tags).
static BRACKET_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]{0,60}\]$").unwrap());

/// Box-drawing and block glyphs that make up borders and dividers.
fn is_chrome_char(c: char) -> bool {
    matches!(c, '\u{2500}'..='\u{257F}' | '\u{2580}'..='\u{259F}')
}

/// Left border glyphs some emulators prepend to every content line.
const LEFT_BORDERS: &[char] = &['│', '┃', '▌', '┆', '┊'];

/// Per-backend extraction tweaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Strip left-border glyphs and cut lines at the first sidebar gap.
    /// Needed for emulators that render a boxed layout with a right-hand
    /// sidebar (WezTerm).
    pub strip_left_border: bool,
}

/// Extract the response text that followed `sent_message` in `screen`.
///
/// Returns `None` when the echo cannot be found or nothing but chrome
/// remains after it.
pub fn extract_response(
    screen: &str,
    sent_message: &str,
    catalog: &IndicatorCatalog,
    opts: ExtractOptions,
) -> Option<String> {
    let marker: String = sent_message.chars().take(MARKER_LEN).collect();
    if marker.is_empty() {
        return None;
    }

    let lines: Vec<&str> = screen.lines().collect();
    let echo_index = lines
        .iter()
        .rposition(|line| line.contains(marker.as_str()))?;

    let mut kept: Vec<String> = Vec::new();
    for line in &lines[echo_index + 1..] {
        if let Some(cleaned) = clean_line(line, catalog, opts) {
            kept.push(cleaned);
        }
    }

    // Trailing blank-ish lines survive interior joins but add nothing.
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }

    if kept.is_empty() {
        return None;
    }
    Some(kept.join("\n"))
}

/// Strip chrome from one line; `None` drops the line entirely.
fn clean_line(line: &str, catalog: &IndicatorCatalog, opts: ExtractOptions) -> Option<String> {
    let mut text = line;

    if opts.strip_left_border {
        let trimmed = text.trim_start();
        if let Some(first) = trimmed.chars().next()
            && LEFT_BORDERS.contains(&first)
        {
            text = trimmed[first.len_utf8()..].strip_prefix(' ').unwrap_or(&trimmed[first.len_utf8()..]);
        }
    }

    // Sidebar content sits to the right of a long whitespace run; keep the
    // main column only.
    if let Some(cut) = find_sidebar_gap(text) {
        text = &text[..cut];
    }

    let trimmed = text.trim_end();
    if trimmed.trim().is_empty() {
        return None;
    }
    if catalog.is_prompt_line(trimmed) {
        return None;
    }
    if BRACKET_MARKER.is_match(trimmed.trim()) {
        return None;
    }
    // Pure border/divider lines.
    if trimmed
        .trim()
        .chars()
        .all(|c| is_chrome_char(c) || c.is_whitespace())
    {
        return None;
    }
    // Idle animations / spinner remnants with no words.
    if trimmed.trim().chars().all(|c| !c.is_alphanumeric()) && trimmed.trim().len() <= 4 {
        return None;
    }

    Some(trimmed.to_string())
}

/// Byte offset of the first run of `SIDEBAR_GAP`+ whitespace characters
/// that has content on both sides.
fn find_sidebar_gap(line: &str) -> Option<usize> {
    let mut run_start: Option<usize> = None;
    let mut run_len = 0usize;
    let mut seen_content = false;

    for (idx, c) in line.char_indices() {
        if c.is_whitespace() {
            if run_start.is_none() {
                run_start = Some(idx);
            }
            run_len += 1;
        } else {
            if seen_content
                && run_len >= SIDEBAR_GAP
                && let Some(start) = run_start
            {
                return Some(start);
            }
            seen_content = true;
            run_start = None;
            run_len = 0;
        }
    }
    // A trailing gap with no right-hand content is just padding.
    None
}
