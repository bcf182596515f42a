//! Text normalization and quoting helpers shared by the backends.

/// Normalize an injection payload: `\r\n` and lone `\r` become `\n`, and
/// trailing newlines are stripped so the final Enter is the only submission.
pub fn normalize_payload(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified.trim_end_matches('\n').to_string()
}

/// Whether a normalized payload needs the bracketed-paste path.
pub fn is_multiline(text: &str) -> bool {
    text.contains('\n')
}

/// Single-quote a string for POSIX sh.
///
/// Embedded single quotes are closed, escaped, and reopened (`'\''`).
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '='))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Build a `cd <dir> && <command>` line with the directory quoted.
pub fn build_cd_command(dir: &std::path::Path, command: &str) -> String {
    format!("cd {} && {}", shell_quote(&dir.display().to_string()), command)
}

/// Escape a string for embedding inside a PowerShell single-quoted literal.
pub fn powershell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_crlf() {
        assert_eq!(normalize_payload("a\r\nb\r\nc"), "a\nb\nc");
    }

    #[test]
    fn test_normalize_strips_trailing_newlines() {
        assert_eq!(normalize_payload("hello\n"), "hello");
        assert_eq!(normalize_payload("hello\r\n\r\n"), "hello");
        assert_eq!(normalize_payload("hello"), "hello");
    }

    #[test]
    fn test_normalize_preserves_interior_newlines() {
        assert_eq!(normalize_payload("line one\nline two\n"), "line one\nline two");
    }

    #[test]
    fn test_is_multiline() {
        assert!(!is_multiline("single line"));
        assert!(is_multiline("two\nlines"));
    }

    #[test]
    fn test_shell_quote_plain() {
        assert_eq!(shell_quote("claude"), "claude");
        assert_eq!(shell_quote("/usr/local/bin/claude"), "/usr/local/bin/claude");
    }

    #[test]
    fn test_shell_quote_spaces() {
        assert_eq!(shell_quote("hello world"), "'hello world'");
    }

    #[test]
    fn test_shell_quote_embedded_quote() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_shell_quote_empty() {
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_build_cd_command_quotes_dir() {
        let cmd = build_cd_command(std::path::Path::new("/tmp/my project"), "claude --verbose");
        assert_eq!(cmd, "cd '/tmp/my project' && claude --verbose");
    }

    #[test]
    fn test_powershell_quote_doubles_quotes() {
        assert_eq!(powershell_quote("it's"), "'it''s'");
        assert_eq!(powershell_quote("plain"), "'plain'");
    }
}
