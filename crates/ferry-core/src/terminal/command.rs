//! Subprocess helpers shared by the terminal backends.
//!
//! Everything is argv-style: no shell string interpolation happens here.

use std::process::{Command, Stdio};

use tracing::debug;

use super::errors::TerminalError;

/// Run a program and require a zero exit code.
pub fn run_checked(program: &str, args: &[&str]) -> Result<(), TerminalError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| TerminalError::CommandFailed {
            message: format!("{program} {args:?}: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TerminalError::CommandFailed {
            message: format!("{program} {args:?} exited with {}: {stderr}", output.status),
        });
    }
    Ok(())
}

/// Run a program and capture trimmed stdout, requiring a zero exit code.
pub fn run_query(program: &str, args: &[&str]) -> Result<String, TerminalError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| TerminalError::CommandFailed {
            message: format!("{program} {args:?}: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TerminalError::CommandFailed {
            message: format!("{program} {args:?} exited with {}: {stderr}", output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a program feeding `input` on stdin, requiring a zero exit code.
pub fn run_with_stdin(program: &str, args: &[&str], input: &[u8]) -> Result<(), TerminalError> {
    use std::io::Write;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| TerminalError::CommandFailed {
            message: format!("{program} {args:?}: {e}"),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input).map_err(|e| TerminalError::CommandFailed {
            message: format!("{program} {args:?}: failed to write stdin: {e}"),
        })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| TerminalError::CommandFailed {
            message: format!("{program} {args:?}: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TerminalError::CommandFailed {
            message: format!("{program} {args:?} exited with {}: {stderr}", output.status),
        });
    }

    debug!(
        event = "core.terminal.stdin_command_completed",
        program = program,
        bytes = input.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_checked_success() {
        assert!(run_checked("true", &[]).is_ok());
    }

    #[test]
    fn test_run_checked_nonzero_exit() {
        let err = run_checked("false", &[]).unwrap_err();
        assert_eq!(err.error_code(), "command_failed");
    }

    #[test]
    fn test_run_checked_missing_program() {
        let err = run_checked("ferry-no-such-program-12345", &[]).unwrap_err();
        assert_eq!(err.error_code(), "command_failed");
    }

    #[test]
    fn test_run_query_captures_stdout() {
        let out = run_query("echo", &["hello"]).unwrap();
        assert_eq!(out, "hello");
    }

    #[test]
    fn test_run_with_stdin() {
        // `cat` consumes stdin and exits zero
        assert!(run_with_stdin("cat", &[], b"some input\n").is_ok());
    }
}
