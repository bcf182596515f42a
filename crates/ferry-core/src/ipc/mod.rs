//! Fast in-band input channel.
//!
//! A per-daemon FIFO gives the secondary AI a shell-free input path that is
//! quicker and less fragile than keystroke injection. The channel is
//! strictly best-effort: any failure downgrades the daemon to terminal
//! injection without failing the request. On hosts without a safe FIFO
//! primitive the channel is simply absent.

use std::path::{Path, PathBuf};

use tracing::debug;

/// All error types for the IPC channel.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("IPC channel is not supported on this platform")]
    Unsupported,

    #[error("failed to create pipe at '{path}': {message}")]
    CreateFailed { path: String, message: String },

    #[error("failed to write to pipe: {message}")]
    WriteFailed { message: String },
}

impl IpcError {
    pub fn error_code(&self) -> &'static str {
        match self {
            IpcError::Unsupported => "ipc_unsupported",
            IpcError::CreateFailed { .. } => "ipc_create_failed",
            IpcError::WriteFailed { .. } => "ipc_write_failed",
        }
    }
}

/// A named-pipe input endpoint owned by one daemon.
#[derive(Debug)]
pub struct InputChannel {
    path: PathBuf,
}

impl InputChannel {
    /// Create the FIFO (mode 0o600). An existing FIFO at the path is reused.
    #[cfg(unix)]
    pub fn create(path: &Path) -> Result<Self, IpcError> {
        use nix::sys::stat::{Mode, SFlag};

        match nix::sys::stat::stat(path) {
            Ok(st) => {
                let kind = SFlag::from_bits_truncate(st.st_mode);
                if !kind.contains(SFlag::S_IFIFO) {
                    return Err(IpcError::CreateFailed {
                        path: path.display().to_string(),
                        message: "path exists and is not a fifo".to_string(),
                    });
                }
            }
            Err(_) => {
                nix::unistd::mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|e| {
                    IpcError::CreateFailed {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    }
                })?;
            }
        }

        debug!(event = "core.ipc.channel_created", path = %path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    pub fn create(_path: &Path) -> Result<Self, IpcError> {
        Err(IpcError::Unsupported)
    }

    /// Write text into the pipe without blocking.
    ///
    /// Fails when no reader has the pipe open (`ENXIO`); the caller treats
    /// any failure as the signal to fall back to terminal injection.
    #[cfg(unix)]
    pub fn write(&self, text: &str) -> Result<(), IpcError> {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        // A non-blocking open fails with ENXIO when no reader has the pipe
        // open, instead of hanging the daemon loop.
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(&self.path)
            .map_err(|e| IpcError::WriteFailed {
                message: format!("open '{}': {}", self.path.display(), e),
            })?;

        file.write_all(text.as_bytes())
            .map_err(|e| IpcError::WriteFailed {
                message: format!("write '{}': {}", self.path.display(), e),
            })?;

        debug!(
            event = "core.ipc.write_completed",
            path = %self.path.display(),
            bytes = text.len(),
        );
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn write(&self, _text: &str) -> Result<(), IpcError> {
        Err(IpcError::Unsupported)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the pipe from the filesystem. Safe to call on a pipe that is
    /// already gone.
    pub fn destroy(&self) {
        if std::fs::remove_file(&self.path).is_ok() {
            debug!(event = "core.ipc.channel_destroyed", path = %self.path.display());
        }
    }
}
