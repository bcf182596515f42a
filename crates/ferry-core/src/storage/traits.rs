//! The storage adapter contract.

use std::path::{Path, PathBuf};

use super::errors::StorageError;
use super::types::Message;

/// Reads a secondary AI's on-disk session representation.
///
/// Parsing is pure: the same file state always yields the same message
/// sequence, and adapters must tolerate a concurrent writer appending
/// records mid-read (a truncated trailing record is skipped, not an error).
pub trait StorageAdapter: Send + Sync {
    /// All parseable messages for the session, in log order.
    ///
    /// A missing session yields an empty vec; individual unparseable
    /// records are silently skipped.
    fn read_session(&self, session_id: &str) -> Result<Vec<Message>, StorageError>;

    /// Resolve the most plausible current session id for a project, used
    /// when no session id is known yet or the known one went stale.
    fn resolve_session(&self, project_path: &Path) -> Result<Option<String>, StorageError>;

    /// The filesystem location a watcher must observe to notice changes to
    /// this session: a file for single-file formats, a directory for
    /// multi-file formats. `None` when the location cannot be determined.
    fn watch_path(&self, session_id: &str) -> Option<PathBuf>;
}
