//! Session-log storage adapters.
//!
//! A storage adapter turns a secondary AI's on-disk session representation
//! into an ordered list of normalized [`Message`]s; a [`SessionWatcher`]
//! keeps a consumer's view fresh as the log grows. Two format families are
//! supported: a single-file append-only JSONL log and a multi-file
//! session/message/part tree.

pub mod claude_log;
pub mod errors;
pub mod opencode;
pub mod traits;
pub mod types;
pub mod watcher;

pub use claude_log::ClaudeLogAdapter;
pub use errors::StorageError;
pub use opencode::OpenCodeAdapter;
pub use traits::StorageAdapter;
pub use types::{Message, Role};
pub use watcher::{SessionWatcher, WatchCallback};
