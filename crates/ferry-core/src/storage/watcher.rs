//! Debounced session watcher.
//!
//! Wraps a `notify` filesystem watcher around a storage adapter: on any
//! relevant change the session is re-read and the callback invoked with the
//! fresh message list. Changes are debounced so a burst of appends collapses
//! into one re-read. A periodic poll backs up the native watcher, and is the
//! only signal on platforms where the native watcher cannot be installed.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::traits::StorageAdapter;
use super::types::Message;

/// Debounce window applied after the first change notification.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Safety-net poll when the native watcher is active.
const SAFETY_POLL: Duration = Duration::from_secs(5);

/// Poll cadence when no native watcher could be installed.
const FALLBACK_POLL: Duration = Duration::from_secs(2);

/// Callback receiving the full re-read message list.
pub type WatchCallback = Arc<dyn Fn(Vec<Message>) + Send + Sync>;

/// Handle to a running watcher task. Dropping without `close()` leaks the
/// task until the process exits; daemons always close explicitly on stop.
pub struct SessionWatcher {
    shutdown: CancellationToken,
}

impl SessionWatcher {
    /// Spawn a watcher for `session_id` on the given adapter.
    ///
    /// The callback fires once immediately with the current state, then on
    /// every debounced change.
    pub fn spawn(
        adapter: Arc<dyn StorageAdapter>,
        session_id: String,
        callback: WatchCallback,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        tokio::spawn(async move {
            let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
            let watch_target = adapter.watch_path(&session_id);
            let native = watch_target
                .as_deref()
                .and_then(|path| setup_notify_watcher(path, wake_tx));

            let poll = if native.is_some() {
                SAFETY_POLL
            } else {
                debug!(
                    event = "core.storage.watcher_poll_fallback",
                    session_id = %session_id,
                );
                FALLBACK_POLL
            };
            let mut interval = tokio::time::interval(poll);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = wake_rx.recv() => {}
                    _ = interval.tick() => {}
                }

                // Debounce: let the burst settle, then drain queued wakes so
                // they collapse into this one re-read.
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(DEBOUNCE) => {}
                }
                while wake_rx.try_recv().is_ok() {}

                match adapter.read_session(&session_id) {
                    Ok(messages) => callback(messages),
                    Err(e) => {
                        warn!(
                            event = "core.storage.watcher_read_failed",
                            session_id = %session_id,
                            error = %e,
                        );
                    }
                }
            }

            debug!(
                event = "core.storage.watcher_stopped",
                session_id = %session_id,
            );
        });

        Self { shutdown }
    }

    /// Release all watcher resources.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Install a notify watcher feeding the wake channel.
///
/// For a file target, the parent directory is watched non-recursively so
/// file creation is seen too; a directory target is watched recursively.
/// Returns `None` when the watcher cannot be installed (poll fallback).
fn setup_notify_watcher(
    target: &Path,
    wake_tx: mpsc::Sender<()>,
) -> Option<notify::RecommendedWatcher> {
    let (watch_path, mode) = if target.is_dir() {
        (target, RecursiveMode::Recursive)
    } else {
        (target.parent()?, RecursiveMode::NonRecursive)
    };

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
        {
            let _ = wake_tx.try_send(());
        }
    })
    .ok()?;

    watcher.watch(watch_path, mode).ok()?;
    Some(watcher)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use chrono::DateTime;

    use super::*;
    use crate::storage::errors::StorageError;
    use crate::storage::types::Role;

    /// Adapter that serves whatever the test writes into a jsonl-ish file:
    /// one `id|content` line per message.
    struct LineAdapter {
        file: PathBuf,
    }

    impl StorageAdapter for LineAdapter {
        fn read_session(&self, _session_id: &str) -> Result<Vec<Message>, StorageError> {
            let content = match std::fs::read_to_string(&self.file) {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
                Err(e) => return Err(e.into()),
            };
            Ok(content
                .lines()
                .filter_map(|line| {
                    let (id, text) = line.split_once('|')?;
                    Some(Message {
                        id: id.to_string(),
                        role: Role::Assistant,
                        content: text.to_string(),
                        timestamp: DateTime::UNIX_EPOCH,
                    })
                })
                .collect())
        }

        fn resolve_session(
            &self,
            _project_path: &Path,
        ) -> Result<Option<String>, StorageError> {
            Ok(Some("fixed".to_string()))
        }

        fn watch_path(&self, _session_id: &str) -> Option<PathBuf> {
            Some(self.file.clone())
        }
    }

    #[tokio::test]
    async fn test_watcher_reports_appended_messages() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("session.log");
        std::fs::write(&file, "m1|hello\n").unwrap();

        let adapter = Arc::new(LineAdapter { file: file.clone() });
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(vec![]));
        let seen_cb = Arc::clone(&seen);

        let watcher = SessionWatcher::spawn(
            adapter,
            "fixed".to_string(),
            Arc::new(move |messages| {
                seen_cb.lock().unwrap().push(messages.len());
            }),
        );

        // Initial tick delivers the current state.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(seen.lock().unwrap().contains(&1));

        std::fs::write(&file, "m1|hello\nm2|world\n").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(
            seen.lock().unwrap().iter().any(|n| *n == 2),
            "watcher should observe the appended message, saw {:?}",
            seen.lock().unwrap()
        );

        watcher.close();
    }

    #[tokio::test]
    async fn test_watcher_close_stops_callbacks() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("session.log");
        std::fs::write(&file, "m1|hello\n").unwrap();

        let adapter = Arc::new(LineAdapter { file: file.clone() });
        let seen: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
        let seen_cb = Arc::clone(&seen);

        let watcher = SessionWatcher::spawn(
            adapter,
            "fixed".to_string(),
            Arc::new(move |_| {
                *seen_cb.lock().unwrap() += 1;
            }),
        );
        tokio::time::sleep(Duration::from_millis(300)).await;
        watcher.close();
        let before = *seen.lock().unwrap();

        std::fs::write(&file, "m1|hello\nm2|world\n").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock().unwrap(), before, "no callbacks after close");
    }
}
