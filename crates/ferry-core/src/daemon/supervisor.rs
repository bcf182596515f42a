//! The per-AI daemon supervisor.
//!
//! One `AiDaemon` supervises one secondary AI inside one pane: it starts
//! lazily on the first queued request, serializes execution through a
//! priority queue (strict single-flight), retries failed attempts up to the
//! configured budget, auto-stops after an idle window, and reports
//! everything through the typed event bus.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::ipc::InputChannel;
use crate::terminal::{SpawnOptions, TerminalBackend, TerminalError};

use super::errors::DaemonError;
use super::events::{DaemonEvent, ErrorCause, EventBus};
use super::queue::RequestQueue;
use super::sources::{CaptureSource, PaneHandle};
use super::state_file::{self, DaemonStateFile, STATE_FILE_NAME};
use super::types::{AiConfig, Captured, DaemonStatus, QueuedRequest, Request};

/// Cadence of `check_response` polls while a request is in flight.
const RESPONSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause between retry attempts.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Timeout on the CLI `--version` probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pipe file name within the daemon's runtime directory.
const PIPE_FILE_NAME: &str = "input.pipe";

/// Everything the orchestrator provides to a daemon at construction.
pub struct DaemonRuntime {
    /// Orchestrator-level runtime directory; the daemon owns `<dir>/<name>`.
    pub run_dir: PathBuf,
    pub bridge_session_id: String,
    pub terminal: Arc<dyn TerminalBackend>,
    pub source: CaptureSource,
}

/// Cheaply clonable handle to one supervised secondary AI.
#[derive(Clone)]
pub struct AiDaemon {
    inner: Arc<DaemonInner>,
}

struct DaemonInner {
    config: AiConfig,
    run_dir: PathBuf,
    bridge_session_id: String,
    terminal: Arc<dyn TerminalBackend>,
    events: EventBus,
    queue: Mutex<RequestQueue>,
    status: Mutex<DaemonStatus>,
    pane_id: Mutex<Option<String>>,
    ipc: Mutex<Option<InputChannel>>,
    source: tokio::sync::Mutex<CaptureSource>,
    /// Re-entrancy guard: at most one processing loop task.
    loop_running: AtomicBool,
    /// Whether a request is in the executing phase right now.
    active: AtomicBool,
    /// Bumped to invalidate a pending idle timer.
    idle_generation: AtomicU64,
    start_lock: tokio::sync::Mutex<()>,
    stop_lock: tokio::sync::Mutex<()>,
}

impl AiDaemon {
    pub fn new(config: AiConfig, runtime: DaemonRuntime) -> Self {
        let run_dir = runtime.run_dir.join(&config.name);
        Self {
            inner: Arc::new(DaemonInner {
                config,
                run_dir,
                bridge_session_id: runtime.bridge_session_id,
                terminal: runtime.terminal,
                events: EventBus::new(),
                queue: Mutex::new(RequestQueue::new()),
                status: Mutex::new(DaemonStatus::Stopped),
                pane_id: Mutex::new(None),
                ipc: Mutex::new(None),
                source: tokio::sync::Mutex::new(runtime.source),
                loop_running: AtomicBool::new(false),
                active: AtomicBool::new(false),
                idle_generation: AtomicU64::new(0),
                start_lock: tokio::sync::Mutex::new(()),
                stop_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &AiConfig {
        &self.inner.config
    }

    pub fn status(&self) -> DaemonStatus {
        *lock(&self.inner.status)
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    pub fn pane_id(&self) -> Option<String> {
        lock(&self.inner.pane_id).clone()
    }

    pub fn project_path(&self) -> Option<PathBuf> {
        self.inner.config.project_path.clone()
    }

    /// Subscribe to this daemon's event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DaemonEvent> {
        self.inner.events.subscribe()
    }

    /// Enqueue a request and return its id immediately.
    ///
    /// Never suspends: insertion is synchronous, and the processing loop is
    /// kicked as a background task. Safe to call from any state: a stopped
    /// daemon starts lazily when the loop reaches the request.
    pub fn queue_request(&self, request: Request) -> String {
        let id = lock(&self.inner.queue).push(request);
        // A new request cancels any pending idle shutdown.
        self.inner.idle_generation.fetch_add(1, Ordering::SeqCst);

        info!(
            event = "core.daemon.request_enqueued",
            ai = %self.inner.config.name,
            request_id = %id,
            queue_len = lock(&self.inner.queue).len(),
        );

        DaemonInner::kick(&self.inner);
        id
    }

    /// Stop the daemon: close watcher, IPC, and pane, persist state.
    /// Deduped against concurrent stops; a no-op unless currently running.
    pub async fn stop(&self, reason: &str) -> Result<(), DaemonError> {
        self.inner.stop(reason).await
    }
}

impl DaemonInner {
    /// Spawn the processing loop unless one is already draining the queue.
    fn kick(self: &Arc<Self>) {
        if self
            .loop_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner.run_loop().await;
            });
        }
    }

    /// Drain the queue one request at a time, then re-check for entries
    /// that raced in while the guard was being released.
    async fn run_loop(self: &Arc<Self>) {
        loop {
            while let Some(entry) = { lock(&self.queue).pop() } {
                self.active.store(true, Ordering::SeqCst);
                self.execute(entry).await;
                self.active.store(false, Ordering::SeqCst);
            }

            self.loop_running.store(false, Ordering::SeqCst);
            if lock(&self.queue).is_empty() {
                break;
            }
            if self
                .loop_running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                break;
            }
        }

        self.arm_idle_timer();
    }

    /// Execute one request: ensure running, send, poll, retry.
    async fn execute(self: &Arc<Self>, entry: QueuedRequest) {
        let request_id = entry.id.clone();
        let max_attempts = self.config.max_retries + 1;

        if let Err(e) = self.ensure_running().await {
            error!(
                event = "core.daemon.request_start_failed",
                ai = %self.config.name,
                request_id = %request_id,
                error = %e,
            );
            self.events.emit(DaemonEvent::Error {
                id: request_id,
                cause: ErrorCause::from(&e),
                attempt: 1,
                max_attempts,
                timestamp: Utc::now(),
            });
            return;
        }

        let message = entry.request.serialized_message();
        let mut last_error = DaemonError::Timeout {
            timeout_ms: self.config.request_timeout_ms,
        };

        for attempt in 1..=max_attempts {
            match self.attempt_once(&message).await {
                Ok(captured) => {
                    info!(
                        event = "core.daemon.request_completed",
                        ai = %self.config.name,
                        request_id = %request_id,
                        attempt = attempt,
                    );
                    self.events.emit(DaemonEvent::Response {
                        id: request_id,
                        text: captured.text,
                        timestamp: captured.timestamp,
                    });
                    return;
                }
                Err(e) => {
                    warn!(
                        event = "core.daemon.attempt_failed",
                        ai = %self.config.name,
                        request_id = %request_id,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                    );
                    last_error = e;
                    if attempt < max_attempts {
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                }
            }
        }

        self.events.emit(DaemonEvent::Error {
            id: request_id,
            cause: ErrorCause::from(&last_error),
            attempt: max_attempts,
            max_attempts,
            timestamp: Utc::now(),
        });
    }

    /// One send + poll cycle.
    async fn attempt_once(self: &Arc<Self>, message: &str) -> Result<Captured, DaemonError> {
        {
            let mut source = self.source.lock().await;
            source.begin_attempt(message);
        }

        self.send(message).await?;

        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.request_timeout_ms);
        loop {
            tokio::time::sleep(RESPONSE_POLL_INTERVAL).await;

            let pane = self.pane_handle();
            let mut source = self.source.lock().await;
            if let Some(captured) = source.check(pane.as_ref())? {
                return Ok(captured);
            }
            drop(source);

            if tokio::time::Instant::now() >= deadline {
                return Err(DaemonError::Timeout {
                    timeout_ms: self.config.request_timeout_ms,
                });
            }
        }
    }

    /// Deliver a message: IPC first, terminal injection on any IPC failure.
    /// A failed IPC write permanently downgrades this session to injection.
    async fn send(self: &Arc<Self>, message: &str) -> Result<(), DaemonError> {
        {
            let mut guard = lock(&self.ipc);
            let write_result = guard
                .as_ref()
                .map(|channel| channel.write(&format!("{message}\n")));
            match write_result {
                Some(Ok(())) => {
                    debug!(
                        event = "core.daemon.sent_via_ipc",
                        ai = %self.config.name,
                        bytes = message.len(),
                    );
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(
                        event = "core.daemon.ipc_downgraded",
                        ai = %self.config.name,
                        error = %e,
                        message = "IPC write failed, using terminal injection from now on",
                    );
                    if let Some(channel) = guard.take() {
                        channel.destroy();
                    }
                }
                None => {}
            }
        }

        let pane_id = lock(&self.pane_id).clone().ok_or(DaemonError::NotRunning)?;
        self.terminal.inject_text(&pane_id, message)?;
        debug!(
            event = "core.daemon.sent_via_injection",
            ai = %self.config.name,
            pane_id = %pane_id,
            bytes = message.len(),
        );
        Ok(())
    }

    fn pane_handle(&self) -> Option<PaneHandle> {
        lock(&self.pane_id).clone().map(|pane_id| PaneHandle {
            terminal: Arc::clone(&self.terminal),
            pane_id,
        })
    }

    /// Bring the daemon to `Running`. Concurrent callers dedupe on one
    /// in-flight start; a daemon in the terminal `Error` state fails fast.
    async fn ensure_running(self: &Arc<Self>) -> Result<(), DaemonError> {
        if *lock(&self.status) == DaemonStatus::Running {
            return Ok(());
        }

        let _guard = self.start_lock.lock().await;
        match *lock(&self.status) {
            DaemonStatus::Running => return Ok(()),
            DaemonStatus::Error => {
                return Err(DaemonError::StartFailed {
                    message: format!("daemon '{}' previously failed to start", self.config.name),
                });
            }
            _ => {}
        }

        self.set_status(DaemonStatus::Starting);
        info!(event = "core.daemon.start_started", ai = %self.config.name);

        match self.start_sequence().await {
            Ok(()) => {
                self.set_status(DaemonStatus::Running);
                info!(event = "core.daemon.start_completed", ai = %self.config.name);
                Ok(())
            }
            Err(e) => {
                error!(
                    event = "core.daemon.start_failed",
                    ai = %self.config.name,
                    error = %e,
                );
                self.set_status(DaemonStatus::Error);
                Err(e)
            }
        }
    }

    async fn start_sequence(self: &Arc<Self>) -> Result<(), DaemonError> {
        self.probe_cli().await?;
        self.prepare_run_dir()?;

        let persisted = state_file::load(&self.state_path())?;

        // Spawn the pane, retrying once: window servers drop the first
        // request surprisingly often right after boot.
        let pane_id = match self.spawn_pane() {
            Ok(id) => id,
            Err(TerminalError::SpawnFailed { message }) => {
                warn!(
                    event = "core.daemon.pane_spawn_retry",
                    ai = %self.config.name,
                    error = %message,
                );
                self.spawn_pane()?
            }
            Err(e) => return Err(e.into()),
        };
        *lock(&self.pane_id) = Some(pane_id.clone());

        // IPC is best-effort: failure means injection-only, never a dead
        // daemon.
        match InputChannel::create(&self.run_dir.join(PIPE_FILE_NAME)) {
            Ok(channel) => *lock(&self.ipc) = Some(channel),
            Err(e) => {
                warn!(
                    event = "core.daemon.ipc_unavailable",
                    ai = %self.config.name,
                    error = %e,
                );
            }
        }

        let persisted_session = persisted.as_ref().and_then(|s| s.session_id.clone());
        let session_id = {
            let mut source = self.source.lock().await;
            source.on_started(self.config.project_path.as_deref(), persisted_session)?
        };

        let state = DaemonStateFile {
            bridge_session_id: self.bridge_session_id.clone(),
            session_id,
            project_path: self.config.project_path.clone(),
            pane_id: Some(pane_id),
            updated_at: Utc::now().to_rfc3339(),
            extra: persisted.map(|s| s.extra).unwrap_or_default(),
        };
        state_file::save(&self.state_path(), &state)?;

        Ok(())
    }

    /// Verify the secondary CLI exists and answers `--version` quickly.
    async fn probe_cli(&self) -> Result<(), DaemonError> {
        let command = &self.config.cli_command;

        which::which(command).map_err(|e| DaemonError::InstallationMissing {
            command: command.clone(),
            message: e.to_string(),
        })?;

        let mut child = tokio::process::Command::new(command)
            .arg("--version")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| DaemonError::InstallationMissing {
                command: command.clone(),
                message: format!("failed to spawn --version probe: {e}"),
            })?;

        match tokio::time::timeout(PROBE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(DaemonError::InstallationMissing {
                command: command.clone(),
                message: format!("--version probe exited with {status}"),
            }),
            Ok(Err(e)) => Err(DaemonError::InstallationMissing {
                command: command.clone(),
                message: format!("--version probe failed: {e}"),
            }),
            Err(_) => {
                let _ = child.kill().await;
                Err(DaemonError::InstallationMissing {
                    command: command.clone(),
                    message: "--version probe timed out".to_string(),
                })
            }
        }
    }

    fn prepare_run_dir(&self) -> Result<(), DaemonError> {
        std::fs::create_dir_all(&self.run_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.run_dir, std::fs::Permissions::from_mode(0o700))?;
        }
        Ok(())
    }

    fn spawn_pane(&self) -> Result<String, TerminalError> {
        let mut opts = self.config.pane.clone();
        if opts.working_directory.is_none() {
            opts.working_directory = self.config.project_path.clone();
        }
        self.terminal.create_pane(
            &format!("ferry-{}", self.config.name),
            &self.config.command_line(),
            &opts,
        )
    }

    fn state_path(&self) -> PathBuf {
        self.run_dir.join(STATE_FILE_NAME)
    }

    async fn stop(self: &Arc<Self>, reason: &str) -> Result<(), DaemonError> {
        let _guard = self.stop_lock.lock().await;
        if *lock(&self.status) != DaemonStatus::Running {
            return Ok(());
        }

        info!(
            event = "core.daemon.stop_started",
            ai = %self.config.name,
            reason = reason,
        );
        self.set_status(DaemonStatus::Stopping);

        {
            let mut source = self.source.lock().await;
            source.close();
        }

        if let Some(channel) = lock(&self.ipc).take() {
            channel.destroy();
        }

        let pane_id = lock(&self.pane_id).take();
        if let Some(id) = &pane_id
            && let Err(e) = self.terminal.close_pane(id)
        {
            warn!(
                event = "core.daemon.pane_close_failed",
                ai = %self.config.name,
                pane_id = %id,
                error = %e,
            );
        }

        // Keep the session binding, drop the pane: it is gone.
        let session_id = {
            let source = self.source.lock().await;
            source.session_id().map(str::to_string)
        };
        let previous = state_file::load(&self.state_path()).unwrap_or_default();
        let state = DaemonStateFile {
            bridge_session_id: self.bridge_session_id.clone(),
            session_id,
            project_path: self.config.project_path.clone(),
            pane_id: None,
            updated_at: Utc::now().to_rfc3339(),
            extra: previous.map(|s| s.extra).unwrap_or_default(),
        };
        if let Err(e) = state_file::save(&self.state_path(), &state) {
            warn!(
                event = "core.daemon.state_persist_failed",
                ai = %self.config.name,
                error = %e,
            );
        }

        self.set_status(DaemonStatus::Stopped);
        info!(event = "core.daemon.stop_completed", ai = %self.config.name);
        Ok(())
    }

    /// Arm the idle shutdown timer. A later enqueue or completion bumps the
    /// generation, so a stale timer wakes up and does nothing.
    fn arm_idle_timer(self: &Arc<Self>) {
        if *lock(&self.status) != DaemonStatus::Running {
            return;
        }
        if !lock(&self.queue).is_empty() || self.active.load(Ordering::SeqCst) {
            return;
        }

        let generation = self.idle_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let timeout = Duration::from_millis(self.config.effective_idle_timeout_ms());
        let inner = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            if inner.idle_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if !lock(&inner.queue).is_empty() || inner.active.load(Ordering::SeqCst) {
                return;
            }
            if *lock(&inner.status) != DaemonStatus::Running {
                return;
            }

            info!(
                event = "core.daemon.idle_shutdown",
                ai = %inner.config.name,
                idle_timeout_ms = inner.config.effective_idle_timeout_ms(),
            );
            if let Err(e) = inner.stop("idle timeout").await {
                warn!(
                    event = "core.daemon.idle_shutdown_failed",
                    ai = %inner.config.name,
                    error = %e,
                );
            }
        });
    }

    /// Transition status, suppressing same-state emissions.
    fn set_status(&self, next: DaemonStatus) {
        let previous = {
            let mut status = lock(&self.status);
            let previous = *status;
            if previous == next {
                return;
            }
            *status = next;
            previous
        };

        debug!(
            event = "core.daemon.status_changed",
            ai = %self.config.name,
            previous = %previous,
            current = %next,
        );
        self.events.emit(DaemonEvent::Status {
            previous,
            current: next,
            timestamp: Utc::now(),
        });
    }
}

/// Poison-tolerant mutex access: a panic elsewhere must not wedge the
/// supervisor.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
