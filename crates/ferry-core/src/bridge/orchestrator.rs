//! The bridge orchestrator.
//!
//! Owns the daemon registry and the request tracking map, and exposes the
//! controller-facing surface: `delegate`, `check_status`, `get_response`,
//! `ping`, `list_ais`, plus lifecycle (`start`/`stop`, signal handling).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::daemon::{AiConfig, AiDaemon, DaemonEvent, DaemonRuntime, DaemonStatus, ErrorCause, Request};
use crate::terminal::{TerminalBackend, TerminalKind, registry as terminal_registry};

use super::errors::BridgeError;
use super::registry::{FactoryRegistry, base_name};
use super::types::{
    AiStatus, BridgeResponse, HealthStatus, RequestStatus, SystemStatus, TrackedRequest,
};

/// Orchestrator construction parameters.
pub struct BridgeConfig {
    /// Runtime directory for daemon state and IPC endpoints (mode 0o700).
    pub run_dir: PathBuf,
    /// Preferred terminal backend; `None` lets the platform default win.
    pub terminal_preference: Option<TerminalKind>,
    /// Explicit terminal backend, bypassing selection (tests, embedders).
    pub terminal: Option<Arc<dyn TerminalBackend>>,
    /// Install SIGINT/SIGTERM handlers that trigger `stop`.
    pub handle_signals: bool,
    /// Daemons registered during `start`.
    pub ais: Vec<AiConfig>,
}

impl BridgeConfig {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            terminal_preference: None,
            terminal: None,
            handle_signals: true,
            ais: Vec::new(),
        }
    }
}

struct DaemonEntry {
    daemon: AiDaemon,
    listener: JoinHandle<()>,
    last_activity: DateTime<Utc>,
    active_request: Option<String>,
}

/// Cheaply clonable orchestrator handle.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    run_dir: PathBuf,
    bridge_session_id: String,
    factories: FactoryRegistry,
    terminal_preference: Option<TerminalKind>,
    terminal_override: Option<Arc<dyn TerminalBackend>>,
    handle_signals: bool,
    initial_ais: Mutex<Vec<AiConfig>>,
    terminal: Mutex<Option<Arc<dyn TerminalBackend>>>,
    daemons: Mutex<HashMap<String, DaemonEntry>>,
    tracking: Mutex<HashMap<String, TrackedRequest>>,
    running: AtomicBool,
    stop_lock: tokio::sync::Mutex<()>,
    signal_task: Mutex<Option<JoinHandle<()>>>,
    /// Cancelled when `stop` finishes; what the binary waits on.
    terminated: CancellationToken,
}

impl Bridge {
    pub fn new(config: BridgeConfig, factories: FactoryRegistry) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                run_dir: config.run_dir,
                bridge_session_id: Uuid::new_v4().to_string(),
                factories,
                terminal_preference: config.terminal_preference,
                terminal_override: config.terminal,
                handle_signals: config.handle_signals,
                initial_ais: Mutex::new(config.ais),
                terminal: Mutex::new(None),
                daemons: Mutex::new(HashMap::new()),
                tracking: Mutex::new(HashMap::new()),
                running: AtomicBool::new(false),
                stop_lock: tokio::sync::Mutex::new(()),
                signal_task: Mutex::new(None),
                terminated: CancellationToken::new(),
            }),
        }
    }

    pub fn bridge_session_id(&self) -> &str {
        &self.inner.bridge_session_id
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Resolves once `stop` has completed (signal-driven or explicit).
    pub async fn wait_terminated(&self) {
        self.inner.terminated.cancelled().await;
    }

    /// Create the runtime directory, install signal handling, and register
    /// the initial AIs. A registration failure rolls back every daemon
    /// already started and propagates.
    pub async fn start(&self) -> Result<(), BridgeError> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!(
            event = "core.bridge.start_started",
            bridge_session_id = %self.inner.bridge_session_id,
            run_dir = %self.inner.run_dir.display(),
        );

        // A restart begins with a clean slate: whatever the previous run
        // tracked was failed by its stop sweep.
        lock(&self.inner.tracking).clear();

        if let Err(e) = self.prepare_run_dir() {
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let terminal = match &self.inner.terminal_override {
            Some(backend) => Arc::clone(backend),
            None => match terminal_registry::select_backend(self.inner.terminal_preference) {
                Ok(backend) => backend,
                Err(e) => {
                    self.inner.running.store(false, Ordering::SeqCst);
                    return Err(e.into());
                }
            },
        };
        *lock(&self.inner.terminal) = Some(terminal);

        if self.inner.handle_signals {
            self.install_signal_handler();
        }

        let initial: Vec<AiConfig> = lock(&self.inner.initial_ais).drain(..).collect();
        for config in initial {
            let name = config.name.clone();
            if let Err(e) = self.register_ai(config).await {
                error!(
                    event = "core.bridge.initial_registration_failed",
                    ai = %name,
                    error = %e,
                );
                self.stop().await;
                return Err(e);
            }
        }

        info!(event = "core.bridge.start_completed");
        Ok(())
    }

    /// Stop every daemon (sorted order), fail whatever is still in flight,
    /// remove the runtime directory, uninstall handlers. Idempotent.
    pub async fn stop(&self) {
        let _guard = self.inner.stop_lock.lock().await;
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!(event = "core.bridge.stop_started");

        let mut names: Vec<String> = lock(&self.inner.daemons).keys().cloned().collect();
        names.sort();
        for name in names {
            self.remove_daemon(&name, None).await;
        }

        // Global cancellation: every request that never finished is failed.
        {
            let mut tracking = lock(&self.inner.tracking);
            for record in tracking.values_mut() {
                if !record.status.is_terminal() {
                    record.status = RequestStatus::Error;
                    record.completed_at = Some(Utc::now());
                    record.error = Some(ErrorCause::new(
                        "cancelled",
                        "orchestrator stopped before completion",
                    ));
                }
            }
        }

        if let Err(e) = std::fs::remove_dir_all(&self.inner.run_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    event = "core.bridge.run_dir_cleanup_failed",
                    run_dir = %self.inner.run_dir.display(),
                    error = %e,
                );
            }
        }

        if let Some(task) = lock(&self.inner.signal_task).take() {
            task.abort();
        }

        info!(event = "core.bridge.stop_completed");
        self.inner.terminated.cancel();
    }

    /// Create and register a daemon for `config.name`.
    pub async fn register_ai(&self, config: AiConfig) -> Result<AiDaemon, BridgeError> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        let name = config.name.clone();
        if lock(&self.inner.daemons).contains_key(&name) {
            return Err(BridgeError::AlreadyRegistered { name });
        }

        let factory = self
            .inner
            .factories
            .get(&name)
            .ok_or_else(|| BridgeError::NoFactory {
                name: name.clone(),
                base: base_name(&name).to_string(),
            })?;

        let terminal = lock(&self.inner.terminal)
            .clone()
            .ok_or(BridgeError::NotRunning)?;

        let runtime = DaemonRuntime {
            run_dir: self.inner.run_dir.clone(),
            bridge_session_id: self.inner.bridge_session_id.clone(),
            terminal,
            // Placeholder; every factory replaces the source.
            source: crate::daemon::CaptureSource::Scrape(crate::daemon::ScrapeSource::new(
                crate::capture::IndicatorCatalog::new(),
            )),
        };
        let daemon = factory(config, runtime)?;

        let listener = self.spawn_listener(&name, &daemon);
        lock(&self.inner.daemons).insert(
            name.clone(),
            DaemonEntry {
                daemon: daemon.clone(),
                listener,
                last_activity: Utc::now(),
                active_request: None,
            },
        );

        info!(event = "core.bridge.ai_registered", ai = %name);
        Ok(daemon)
    }

    /// Detach, stop, and remove a daemon; fail its in-flight requests.
    pub async fn unregister_ai(&self, name: &str) -> Result<(), BridgeError> {
        if lock(&self.inner.daemons).contains_key(name) {
            self.remove_daemon(name, Some("daemon unregistered")).await;
            info!(event = "core.bridge.ai_unregistered", ai = %name);
            Ok(())
        } else {
            Err(BridgeError::UnknownAi {
                name: name.to_string(),
            })
        }
    }

    /// Queue a request on a named daemon and return the tracked request id.
    ///
    /// Synchronous: insertion into both the daemon queue and the tracking
    /// map happens before any event for the request can be processed.
    pub fn delegate(&self, ai_name: &str, request: Request) -> Result<String, BridgeError> {
        if !self.is_running() {
            return Err(BridgeError::NotRunning);
        }
        let daemon = {
            let daemons = lock(&self.inner.daemons);
            daemons
                .get(ai_name)
                .map(|entry| entry.daemon.clone())
                .ok_or_else(|| BridgeError::UnknownAi {
                    name: ai_name.to_string(),
                })?
        };

        // Tracking lock held across the enqueue: the listener task cannot
        // observe a response for an id that is not yet tracked.
        let mut tracking = lock(&self.inner.tracking);
        let id = daemon.queue_request(request);
        tracking.insert(id.clone(), TrackedRequest::queued(ai_name));

        info!(
            event = "core.bridge.request_delegated",
            ai = %ai_name,
            request_id = %id,
        );
        Ok(id)
    }

    pub fn check_status(&self, request_id: &str) -> RequestStatus {
        lock(&self.inner.tracking)
            .get(request_id)
            .map(|record| record.status)
            .unwrap_or(RequestStatus::Unknown)
    }

    /// The completed response, or `None` while the request is anywhere
    /// short of `Completed`. Never blocks.
    pub fn get_response(&self, request_id: &str) -> Option<BridgeResponse> {
        let tracking = lock(&self.inner.tracking);
        let record = tracking.get(request_id)?;
        if record.status != RequestStatus::Completed {
            return None;
        }
        let completed_at = record.completed_at?;
        Some(BridgeResponse {
            request_id: request_id.to_string(),
            ai_name: record.ai_name.clone(),
            content: record.content.clone()?,
            timestamp: completed_at,
            processing_time_ms: (completed_at - record.created_at)
                .num_milliseconds()
                .max(0) as u64,
        })
    }

    pub fn ping(&self, ai_name: &str) -> Result<HealthStatus, BridgeError> {
        let started = std::time::Instant::now();
        let (daemon_status, queue_length) = {
            let daemons = lock(&self.inner.daemons);
            let entry = daemons.get(ai_name).ok_or_else(|| BridgeError::UnknownAi {
                name: ai_name.to_string(),
            })?;
            (entry.daemon.status(), entry.daemon.queue_len())
        };

        let (health, detail) = HealthStatus::classify(daemon_status, queue_length);
        Ok(HealthStatus {
            ai_name: ai_name.to_string(),
            health,
            daemon_status,
            queue_length,
            latency_ms: started.elapsed().as_millis() as u64,
            checked_at: Utc::now(),
            detail,
        })
    }

    pub fn list_ais(&self) -> Vec<AiStatus> {
        let daemons = lock(&self.inner.daemons);
        let mut statuses: Vec<AiStatus> = daemons
            .iter()
            .map(|(name, entry)| AiStatus {
                name: name.clone(),
                status: entry.daemon.status(),
                active_request: entry.active_request.clone(),
                queue_length: entry.daemon.queue_len(),
                last_activity: entry.last_activity,
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn system_status(&self) -> SystemStatus {
        let daemons = lock(&self.inner.daemons);
        SystemStatus {
            running: self.is_running(),
            bridge_session_id: self.inner.bridge_session_id.clone(),
            ai_count: daemons.len(),
            total_queued: daemons.values().map(|e| e.daemon.queue_len()).sum(),
            tracked_requests: lock(&self.inner.tracking).len(),
        }
    }

    fn prepare_run_dir(&self) -> Result<(), BridgeError> {
        std::fs::create_dir_all(&self.inner.run_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.inner.run_dir,
                std::fs::Permissions::from_mode(0o700),
            )?;
        }
        Ok(())
    }

    /// One listener task per daemon translates its events into tracking
    /// updates. Aborted on unregister so no listener outlives its daemon.
    fn spawn_listener(&self, name: &str, daemon: &AiDaemon) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        let mut rx = daemon.subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(DaemonEvent::Response { id, text, timestamp }) => {
                        {
                            let mut tracking = lock(&inner.tracking);
                            if let Some(record) = tracking.get_mut(&id) {
                                record.status = RequestStatus::Completed;
                                record.content = Some(text);
                                record.completed_at = Some(timestamp);
                            }
                        }
                        inner.touch(&name, None);
                        inner.promote_oldest_queued(&name);
                    }
                    Ok(DaemonEvent::Error { id, cause, .. }) => {
                        {
                            let mut tracking = lock(&inner.tracking);
                            if let Some(record) = tracking.get_mut(&id) {
                                record.status = RequestStatus::Error;
                                record.completed_at = Some(Utc::now());
                                record.error = Some(cause);
                            }
                        }
                        inner.touch(&name, None);
                        inner.promote_oldest_queued(&name);
                    }
                    Ok(DaemonEvent::Status { current, .. }) => {
                        if current == DaemonStatus::Running {
                            inner.promote_oldest_queued(&name);
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            event = "core.bridge.listener_lagged",
                            ai = %name,
                            skipped = skipped,
                        );
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Shared removal path for `stop` and `unregister_ai`. When
    /// `fail_cause` is set, the daemon's non-terminal requests fail with
    /// it; `stop` passes `None` and applies its own sweep afterwards.
    async fn remove_daemon(&self, name: &str, fail_cause: Option<&str>) {
        let entry = lock(&self.inner.daemons).remove(name);
        let Some(entry) = entry else {
            return;
        };

        entry.listener.abort();
        if let Err(e) = entry.daemon.stop("unregistered from bridge").await {
            warn!(
                event = "core.bridge.daemon_stop_failed",
                ai = %name,
                error = %e,
            );
        }

        if let Some(cause) = fail_cause {
            let mut tracking = lock(&self.inner.tracking);
            for record in tracking.values_mut() {
                if record.ai_name == name && !record.status.is_terminal() {
                    record.status = RequestStatus::Error;
                    record.completed_at = Some(Utc::now());
                    record.error = Some(ErrorCause::new("cancelled", cause));
                }
            }
        }
    }

    fn install_signal_handler(&self) {
        let bridge = self.clone();
        let task = tokio::spawn(async move {
            wait_for_termination_signal().await;
            info!(event = "core.bridge.termination_signal");
            bridge.stop().await;
        });
        *lock(&self.inner.signal_task) = Some(task);
    }
}

impl BridgeInner {
    fn touch(&self, name: &str, active_request: Option<String>) {
        if let Some(entry) = lock(&self.daemons).get_mut(name) {
            entry.last_activity = Utc::now();
            entry.active_request = active_request;
        }
    }

    /// The promotion rule: the oldest still-queued request of this daemon
    /// becomes `Processing`. This is how callers watch the queue drain.
    fn promote_oldest_queued(&self, name: &str) {
        let mut tracking = lock(&self.tracking);
        let oldest = tracking
            .iter()
            .filter(|(_, r)| r.ai_name == name && r.status == RequestStatus::Queued)
            .min_by_key(|(id, r)| (r.created_at, (*id).clone()))
            .map(|(id, _)| id.clone());

        if let Some(id) = oldest {
            if let Some(record) = tracking.get_mut(&id) {
                record.status = RequestStatus::Processing;
            }
            drop(tracking);
            debug!(event = "core.bridge.request_promoted", ai = %name, request_id = %id);
            self.touch(name, Some(id));
        }
    }
}

/// Wait for SIGINT or SIGTERM.
#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(event = "core.bridge.signal_install_failed", error = %e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Poison-tolerant mutex access, as in the daemon supervisor.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
