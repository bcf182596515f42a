//! Backend selection.
//!
//! A user preference is tried first, then the platform defaults. Each
//! candidate is probed with a cheap capability call; the first one that
//! answers wins. When nothing answers, the error carries one diagnostic
//! line per candidate, including how to install it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::backends::{TmuxBackend, WezTermBackend, WindowsTerminalBackend};
use super::errors::TerminalError;
use super::traits::TerminalBackend;
use super::types::TerminalKind;

/// Instantiate the backend for a given kind.
pub fn backend_for(kind: TerminalKind) -> Arc<dyn TerminalBackend> {
    match kind {
        TerminalKind::Tmux => Arc::new(TmuxBackend),
        TerminalKind::WezTerm => Arc::new(WezTermBackend),
        TerminalKind::WindowsTerminal => Arc::new(WindowsTerminalBackend),
    }
}

/// Platform default candidate order, most preferred first.
fn platform_defaults() -> Vec<TerminalKind> {
    if cfg!(windows) {
        vec![TerminalKind::WezTerm, TerminalKind::WindowsTerminal]
    } else {
        vec![TerminalKind::Tmux, TerminalKind::WezTerm]
    }
}

/// Candidate order: preference first (deduplicated), then platform defaults.
fn candidate_kinds(preference: Option<TerminalKind>) -> Vec<TerminalKind> {
    let mut kinds = Vec::new();
    if let Some(kind) = preference {
        kinds.push(kind);
    }
    for kind in platform_defaults() {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

/// Select a working terminal backend.
pub fn select_backend(
    preference: Option<TerminalKind>,
) -> Result<Arc<dyn TerminalBackend>, TerminalError> {
    let mut diagnostics = Vec::new();

    for kind in candidate_kinds(preference) {
        let backend = backend_for(kind);

        if !backend.is_available() {
            debug!(
                event = "core.terminal.candidate_unavailable",
                backend = backend.name(),
            );
            diagnostics.push(format!(
                "{}: not installed ({})",
                backend.name(),
                backend.install_hint()
            ));
            continue;
        }

        match backend.probe() {
            Ok(()) => {
                info!(
                    event = "core.terminal.backend_selected",
                    backend = backend.name(),
                    preferred = preference.map(|p| p == kind).unwrap_or(false),
                );
                return Ok(backend);
            }
            Err(e) => {
                warn!(
                    event = "core.terminal.candidate_probe_failed",
                    backend = backend.name(),
                    error = %e,
                );
                diagnostics.push(format!("{}: probe failed: {}", backend.name(), e));
            }
        }
    }

    Err(TerminalError::NoBackendAvailable { diagnostics })
}
