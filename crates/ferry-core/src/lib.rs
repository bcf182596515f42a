//! ferry-core: delegate requests to interactive AI CLIs in terminal panes.
//!
//! Secondary AI assistants are conversational TUIs with no API. Ferry runs
//! each one inside a managed terminal pane, types requests at it, and
//! recovers the answers from its on-disk session log or, failing that,
//! from the pane's own scrollback. A request/response layer on top hides
//! all of that from the controller.
//!
//! # Main entry points
//!
//! - [`bridge`] - the orchestrator: `delegate` / `check_status` /
//!   `get_response` / `ping`
//! - [`daemon`] - per-AI supervision: queue, retries, lifecycle, events
//! - [`terminal`] - pane backends (tmux, WezTerm, Windows Terminal)
//! - [`storage`] - session-log adapters and the debounced watcher
//! - [`capture`] - the pane-scrape state machine and indicator catalog
//! - [`ipc`] - the FIFO fast path for input delivery

pub mod bridge;
pub mod capture;
pub mod daemon;
pub mod ipc;
pub mod logging;
pub mod storage;
pub mod terminal;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeResponse, FactoryRegistry, RequestStatus};
pub use daemon::{AiConfig, AiDaemon, DaemonEvent, DaemonStatus, Priority, Request};
pub use storage::{Message, Role, StorageAdapter};
pub use terminal::{TerminalBackend, TerminalKind};

pub use logging::init_logging;
