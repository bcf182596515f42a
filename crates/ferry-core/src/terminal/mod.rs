//! Terminal pane abstraction.
//!
//! Everything a daemon needs from a host terminal: spawn a pane running a
//! command, push text into it as if typed, read its scrollback, tear it
//! down. Three interchangeable backends (tmux, WezTerm, Windows Terminal)
//! satisfy one trait; `registry::select_backend` picks the first working
//! one for the current machine.

pub mod backends;
pub mod command;
pub mod errors;
pub mod keys;
pub mod registry;
pub mod text;
pub mod traits;
pub mod types;

pub use errors::TerminalError;
pub use registry::{backend_for, select_backend};
pub use traits::TerminalBackend;
pub use types::{PaneInfo, SpawnOptions, SplitDirection, TerminalKind};
