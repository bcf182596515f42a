//! Concrete terminal backend implementations.

mod tmux;
mod wezterm;
mod windows_terminal;

pub use tmux::TmuxBackend;
pub use wezterm::WezTermBackend;
pub use windows_terminal::WindowsTerminalBackend;
