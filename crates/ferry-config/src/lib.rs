//! # ferry-config
//!
//! TOML configuration types, hierarchy loading, and validation for ferry.
//!
//! Single source of truth for [`FerryConfig`] and friends. The core crate
//! never reads config files; the binary loads here and maps into core
//! types.

mod loading;
mod validation;

pub mod errors;
pub mod types;

pub use errors::ConfigError;
pub use loading::{load_file, load_hierarchy};
pub use types::{AiEntry, DaemonSettings, FerryConfig, TerminalSettings};
pub use validation::{VALID_BACKENDS, VALID_LOG_LEVELS, VALID_PANE_LAYOUTS, validate_config};

impl FerryConfig {
    /// Load configuration from the hierarchy of config files.
    pub fn load_hierarchy() -> Result<Self, ConfigError> {
        loading::load_hierarchy()
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }
}
