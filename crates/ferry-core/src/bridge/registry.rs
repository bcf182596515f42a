//! Daemon factory registry.
//!
//! The bridge is factory-agnostic: it looks up a factory by the AI's name
//! and hands it the runtime (terminal backend, run dir, bridge session).
//! Multiple instances of one tool share a factory through the base-name
//! rule: `cc:1` and `cc:2` both resolve to the `cc` factory when no exact
//! entry exists.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::capture::IndicatorCatalog;
use crate::daemon::{AiConfig, AiDaemon, CaptureSource, DaemonRuntime, LogSource, ScrapeSource};
use crate::storage::{ClaudeLogAdapter, OpenCodeAdapter, StorageAdapter};

use super::errors::BridgeError;

/// Builds a daemon for one AI from its config and the bridge runtime.
pub type DaemonFactory =
    Arc<dyn Fn(AiConfig, DaemonRuntime) -> Result<AiDaemon, BridgeError> + Send + Sync>;

/// Idle footer rendered by the log-backed default tools.
const CONTEXT_FOOTER_HINT: &str = r"\d+% context left";

#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, DaemonFactory>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry carrying the built-in factories: log-backed `claude` (with
    /// pane fallback), log-backed `opencode`, and a pure pane-scrape
    /// factory under `scrape` for tools without any on-disk log.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("claude", claude_factory(None));
        registry.insert("opencode", opencode_factory(None));
        registry.insert("scrape", scrape_factory());
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, factory: DaemonFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Exact name first, then the base name before a `:` suffix.
    pub fn get(&self, name: &str) -> Option<&DaemonFactory> {
        if let Some(factory) = self.factories.get(name) {
            return Some(factory);
        }
        self.factories.get(base_name(name))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

/// The part of an AI name before an instance suffix (`cc:2` → `cc`).
pub fn base_name(name: &str) -> &str {
    name.split_once(':').map(|(base, _)| base).unwrap_or(name)
}

/// Log-backed factory over the append-only JSONL format, with pane-scrape
/// fallback for replies the log misses. `root` overrides the adapter's
/// default tree (tests).
pub fn claude_factory(root: Option<std::path::PathBuf>) -> DaemonFactory {
    Arc::new(move |config, runtime| {
        let adapter: Arc<dyn StorageAdapter> = Arc::new(match &root {
            Some(root) => ClaudeLogAdapter::with_root(root.clone()),
            None => ClaudeLogAdapter::new(),
        });
        let catalog = IndicatorCatalog::new()
            .with_idle_hint(CONTEXT_FOOTER_HINT)
            .map_err(|e| BridgeError::Daemon(crate::daemon::DaemonError::StartFailed {
                message: format!("invalid idle hint regex: {e}"),
            }))?;
        let fallback = ScrapeSource::new(catalog).for_backend(runtime.terminal.kind());
        let source = CaptureSource::Log(
            LogSource::new(adapter).with_scrape_fallback(fallback),
        );
        Ok(AiDaemon::new(config, DaemonRuntime { source, ..runtime }))
    })
}

/// Log-backed factory over the multi-file session tree.
pub fn opencode_factory(root: Option<std::path::PathBuf>) -> DaemonFactory {
    Arc::new(move |config, runtime| {
        let adapter: Arc<dyn StorageAdapter> = Arc::new(match &root {
            Some(root) => OpenCodeAdapter::with_root(root.clone()),
            None => OpenCodeAdapter::new(),
        });
        let source = CaptureSource::Log(LogSource::new(adapter));
        Ok(AiDaemon::new(config, DaemonRuntime { source, ..runtime }))
    })
}

/// Pane-scrape-only factory for tools with no on-disk session log.
pub fn scrape_factory() -> DaemonFactory {
    scrape_factory_with_interval(Duration::from_millis(1500))
}

/// Pane-scrape factory with an explicit poll interval (tests).
pub fn scrape_factory_with_interval(poll_interval: Duration) -> DaemonFactory {
    Arc::new(move |config, runtime| {
        let source = CaptureSource::Scrape(
            ScrapeSource::new(IndicatorCatalog::new())
                .for_backend(runtime.terminal.kind())
                .with_poll_interval(poll_interval),
        );
        Ok(AiDaemon::new(config, DaemonRuntime { source, ..runtime }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("cc"), "cc");
        assert_eq!(base_name("cc:1"), "cc");
        assert_eq!(base_name("cc:1:extra"), "cc");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn test_defaults_present() {
        let registry = FactoryRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["claude", "opencode", "scrape"]);
    }

    #[test]
    fn test_instance_suffix_shares_factory() {
        let registry = FactoryRegistry::with_defaults();
        assert!(registry.get("claude").is_some());
        assert!(registry.get("claude:1").is_some());
        assert!(registry.get("claude:2").is_some());
        assert!(registry.get("ghost:1").is_none());
    }

    #[test]
    fn test_exact_name_wins_over_base() {
        let mut registry = FactoryRegistry::with_defaults();
        let marker = scrape_factory();
        registry.insert("claude:special", marker);
        // Both resolve; the exact entry is preferred (observable through
        // registration success; both are valid factories).
        assert!(registry.get("claude:special").is_some());
    }
}
