use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use ferry_config::{AiEntry, FerryConfig};
use ferry_core::bridge::{Bridge, BridgeConfig, FactoryRegistry};
use ferry_core::daemon::AiConfig;
use ferry_core::terminal::TerminalKind;

#[derive(Parser)]
#[command(name = "ferry", about = "Delegate requests to AI CLIs in terminal panes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the orchestrator and run until SIGINT/SIGTERM.
    Start {
        /// Explicit config file instead of the user/project hierarchy.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Start { config } => run_start(config),
    };
    std::process::exit(exit_code);
}

fn run_start(config_path: Option<PathBuf>) -> i32 {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ferry: {e}");
            return 1;
        }
    };

    ferry_core::init_logging(&config.log_level);
    info!(event = "cli.start_started", pid = std::process::id());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(event = "cli.runtime_init_failed", error = %e);
            eprintln!("ferry: failed to start runtime: {e}");
            return 1;
        }
    };

    rt.block_on(async {
        let bridge = build_bridge(&config);
        if let Err(e) = bridge.start().await {
            error!(event = "cli.bridge_start_failed", error = %e);
            eprintln!("ferry: {e}");
            return 1;
        }

        eprintln!(
            "ferry running (session {}, {} AIs). Ctrl-C to stop.",
            bridge.bridge_session_id(),
            bridge.list_ais().len(),
        );

        bridge.wait_terminated().await;
        info!(event = "cli.start_completed");
        0
    })
}

fn load_config(path: Option<PathBuf>) -> Result<FerryConfig, ferry_config::ConfigError> {
    match path {
        Some(path) => ferry_config::load_file(&path),
        None => FerryConfig::load_hierarchy(),
    }
}

fn build_bridge(config: &FerryConfig) -> Bridge {
    let mut bridge_config = BridgeConfig::new(config.effective_run_dir());
    bridge_config.terminal_preference = TerminalKind::parse(&config.terminal.backend);
    bridge_config.ais = config.ais.iter().map(|entry| ai_config(config, entry)).collect();

    Bridge::new(bridge_config, FactoryRegistry::with_defaults())
}

/// Map a config entry onto a daemon config, applying the `[daemon]`
/// defaults where the entry has no override.
fn ai_config(config: &FerryConfig, entry: &AiEntry) -> AiConfig {
    let mut ai = AiConfig::new(&entry.name, entry.effective_command());
    ai.cli_args = entry.args.clone();
    ai.project_path = entry.project_path.clone();
    ai.idle_timeout_ms = entry
        .idle_timeout_ms
        .unwrap_or(config.daemon.idle_timeout_ms);
    ai.max_retries = entry.max_retries.unwrap_or(config.daemon.max_retries);
    ai.request_timeout_ms = entry
        .request_timeout_ms
        .unwrap_or(config.daemon.request_timeout_ms);
    ai
}
