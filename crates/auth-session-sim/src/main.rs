//! Biometric session simulator - run scripted authentication scenarios.

mod output;
mod runner;
mod scenario;

use anyhow::Context;
use auth_config_and_utils::{init_logging_for_service, Config, Paths};
use auth_session_runtime::RuntimeConfig;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Drive biometric authentication sessions from JSON scenarios.
#[derive(Parser)]
#[command(name = "biometric-session-sim")]
#[command(about = "Simulator for biometric authentication sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and logs
    #[arg(long, env = "BIOMETRIC_SESSION_HOME", global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario file
    Run {
        /// Path to the scenario JSON
        #[arg(short, long)]
        scenario: PathBuf,
    },
    /// Show the effective configuration
    Config,
}

/// Effective configuration and where it came from.
#[derive(Serialize)]
struct ConfigView {
    config: Config,
    base_dir: PathBuf,
    config_file: PathBuf,
    log_file: PathBuf,
}

impl fmt::Display for ConfigView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {:<24} {}", "log_level:", self.config.log_level)?;
        writeln!(
            f,
            "  {:<24} {}",
            "event_queue_capacity:", self.config.event_queue_capacity
        )?;
        writeln!(
            f,
            "  {:<24} {}",
            "cancel_on_handle_drop:", self.config.cancel_on_handle_drop
        )?;
        writeln!(f, "  {:<24} {}", "base_dir:", self.base_dir.display())?;
        writeln!(f, "  {:<24} {}", "config_file:", self.config_file.display())?;
        write!(f, "  {:<24} {}", "log_file:", self.log_file.display())
    }
}

async fn run_scenario(
    path: &Path,
    config: &Config,
    format: &output::OutputFormat,
) -> anyhow::Result<()> {
    let scenario = scenario::Scenario::load(path)?;
    let outcome = runner::run(&scenario, RuntimeConfig::from(config)).await?;
    output::print(&outcome, format);
    Ok(())
}

fn show_config(paths: &Paths, config: &Config, format: &output::OutputFormat) {
    let view = ConfigView {
        config: config.clone(),
        base_dir: paths.base_dir().clone(),
        config_file: paths.config_file(),
        log_file: paths.session_log_file(),
    };
    output::print(&view, format);
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::resolve(cli.base_dir.clone())?;
    let config = Config::load(&paths).context("Failed to load configuration")?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    match init_logging_for_service("biometric-session-sim", &level, Some(paths.session_log_file())) {
        Ok(log_path) => debug!(log_path = %log_path.display(), "Logging ready"),
        Err(e) => eprintln!("Warning: logging disabled: {}", e),
    }

    match cli.command {
        Commands::Run { scenario } => run_scenario(&scenario, &config, &cli.format).await,
        Commands::Config => {
            show_config(&paths, &config, &cli.format);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = execute(cli).await {
        warn!(error = %e, "Simulator failed");
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}
