//! Job log operator CLI
//!
//! Thin wrapper around joblog-core for inspecting and maintaining the logs a
//! job service writes.
//!
//! ## Usage
//!
//! ```bash
//! # List the registered backends and what they support
//! joblog backends
//!
//! # Print a stored job log (or just its last 4 KiB)
//! joblog logs get 5f8a2c --tail 4096
//!
//! # Run every configured sweeper once
//! joblog sweep
//!
//! # Probe the configured health components, or ad-hoc endpoints
//! joblog health
//! joblog health core=http://core:8080/api/v2.0/ping --timeout 5
//!
//! # Validate a configuration file
//! joblog -c ./config.yml check-config
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use joblog_core::bootstrap::{build_sweepers, select_getter};
use joblog_core::{
    BackendCatalog, Checker, Getter, HealthAggregator, HttpProbe, LogError, Registry,
    ServiceConfig, SweeperController, TailGetter,
};
use tokio_util::sync::CancellationToken;

/// Job log operator tool
#[derive(Parser)]
#[command(name = "joblog")]
#[command(version = "0.1.0")]
#[command(about = "Inspect, sweep and health-check job service logs")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ~/.joblog/config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered backends and their capabilities
    Backends {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Job log retrieval
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },

    /// Run every configured sweeper once and report what was removed
    ///
    /// With a `database` configured, this needs exclusive access to it and
    /// fails while the job service is running.
    Sweep,

    /// Probe HTTP components and print the aggregated status
    Health {
        /// Components as NAME=URL; defaults to the configured components
        targets: Vec<String>,

        /// Seconds to wait for each component
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Load and validate the configuration file
    CheckConfig,
}

#[derive(Subcommand)]
enum LogsAction {
    /// Print the log of a job
    ///
    /// With a `database` configured, this needs exclusive access to it and
    /// fails while the job service is running.
    Get {
        /// Job (log) ID
        id: String,

        /// Only print the last N bytes
        #[arg(long)]
        tail: Option<usize>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default configuration file (~/.joblog/config.yml)
fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".joblog")
        .join("config.yml")
}

fn load_config(path: &Path) -> Result<ServiceConfig> {
    let config = ServiceConfig::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    Ok(config)
}

/// Catalog over the configured backends.
///
/// redb allows a single opener, so this fails while `joblog-service` is
/// running against the same database.
fn open_catalog(config: &ServiceConfig) -> Result<BackendCatalog> {
    match BackendCatalog::from_config(Registry::builtin(), config) {
        Ok(catalog) => Ok(catalog),
        Err(LogError::DatabaseLocked(path)) => bail!(
            "the job service holds {}; stop it or use the FILE getter",
            path.display()
        ),
        Err(e) => Err(e.into()),
    }
}

/// Split a `NAME=URL` argument.
fn parse_target(target: &str) -> Result<(&str, &str)> {
    match target.split_once('=') {
        Some((name, url)) if !name.is_empty() && !url.is_empty() => Ok((name, url)),
        _ => bail!("invalid health target '{}', expected NAME=URL", target),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config_path = cli.config.unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Backends { json } => {
            let backends = Registry::builtin().describe();
            if json {
                println!("{}", serde_json::to_string_pretty(&backends)?);
            } else {
                println!("{:<12} {:<10} {:<8} {:<8}", "NAME", "SINGLETON", "SWEEPER", "GETTER");
                for b in backends {
                    println!(
                        "{:<12} {:<10} {:<8} {:<8}",
                        b.name,
                        yes_no(b.singleton),
                        yes_no(b.sweeper),
                        yes_no(b.getter)
                    );
                }
            }
        }

        Commands::Logs { action } => match action {
            LogsAction::Get { id, tail } => {
                let config = load_config(&config_path)?;
                let catalog = open_catalog(&config)?;
                let Some(mut getter) = select_getter(&catalog, &config.job_loggers) else {
                    bail!("no configured job logger supports retrieval");
                };
                if let Some(max_bytes) = tail {
                    getter = Arc::new(TailGetter::new(getter, max_bytes)) as Arc<dyn Getter>;
                }

                let content = getter
                    .retrieve(&id)
                    .with_context(|| format!("failed to retrieve log {}", id))?;
                use std::io::Write;
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&content)?;
                stdout.flush()?;
            }
        },

        Commands::Sweep => {
            let config = load_config(&config_path)?;
            config.validate(&Registry::builtin())?;
            let catalog = open_catalog(&config)?;
            let sweepers = build_sweepers(&catalog, &config)?;
            if sweepers.is_empty() {
                println!("No sweepers configured.");
                return Ok(());
            }

            let controller = SweeperController::new(&CancellationToken::new(), sweepers);
            let count = controller.len();
            let summary = tokio::task::spawn_blocking(move || controller.sweep_once()).await?;

            println!("Ran {} sweeper(s), removed {} log(s).", count, summary.removed);
            for failure in &summary.failures {
                eprintln!("  {}: {}", failure.backend, failure.error);
            }
            if !summary.failures.is_empty() {
                bail!("{} sweeper(s) failed", summary.failures.len());
            }
        }

        Commands::Health { targets, timeout } => {
            let client = reqwest::Client::new();
            let mut aggregator = HealthAggregator::new();

            if targets.is_empty() {
                let config = load_config(&config_path)?;
                if config.health.components.is_empty() {
                    bail!("no health components configured; pass NAME=URL targets");
                }
                for (name, component) in &config.health.components {
                    let probe = HttpProbe::from_config(client.clone(), component)?;
                    aggregator.add(name.as_str(), Arc::new(probe) as Arc<dyn Checker>);
                }
                if let Some(secs) = config.health.timeout {
                    aggregator = aggregator.with_timeout(Duration::from_secs(secs));
                }
            } else {
                for target in &targets {
                    let (name, url) = parse_target(target)?;
                    let probe = HttpProbe::new(client.clone(), url);
                    aggregator.add(name, Arc::new(probe) as Arc<dyn Checker>);
                }
            }
            if let Some(secs) = timeout {
                aggregator = aggregator.with_timeout(Duration::from_secs(secs));
            }

            let status = aggregator.check_all().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            if !status.is_healthy() {
                bail!("one or more components are unhealthy");
            }
        }

        Commands::CheckConfig => {
            let config = load_config(&config_path)?;
            config.validate(&Registry::builtin())?;

            let raw = std::fs::read_to_string(&config_path)?;
            for entry in ServiceConfig::unknown_levels(&raw)? {
                eprintln!("warning: unknown level {}, WARNING will be used", entry);
            }

            println!("Configuration OK: {}", config_path.display());
            println!("  Service loggers: {}", config.loggers.len());
            println!("  Job loggers:     {}", config.job_loggers.len());
            println!(
                "  Sweepers:        {}",
                config
                    .loggers
                    .iter()
                    .chain(config.job_loggers.iter())
                    .filter(|p| p.sweeper.is_some())
                    .count()
            );
            if let Some(db) = &config.database {
                println!("  Database:        {}", db.path.display());
            }
            println!("  Health checks:   {}", config.health.components.len());
        }
    }

    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
