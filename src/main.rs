//! Job service host
//!
//! Boots the logging environment from a YAML configuration, routes the
//! process's own diagnostics into the service loggers, keeps the sweepers
//! running and periodically reports dependency health until interrupted.
//!
//! ## Usage
//!
//! ```bash
//! joblog-service --config /etc/joblog/config.yml -v
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use joblog_core::health::{probe_fn, row_store_probe, DEFAULT_TIMEOUT};
use joblog_core::logger::ServiceLoggerLayer;
use joblog_core::{
    Backend, Checker, HealthAggregator, HttpProbe, LoggerExt, PeriodicChecker, ServiceConfig,
    ServiceEnvironment,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Seconds between row-store pings
const DATABASE_PROBE_PERIOD: Duration = Duration::from_secs(30);

/// Job service host
#[derive(Parser)]
#[command(name = "joblog-service")]
#[command(version = "0.1.0")]
#[command(about = "Run the job logging environment: loggers, sweepers and health checks")]
struct Args {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ~/.joblog/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between health summaries; 0 disables them
    #[arg(long, default_value_t = 60)]
    health_interval: u64,
}

fn env_filter(verbosity: u8) -> EnvFilter {
    let filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
}

/// Get the default configuration file (~/.joblog/config.yml)
fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".joblog")
        .join("config.yml")
}

/// Health aggregator over the configured components and the row store.
fn build_health(
    env: &ServiceEnvironment,
    config: &ServiceConfig,
    cancel: &CancellationToken,
) -> Result<HealthAggregator> {
    let client = reqwest::Client::new();
    let timeout = config
        .health
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);
    let mut aggregator = HealthAggregator::new().with_timeout(timeout);

    for (name, component) in &config.health.components {
        let http = Arc::new(HttpProbe::from_config(client.clone(), component)?);
        let probe = probe_fn(move || {
            let http = http.clone();
            async move { http.probe().await }
        });
        let period = Duration::from_secs(component.period.max(1));
        let checker = PeriodicChecker::spawn(name.as_str(), probe, period, cancel.child_token());
        aggregator.add(name.as_str(), Arc::new(checker) as Arc<dyn Checker>);
    }

    if let Some(store) = env.row_store() {
        let checker = PeriodicChecker::spawn(
            "database",
            row_store_probe(store.clone()),
            DATABASE_PROBE_PERIOD,
            cancel.child_token(),
        );
        aggregator.add("database", Arc::new(checker) as Arc<dyn Checker>);
    }

    Ok(aggregator)
}

async fn report_health(aggregator: HealthAggregator, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick is immediate; every checker still reads "unknown" then.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let status = aggregator.check_all().await;
                if status.is_healthy() {
                    info!(components = status.components.len(), "All components healthy");
                } else {
                    for component in status.components.iter().filter(|c| c.error.is_some()) {
                        warn!(
                            component = %component.name,
                            error = component.error.as_deref().unwrap_or_default(),
                            "Component unhealthy"
                        );
                    }
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(default_config_path);

    // Bootstrap diagnostics go to stderr until the service logger exists.
    let early = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(args.verbose))
        .finish()
        .set_default();

    let config = ServiceConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    let cancel = CancellationToken::new();
    let env = ServiceEnvironment::bootstrap(&config, cancel.clone())
        .await
        .context("failed to bootstrap the logging environment")?;
    drop(early);

    tracing_subscriber::registry()
        .with(env_filter(args.verbose))
        .with(ServiceLoggerLayer::new(env.service_logger() as Arc<dyn Backend>))
        .init();

    let aggregator = build_health(&env, &config, &cancel)?;
    let reporter = (args.health_interval > 0 && !aggregator.is_empty()).then(|| {
        tokio::spawn(report_health(
            aggregator,
            Duration::from_secs(args.health_interval),
            cancel.child_token(),
        ))
    });

    env.service_logger().infof(format_args!(
        "job service started with {} sweeper(s)",
        env.controller().len()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    cancel.cancel();
    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }
    env.shutdown().await.context("failed to close service loggers")?;

    Ok(())
}
