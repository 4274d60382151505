//! Strategy Host CLI
//!
//! Loads a strategy script, runs it against a fresh order server and exits
//! with status 0, or 1 after printing the error trace to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use strategy_host::config::{HostConfig, LoggingConfig};
use strategy_host::host::Host;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Strategy script to load, overriding the configuration
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    report: bool,
}

impl Args {
    fn apply_logging(&self, logging: &mut LoggingConfig) {
        if let Some(level) = &self.log_level {
            logging.level = level.clone();
        }
        if self.json_logs {
            logging.json = true;
        }
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = HostConfig::load(args.config.as_deref()).context("failed to load configuration");
    let mut logging = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    args.apply_logging(&mut logging);

    let _guard = match init_tracing(&logging) {
        Ok(guard) => guard,
        Err(err) => return fail(err),
    };

    match config.and_then(|config| run(&args, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

fn run(args: &Args, mut config: HostConfig) -> Result<()> {
    if let Some(script) = &args.script {
        config.script = script.clone();
    }

    info!("Starting Strategy Host v{}", strategy_host::VERSION);
    config.log_summary();

    let report = Host::new(config).run()?;
    for ack in &report.orders {
        info!(order = %ack.order, "Order acknowledged");
    }

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn fail(err: anyhow::Error) -> ExitCode {
    error!("Strategy host failed: {err:#}");
    eprintln!("==================== strategy host error ====================");
    eprintln!("{err:?}");
    eprintln!("=============================================================");
    ExitCode::FAILURE
}

/// Installs the global subscriber. The returned guard flushes the log file
/// and must live until the process exits.
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let filter = || {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))
    };

    let stderr_layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .with_filter(filter()?)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter()?)
            .boxed()
    };

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, "strategy-host.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(filter()?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}
