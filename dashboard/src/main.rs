mod config;
mod telemetry;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError};
use feeds::{FeedCache, FeedError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "dashboard", about = "Aggregates the DE dashboard")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the dashboard API
    Run {
        #[arg(long)]
        config_file: PathBuf,
    },
    /// Pull every configured feed once and print the result as JSON
    Feeds {
        #[arg(long)]
        config_file: PathBuf,
    },
}

impl CliCommand {
    fn config_file(&self) -> &PathBuf {
        match self {
            CliCommand::Run { config_file } | CliCommand::Feeds { config_file } => config_file,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error(transparent)]
    Aggregator(#[from] aggregator::AggregatorError),
    #[error(transparent)]
    Feeds(#[from] FeedError),
    #[error("could not encode feeds: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not start the runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(cli.command.config_file()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = telemetry::init_logging(&config.common.logging);

    match start(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "dashboard exited with an error");
            ExitCode::FAILURE
        }
    }
}

fn start(command: CliCommand, config: Config) -> Result<(), CliError> {
    if let Some(metrics) = &config.common.metrics {
        telemetry::init_metrics(metrics)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match command {
        CliCommand::Run { .. } => runtime.block_on(serve(config)),
        CliCommand::Feeds { .. } => runtime.block_on(print_feeds(config)),
    }
}

async fn serve(config: Config) -> Result<(), CliError> {
    let client = aggregator::http_client(&config.aggregator)?;
    let feeds = FeedCache::from_config(&config.feeds, client)?;

    aggregator::run(config.aggregator, feeds, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
        }
    })
    .await?;

    tracing::info!("dashboard stopped");
    Ok(())
}

async fn print_feeds(config: Config) -> Result<(), CliError> {
    let client = aggregator::http_client(&config.aggregator)?;
    let feeds = FeedCache::from_config(&config.feeds, client)?;

    let summary = feeds.refresh().await?;
    for name in &summary.failed {
        tracing::warn!(feed = %name, "feed could not be pulled");
    }

    println!("{}", serde_json::to_string_pretty(&*feeds.snapshot())?);
    feeds.shutdown().await;
    Ok(())
}
