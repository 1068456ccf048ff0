use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use regionfeed_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod server;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "regionfeedctl")]
#[command(
    about = "Aggregate cloud provider regions with a last-known-good cache"
)]
struct Cli {
    /// Path to regionfeed.toml (defaults to ./regionfeed.toml or
    /// ./config/regionfeed.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch regions for every configured provider and print the report as
    /// JSON
    Run {
        /// Pretty-print the report
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
    /// Serve the report as JSON on `GET /` until Ctrl-C
    Serve {
        /// Address to listen on
        #[arg(
            long,
            env = "REGIONFEED_LISTEN",
            default_value = "127.0.0.1:8080"
        )]
        listen: SocketAddr,
    },
    /// List cache rows with their validity
    CacheStats,
    /// Send a test message and a simulated error event to the Slack webhook
    TestNotify {
        /// Channel for the plain test message (defaults to the webhook's
        /// channel)
        #[arg(long)]
        channel: Option<String>,
    },
    /// Print the effective configuration with secrets masked
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the report, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ConfigLoad { config, warnings } =
        ConfigLoader::with_options(ConfigLoaderOptions {
            config_path: cli.config,
            env_file: cli.env_file,
        })
        .load()
        .context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => warn!("{} ({})", warning.message, hint),
            None => warn!("{}", warning.message),
        }
    }

    match cli.command.unwrap_or(Command::Run { pretty: false }) {
        Command::Run { pretty } => commands::run(&config, pretty).await,
        Command::Serve { listen } => commands::serve(&config, listen).await,
        Command::CacheStats => commands::cache_stats(&config).await,
        Command::TestNotify { channel } => {
            commands::test_notify(&config, channel).await
        }
        Command::CheckConfig => commands::check_config(&config),
    }
}
