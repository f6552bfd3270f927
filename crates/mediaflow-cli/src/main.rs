//! mediaflow CLI
//!
//! The main entry point for the `mediaflow` binary.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediaflow_cli::{Cli, Commands};

fn main() -> Result<ExitCode> {
    // stdout は結果の JSON 専用。ログは stderr へ
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.driver_config()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Generate(args) => mediaflow_cli::commands::generate::execute(args, config).await,
            Commands::Simulate(args) => mediaflow_cli::commands::simulate::execute(args, config).await,
        }
    })
}
