//! # mediaflow-cli
//!
//! Command-line front end for the mediaflow driver.
//!
//! ## Commands
//!
//! - `mediaflow generate` - run a generation against HTTP providers
//! - `mediaflow simulate` - run the same lifecycle against scripted providers
//!
//! Both print the final `GenerationResult` as JSON on stdout; logs and
//! progress go to stderr. Ctrl-C cancels the running generation.
//!
//! ## Configuration
//!
//! - `MEDIAFLOW_CONFIG` - driver config (JSON), see `DriverConfig`
//! - `MEDIAFLOW_API_KEY` / `MEDIAFLOW_FALLBACK_API_KEY` - provider keys
//! - `RUST_LOG` - log filter (default: `info`)

pub mod commands;
pub mod progress;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mediaflow_core::config::DriverConfig;

/// mediaflow - generative media task driver.
#[derive(Debug, Parser)]
#[command(name = "mediaflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Driver config file (JSON). Built-in defaults apply when omitted.
    #[arg(long, env = "MEDIAFLOW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Load and validate the driver config.
    pub fn driver_config(&self) -> Result<DriverConfig> {
        match &self.config {
            Some(path) => DriverConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => Ok(DriverConfig::default()),
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate media through HTTP providers.
    Generate(commands::generate::GenerateArgs),
    /// Drive scripted providers through the full lifecycle.
    Simulate(commands::simulate::SimulateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_with_fallback() {
        let cli = Cli::parse_from([
            "mediaflow",
            "generate",
            "--providers",
            "providers.json",
            "--provider",
            "kling",
            "--fallback",
            "runway",
            "--prompt",
            "a cat surfing",
            "--media",
            "https://cdn/ref.png",
            "--api-key",
            "sk-1",
        ]);

        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(args.provider, "kling");
        assert_eq!(args.fallback.as_deref(), Some("runway"));
        assert_eq!(args.media, vec!["https://cdn/ref.png".to_string()]);
        assert!(!args.no_fallback);
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from([
            "mediaflow",
            "simulate",
            "--script",
            "queued,succeeded",
            "--config",
            "driver.json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("driver.json")));
    }

    #[test]
    fn missing_config_uses_defaults() {
        let cli = Cli::parse_from(["mediaflow", "simulate"]);
        assert_eq!(cli.driver_config().unwrap(), DriverConfig::default());
    }
}
