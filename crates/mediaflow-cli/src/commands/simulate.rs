//! Simulate command - scripted providers, no network.
//!
//! Each `--script` is one submit+poll cycle of the preferred provider,
//! written as comma-separated steps: `queued,in-progress,error,succeeded`.
//! By default time is virtual, so a script that would poll for minutes
//! finishes immediately; `--real-time` waits for real.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::Args;
use mediaflow_core::app::ServiceBuilder;
use mediaflow_core::config::DriverConfig;
use mediaflow_core::domain::{
    GenerationCall, GenerationRequest, GenerationResult, ProviderSelection, SubmitError,
};
use mediaflow_core::impls::{ScriptStep, ScriptedProvider};
use mediaflow_core::ports::{
    Clock, Credential, ManualClock, ProgressObserver, StaticCredentials, SystemClock,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{cancel_on_ctrl_c, emit};
use crate::progress::StderrProgress;

const PRIMARY: &str = "primary";
const FALLBACK: &str = "fallback";

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Status script for one cycle of the preferred provider (repeatable).
    #[arg(long = "script")]
    pub scripts: Vec<String>,

    /// Status script for one cycle of the alternate provider (repeatable).
    /// Enables fallback.
    #[arg(long = "fallback-script")]
    pub fallback_scripts: Vec<String>,

    /// Reject every submission to the preferred provider with this HTTP status.
    #[arg(long)]
    pub reject_status: Option<u16>,

    /// Override the retry budget (total cycles).
    #[arg(long)]
    pub budget: Option<u32>,

    /// Text prompt sent to the scripted provider.
    #[arg(long, default_value = "simulated prompt")]
    pub prompt: String,

    /// Sleep for real instead of advancing a virtual clock.
    #[arg(long)]
    pub real_time: bool,
}

fn parse_script(raw: &str) -> Result<Vec<ScriptStep>> {
    raw.split(',')
        .filter(|step| !step.trim().is_empty())
        .map(|step| step.parse::<ScriptStep>().map_err(|err| anyhow!(err)))
        .collect()
}

fn scripted(id: &str, scripts: &[String]) -> Result<ScriptedProvider> {
    let mut provider = ScriptedProvider::new(id);
    for script in scripts {
        provider = provider.with_cycle(parse_script(script)?);
    }
    Ok(provider)
}

/// Build the scripted service and run one generation.
pub async fn run(
    args: &SimulateArgs,
    mut config: DriverConfig,
    progress: &dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<GenerationResult> {
    if let Some(budget) = args.budget {
        config.retry.budget = budget;
    }

    let default_script = vec!["queued,in-progress,succeeded".to_string()];
    let scripts = if args.scripts.is_empty() {
        &default_script
    } else {
        &args.scripts
    };
    let mut primary = scripted(PRIMARY, scripts)?;
    if let Some(status) = args.reject_status {
        primary = primary.always_reject(SubmitError::from_status(status, "simulated rejection"));
    }

    let clock: Arc<dyn Clock> = if args.real_time {
        Arc::new(SystemClock)
    } else {
        Arc::new(ManualClock::default())
    };
    let credentials = StaticCredentials::new().with_default(Credential::new("simulated"));
    let mut builder = ServiceBuilder::new()
        .config(config)
        .clock(clock.clone())
        .credentials(Arc::new(credentials))
        .provider(Arc::new(primary))?;

    let mut selection = ProviderSelection::single(PRIMARY);
    if !args.fallback_scripts.is_empty() {
        builder = builder.provider(Arc::new(scripted(FALLBACK, &args.fallback_scripts)?))?;
        selection = selection.with_fallback(FALLBACK);
    }
    let service = builder.build()?;

    let started = clock.now();
    let result = service
        .submit_and_await(
            GenerationCall::new(GenerationRequest::new(args.prompt.clone()), selection),
            progress,
            cancel,
        )
        .await?;
    info!(
        simulated_wait = ?clock.elapsed_since(started),
        "simulation finished"
    );
    Ok(result)
}

/// Execute the simulate command.
///
/// # Errors
///
/// Returns an error if a script step cannot be parsed or the config is invalid.
pub async fn execute(args: SimulateArgs, config: DriverConfig) -> Result<ExitCode> {
    let result = run(&args, config, &StderrProgress, &cancel_on_ctrl_c()).await?;
    emit(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaflow_core::domain::{FailureKind, ProviderId};
    use mediaflow_core::ports::RecordingProgress;

    fn args(scripts: &[&str], fallback: &[&str]) -> SimulateArgs {
        SimulateArgs {
            scripts: scripts.iter().map(|s| s.to_string()).collect(),
            fallback_scripts: fallback.iter().map(|s| s.to_string()).collect(),
            reject_status: None,
            budget: None,
            prompt: "test".into(),
            real_time: false,
        }
    }

    #[tokio::test]
    async fn default_script_succeeds() {
        let progress = RecordingProgress::new();

        let result = run(&args(&[], &[]), DriverConfig::default(), &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.provider, Some(ProviderId::from(PRIMARY)));
        assert_eq!(progress.events().len(), 3);
    }

    #[tokio::test]
    async fn failing_primary_falls_back() {
        let mut simulate = args(&["queued,failed:render crashed"], &["succeeded:https://cdn/alt.mp4"]);
        simulate.budget = Some(2);

        let result = run(&simulate, DriverConfig::default(), &RecordingProgress::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.provider, Some(ProviderId::from(FALLBACK)));
        assert_eq!(result.artifact_url.as_deref(), Some("https://cdn/alt.mp4"));
        assert_eq!(result.attempts, 3);
    }

    #[tokio::test]
    async fn rejected_submission_reports_kind() {
        let mut simulate = args(&[], &[]);
        simulate.reject_status = Some(402);

        let result = run(&simulate, DriverConfig::default(), &RecordingProgress::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(FailureKind::InsufficientCredits));
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test]
    async fn bad_script_step_is_an_error() {
        let result = run(
            &args(&["queued,warp"], &[]),
            DriverConfig::default(),
            &RecordingProgress::new(),
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
