//! Generate command - run one generation against HTTP providers.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use mediaflow_core::app::ServiceBuilder;
use mediaflow_core::config::DriverConfig;
use mediaflow_core::domain::{GenerationCall, GenerationRequest, MediaInput, ProviderSelection};
use mediaflow_core::impls::{HttpProviderConfig, HttpTaskProvider};
use mediaflow_core::ports::{Credential, StaticCredentials};
use tracing::info;

use super::{cancel_on_ctrl_c, emit};
use crate::progress::StderrProgress;

/// Arguments for the generate command.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Provider definitions: a JSON array of `HttpProviderConfig`.
    #[arg(long)]
    pub providers: PathBuf,

    /// Preferred provider id.
    #[arg(long)]
    pub provider: String,

    /// Alternate provider id, tried once if the preferred one fails.
    #[arg(long)]
    pub fallback: Option<String>,

    /// Never fall back, even if `--fallback` is given.
    #[arg(long)]
    pub no_fallback: bool,

    /// Text prompt.
    #[arg(long, default_value = "")]
    pub prompt: String,

    /// Public URL of a reference image or video (repeatable).
    #[arg(long)]
    pub media: Vec<String>,

    /// Extra provider options as a JSON object.
    #[arg(long)]
    pub options: Option<String>,

    /// API key for the preferred provider.
    #[arg(long, env = "MEDIAFLOW_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API key for the alternate provider.
    #[arg(long, env = "MEDIAFLOW_FALLBACK_API_KEY", hide_env_values = true)]
    pub fallback_api_key: Option<String>,
}

impl GenerateArgs {
    fn call(&self) -> Result<GenerationCall> {
        let mut request = GenerationRequest::new(self.prompt.clone());
        for url in &self.media {
            request = request.with_reference(MediaInput::url(url.clone()));
        }
        if let Some(raw) = &self.options {
            let options: serde_json::Value =
                serde_json::from_str(raw).context("--options must be valid JSON")?;
            request = request.with_options(options);
        }

        let mut selection = ProviderSelection::single(self.provider.as_str());
        if let Some(fallback) = &self.fallback {
            selection = selection.with_fallback(fallback.as_str());
        }
        if self.no_fallback {
            selection = selection.without_fallback();
        }
        Ok(GenerationCall::new(request, selection))
    }

    fn credentials(&self) -> StaticCredentials {
        let mut credentials = StaticCredentials::new();
        if let Some(key) = &self.api_key {
            credentials = credentials.with_key(self.provider.as_str(), Credential::new(key.clone()));
        }
        if let (Some(fallback), Some(key)) = (&self.fallback, &self.fallback_api_key) {
            credentials = credentials.with_key(fallback.as_str(), Credential::new(key.clone()));
        }
        credentials
    }
}

/// Execute the generate command.
///
/// # Errors
///
/// Returns an error if provider definitions cannot be loaded or the call is
/// misconfigured (unknown provider, missing API key).
pub async fn execute(args: GenerateArgs, config: DriverConfig) -> Result<ExitCode> {
    let definitions = HttpProviderConfig::load_all(&args.providers)
        .with_context(|| format!("Failed to load providers from {}", args.providers.display()))?;

    let mut builder = ServiceBuilder::new()
        .config(config)
        .credentials(Arc::new(args.credentials()));
    for definition in definitions {
        let id = definition.id.clone();
        let provider = HttpTaskProvider::new(definition)
            .with_context(|| format!("Failed to create HTTP client for {id}"))?;
        builder = builder.provider(Arc::new(provider))?;
    }

    let mut expected = vec![args.provider.as_str()];
    if let Some(fallback) = args.fallback.as_deref().filter(|_| !args.no_fallback) {
        expected.push(fallback);
    }
    let service = builder.expect_providers(&expected).build()?;

    let call = args.call()?;
    info!(provider = %args.provider, fallback = ?args.fallback, "starting generation");
    let result = service
        .submit_and_await(call, &StderrProgress, &cancel_on_ctrl_c())
        .await?;
    emit(&result)
}
