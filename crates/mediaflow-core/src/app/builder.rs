//! ServiceBuilder - GenerationService の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 同じ ProviderId の二重登録は `provider()` の時点でエラー
//! - `expect_providers()` で必須プロバイダを宣言すると、`build()` で不足をチェック
//! - 設定値は `build()` で `validate()` される
//!
//! 未指定のポートはデフォルトで埋める（SystemClock、空の StaticCredentials、
//! `submit_spacing_ms` に応じた RateLimiter、設定の RetryPolicy による DefaultDecider）。
//! DefaultDecider にはフォールバック設定のモデレーション語句も渡す。

use std::collections::HashMap;
use std::sync::Arc;

use super::fallback::FallbackCoordinator;
use super::orchestrator::RetryOrchestrator;
use super::poller::TaskPoller;
use super::service::GenerationService;
use crate::config::{ConfigError, DriverConfig};
use crate::domain::{Decider, DefaultDecider, ProviderId};
use crate::impls::SpacingRateLimiter;
use crate::ports::{
    Clock, CredentialStore, MediaUploader, RateLimiter, StaticCredentials, SystemClock,
    TaskProvider, UlidGenerator, Unlimited,
};

/// # 使用例
/// ```ignore
/// let service = ServiceBuilder::new()
///     .config(DriverConfig::load("mediaflow.json")?)
///     .credentials(Arc::new(keys))
///     .provider(kling)?
///     .provider(runway)?
///     .expect_providers(&["kling", "runway"])
///     .build()?;
/// ```
pub struct ServiceBuilder {
    providers: HashMap<ProviderId, Arc<dyn TaskProvider>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    uploader: Option<Arc<dyn MediaUploader>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    clock: Option<Arc<dyn Clock>>,
    decider: Option<Arc<dyn Decider>>,
    config: DriverConfig,
    expected_providers: Option<Vec<ProviderId>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("provider {0} is registered twice")]
    DuplicateProvider(ProviderId),

    #[error("Missing providers: {0:?}. These providers were expected but not registered.")]
    MissingProviders(Vec<ProviderId>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ServiceBuilder {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            credentials: None,
            uploader: None,
            rate_limiter: None,
            clock: None,
            decider: None,
            config: DriverConfig::default(),
            expected_providers: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn TaskProvider>) -> Result<Self, BuildError> {
        let id = provider.id().clone();
        if self.providers.contains_key(&id) {
            return Err(BuildError::DuplicateProvider(id));
        }
        self.providers.insert(id, provider);
        Ok(self)
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn uploader(mut self, uploader: Arc<dyn MediaUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Overrides the limiter derived from `submit_spacing_ms`.
    pub fn rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the `DefaultDecider` built from the retry section.
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expect_providers(mut self, providers: &[&str]) -> Self {
        self.expected_providers = Some(providers.iter().map(|&p| ProviderId::from(p)).collect());
        self
    }

    pub fn build(self) -> Result<GenerationService, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_providers {
            let missing: Vec<ProviderId> = expected
                .iter()
                .filter(|id| !self.providers.contains_key(*id))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingProviders(missing));
            }
        }

        let config = self.config;
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let rate_limiter: Arc<dyn RateLimiter> = match self.rate_limiter {
            Some(limiter) => limiter,
            None if config.submit_spacing_ms > 0 => {
                Arc::new(SpacingRateLimiter::new(clock.clone(), config.submit_spacing()))
            }
            None => Arc::new(Unlimited),
        };
        let fallback_policy = config.fallback_policy();
        let decider: Arc<dyn Decider> = match self.decider {
            Some(decider) => decider,
            None => Arc::new(
                DefaultDecider::new(config.retry_policy())
                    .with_content_flags(fallback_policy.content_flag_phrases.clone()),
            ),
        };
        let credentials: Arc<dyn CredentialStore> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(StaticCredentials::new()),
        };
        let ids = Arc::new(UlidGenerator::new(clock.clone()));

        let poller = TaskPoller::new(clock.clone(), config.poll_policy(), config.request_timeout());
        let orchestrator = RetryOrchestrator::new(
            clock,
            ids.clone(),
            rate_limiter,
            decider,
            poller,
            config.request_timeout(),
        );

        Ok(GenerationService {
            providers: self.providers,
            credentials,
            uploader: self.uploader,
            ids,
            coordinator: FallbackCoordinator::new(orchestrator, fallback_policy),
        })
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::scripted::ScriptedProvider;

    #[test]
    fn build_success() {
        let service = ServiceBuilder::new()
            .provider(Arc::new(ScriptedProvider::new("kling")))
            .unwrap()
            .expect_providers(&["kling"])
            .build();
        assert!(service.is_ok());
    }

    #[test]
    fn build_missing_providers() {
        let service = ServiceBuilder::new()
            .provider(Arc::new(ScriptedProvider::new("kling")))
            .unwrap()
            .expect_providers(&["kling", "runway"])
            .build();
        assert!(matches!(
            service,
            Err(BuildError::MissingProviders(missing)) if missing == vec![ProviderId::from("runway")]
        ));
    }

    #[test]
    fn duplicate_provider_is_rejected() {
        let result = ServiceBuilder::new()
            .provider(Arc::new(ScriptedProvider::new("kling")))
            .unwrap()
            .provider(Arc::new(ScriptedProvider::new("kling")));
        assert!(matches!(result, Err(BuildError::DuplicateProvider(id)) if id.as_str() == "kling"));
    }

    #[test]
    fn invalid_config_fails_build() {
        let mut config = DriverConfig::default();
        config.retry.budget = 0;
        let result = ServiceBuilder::new().config(config).build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[test]
    fn build_without_expectations() {
        let service = ServiceBuilder::new()
            .provider(Arc::new(ScriptedProvider::new("kling")))
            .unwrap()
            .provider(Arc::new(ScriptedProvider::new("runway")))
            .unwrap()
            .build()
            .unwrap();
        let mut ids: Vec<&str> = service.providers().map(ProviderId::as_str).collect();
        ids.sort();
        assert_eq!(ids, vec!["kling", "runway"]);
    }
}
