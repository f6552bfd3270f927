//! GenerationService - ドライバの入口
//!
//! `submit_and_await()` 1 回で「検証 → メディアのアップロード → 投入・ポーリング・
//! リトライ → フォールバック」までを行い、必ず `GenerationResult` を返す。
//!
//! `Err(DriverError)` になるのは設定ミス（リモート呼び出し前に分かるもの）だけ。
//! 実行中の失敗はすべて `success: false` の結果として返る。

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use super::fallback::{FallbackCoordinator, Route};
use crate::domain::{
    DriverError, FailureKind, GenerationCall, GenerationId, GenerationResult, MediaInput,
    ProviderId, SubmissionPayload,
};
use crate::ports::{
    Credential, CredentialStore, IdGenerator, MediaUploader, ProgressObserver, TaskProvider,
};

pub struct GenerationService {
    pub(crate) providers: HashMap<ProviderId, Arc<dyn TaskProvider>>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) uploader: Option<Arc<dyn MediaUploader>>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) coordinator: FallbackCoordinator,
}

/// Everything resolved before the first remote call.
struct Plan<'a> {
    preferred: &'a dyn TaskProvider,
    credential: Credential,
    alternate: Option<(&'a dyn TaskProvider, Credential)>,
}

impl GenerationService {
    pub fn providers(&self) -> impl Iterator<Item = &ProviderId> {
        self.providers.keys()
    }

    /// Run one generation to a terminal result.
    pub async fn submit_and_await(
        &self,
        call: GenerationCall,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, DriverError> {
        let generation_id = self.ids.generation_id();
        let span = info_span!(
            "generation",
            %generation_id,
            provider = %call.selection.preferred,
        );
        self.drive(generation_id, call, progress, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        generation_id: GenerationId,
        call: GenerationCall,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, DriverError> {
        let plan = self.plan(&call)?;

        let media_urls = match self.resolve_media(&call.request.references, cancel).await {
            Ok(urls) => urls,
            Err((kind, message)) => {
                warn!(kind = ?kind, error = %message, "generation aborted before submission");
                return Ok(GenerationResult::failed_before_submission(
                    generation_id,
                    kind,
                    message,
                ));
            }
        };
        let payload = SubmissionPayload {
            prompt: call.request.prompt,
            media_urls,
            options: call.request.options,
        };

        let report = self
            .coordinator
            .run(
                Route {
                    provider: plan.preferred,
                    credential: &plan.credential,
                },
                plan.alternate.as_ref().map(|(provider, credential)| Route {
                    provider: *provider,
                    credential,
                }),
                &payload,
                progress,
                cancel,
            )
            .await;

        let result = GenerationResult::from_outcome(
            generation_id,
            Some(report.provider),
            &report.outcome,
            report.history,
        );
        info!(
            success = result.success,
            provider = ?result.provider.as_ref().map(ProviderId::as_str),
            attempts = result.attempts,
            error_kind = ?result.error_kind,
            "generation finished"
        );
        Ok(result)
    }

    fn plan<'a>(&'a self, call: &GenerationCall) -> Result<Plan<'a>, DriverError> {
        let request = &call.request;
        if request.prompt.trim().is_empty() && request.references.is_empty() {
            return Err(DriverError::InvalidRequest(
                "request has neither a prompt nor media references".into(),
            ));
        }
        if request.has_inline_media() && self.uploader.is_none() {
            return Err(DriverError::UploaderMissing);
        }

        let preferred_id = &call.selection.preferred;
        let preferred = self.provider(preferred_id)?;
        let credential = call
            .credential
            .clone()
            .filter(|c| !c.is_blank())
            .or_else(|| self.credentials.credential_for(preferred_id))
            .ok_or_else(|| DriverError::MissingCredential(preferred_id.clone()))?;

        let alternate = match call.selection.effective_alternate() {
            None => None,
            Some(alternate_id) => {
                let provider = self.provider(alternate_id)?;
                match self.credentials.credential_for(alternate_id) {
                    Some(credential) => Some((provider, credential)),
                    None => {
                        warn!(provider = %alternate_id, "no credential for alternate provider; fallback disabled");
                        None
                    }
                }
            }
        };

        Ok(Plan {
            preferred,
            credential,
            alternate,
        })
    }

    fn provider(&self, id: &ProviderId) -> Result<&dyn TaskProvider, DriverError> {
        self.providers
            .get(id)
            .map(|p| p.as_ref())
            .ok_or_else(|| DriverError::UnknownProvider(id.clone()))
    }

    /// Turn every reference into a public URL, uploading inline bytes.
    async fn resolve_media(
        &self,
        references: &[MediaInput],
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, (FailureKind, String)> {
        let mut urls = Vec::with_capacity(references.len());
        for media in references {
            match media {
                MediaInput::Url { url } => urls.push(url.clone()),
                MediaInput::Inline {
                    name,
                    content_type,
                    bytes,
                } => {
                    if cancel.is_cancelled() {
                        return Err((FailureKind::Cancelled, "generation cancelled".into()));
                    }
                    let uploader = self
                        .uploader
                        .as_ref()
                        .ok_or((FailureKind::Upload, "no uploader configured".to_string()))?;
                    let url = uploader
                        .upload(name, content_type, bytes)
                        .await
                        .map_err(|err| (FailureKind::Upload, err.to_string()))?;
                    info!(name = %name, size = bytes.len(), "inline media uploaded");
                    urls.push(url);
                }
            }
        }
        Ok(urls)
    }
}
