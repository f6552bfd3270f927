//! MediaUploader port - ローカルのバイト列を公開 URL にする
//!
//! 実体（R2, Supabase Storage など）は外側の責務。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upload of {name} failed: {reason}")]
pub struct UploadError {
    pub name: String,
    pub reason: String,
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Returns a publicly fetchable URL for the uploaded bytes.
    async fn upload(
        &self,
        name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError>;
}
