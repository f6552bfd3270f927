//! Generation requests: what the caller asks for and what providers receive.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::ProviderId;
use crate::ports::Credential;

/// A reference image/video for the generation.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaInput {
    /// Already publicly reachable.
    Url { url: String },

    /// Local bytes; uploaded through the `MediaUploader` before submission.
    Inline {
        name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl MediaInput {
    pub fn url(url: impl Into<String>) -> Self {
        MediaInput::Url { url: url.into() }
    }

    pub fn inline(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        MediaInput::Inline {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, MediaInput::Inline { .. })
    }
}

impl fmt::Debug for MediaInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaInput::Url { url } => f.debug_struct("Url").field("url", url).finish(),
            MediaInput::Inline {
                name,
                content_type,
                bytes,
            } => f
                .debug_struct("Inline")
                .field("name", name)
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// What the caller wants generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<MediaInput>,

    /// Provider-specific knobs (aspect ratio, duration, orientation, ...).
    /// Passed through untouched.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            references: Vec::new(),
            options: serde_json::Value::Null,
        }
    }

    pub fn with_reference(mut self, media: MediaInput) -> Self {
        self.references.push(media);
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    pub fn has_inline_media(&self) -> bool {
        self.references.iter().any(MediaInput::is_inline)
    }
}

/// A fully-resolved request: every media reference is a public URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

/// Which providers a call may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    pub preferred: ProviderId,
    pub alternate: Option<ProviderId>,
    /// Forces the preferred provider only, even if an alternate is set.
    pub disable_fallback: bool,
}

impl ProviderSelection {
    pub fn single(provider: impl Into<ProviderId>) -> Self {
        Self {
            preferred: provider.into(),
            alternate: None,
            disable_fallback: false,
        }
    }

    pub fn with_fallback(mut self, alternate: impl Into<ProviderId>) -> Self {
        self.alternate = Some(alternate.into());
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.disable_fallback = true;
        self
    }

    /// The alternate provider, if fallback is allowed for this call.
    pub fn effective_alternate(&self) -> Option<&ProviderId> {
        if self.disable_fallback {
            return None;
        }
        self.alternate.as_ref().filter(|alt| **alt != self.preferred)
    }
}

/// One `submit_and_await` invocation.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub request: GenerationRequest,
    pub selection: ProviderSelection,
    /// Explicit credential for the preferred provider. When absent, the
    /// service's `CredentialStore` is consulted.
    pub credential: Option<Credential>,
}

impl GenerationCall {
    pub fn new(request: GenerationRequest, selection: ProviderSelection) -> Self {
        Self {
            request,
            selection,
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_media_is_detected() {
        let req = GenerationRequest::new("a cat")
            .with_reference(MediaInput::url("https://cdn.example/a.png"));
        assert!(!req.has_inline_media());

        let req = req.with_reference(MediaInput::inline("b.png", "image/png", vec![1, 2, 3]));
        assert!(req.has_inline_media());
    }

    #[test]
    fn inline_media_debug_hides_bytes() {
        let media = MediaInput::inline("b.png", "image/png", vec![0; 2048]);
        let shown = format!("{media:?}");
        assert!(shown.contains("len: 2048"));
        assert!(!shown.contains("0, 0"));
    }

    #[test]
    fn disabled_fallback_hides_alternate() {
        let sel = ProviderSelection::single("primary").with_fallback("backup");
        assert_eq!(sel.effective_alternate(), Some(&ProviderId::from("backup")));

        let sel = sel.without_fallback();
        assert_eq!(sel.effective_alternate(), None);
    }

    #[test]
    fn alternate_equal_to_preferred_is_ignored() {
        let sel = ProviderSelection::single("primary").with_fallback("primary");
        assert_eq!(sel.effective_alternate(), None);
    }

    #[test]
    fn request_without_references_serializes_compactly() {
        let req = GenerationRequest::new("a dog");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v, serde_json::json!({ "prompt": "a dog" }));
    }
}
