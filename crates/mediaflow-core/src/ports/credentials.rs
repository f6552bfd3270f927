//! CredentialStore port - API キーの供給
//!
//! 保存方法（localStorage, Vault など）は外側の責務。ここでは引くだけ。

use std::collections::HashMap;
use std::fmt;

use crate::domain::ProviderId;

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

pub trait CredentialStore: Send + Sync {
    /// `None` when nothing usable is configured for `provider`.
    fn credential_for(&self, provider: &ProviderId) -> Option<Credential>;
}

/// Fixed per-provider keys with an optional shared default.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    keys: HashMap<ProviderId, Credential>,
    default: Option<Credential>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, provider: impl Into<ProviderId>, credential: Credential) -> Self {
        self.keys.insert(provider.into(), credential);
        self
    }

    pub fn with_default(mut self, credential: Credential) -> Self {
        self.default = Some(credential);
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn credential_for(&self, provider: &ProviderId) -> Option<Credential> {
        self.keys
            .get(provider)
            .or(self.default.as_ref())
            .filter(|c| !c.is_blank())
            .cloned()
    }
}
