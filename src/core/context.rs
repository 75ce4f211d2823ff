//! Authentication contexts and their fingerprints.
//!
//! An [`AuthenticationContext`] is the resolved credential identity used to
//! talk to a provider. Contexts are immutable: every switch or reset builds a
//! new one through [`ContextBuilder`].
//!
//! The [`ContextFingerprint`] hashes only non-secret fields in a fixed order,
//! so it is safe to log and stable across repeated resolution of the same
//! source.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::provider::Provider;

// =============================================================================
// Secret
// =============================================================================

/// Secret credential value. `Debug` and `Display` never show the content.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw secret. Callers must not log the result.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// =============================================================================
// Credential Material
// =============================================================================

/// Where a context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialSource {
    /// A named profile from the provider's profile sources.
    Profile,
    /// Ambient environment variables.
    Environment,
    /// A role assumed from another context.
    AssumedRole,
    /// A snapshot previously captured to disk.
    CapturedSession,
}

impl CredentialSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Environment => "environment",
            Self::AssumedRole => "assumed-role",
            Self::CapturedSession => "captured-session",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialMaterial {
    /// AWS static or temporary access keys.
    AccessKey {
        access_key_id: String,
        secret_access_key: Secret,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_token: Option<Secret>,
    },
    /// GCP service-account key file.
    ServiceAccount { key_file: PathBuf },
    /// gcloud user login / application default credentials.
    ApplicationDefault {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        account: Option<String>,
    },
    /// Azure service principal.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: Secret,
    },
    /// Datadog API and application keys.
    ApiKey {
        api_key: Secret,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app_key: Option<Secret>,
    },
    /// Resolved by the provider SDK behind the client factory
    /// (SSO, `credential_process`, role chaining, CLI login).
    Delegated { mechanism: String },
}

impl CredentialMaterial {
    /// Non-secret identifier used in fingerprints and output.
    #[must_use]
    pub fn public_id(&self) -> String {
        match self {
            Self::AccessKey { access_key_id, .. } => access_key_id.clone(),
            Self::ServiceAccount { key_file } => key_file.display().to_string(),
            Self::ApplicationDefault { account } => {
                account.clone().unwrap_or_else(|| "application-default".to_string())
            }
            Self::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => format!("{tenant_id}/{client_id}"),
            Self::ApiKey { .. } => "api-key".to_string(),
            Self::Delegated { mechanism } => mechanism.clone(),
        }
    }

    /// Short kind label for output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AccessKey { .. } => "access-key",
            Self::ServiceAccount { .. } => "service-account",
            Self::ApplicationDefault { .. } => "application-default",
            Self::ClientSecret { .. } => "client-secret",
            Self::ApiKey { .. } => "api-key",
            Self::Delegated { .. } => "delegated",
        }
    }
}

// =============================================================================
// Fingerprint
// =============================================================================

/// Deterministic hash of a context's non-secret fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextFingerprint(String);

impl ContextFingerprint {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContextFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hash_field(hasher: &mut Sha256, name: &str, value: Option<&str>) {
    hasher.update(name.as_bytes());
    hasher.update(":");
    hasher.update(value.unwrap_or("").as_bytes());
    hasher.update(";");
}

// =============================================================================
// Authentication Context
// =============================================================================

/// Resolved credential identity for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationContext {
    provider: Provider,
    source: CredentialSource,
    material: CredentialMaterial,
    expires_at: Option<DateTime<Utc>>,
    region: Option<String>,
    profile: Option<String>,
    account: Option<String>,
    established_at: DateTime<Utc>,
}

impl AuthenticationContext {
    /// Start building a context.
    #[must_use]
    pub fn builder(
        provider: Provider,
        source: CredentialSource,
        material: CredentialMaterial,
    ) -> ContextBuilder {
        ContextBuilder::new(provider, source, material)
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub const fn source(&self) -> CredentialSource {
        self.source
    }

    #[must_use]
    pub const fn material(&self) -> &CredentialMaterial {
        &self.material
    }

    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    #[must_use]
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    #[must_use]
    pub const fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Whether the context has expired at `now`. Contexts without expiry never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Whether the context has expired against the wall clock.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Compute the fingerprint over non-secret fields in fixed order.
    #[must_use]
    pub fn fingerprint(&self) -> ContextFingerprint {
        let mut hasher = Sha256::new();
        let expiry = self.expires_at.map(|e| e.to_rfc3339());
        hash_field(&mut hasher, "provider", Some(self.provider.cli_name()));
        hash_field(&mut hasher, "source", Some(self.source.as_str()));
        hash_field(&mut hasher, "profile", self.profile.as_deref());
        hash_field(&mut hasher, "region", self.region.as_deref());
        hash_field(&mut hasher, "account", self.account.as_deref());
        hash_field(&mut hasher, "public_id", Some(&self.material.public_id()));
        hash_field(&mut hasher, "expiry", expiry.as_deref());
        let result = hasher.finalize();
        ContextFingerprint(hex::encode(&result[..16]))
    }

    /// Copy of this context re-tagged as a captured session.
    #[must_use]
    pub fn as_captured(&self) -> Self {
        Self {
            source: CredentialSource::CapturedSession,
            established_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Human label: profile name if any, otherwise the source.
    #[must_use]
    pub fn label(&self) -> String {
        self.profile
            .clone()
            .unwrap_or_else(|| self.source.as_str().to_string())
    }
}

/// Contexts compare equal when everything but the establishment time matches.
impl PartialEq for AuthenticationContext {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.source == other.source
            && self.material == other.material
            && self.expires_at == other.expires_at
            && self.region == other.region
            && self.profile == other.profile
            && self.account == other.account
    }
}

impl Eq for AuthenticationContext {}

// =============================================================================
// Context Builder
// =============================================================================

/// Builder for [`AuthenticationContext`]; profile registries return one from `resolve`.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    provider: Provider,
    source: CredentialSource,
    material: CredentialMaterial,
    expires_at: Option<DateTime<Utc>>,
    region: Option<String>,
    profile: Option<String>,
    account: Option<String>,
    established_at: Option<DateTime<Utc>>,
}

impl ContextBuilder {
    #[must_use]
    pub const fn new(
        provider: Provider,
        source: CredentialSource,
        material: CredentialMaterial,
    ) -> Self {
        Self {
            provider,
            source,
            material,
            expires_at: None,
            region: None,
            profile: None,
            account: None,
            established_at: None,
        }
    }

    #[must_use]
    pub fn profile(mut self, name: impl Into<String>) -> Self {
        self.profile = Some(name.into());
        self
    }

    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the region only if none was set.
    #[must_use]
    pub fn default_region(mut self, region: Option<String>) -> Self {
        if self.region.is_none() {
            self.region = region;
        }
        self
    }

    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    #[must_use]
    pub const fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub const fn established_at(mut self, at: DateTime<Utc>) -> Self {
        self.established_at = Some(at);
        self
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub fn profile_name(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    #[must_use]
    pub fn build(self) -> AuthenticationContext {
        AuthenticationContext {
            provider: self.provider,
            source: self.source,
            material: self.material,
            expires_at: self.expires_at,
            region: self.region,
            profile: self.profile,
            account: self.account,
            established_at: self.established_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn access_key(id: &str, secret: &str) -> CredentialMaterial {
        CredentialMaterial::AccessKey {
            access_key_id: id.to_string(),
            secret_access_key: Secret::new(secret),
            session_token: None,
        }
    }

    #[test]
    fn secret_is_redacted_in_debug() {
        let ctx = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Environment,
            access_key("AKIAEXAMPLE", "super-secret-value"),
        )
        .build();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("AKIAEXAMPLE"));
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn fingerprint_ignores_secrets_and_establishment_time() {
        let a = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Profile,
            access_key("AKIA1", "one"),
        )
        .profile("dev")
        .region("us-east-1")
        .build();
        let b = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Profile,
            access_key("AKIA1", "two"),
        )
        .profile("dev")
        .region("us-east-1")
        .established_at(Utc::now() - Duration::hours(3))
        .build();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str().len(), 32);
    }

    #[test]
    fn fingerprint_changes_with_profile() {
        let base = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Profile,
            access_key("AKIA1", "x"),
        );
        let dev = base.clone().profile("dev").build();
        let prod = base.profile("prod").build();
        assert_ne!(dev.fingerprint(), prod.fingerprint());
    }

    #[test]
    fn expiry_check_uses_given_clock() {
        let now = Utc::now();
        let ctx = AuthenticationContext::builder(
            Provider::Gcp,
            CredentialSource::CapturedSession,
            CredentialMaterial::ApplicationDefault { account: None },
        )
        .expires_at(now + Duration::minutes(5))
        .build();
        assert!(!ctx.is_expired_at(now));
        assert!(ctx.is_expired_at(now + Duration::minutes(5)));
    }

    #[test]
    fn default_region_does_not_override() {
        let ctx = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Profile,
            CredentialMaterial::Delegated {
                mechanism: "sso".into(),
            },
        )
        .region("eu-west-1")
        .default_region(Some("us-east-1".into()))
        .build();
        assert_eq!(ctx.region(), Some("eu-west-1"));
    }

    #[test]
    fn material_serializes_with_kind_tag() {
        let json = serde_json::to_value(access_key("AKIA1", "s3cr3t")).unwrap();
        assert_eq!(json["kind"], "access_key");
        assert_eq!(json["secret_access_key"], "s3cr3t");
    }
}
