//! Provider client seams.
//!
//! Billing SDKs are not linked into autocost. A [`ClientFactory`] turns an
//! [`AuthenticationContext`] into a [`ProviderClient`], and the session
//! manager caches the result per context fingerprint.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::context::{AuthenticationContext, CredentialMaterial, CredentialSource};
use crate::core::models::{CostQuery, CostRecord};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};

/// One read-only call that demonstrates a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityCheck {
    /// Capability name reported in verdicts (e.g. `cost_explorer`).
    pub capability: String,
    /// Provider operation exercised (e.g. `ce:GetDimensionValues`).
    pub operation: String,
    /// Export dataset backing the capability for file-based clients.
    pub dataset: String,
}

impl CapabilityCheck {
    #[must_use]
    pub fn new(
        capability: impl Into<String>,
        operation: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            operation: operation.into(),
            dataset: dataset.into(),
        }
    }
}

/// A connected client for one provider under one context.
///
/// Implementations must be safe to share across tasks; the session manager
/// hands out the same `Arc` to every caller until the context changes.
#[async_trait]
pub trait ProviderClient: Send + Sync + fmt::Debug {
    /// Provider this client talks to.
    fn provider(&self) -> Provider;

    /// Fetch cost records for the query.
    ///
    /// # Errors
    /// Permission failures surface as [`AutocostError::InsufficientPermission`].
    async fn fetch_costs(&self, query: &CostQuery) -> Result<Vec<CostRecord>>;

    /// Execute the read-only call behind a capability check.
    async fn run_check(&self, check: &CapabilityCheck) -> Result<()>;
}

/// Builds clients for one provider.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Verify the context is accepted by the provider (e.g. an identity call).
    ///
    /// # Errors
    /// [`AutocostError::InvalidCredentials`] when the provider rejects the context.
    async fn authenticate(&self, context: &AuthenticationContext) -> Result<()>;

    /// Construct a client bound to the context.
    async fn connect(&self, context: &AuthenticationContext) -> Result<Arc<dyn ProviderClient>>;

    /// Derive an assumed-role context from `base`.
    ///
    /// The default delegates credential exchange to the SDK behind the
    /// client: the resulting context names the role and target account.
    async fn assume_role(
        &self,
        base: &AuthenticationContext,
        role_arn: &str,
        account_id: &str,
    ) -> Result<AuthenticationContext> {
        if !base.provider().supports_assume_role() {
            return Err(AutocostError::Config(format!(
                "{} does not support assumed-role contexts",
                base.provider()
            )));
        }
        let mut builder = AuthenticationContext::builder(
            base.provider(),
            CredentialSource::AssumedRole,
            CredentialMaterial::Delegated {
                mechanism: format!("assume-role:{role_arn}"),
            },
        )
        .account(account_id)
        .default_region(base.region().map(ToString::to_string));
        if let Some(profile) = base.profile() {
            builder = builder.profile(profile);
        }
        if let Some(expiry) = base.expires_at() {
            builder = builder.expires_at(expiry);
        }
        Ok(builder.build())
    }
}
