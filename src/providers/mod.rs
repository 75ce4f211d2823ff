//! Cloud provider definitions.
//!
//! Each provider has its own submodule implementing [`CloudProvider`]: where
//! its profiles live, which environment variables carry credentials, which
//! read-only calls demonstrate each capability, and how its errors map onto
//! permission verdicts. [`export`] holds the bundled file-based client.

pub mod aws;
pub mod azure;
pub mod datadog;
pub mod export;
pub mod gcp;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::client::{CapabilityCheck, ProviderClient};
use crate::core::context::ContextBuilder;
use crate::core::probe::VerdictOutcome;
use crate::core::provider::{Provider, ProviderStatus};
use crate::error::{AutocostError, Result};
use crate::storage::config::Settings;
use crate::storage::profiles::ProfileRegistry;
use crate::util::env::EnvSnapshot;

pub use aws::AwsProvider;
pub use azure::AzureProvider;
pub use datadog::DatadogProvider;
pub use gcp::GcpProvider;

/// Capability set of one cloud provider.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn kind(&self) -> Provider;

    /// Analysis capabilities advertised when the provider is ready.
    fn capabilities(&self) -> Vec<String>;

    /// Read-only checks run by the permission probe, in report order.
    fn capability_checks(&self) -> Vec<CapabilityCheck>;

    /// Configuration keys reported when no credential source exists.
    fn missing_config(&self) -> Vec<String>;

    /// Registry of the provider's named profiles.
    fn profile_registry(&self, settings: &Settings) -> Arc<dyn ProfileRegistry>;

    /// Context built from ambient credential variables, if any.
    fn environment_context(&self) -> Option<ContextBuilder>;

    /// Provider error codes that mean "not allowed".
    fn deny_codes(&self) -> &'static [&'static str];

    /// Profile the provider's own tooling uses when none is named.
    fn native_default_profile(&self) -> Option<&'static str> {
        None
    }

    /// Profile to load at start-up: the configured one, else the native
    /// default when no environment credentials exist and the registry has it.
    fn startup_profile(&self, settings: &Settings) -> Option<String> {
        if let Some(profile) = settings.provider(self.kind()).profile {
            return Some(profile);
        }
        if self.environment_context().is_some() {
            return None;
        }
        let name = self.native_default_profile()?;
        self.profile_registry(settings)
            .list()
            .iter()
            .any(|p| p.name == name)
            .then(|| name.to_string())
    }

    /// Static configuration check; makes no network calls.
    fn validate(&self, settings: &Settings) -> ProviderStatus {
        let provider = self.kind();
        let registry = self.profile_registry(settings);
        let profiles = registry.list();
        let has_environment = self.environment_context().is_some();

        if let Some(name) = self.startup_profile(settings) {
            return match profiles.iter().find(|p| p.name == name) {
                Some(p) if p.resolvable => ProviderStatus::ready(provider, self.capabilities()),
                Some(_) if has_environment => ProviderStatus::ready(provider, self.capabilities())
                    .with_warning(format!("profile '{name}' has no usable credentials; using environment")),
                Some(_) => ProviderStatus::error(
                    provider,
                    format!("profile '{name}' has no usable credentials"),
                ),
                None if has_environment => ProviderStatus::ready(provider, self.capabilities())
                    .with_warning(format!("profile '{name}' not found; using environment")),
                None => ProviderStatus::error(provider, format!("profile '{name}' not found")),
            };
        }

        if has_environment {
            return ProviderStatus::ready(provider, self.capabilities());
        }

        if profiles.iter().any(|p| p.resolvable) {
            return ProviderStatus::ready(provider, self.capabilities())
                .with_warning("no default profile selected; pass --profile");
        }

        ProviderStatus::disabled(provider, self.missing_config())
    }

    /// Map a failed capability check onto a verdict.
    fn classify_failure(&self, error: &AutocostError) -> VerdictOutcome {
        match error {
            AutocostError::InsufficientPermission { .. }
            | AutocostError::InvalidCredentials { .. }
            | AutocostError::AuthExpired { .. }
            | AutocostError::AuthNotConfigured { .. } => VerdictOutcome::Denied,
            AutocostError::ProviderApiError {
                code: Some(code), ..
            } if self
                .deny_codes()
                .iter()
                .any(|deny| deny.eq_ignore_ascii_case(code)) =>
            {
                VerdictOutcome::Denied
            }
            _ => VerdictOutcome::Indeterminate,
        }
    }

    /// Run the provider's primary capability check as a connectivity test.
    async fn test_connection(&self, client: &dyn ProviderClient) -> Result<()> {
        match self.capability_checks().first() {
            Some(check) => client.run_check(check).await,
            None => Ok(()),
        }
    }
}

/// Provider definitions for the given providers, built from one environment snapshot.
#[must_use]
pub fn definitions(providers: &[Provider], env: &EnvSnapshot) -> Vec<Arc<dyn CloudProvider>> {
    providers.iter().map(|p| definition(*p, env)).collect()
}

/// Provider definition for one provider.
#[must_use]
pub fn definition(provider: Provider, env: &EnvSnapshot) -> Arc<dyn CloudProvider> {
    match provider {
        Provider::Aws => Arc::new(AwsProvider::new(env)),
        Provider::Gcp => Arc::new(GcpProvider::new(env)),
        Provider::Azure => Arc::new(AzureProvider::new(env)),
        Provider::Datadog => Arc::new(DatadogProvider::new(env)),
    }
}
