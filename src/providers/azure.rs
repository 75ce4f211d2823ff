//! Azure provider definition.
//!
//! Service-principal credentials come from `AZURE_TENANT_ID`,
//! `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`, or from named profiles in the
//! autocost config file. The context account is the subscription.

use std::sync::Arc;

use super::CloudProvider;
use crate::core::client::CapabilityCheck;
use crate::core::context::{
    AuthenticationContext, ContextBuilder, CredentialMaterial, CredentialSource, Secret,
};
use crate::core::models::DEFAULT_DATASET;
use crate::core::provider::Provider;
use crate::storage::config::{Settings, region_env_vars};
use crate::storage::profiles::{ConfigProfileRegistry, ProfileRegistry};
use crate::util::env::EnvSnapshot;

pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";

const DENY_CODES: &[&str] = &["AuthorizationFailed", "403", "Forbidden"];

#[derive(Debug, Clone)]
pub struct AzureProvider {
    environment: Option<ContextBuilder>,
}

impl AzureProvider {
    #[must_use]
    pub fn new(env: &EnvSnapshot) -> Self {
        Self {
            environment: environment_context(env),
        }
    }
}

fn environment_context(env: &EnvSnapshot) -> Option<ContextBuilder> {
    let material = CredentialMaterial::ClientSecret {
        tenant_id: env.get(ENV_TENANT_ID)?.to_string(),
        client_id: env.get(ENV_CLIENT_ID)?.to_string(),
        client_secret: Secret::new(env.get(ENV_CLIENT_SECRET)?),
    };
    let mut builder =
        AuthenticationContext::builder(Provider::Azure, CredentialSource::Environment, material);
    if let Some(subscription) = env.get(ENV_SUBSCRIPTION_ID) {
        builder = builder.account(subscription);
    }
    if let Some(region) = env.get_any(region_env_vars(Provider::Azure)) {
        builder = builder.region(region);
    }
    Some(builder)
}

impl CloudProvider for AzureProvider {
    fn kind(&self) -> Provider {
        Provider::Azure
    }

    fn capabilities(&self) -> Vec<String> {
        ["cost_analysis", "performance_metrics", "tag_analysis"]
            .map(String::from)
            .to_vec()
    }

    fn capability_checks(&self) -> Vec<CapabilityCheck> {
        vec![
            CapabilityCheck::new(
                "cost_management",
                "Microsoft.CostManagement/query/read",
                DEFAULT_DATASET,
            ),
            CapabilityCheck::new(
                "consumption_usage",
                "Microsoft.Consumption/usageDetails/read",
                "consumption_usage",
            ),
            CapabilityCheck::new(
                "monitor_metrics",
                "Microsoft.Insights/metrics/read",
                "monitor_metrics",
            ),
        ]
    }

    fn missing_config(&self) -> Vec<String> {
        vec![
            "azure_credentials".to_string(),
            "azure_subscription_id".to_string(),
        ]
    }

    fn profile_registry(&self, settings: &Settings) -> Arc<dyn ProfileRegistry> {
        Arc::new(ConfigProfileRegistry::new(
            Provider::Azure,
            settings.config_path.clone(),
            settings.profiles_for(Provider::Azure).to_vec(),
        ))
    }

    fn environment_context(&self) -> Option<ContextBuilder> {
        self.environment.clone()
    }

    fn deny_codes(&self) -> &'static [&'static str] {
        DENY_CODES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_principal_needs_all_three_variables() {
        let partial = EnvSnapshot::from_pairs([(ENV_TENANT_ID, "t"), (ENV_CLIENT_ID, "c")]);
        assert!(AzureProvider::new(&partial).environment_context().is_none());

        let full = partial
            .with(ENV_CLIENT_SECRET, "s")
            .with(ENV_SUBSCRIPTION_ID, "sub-1");
        let context = AzureProvider::new(&full).environment_context().unwrap().build();
        assert_eq!(context.material().public_id(), "t/c");
        assert_eq!(context.account(), Some("sub-1"));
    }
}
