//! Datadog provider definition.
//!
//! API and application keys come from `DATADOG_API_KEY` / `DATADOG_APP_KEY`
//! (or the `DD_` spellings) or from named profiles in the autocost config
//! file. The context region is the Datadog site.

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

pub const ENV_API_KEY: &[&str] = &["DATADOG_API_KEY", "DD_API_KEY"];
pub const ENV_APP_KEY: &[&str] = &["DATADOG_APP_KEY", "DD_APP_KEY"];

const DENY_CODES: &[&str] = &["403", "Forbidden"];

#[derive(Debug, Clone)]
pub struct DatadogProvider {
    environment: Option<ContextBuilder>,
}

impl DatadogProvider {
    #[must_use]
    pub fn new(env: &EnvSnapshot) -> Self {
        Self {
            environment: environment_context(env),
        }
    }
}

fn environment_context(env: &EnvSnapshot) -> Option<ContextBuilder> {
    let api_key = env.get_any(ENV_API_KEY)?;
    let mut builder = AuthenticationContext::builder(
        Provider::Datadog,
        CredentialSource::Environment,
        CredentialMaterial::ApiKey {
            api_key: Secret::new(api_key),
            app_key: env.get_any(ENV_APP_KEY).map(Secret::new),
        },
    );
    if let Some(site) = env.get_any(region_env_vars(Provider::Datadog)) {
        builder = builder.region(site);
    }
    Some(builder)
}

impl CloudProvider for DatadogProvider {
    fn kind(&self) -> Provider {
        Provider::Datadog
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "usage_analysis",
            "metrics_analysis",
            "log_analysis",
            "apm_analysis",
            "infrastructure_analysis",
        ]
        .map(String::from)
        .to_vec()
    }

    fn capability_checks(&self) -> Vec<CapabilityCheck> {
        vec![
            CapabilityCheck::new("usage_metering", "usage_read", DEFAULT_DATASET),
            CapabilityCheck::new("metrics", "metrics_read", "metrics"),
            CapabilityCheck::new("logs", "logs_read_data", "logs"),
        ]
    }

    fn missing_config(&self) -> Vec<String> {
        vec!["datadog_api_key".to_string(), "datadog_app_key".to_string()]
    }

    fn profile_registry(&self, settings: &Settings) -> Arc<dyn ProfileRegistry> {
        Arc::new(ConfigProfileRegistry::new(
            Provider::Datadog,
            settings.config_path.clone(),
            settings.profiles_for(Provider::Datadog).to_vec(),
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
    fn dd_spelling_is_accepted() {
        let env = EnvSnapshot::from_pairs([("DD_API_KEY", "abc"), ("DD_SITE", "datadoghq.eu")]);
        let context = DatadogProvider::new(&env)
            .environment_context()
            .unwrap()
            .build();
        assert_eq!(context.region(), Some("datadoghq.eu"));
        assert_eq!(context.material().kind(), "api-key");
    }
}
