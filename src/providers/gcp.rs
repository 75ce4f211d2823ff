//! GCP provider definition.
//!
//! Credential sources: gcloud named configurations and
//! `GOOGLE_APPLICATION_CREDENTIALS` service-account key files. The context
//! account is the GCP project.

use std::path::PathBuf;
use std::sync::Arc;

use super::CloudProvider;
use crate::core::client::CapabilityCheck;
use crate::core::context::{AuthenticationContext, ContextBuilder, CredentialMaterial, CredentialSource};
use crate::core::models::DEFAULT_DATASET;
use crate::core::provider::Provider;
use crate::storage::config::{Settings, region_env_vars};
use crate::storage::profiles::{GcloudProfileRegistry, ProfileRegistry};
use crate::util::env::EnvSnapshot;

pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Project variables, first match wins.
pub const ENV_PROJECT: &[&str] = &["GCP_PROJECT_ID", "GOOGLE_CLOUD_PROJECT", "CLOUDSDK_CORE_PROJECT"];

const DENY_CODES: &[&str] = &["PERMISSION_DENIED", "403", "Forbidden"];

#[derive(Debug, Clone)]
pub struct GcpProvider {
    registry: Arc<GcloudProfileRegistry>,
    environment: Option<ContextBuilder>,
}

impl GcpProvider {
    #[must_use]
    pub fn new(env: &EnvSnapshot) -> Self {
        Self {
            registry: Arc::new(GcloudProfileRegistry::from_env(env)),
            environment: environment_context(env),
        }
    }
}

fn environment_context(env: &EnvSnapshot) -> Option<ContextBuilder> {
    let key_file = env.get(ENV_CREDENTIALS)?;
    let mut builder = AuthenticationContext::builder(
        Provider::Gcp,
        CredentialSource::Environment,
        CredentialMaterial::ServiceAccount {
            key_file: PathBuf::from(key_file),
        },
    );
    if let Some(project) = env.get_any(ENV_PROJECT) {
        builder = builder.account(project);
    }
    if let Some(region) = env.get_any(region_env_vars(Provider::Gcp)) {
        builder = builder.region(region);
    }
    Some(builder)
}

impl CloudProvider for GcpProvider {
    fn kind(&self) -> Provider {
        Provider::Gcp
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "cost_analysis",
            "performance_metrics",
            "dimension_discovery",
            "tag_analysis",
            "billing_account_access",
            "project_switching",
        ]
        .map(String::from)
        .to_vec()
    }

    fn capability_checks(&self) -> Vec<CapabilityCheck> {
        vec![
            CapabilityCheck::new("billing_export", "bigquery.tables.getData", DEFAULT_DATASET),
            CapabilityCheck::new("billing_accounts", "billing.accounts.list", "billing_accounts"),
            CapabilityCheck::new("projects", "resourcemanager.projects.get", "projects"),
            CapabilityCheck::new("monitoring_metrics", "monitoring.timeSeries.list", "monitoring_metrics"),
            CapabilityCheck::new("compute_instances", "compute.instances.list", "compute_instances"),
        ]
    }

    fn missing_config(&self) -> Vec<String> {
        vec!["gcp_credentials".to_string(), "gcp_project".to_string()]
    }

    fn profile_registry(&self, _settings: &Settings) -> Arc<dyn ProfileRegistry> {
        Arc::clone(&self.registry) as Arc<dyn ProfileRegistry>
    }

    fn environment_context(&self) -> Option<ContextBuilder> {
        self.environment.clone()
    }

    fn deny_codes(&self) -> &'static [&'static str] {
        DENY_CODES
    }

    fn native_default_profile(&self) -> Option<&'static str> {
        Some("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_from_environment() {
        let env = EnvSnapshot::from_pairs([
            (ENV_CREDENTIALS, "/keys/sa.json"),
            ("GOOGLE_CLOUD_PROJECT", "billing-prod"),
        ]);
        let context = GcpProvider::new(&env).environment_context().unwrap().build();
        assert_eq!(context.account(), Some("billing-prod"));
        assert_eq!(context.material().public_id(), "/keys/sa.json");
    }

    #[test]
    fn project_alone_is_not_a_credential() {
        let env = EnvSnapshot::from_pairs([("GCP_PROJECT_ID", "billing-prod")]);
        assert!(GcpProvider::new(&env).environment_context().is_none());
    }
}
