//! AWS provider definition.
//!
//! Credential sources:
//! - named profiles in `~/.aws/credentials` and `~/.aws/config`
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (+ `AWS_SESSION_TOKEN`)
//! - cross-account roles assumed from the current context

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::CloudProvider;
use crate::core::client::CapabilityCheck;
use crate::core::context::{AuthenticationContext, ContextBuilder, CredentialMaterial, CredentialSource, Secret};
use crate::core::models::DEFAULT_DATASET;
use crate::core::provider::Provider;
use crate::storage::config::{Settings, region_env_vars};
use crate::storage::profiles::{AwsProfileRegistry, ProfileRegistry};
use crate::util::env::EnvSnapshot;

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
/// RFC 3339 expiry of temporary environment credentials.
pub const ENV_CREDENTIAL_EXPIRATION: &str = "AWS_CREDENTIAL_EXPIRATION";

const DENY_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "UnauthorizedException",
];

#[derive(Debug, Clone)]
pub struct AwsProvider {
    registry: Arc<AwsProfileRegistry>,
    environment: Option<ContextBuilder>,
}

impl AwsProvider {
    #[must_use]
    pub fn new(env: &EnvSnapshot) -> Self {
        Self {
            registry: Arc::new(AwsProfileRegistry::from_env(env)),
            environment: environment_context(env),
        }
    }
}

fn environment_context(env: &EnvSnapshot) -> Option<ContextBuilder> {
    let access_key_id = env.get(ENV_ACCESS_KEY_ID)?;
    let secret = env.get(ENV_SECRET_ACCESS_KEY)?;
    let mut builder = AuthenticationContext::builder(
        Provider::Aws,
        CredentialSource::Environment,
        CredentialMaterial::AccessKey {
            access_key_id: access_key_id.to_string(),
            secret_access_key: Secret::new(secret),
            session_token: env.get(ENV_SESSION_TOKEN).map(Secret::new),
        },
    );
    if let Some(region) = env.get_any(region_env_vars(Provider::Aws)) {
        builder = builder.region(region);
    }
    match env.get(ENV_CREDENTIAL_EXPIRATION).map(DateTime::parse_from_rfc3339) {
        Some(Ok(expiry)) => builder = builder.expires_at(expiry.with_timezone(&Utc)),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring unparseable {ENV_CREDENTIAL_EXPIRATION}");
        }
        None => {}
    }
    Some(builder)
}

impl CloudProvider for AwsProvider {
    fn kind(&self) -> Provider {
        Provider::Aws
    }

    fn capabilities(&self) -> Vec<String> {
        [
            "cost_analysis",
            "performance_metrics",
            "dimension_discovery",
            "tag_analysis",
            "cross_account_access",
            "ec2_analysis",
            "ecs_analysis",
        ]
        .map(String::from)
        .to_vec()
    }

    fn capability_checks(&self) -> Vec<CapabilityCheck> {
        vec![
            CapabilityCheck::new("cost_explorer", "ce:GetDimensionValues", DEFAULT_DATASET),
            CapabilityCheck::new("ec2_instances", "ec2:DescribeInstances", "ec2_instances"),
            CapabilityCheck::new("cloudwatch_metrics", "cloudwatch:ListMetrics", "cloudwatch_metrics"),
            CapabilityCheck::new("ecs_clusters", "ecs:ListClusters", "ecs_clusters"),
        ]
    }

    fn missing_config(&self) -> Vec<String> {
        vec!["aws_credentials".to_string()]
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
    use crate::core::probe::VerdictOutcome;
    use crate::error::AutocostError;

    #[test]
    fn environment_keys_build_context() {
        let env = EnvSnapshot::from_pairs([
            (ENV_ACCESS_KEY_ID, "AKIAEXAMPLE"),
            (ENV_SECRET_ACCESS_KEY, "secret"),
            (ENV_SESSION_TOKEN, "token"),
            ("AWS_REGION", "eu-west-1"),
            (ENV_CREDENTIAL_EXPIRATION, "2030-01-01T00:00:00Z"),
        ]);
        let context = AwsProvider::new(&env)
            .environment_context()
            .unwrap()
            .build();
        assert_eq!(context.source(), CredentialSource::Environment);
        assert_eq!(context.region(), Some("eu-west-1"));
        assert_eq!(context.material().public_id(), "AKIAEXAMPLE");
        assert!(context.expires_at().is_some());
    }

    #[test]
    fn partial_keys_are_not_a_context() {
        let env = EnvSnapshot::from_pairs([(ENV_ACCESS_KEY_ID, "AKIAEXAMPLE")]);
        assert!(AwsProvider::new(&env).environment_context().is_none());
    }

    #[test]
    fn access_denied_code_is_denied() {
        let provider = AwsProvider::new(&EnvSnapshot::default());
        let err = AutocostError::ProviderApiError {
            provider: "aws".into(),
            code: Some("AccessDeniedException".into()),
            message: "User is not authorized to perform ce:GetCostAndUsage".into(),
        };
        assert_eq!(provider.classify_failure(&err), VerdictOutcome::Denied);
    }

    #[test]
    fn checks_start_with_cost_explorer() {
        let provider = AwsProvider::new(&EnvSnapshot::default());
        let checks = provider.capability_checks();
        assert_eq!(checks[0].capability, "cost_explorer");
        assert_eq!(checks[0].dataset, DEFAULT_DATASET);
        assert_eq!(checks.len(), 4);
    }
}
