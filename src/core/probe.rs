//! Permission probing.
//!
//! Runs a provider's battery of read-only capability checks against a client
//! and classifies each outcome as allowed, denied, or indeterminate. Verdicts
//! are produced fresh on every probe and never cached. The report is
//! advisory: callers consult [`ProbeReport::missing`] before running
//! higher-privilege analytics, nothing here enforces it.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::core::client::{CapabilityCheck, ProviderClient};
use crate::core::provider::Provider;
use crate::providers::CloudProvider;

/// Default timeout for one capability check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one capability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictOutcome {
    Allowed,
    Denied,
    /// Network failure, timeout, or an error that says nothing about permissions.
    Indeterminate,
}

impl VerdictOutcome {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Indeterminate => "indeterminate",
        }
    }
}

/// Verdict for one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityVerdict {
    pub capability: String,
    pub operation: String,
    pub outcome: VerdictOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// Ordered verdicts for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub provider: Provider,
    pub verdicts: Vec<CapabilityVerdict>,
    pub probed_at: DateTime<Utc>,
}

impl ProbeReport {
    /// Whether the capability was probed and allowed.
    #[must_use]
    pub fn is_allowed(&self, capability: &str) -> bool {
        self.verdicts
            .iter()
            .any(|v| v.capability == capability && v.outcome == VerdictOutcome::Allowed)
    }

    /// Required capabilities that were not allowed (denied, indeterminate, or not probed).
    #[must_use]
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| !self.is_allowed(c))
            .map(ToString::to_string)
            .collect()
    }

    /// Count verdicts with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: VerdictOutcome) -> usize {
        self.verdicts.iter().filter(|v| v.outcome == outcome).count()
    }
}

/// Runs capability checks with a per-check timeout.
#[derive(Debug, Clone, Copy)]
pub struct PermissionProbe {
    timeout: Duration,
}

impl Default for PermissionProbe {
    fn default() -> Self {
        Self::new(DEFAULT_CHECK_TIMEOUT)
    }
}

impl PermissionProbe {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe every capability the provider defines. Checks run concurrently;
    /// verdicts keep the provider's check order.
    pub async fn probe(
        &self,
        provider: &dyn CloudProvider,
        client: &dyn ProviderClient,
    ) -> ProbeReport {
        let checks = provider.capability_checks();
        let verdicts = join_all(
            checks
                .iter()
                .map(|check| self.run_one(provider, client, check)),
        )
        .await;

        let report = ProbeReport {
            provider: provider.kind(),
            verdicts,
            probed_at: Utc::now(),
        };
        tracing::info!(
            provider = %report.provider,
            allowed = report.count(VerdictOutcome::Allowed),
            denied = report.count(VerdictOutcome::Denied),
            indeterminate = report.count(VerdictOutcome::Indeterminate),
            "Permission probe finished"
        );
        report
    }

    async fn run_one(
        &self,
        provider: &dyn CloudProvider,
        client: &dyn ProviderClient,
        check: &CapabilityCheck,
    ) -> CapabilityVerdict {
        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, client.run_check(check)).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (outcome, detail) = match result {
            Ok(Ok(())) => (VerdictOutcome::Allowed, None),
            Ok(Err(e)) => (provider.classify_failure(&e), Some(e.to_string())),
            Err(_) => (
                VerdictOutcome::Indeterminate,
                Some(format!("timed out after {}s", self.timeout.as_secs_f64())),
            ),
        };
        tracing::debug!(
            provider = %provider.kind(),
            capability = %check.capability,
            outcome = outcome.label(),
            duration_ms,
            "Capability check"
        );
        CapabilityVerdict {
            capability: check.capability.clone(),
            operation: check.operation.clone(),
            outcome,
            detail,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::aws::AwsProvider;
    use crate::test_utils::MockClient;
    use crate::util::env::EnvSnapshot;

    fn aws() -> AwsProvider {
        AwsProvider::new(&EnvSnapshot::default())
    }

    #[tokio::test]
    async fn verdicts_follow_check_order_and_classification() {
        let provider = aws();
        let client = MockClient::new(Provider::Aws)
            .deny("ec2_instances")
            .fail("ecs_clusters", "service unavailable");
        let report = PermissionProbe::default().probe(&provider, &client).await;

        let caps: Vec<_> = report.verdicts.iter().map(|v| v.capability.as_str()).collect();
        let expected: Vec<_> = provider
            .capability_checks()
            .into_iter()
            .map(|c| c.capability)
            .collect();
        assert_eq!(caps, expected);

        let outcome = |cap: &str| {
            report
                .verdicts
                .iter()
                .find(|v| v.capability == cap)
                .unwrap()
                .outcome
        };
        assert_eq!(outcome("cost_explorer"), VerdictOutcome::Allowed);
        assert_eq!(outcome("ec2_instances"), VerdictOutcome::Denied);
        assert_eq!(outcome("ecs_clusters"), VerdictOutcome::Indeterminate);
    }

    #[tokio::test]
    async fn slow_check_is_indeterminate() {
        let provider = aws();
        let client = MockClient::new(Provider::Aws).delay("cloudwatch_metrics", Duration::from_millis(300));
        let report = PermissionProbe::new(Duration::from_millis(20))
            .probe(&provider, &client)
            .await;
        let verdict = report
            .verdicts
            .iter()
            .find(|v| v.capability == "cloudwatch_metrics")
            .unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Indeterminate);
        assert!(verdict.detail.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_lists_non_allowed_capabilities() {
        let provider = aws();
        let client = MockClient::new(Provider::Aws).deny("cost_explorer");
        let report = PermissionProbe::default().probe(&provider, &client).await;
        assert_eq!(
            report.missing(&["cost_explorer", "ec2_instances", "not_probed"]),
            vec!["cost_explorer".to_string(), "not_probed".to_string()]
        );
        assert!(report.is_allowed("ec2_instances"));
    }
}
