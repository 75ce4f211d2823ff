//! Provider identities and status.
//!
//! Defines all supported cloud providers and the readiness status computed
//! for each enabled provider at start-up.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AutocostError, Result};

// =============================================================================
// Provider Enum
// =============================================================================

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Gcp,
    Azure,
    Datadog,
}

impl Provider {
    /// All providers in display order.
    pub const ALL: &'static [Self] = &[Self::Aws, Self::Gcp, Self::Azure, Self::Datadog];

    /// CLI name for this provider.
    #[must_use]
    pub const fn cli_name(self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure => "azure",
            Self::Datadog => "datadog",
        }
    }

    /// Display name for human output.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Aws => "AWS",
            Self::Gcp => "Google Cloud",
            Self::Azure => "Azure",
            Self::Datadog => "Datadog",
        }
    }

    /// Parse from CLI argument.
    pub fn from_cli_name(name: &str) -> Result<Self> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .find(|p| p.cli_name() == lower)
            .copied()
            .ok_or_else(|| AutocostError::InvalidProvider(name.to_string()))
    }

    /// Parse a comma-separated provider list, skipping blanks and duplicates.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        let mut providers = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let provider = Self::from_cli_name(name)?;
            if !providers.contains(&provider) {
                providers.push(provider);
            }
        }
        Ok(providers)
    }

    /// Default timeout for a single provider call.
    #[must_use]
    pub const fn default_timeout(self) -> Duration {
        match self {
            // Cost APIs on GCP go through BigQuery and are slow
            Self::Gcp => Duration::from_secs(20),
            _ => Duration::from_secs(10),
        }
    }

    /// Whether the provider supports cross-account assumed-role contexts.
    #[must_use]
    pub const fn supports_assume_role(self) -> bool {
        matches!(self, Self::Aws)
    }

    /// Get authentication suggestion for this provider.
    #[must_use]
    pub const fn auth_suggestion(self) -> &'static str {
        match self {
            Self::Aws => "Run: aws configure (or aws sso login --profile <name>)",
            Self::Gcp => "Run: gcloud auth application-default login",
            Self::Azure => "Run: az login, or set AZURE_TENANT_ID/AZURE_CLIENT_ID/AZURE_CLIENT_SECRET",
            Self::Datadog => "Set DATADOG_API_KEY and DATADOG_APP_KEY",
        }
    }

    /// Billing console for this provider.
    #[must_use]
    pub const fn console_url(self) -> &'static str {
        match self {
            Self::Aws => "https://console.aws.amazon.com/cost-management/home",
            Self::Gcp => "https://console.cloud.google.com/billing",
            Self::Azure => "https://portal.azure.com/#view/Microsoft_Azure_CostManagement",
            Self::Datadog => "https://app.datadoghq.com/billing/usage",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

// =============================================================================
// Provider Selection
// =============================================================================

/// Provider selection from CLI arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProviderSelection {
    /// Single provider.
    Single(Provider),
    /// Every enabled provider.
    #[default]
    Enabled,
}

impl ProviderSelection {
    /// Parse from CLI argument string.
    pub fn from_arg(arg: &str) -> Result<Self> {
        match arg.to_lowercase().as_str() {
            "all" | "enabled" => Ok(Self::Enabled),
            name => Ok(Self::Single(Provider::from_cli_name(name)?)),
        }
    }

    /// Resolve the selection against the enabled providers.
    #[must_use]
    pub fn providers(&self, enabled: &[Provider]) -> Vec<Provider> {
        match self {
            Self::Single(p) => vec![*p],
            Self::Enabled => enabled.to_vec(),
        }
    }
}

// =============================================================================
// Provider Status
// =============================================================================

/// Readiness state of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderState {
    /// Configured and usable.
    Ready,
    /// Configured but failing.
    Error,
    /// Usable with reduced functionality.
    Warning,
    /// Not enabled or not configured.
    Disabled,
}

impl ProviderState {
    /// Short label for output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Disabled => "disabled",
        }
    }
}

/// Readiness status of a provider, computed at start-up and on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider: Provider,
    pub state: ProviderState,
    pub is_configured: bool,
    /// Configuration items that would make the provider usable.
    pub missing_config: Vec<String>,
    /// Capability names the provider exposes.
    pub capabilities: Vec<String>,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ProviderStatus {
    /// Status for a provider that is usable.
    #[must_use]
    pub fn ready(provider: Provider, capabilities: Vec<String>) -> Self {
        Self {
            provider,
            state: ProviderState::Ready,
            is_configured: true,
            missing_config: Vec::new(),
            capabilities,
            last_check: Utc::now(),
            error_message: None,
        }
    }

    /// Status for a provider with no usable configuration.
    #[must_use]
    pub fn disabled(provider: Provider, missing_config: Vec<String>) -> Self {
        Self {
            provider,
            state: ProviderState::Disabled,
            is_configured: false,
            missing_config,
            capabilities: Vec::new(),
            last_check: Utc::now(),
            error_message: None,
        }
    }

    /// Status for a provider whose configuration failed.
    #[must_use]
    pub fn error(provider: Provider, message: impl Into<String>) -> Self {
        Self {
            provider,
            state: ProviderState::Error,
            is_configured: true,
            missing_config: Vec::new(),
            capabilities: Vec::new(),
            last_check: Utc::now(),
            error_message: Some(message.into()),
        }
    }

    /// Downgrade a ready status to a warning with a message.
    #[must_use]
    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.state = ProviderState::Warning;
        self.error_message = Some(message.into());
        self
    }

    /// Whether operations can be attempted against this provider.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.state, ProviderState::Ready | ProviderState::Warning)
    }
}
