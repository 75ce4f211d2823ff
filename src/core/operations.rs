//! Operation request and result shapes.
//!
//! Requests are validated before any provider is touched; results are plain
//! serializable values handed back to whoever renders them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::core::context::AuthenticationContext;
use crate::core::models::{DEFAULT_DATASET, DimensionKey, DimensionKind};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::storage::config::MAX_ANALYSIS_DAYS;
use crate::storage::paths::is_plain_file_name;

// =============================================================================
// Validation
// =============================================================================

fn invalid(key: &str, value: impl ToString, message: &str) -> AutocostError {
    AutocostError::ConfigInvalid {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

/// Look-back window in `[1, 365]` days.
pub fn validate_days(days: u32) -> Result<u32> {
    if (1..=MAX_ANALYSIS_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(invalid(
            "days",
            days,
            &format!("must be between 1 and {MAX_ANALYSIS_DAYS}"),
        ))
    }
}

pub fn validate_window(window: usize) -> Result<usize> {
    if window >= 1 {
        Ok(window)
    } else {
        Err(invalid("window", window, "must be at least 1"))
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(invalid("threshold", threshold, "must be a non-negative number"))
    }
}

pub fn validate_profile(profile: &str) -> Result<&str> {
    let trimmed = profile.trim();
    if trimmed.is_empty() {
        Err(invalid("profile", profile, "profile name must not be empty"))
    } else if !is_plain_file_name(trimmed) {
        Err(invalid(
            "profile",
            profile,
            "profile name must not contain path separators",
        ))
    } else {
        Ok(trimmed)
    }
}

/// Export dataset name; a single file name without extension.
pub fn validate_dataset(dataset: &str) -> Result<&str> {
    if is_plain_file_name(dataset) {
        Ok(dataset)
    } else {
        Err(invalid(
            "dataset",
            dataset,
            "dataset must be a plain name without path separators",
        ))
    }
}

fn validate_optional_profile(profile: Option<&str>) -> Result<()> {
    profile.map_or(Ok(()), |p| validate_profile(p).map(|_| ()))
}

// =============================================================================
// Requests
// =============================================================================

/// Rolling-average trend over one provider's costs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRequest {
    pub provider: Provider,
    /// Profile to switch to before fetching.
    pub profile: Option<String>,
    /// Look-back days; defaults to `2 * window + 1`.
    pub days: Option<u32>,
    pub window: Option<usize>,
    pub threshold: Option<f64>,
    pub group_by: DimensionKind,
    /// Restrict the series to one dimension key.
    pub key: Option<DimensionKey>,
    pub dataset: String,
    /// Last day included; defaults to today (UTC).
    pub as_of: Option<NaiveDate>,
}

impl TrendRequest {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            profile: None,
            days: None,
            window: None,
            threshold: None,
            group_by: DimensionKind::Total,
            key: None,
            dataset: DEFAULT_DATASET.to_string(),
            as_of: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_optional_profile(self.profile.as_deref())?;
        validate_dataset(&self.dataset)?;
        if let Some(days) = self.days {
            validate_days(days)?;
        }
        if let Some(window) = self.window {
            validate_window(window)?;
        }
        if let Some(threshold) = self.threshold {
            validate_threshold(threshold)?;
        }
        Ok(())
    }
}

/// Anomaly detection across one dimension of a provider's costs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRequest {
    pub provider: Provider,
    pub profile: Option<String>,
    /// Reference window in days.
    pub reference_days: Option<u32>,
    pub current_days: Option<u32>,
    pub threshold: Option<f64>,
    pub min_observations: Option<usize>,
    pub group_by: DimensionKind,
    pub dataset: String,
    pub as_of: Option<NaiveDate>,
    /// Probe the cost capability first and fail if it is not allowed.
    pub require_permissions: bool,
}

impl AnomalyRequest {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            profile: None,
            reference_days: None,
            current_days: None,
            threshold: None,
            min_observations: None,
            group_by: DimensionKind::Service,
            dataset: DEFAULT_DATASET.to_string(),
            as_of: None,
            require_permissions: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_optional_profile(self.profile.as_deref())?;
        validate_dataset(&self.dataset)?;
        let reference = self.reference_days.map(validate_days).transpose()?;
        let current = self.current_days.map(validate_days).transpose()?;
        if let (Some(r), Some(c)) = (reference, current) {
            validate_days(r + c)?;
        }
        if let Some(threshold) = self.threshold {
            validate_threshold(threshold)?;
        }
        if self.min_observations == Some(0) {
            return Err(invalid("min_observations", 0, "must be at least 1"));
        }
        Ok(())
    }
}

/// Spillover attribution of a dependent key to trigger keys.
#[derive(Debug, Clone, PartialEq)]
pub struct SpilloverRequest {
    pub provider: Provider,
    pub profile: Option<String>,
    pub triggers: Vec<DimensionKey>,
    pub dependent: DimensionKey,
    pub days: Option<u32>,
    pub rel_tolerance: Option<f64>,
    pub min_abs: Option<f64>,
    pub dataset: String,
    pub as_of: Option<NaiveDate>,
    pub require_permissions: bool,
}

impl SpilloverRequest {
    #[must_use]
    pub fn new(provider: Provider, triggers: Vec<DimensionKey>, dependent: DimensionKey) -> Self {
        Self {
            provider,
            profile: None,
            triggers,
            dependent,
            days: None,
            rel_tolerance: None,
            min_abs: None,
            dataset: DEFAULT_DATASET.to_string(),
            as_of: None,
            require_permissions: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_optional_profile(self.profile.as_deref())?;
        validate_dataset(&self.dataset)?;
        if self.triggers.is_empty() {
            return Err(invalid("triggers", "", "at least one trigger key is required"));
        }
        if self.triggers.contains(&self.dependent) {
            return Err(invalid(
                "dependent",
                &self.dependent,
                "dependent key cannot also be a trigger",
            ));
        }
        if let Some(days) = self.days {
            validate_days(days)?;
        }
        if let Some(tolerance) = self.rel_tolerance {
            validate_threshold(tolerance)?;
        }
        if let Some(min_abs) = self.min_abs {
            if !min_abs.is_finite() || min_abs < 0.0 {
                return Err(invalid("min_abs", min_abs, "must be a non-negative number"));
            }
        }
        Ok(())
    }

    /// Dimension kinds to fetch, deduplicated.
    #[must_use]
    pub fn kinds(&self) -> Vec<DimensionKind> {
        let mut kinds: Vec<DimensionKind> = Vec::new();
        for key in self.triggers.iter().chain(std::iter::once(&self.dependent)) {
            if !kinds.contains(&key.kind) {
                kinds.push(key.kind.clone());
            }
        }
        kinds
    }
}

// =============================================================================
// Results
// =============================================================================

/// Non-secret view of an authentication context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub provider: Provider,
    pub source: String,
    pub credential_kind: String,
    pub credential_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub established_at: DateTime<Utc>,
    pub fingerprint: String,
}

impl From<&AuthenticationContext> for ContextSummary {
    fn from(context: &AuthenticationContext) -> Self {
        Self {
            provider: context.provider(),
            source: context.source().as_str().to_string(),
            credential_kind: context.material().kind().to_string(),
            credential_id: context.material().public_id(),
            profile: context.profile().map(ToString::to_string),
            region: context.region().map(ToString::to_string),
            account: context.account().map(ToString::to_string),
            expires_at: context.expires_at(),
            established_at: context.established_at(),
            fingerprint: context.fingerprint().to_string(),
        }
    }
}

/// Details of a current or named profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInfo {
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether this is the provider's current context.
    pub current: bool,
    pub resolvable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

/// Where a captured session went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub path: String,
    pub context: ContextSummary,
}

/// Outcome of one provider connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResult {
    pub provider: Provider,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Analysis output plus the context and period it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostAnalysis<T> {
    pub provider: Provider,
    pub context: ContextSummary,
    pub start: NaiveDate,
    /// First day excluded.
    pub end: NaiveDate,
    pub records: usize,
    pub result: T,
}
