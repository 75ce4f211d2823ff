//! Cost data models.
//!
//! [`CostRecord`] is the unit every provider client returns and every
//! analytics algorithm consumes. Amounts stay in provider-native currency.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};

// =============================================================================
// Dimensions
// =============================================================================

/// What a cost is grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DimensionKind {
    Service,
    Account,
    Region,
    /// Cost allocation tag with the given tag key.
    Tag(String),
    Resource,
    UsageType,
    Total,
}

impl DimensionKind {
    /// Label used in `kind:value` strings. Tags carry their key separately.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Account => "account",
            Self::Region => "region",
            Self::Tag(_) => "tag",
            Self::Resource => "resource",
            Self::UsageType => "usage_type",
            Self::Total => "total",
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(key) => write!(f, "tag:{key}"),
            other => f.write_str(other.label()),
        }
    }
}

impl FromStr for DimensionKind {
    type Err = AutocostError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim();
        if let Some(key) = lower.strip_prefix("tag:") {
            if key.is_empty() {
                return Err(invalid_dimension(s, "tag dimension needs a tag key"));
            }
            return Ok(Self::Tag(key.to_string()));
        }
        match lower.to_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "account" | "linked_account" | "project" | "subscription" => Ok(Self::Account),
            "region" | "location" => Ok(Self::Region),
            "resource" => Ok(Self::Resource),
            "usage_type" | "usage-type" | "usagetype" => Ok(Self::UsageType),
            "total" => Ok(Self::Total),
            _ => Err(invalid_dimension(s, "unknown dimension kind")),
        }
    }
}

fn invalid_dimension(value: &str, message: &str) -> AutocostError {
    AutocostError::ConfigInvalid {
        key: "dimension".to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

/// A dimension kind plus value, e.g. `service:AmazonEC2` or `tag:Organization=acme`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DimensionKey {
    pub kind: DimensionKind,
    pub value: String,
}

impl DimensionKey {
    #[must_use]
    pub fn new(kind: DimensionKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn service(value: impl Into<String>) -> Self {
        Self::new(DimensionKind::Service, value)
    }

    #[must_use]
    pub fn total() -> Self {
        Self::new(DimensionKind::Total, "total")
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            DimensionKind::Tag(key) => write!(f, "tag:{key}={}", self.value),
            DimensionKind::Total => f.write_str("total"),
            other => write!(f, "{}:{}", other.label(), self.value),
        }
    }
}

impl FromStr for DimensionKey {
    type Err = AutocostError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("total") {
            return Ok(Self::total());
        }
        let (kind, value) = trimmed
            .split_once(':')
            .ok_or_else(|| invalid_dimension(s, "expected kind:value"))?;
        if kind.eq_ignore_ascii_case("tag") {
            let (tag_key, tag_value) = value
                .split_once('=')
                .ok_or_else(|| invalid_dimension(s, "expected tag:key=value"))?;
            return Ok(Self::new(DimensionKind::Tag(tag_key.to_string()), tag_value));
        }
        if value.is_empty() {
            return Err(invalid_dimension(s, "dimension value is empty"));
        }
        Ok(Self::new(kind.parse()?, value))
    }
}

impl Serialize for DimensionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DimensionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Cost Record
// =============================================================================

/// One cost observation for one dimension key over one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    provider: Provider,
    key: DimensionKey,
    amount: f64,
    currency: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
}

impl CostRecord {
    /// Create a record. Fails if the period is empty or reversed, or the amount is not finite.
    pub fn new(
        provider: Provider,
        key: DimensionKey,
        amount: f64,
        currency: impl Into<String>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Self> {
        if period_start >= period_end {
            return Err(AutocostError::InvalidRecords(format!(
                "period start {period_start} is not before end {period_end} for {key}"
            )));
        }
        if !amount.is_finite() {
            return Err(AutocostError::InvalidRecords(format!(
                "amount for {key} is not a finite number"
            )));
        }
        Ok(Self {
            provider,
            key,
            amount,
            currency: currency.into(),
            period_start,
            period_end,
        })
    }

    /// Record covering one UTC calendar day.
    pub fn daily(
        provider: Provider,
        key: DimensionKey,
        day: NaiveDate,
        amount: f64,
        currency: impl Into<String>,
    ) -> Result<Self> {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        Self::new(provider, key, amount, currency, start, start + Duration::days(1))
    }

    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    #[must_use]
    pub const fn key(&self) -> &DimensionKey {
        &self.key
    }

    #[must_use]
    pub const fn amount(&self) -> f64 {
        self.amount
    }

    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    #[must_use]
    pub const fn period_start(&self) -> DateTime<Utc> {
        self.period_start
    }

    #[must_use]
    pub const fn period_end(&self) -> DateTime<Utc> {
        self.period_end
    }

    /// UTC calendar day the record is attributed to.
    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.period_start.date_naive()
    }
}

// =============================================================================
// Cost Query
// =============================================================================

/// Default dataset name for billing exports.
pub const DEFAULT_DATASET: &str = "costs";

/// Request for cost records over a day range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostQuery {
    /// First day included.
    pub start: NaiveDate,
    /// First day excluded.
    pub end: NaiveDate,
    pub group_by: DimensionKind,
    pub dataset: String,
}

impl CostQuery {
    /// Query covering the `days` full days before `today`.
    #[must_use]
    pub fn last_days(days: u32, group_by: DimensionKind, today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(i64::from(days)),
            end: today,
            group_by,
            dataset: DEFAULT_DATASET.to_string(),
        }
    }

    /// Query covering the `days` days up to and including `today`.
    #[must_use]
    pub fn through(days: u32, group_by: DimensionKind, today: NaiveDate) -> Self {
        let end = today + Duration::days(1);
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
            group_by,
            dataset: DEFAULT_DATASET.to_string(),
        }
    }

    #[must_use]
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    /// Whether `day` falls inside the query range.
    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn dimension_key_display_and_parse() {
        let key: DimensionKey = "tag:Organization=acme".parse().unwrap();
        assert_eq!(key.kind, DimensionKind::Tag("Organization".into()));
        assert_eq!(key.to_string(), "tag:Organization=acme");

        let svc: DimensionKey = "service:AmazonEC2".parse().unwrap();
        assert_eq!(svc, DimensionKey::service("AmazonEC2"));
        assert_eq!(svc.to_string(), "service:AmazonEC2");

        assert_eq!("total".parse::<DimensionKey>().unwrap(), DimensionKey::total());
        assert!("AmazonEC2".parse::<DimensionKey>().is_err());
        assert!("tag:nokey".parse::<DimensionKey>().is_err());
    }

    #[test]
    fn dimension_key_serializes_as_string() {
        let json = serde_json::to_string(&DimensionKey::service("Compute Engine")).unwrap();
        assert_eq!(json, "\"service:Compute Engine\"");
        let back: DimensionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DimensionKey::service("Compute Engine"));
    }

    #[test]
    fn record_rejects_reversed_period() {
        let start = day("2026-03-02").and_time(chrono::NaiveTime::MIN).and_utc();
        let err = CostRecord::new(
            Provider::Aws,
            DimensionKey::total(),
            1.0,
            "USD",
            start,
            start,
        )
        .unwrap_err();
        assert!(matches!(err, AutocostError::InvalidRecords(_)));
    }

    #[test]
    fn record_rejects_nan_amount() {
        assert!(
            CostRecord::daily(Provider::Aws, DimensionKey::total(), day("2026-03-02"), f64::NAN, "USD")
                .is_err()
        );
    }

    #[test]
    fn daily_record_spans_one_day() {
        let record =
            CostRecord::daily(Provider::Gcp, DimensionKey::total(), day("2026-03-02"), 4.5, "EUR")
                .unwrap();
        assert_eq!(record.day(), day("2026-03-02"));
        assert_eq!(record.period_end() - record.period_start(), Duration::days(1));
        assert_eq!(record.currency(), "EUR");
    }

    #[test]
    fn query_ranges() {
        let q = CostQuery::last_days(7, DimensionKind::Service, day("2026-03-08"));
        assert_eq!(q.start, day("2026-03-01"));
        assert!(q.contains(day("2026-03-07")));
        assert!(!q.contains(day("2026-03-08")));

        let q = CostQuery::through(7, DimensionKind::Total, day("2026-03-08"));
        assert!(q.contains(day("2026-03-08")));
        assert!(!q.contains(day("2026-03-01")));
    }
}
