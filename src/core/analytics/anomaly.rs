//! Anomaly detection against a median baseline.
//!
//! Each dimension key is judged independently: the mean daily cost over the
//! current period (missing days count as zero) is compared with the median of
//! the observed days in the reference window immediately before it.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::series::{common_currency, median, series_by_key, DailySeries};
use crate::core::models::{CostRecord, DimensionKey};
use crate::error::{AutocostError, Result};

/// Parameters for [`detect_anomalies`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyParams {
    /// Days in the reference window before the current period.
    pub reference_days: u32,
    /// Days in the current period, ending at `as_of`.
    pub current_days: u32,
    /// Relative deviation from the baseline that counts as anomalous.
    pub threshold: f64,
    /// Observed reference days required for a verdict.
    pub min_observations: usize,
    /// Last day of the current period; defaults to the latest record day.
    pub as_of: Option<NaiveDate>,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            reference_days: 14,
            current_days: 1,
            threshold: 0.5,
            min_observations: 5,
            as_of: None,
        }
    }
}

impl AnomalyParams {
    #[must_use]
    pub const fn as_of(mut self, day: NaiveDate) -> Self {
        self.as_of = Some(day);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let invalid = |key: &str, value: String, message: &str| AutocostError::ConfigInvalid {
            key: key.to_string(),
            value,
            message: message.to_string(),
        };
        if self.reference_days == 0 {
            return Err(invalid(
                "reference_days",
                "0".to_string(),
                "reference window must be at least 1 day",
            ));
        }
        if self.current_days == 0 {
            return Err(invalid(
                "current_days",
                "0".to_string(),
                "current period must be at least 1 day",
            ));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(invalid(
                "threshold",
                self.threshold.to_string(),
                "threshold must be a non-negative number",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyStatus {
    Normal,
    AnomalousHigh,
    AnomalousLow,
    /// Too few reference observations for a verdict.
    Indeterminate,
}

impl AnomalyStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::AnomalousHigh => "anomalous-high",
            Self::AnomalousLow => "anomalous-low",
            Self::Indeterminate => "indeterminate",
        }
    }

    #[must_use]
    pub const fn is_anomalous(self) -> bool {
        matches!(self, Self::AnomalousHigh | Self::AnomalousLow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyFinding {
    pub key: DimensionKey,
    pub status: AnomalyStatus,
    pub current: f64,
    /// Median of the observed reference days; absent with no observations.
    pub baseline: Option<f64>,
    /// `(current - baseline) / |baseline|` when the baseline is non-zero.
    pub deviation: Option<f64>,
    pub reference_observations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyResult {
    pub as_of: NaiveDate,
    pub current_start: NaiveDate,
    pub reference_start: NaiveDate,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// One finding per dimension key, ordered by key.
    pub findings: Vec<AnomalyFinding>,
}

impl AnomalyResult {
    /// Findings flagged high or low.
    pub fn anomalies(&self) -> impl Iterator<Item = &AnomalyFinding> {
        self.findings.iter().filter(|f| f.status.is_anomalous())
    }
}

/// Judge every dimension key in `records`.
///
/// # Errors
/// [`AutocostError::InsufficientData`] when there are no records and no
/// explicit `as_of`; [`AutocostError::InvalidRecords`] for mixed currencies.
pub fn detect_anomalies(records: &[CostRecord], params: &AnomalyParams) -> Result<AnomalyResult> {
    params.validate()?;
    let currency = common_currency(records)?;

    let as_of = match params.as_of.or_else(|| records.iter().map(CostRecord::day).max()) {
        Some(day) => day,
        None => {
            return Err(AutocostError::InsufficientData {
                analysis: "anomalies".to_string(),
                required: 1,
                found: 0,
            });
        }
    };
    let current_start = as_of - Duration::days(i64::from(params.current_days) - 1);
    let reference_start = current_start - Duration::days(i64::from(params.reference_days));
    let current_end = as_of + Duration::days(1);

    let findings = series_by_key(records)?
        .into_iter()
        .map(|(key, series)| {
            judge(
                key,
                &series,
                params,
                (reference_start, current_start, current_end),
            )
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        %as_of,
        keys = findings.len(),
        anomalous = findings.iter().filter(|f| f.status.is_anomalous()).count(),
        "Anomaly detection finished"
    );

    Ok(AnomalyResult {
        as_of,
        current_start,
        reference_start,
        threshold: params.threshold,
        currency,
        findings,
    })
}

fn judge(
    key: DimensionKey,
    series: &DailySeries,
    params: &AnomalyParams,
    (reference_start, current_start, current_end): (NaiveDate, NaiveDate, NaiveDate),
) -> AnomalyFinding {
    let current_total: f64 = current_start
        .iter_days()
        .take_while(|d| *d < current_end)
        .map(|d| series.value_or_zero(d))
        .sum();
    let current = current_total / f64::from(params.current_days);

    let reference = series.observed_between(reference_start, current_start);
    let baseline = median(&reference);
    let deviation = baseline
        .filter(|b| *b != 0.0)
        .map(|b| (current - b) / b.abs());

    let status = match baseline {
        Some(b) if reference.len() >= params.min_observations => {
            let margin = params.threshold * b.abs();
            if current > b + margin {
                AnomalyStatus::AnomalousHigh
            } else if current < b - margin {
                AnomalyStatus::AnomalousLow
            } else {
                AnomalyStatus::Normal
            }
        }
        _ => AnomalyStatus::Indeterminate,
    };

    AnomalyFinding {
        key,
        status,
        current,
        baseline,
        deviation,
        reference_observations: reference.len(),
    }
}
