//! Spillover attribution.
//!
//! Splits the deviation of a dependent cost series across trigger series in
//! proportion to each trigger's absolute deviation from its own baseline.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::series::{common_currency, median, series_by_key, DailySeries};
use crate::core::models::{CostRecord, DimensionKey};
use crate::error::{AutocostError, Result};

/// Parameters for [`attribute_spillover`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpilloverParams {
    /// Deviation relative to `|baseline|` below which a trigger did not move.
    pub rel_tolerance: f64,
    /// Absolute deviation below which a trigger did not move.
    pub min_abs: f64,
}

impl Default for SpilloverParams {
    fn default() -> Self {
        Self {
            rel_tolerance: 0.05,
            min_abs: 0.0,
        }
    }
}

impl SpilloverParams {
    pub(crate) fn validate(&self) -> Result<()> {
        for (key, value) in [("rel_tolerance", self.rel_tolerance), ("min_abs", self.min_abs)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AutocostError::ConfigInvalid {
                    key: key.to_string(),
                    value: value.to_string(),
                    message: format!("{key} must be a non-negative number"),
                });
            }
        }
        Ok(())
    }

    fn threshold(&self, baseline: f64) -> f64 {
        self.min_abs.max(self.rel_tolerance * baseline.abs())
    }
}

/// One trigger's share of a period's dependent delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerShare {
    pub key: DimensionKey,
    pub value: f64,
    pub deviation: f64,
    pub measurable: bool,
    pub attributed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpilloverPeriod {
    pub day: NaiveDate,
    pub dependent_value: f64,
    pub dependent_delta: f64,
    /// One entry per trigger key, ordered by key.
    pub shares: Vec<TriggerShare>,
}

impl SpilloverPeriod {
    #[must_use]
    pub fn attributed_total(&self) -> f64 {
        self.shares.iter().map(|s| s.attributed).sum()
    }

    /// Whether any trigger moved beyond tolerance.
    #[must_use]
    pub fn any_measurable(&self) -> bool {
        self.shares.iter().any(|s| s.measurable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpilloverResult {
    pub dependent_baseline: f64,
    /// Baseline per trigger key.
    pub trigger_baselines: BTreeMap<DimensionKey, f64>,
    pub periods: Vec<SpilloverPeriod>,
    /// Sum of attributions per trigger across all periods.
    pub totals: BTreeMap<DimensionKey, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Attribute the dependent series' deviations to the triggers.
///
/// # Errors
/// [`AutocostError::InsufficientData`] for an empty dependent series;
/// [`AutocostError::InvalidRecords`] when triggers and dependent mix
/// currencies; [`AutocostError::ConfigInvalid`] for negative tolerances.
pub fn attribute_spillover(
    triggers: &[CostRecord],
    dependent: &[CostRecord],
    params: &SpilloverParams,
) -> Result<SpilloverResult> {
    params.validate()?;
    let currency = common_currency(triggers.iter().chain(dependent))?;
    let dependent = DailySeries::from_records(dependent)?;
    if dependent.is_empty() {
        return Err(AutocostError::InsufficientData {
            analysis: "spillover".to_string(),
            required: 1,
            found: 0,
        });
    }
    let triggers = series_by_key(triggers)?;
    let days: Vec<NaiveDate> = dependent.days().collect();

    let dependent_baseline = median(&dependent.values()).unwrap_or(0.0);
    let trigger_baselines: BTreeMap<DimensionKey, f64> = triggers
        .iter()
        .map(|(key, series)| {
            let values: Vec<f64> = days.iter().map(|d| series.value_or_zero(*d)).collect();
            (key.clone(), median(&values).unwrap_or(0.0))
        })
        .collect();

    let periods: Vec<SpilloverPeriod> = days
        .iter()
        .map(|day| {
            let dependent_value = dependent.value_or_zero(*day);
            let dependent_delta = dependent_value - dependent_baseline;
            split_period(*day, dependent_value, dependent_delta, &triggers, &trigger_baselines, params)
        })
        .collect();

    let mut totals: BTreeMap<DimensionKey, f64> =
        triggers.keys().map(|k| (k.clone(), 0.0)).collect();
    for share in periods.iter().flat_map(|p| &p.shares) {
        if let Some(total) = totals.get_mut(&share.key) {
            *total += share.attributed;
        }
    }

    tracing::debug!(
        periods = periods.len(),
        triggers = trigger_baselines.len(),
        dependent_baseline,
        "Spillover attributed"
    );

    Ok(SpilloverResult {
        dependent_baseline,
        trigger_baselines,
        periods,
        totals,
        currency,
    })
}

fn split_period(
    day: NaiveDate,
    dependent_value: f64,
    dependent_delta: f64,
    triggers: &BTreeMap<DimensionKey, DailySeries>,
    baselines: &BTreeMap<DimensionKey, f64>,
    params: &SpilloverParams,
) -> SpilloverPeriod {
    let mut shares: Vec<TriggerShare> = triggers
        .iter()
        .map(|(key, series)| {
            let baseline = baselines.get(key).copied().unwrap_or(0.0);
            let value = series.value_or_zero(day);
            let deviation = value - baseline;
            TriggerShare {
                key: key.clone(),
                value,
                deviation,
                measurable: deviation.abs() > params.threshold(baseline),
                attributed: 0.0,
            }
        })
        .collect();

    let weight: f64 = shares
        .iter()
        .filter(|s| s.measurable)
        .map(|s| s.deviation.abs())
        .sum();
    if weight > 0.0 {
        for share in shares.iter_mut().filter(|s| s.measurable) {
            share.attributed = dependent_delta * share.deviation.abs() / weight;
        }
    }

    SpilloverPeriod {
        day,
        dependent_value,
        dependent_delta,
        shares,
    }
}
