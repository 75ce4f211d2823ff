//! Daily cost series.
//!
//! Records are aggregated by the UTC calendar day of `period_start`. Missing
//! days are absent from the series, never zero-filled; algorithms that need
//! zeros for missing days ask for them explicitly via [`DailySeries::value_or_zero`].

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::core::models::{CostRecord, DimensionKey};
use crate::error::{AutocostError, Result};

/// Sum of amounts per day, in one currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    currency: Option<String>,
    points: BTreeMap<NaiveDate, f64>,
}

impl DailySeries {
    /// Aggregate records into one series.
    ///
    /// # Errors
    /// [`AutocostError::InvalidRecords`] when records mix currencies.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CostRecord>) -> Result<Self> {
        let mut series = Self::default();
        for record in records {
            series.add(record)?;
        }
        Ok(series)
    }

    fn add(&mut self, record: &CostRecord) -> Result<()> {
        match &self.currency {
            Some(currency) if currency != record.currency() => {
                return Err(AutocostError::InvalidRecords(format!(
                    "mixed currencies {currency} and {} for {}",
                    record.currency(),
                    record.key()
                )));
            }
            Some(_) => {}
            None => self.currency = Some(record.currency().to_string()),
        }
        *self.points.entry(record.day()).or_insert(0.0) += record.amount();
        Ok(())
    }

    #[must_use]
    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    /// Number of observed days.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observed days in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    /// Observed `(day, amount)` pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    /// Amounts in day order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    #[must_use]
    pub fn get(&self, day: NaiveDate) -> Option<f64> {
        self.points.get(&day).copied()
    }

    /// Amount on `day`, counting an unobserved day as zero.
    #[must_use]
    pub fn value_or_zero(&self, day: NaiveDate) -> f64 {
        self.get(day).unwrap_or(0.0)
    }

    #[must_use]
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.points.keys().next().copied()
    }

    #[must_use]
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.points.keys().next_back().copied()
    }

    /// Observed amounts with `start <= day < end`.
    #[must_use]
    pub fn observed_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<f64> {
        if start >= end {
            return Vec::new();
        }
        self.points.range(start..end).map(|(_, v)| *v).collect()
    }
}

/// Partition records by dimension key, one series per key, ordered by key.
pub fn series_by_key(records: &[CostRecord]) -> Result<BTreeMap<DimensionKey, DailySeries>> {
    let mut out: BTreeMap<DimensionKey, DailySeries> = BTreeMap::new();
    for record in records {
        out.entry(record.key().clone()).or_default().add(record)?;
    }
    Ok(out)
}

/// Ensure every record shares one currency; returns it.
pub fn common_currency<'a>(
    records: impl IntoIterator<Item = &'a CostRecord>,
) -> Result<Option<String>> {
    let mut currency: Option<&str> = None;
    for record in records {
        match currency {
            Some(c) if c != record.currency() => {
                return Err(AutocostError::InvalidRecords(format!(
                    "mixed currencies {c} and {}",
                    record.currency()
                )));
            }
            Some(_) => {}
            None => currency = Some(record.currency()),
        }
    }
    Ok(currency.map(ToString::to_string))
}

/// Arithmetic mean; `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)] // day counts are far below f64 precision
    let n = values.len() as f64;
    Some(values.iter().sum::<f64>() / n)
}

/// Median; `None` for an empty slice. Even counts average the middle pair.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(f64::midpoint(sorted[mid - 1], sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_float_eq;
    use crate::core::provider::Provider;
    use crate::test_utils::{day, make_daily_record};

    #[test]
    fn sums_records_on_same_day() {
        let records = vec![
            make_daily_record("service:A", day(1), 2.0),
            make_daily_record("service:B", day(1), 3.0),
            make_daily_record("service:A", day(3), 1.5),
        ];
        let series = DailySeries::from_records(&records).unwrap();
        assert_eq!(series.len(), 2);
        assert_float_eq!(series.get(day(1)).unwrap(), 5.0);
        assert_eq!(series.get(day(2)), None);
        assert_float_eq!(series.value_or_zero(day(2)), 0.0);
        assert_eq!(series.currency(), Some("USD"));
    }

    #[test]
    fn mixed_currency_is_rejected() {
        let records = vec![
            make_daily_record("service:A", day(1), 2.0),
            CostRecord::daily(Provider::Aws, "service:A".parse().unwrap(), day(2), 1.0, "EUR")
                .unwrap(),
        ];
        assert!(matches!(
            DailySeries::from_records(&records),
            Err(AutocostError::InvalidRecords(_))
        ));
        assert!(common_currency(&records).is_err());
    }

    #[test]
    fn partition_orders_by_key() {
        let records = vec![
            make_daily_record("service:Zeta", day(1), 1.0),
            make_daily_record("service:Alpha", day(1), 1.0),
        ];
        let keys: Vec<String> = series_by_key(&records)
            .unwrap()
            .keys()
            .map(ToString::to_string)
            .collect();
        assert_eq!(keys, vec!["service:Alpha", "service:Zeta"]);
    }

    #[test]
    fn median_and_mean() {
        assert_eq!(median(&[]), None);
        assert_float_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_float_eq!(median(&[4.0, 1.0, 2.0, 3.0]).unwrap(), 2.5);
        assert_float_eq!(mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn observed_between_is_half_open() {
        let records: Vec<_> = (1..=5)
            .map(|d| make_daily_record("total", day(d), f64::from(d)))
            .collect();
        let series = DailySeries::from_records(&records).unwrap();
        assert_eq!(series.observed_between(day(2), day(4)), vec![2.0, 3.0]);
        assert!(series.observed_between(day(4), day(2)).is_empty());
    }
}
