//! Rolling-average trend detection.
//!
//! For a daily series of `n` periods and window `w`, the rolling point at
//! index `d` (for `d` in `w..n`) is the mean over `[d - w, d)`.
//!
//! With at least `2w + 1` periods the direction compares the last rolling
//! point with the one `w` periods earlier. Shorter series compare the latest
//! period with the last rolling point instead.

use chrono::NaiveDate;
use serde::Serialize;

use super::series::{DailySeries, mean};
use crate::core::models::CostRecord;
use crate::error::{AutocostError, Result};

/// Parameters for [`rolling_trend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendParams {
    /// Rolling window in periods.
    pub window: usize,
    /// Relative change beyond which the trend is rising or falling.
    pub threshold: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            window: 28,
            threshold: 0.10,
        }
    }
}

impl TrendParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(AutocostError::ConfigInvalid {
                key: "window".to_string(),
                value: "0".to_string(),
                message: "window must be at least 1".to_string(),
            });
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(AutocostError::ConfigInvalid {
                key: "threshold".to_string(),
                value: self.threshold.to_string(),
                message: "threshold must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

/// Direction of the latest period relative to the rolling baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }
}

/// Which comparison produced the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBasis {
    /// Last rolling point against the one `window` periods earlier.
    WindowOverWindow,
    /// Latest period against the last rolling point.
    LatestPeriod,
}

/// One point of the rolling series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingPoint {
    /// Period the average precedes.
    pub day: NaiveDate,
    /// Mean of the `window` periods before `day`.
    pub average: f64,
}

/// Trend classification and the rolling series behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub basis: TrendBasis,
    pub latest_day: NaiveDate,
    pub latest_value: f64,
    /// Average of the `window` periods before the latest one.
    pub baseline: f64,
    /// `(latest - baseline) / |baseline|`; absent for a zero baseline.
    pub relative_change: Option<f64>,
    /// Change between the last rolling point and the one `window` periods
    /// earlier, when enough periods exist.
    pub window_over_window: Option<f64>,
    pub window: usize,
    pub threshold: f64,
    pub periods: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub rolling: Vec<RollingPoint>,
}

/// Classify the trend of a record series.
///
/// # Errors
/// [`AutocostError::InsufficientData`] with fewer than `window + 1` daily
/// periods; [`AutocostError::InvalidRecords`] for mixed currencies.
pub fn rolling_trend(records: &[CostRecord], params: &TrendParams) -> Result<TrendResult> {
    params.validate()?;
    let series = DailySeries::from_records(records)?;
    let w = params.window;
    let n = series.len();
    if n < w + 1 {
        return Err(AutocostError::InsufficientData {
            analysis: "trend".to_string(),
            required: w + 1,
            found: n,
        });
    }

    let days: Vec<NaiveDate> = series.days().collect();
    let values = series.values();

    let rolling: Vec<RollingPoint> = (w..n)
        .filter_map(|d| {
            mean(&values[d - w..d]).map(|average| RollingPoint {
                day: days[d],
                average,
            })
        })
        .collect();

    let latest_value = values[n - 1];
    let baseline = rolling.last().map_or(0.0, |p| p.average);
    let relative_change = relative(latest_value, baseline);

    let window_pair = (rolling.len() > w).then(|| {
        (
            rolling[rolling.len() - 1].average,
            rolling[rolling.len() - 1 - w].average,
        )
    });
    let window_over_window = window_pair.and_then(|(current, previous)| relative(current, previous));

    let (direction, basis) = match window_pair {
        Some((current, _)) => (
            direction_of(window_over_window, current, params.threshold),
            TrendBasis::WindowOverWindow,
        ),
        None => (
            direction_of(relative_change, latest_value, params.threshold),
            TrendBasis::LatestPeriod,
        ),
    };

    tracing::debug!(
        periods = n,
        window = w,
        baseline,
        latest_value,
        direction = direction.label(),
        basis = ?basis,
        "Trend classified"
    );

    Ok(TrendResult {
        direction,
        basis,
        latest_day: days[n - 1],
        latest_value,
        baseline,
        relative_change,
        window_over_window,
        window: w,
        threshold: params.threshold,
        periods: n,
        currency: series.currency().map(ToString::to_string),
        rolling,
    })
}

fn relative(value: f64, base: f64) -> Option<f64> {
    if base == 0.0 {
        None
    } else {
        Some((value - base) / base.abs())
    }
}

/// A zero base is rising when the compared value is positive.
fn direction_of(change: Option<f64>, value: f64, threshold: f64) -> TrendDirection {
    match change {
        Some(change) => classify(change, threshold),
        None if value > 0.0 => TrendDirection::Rising,
        None => TrendDirection::Stable,
    }
}

fn classify(change: f64, threshold: f64) -> TrendDirection {
    if change > threshold {
        TrendDirection::Rising
    } else if change < -threshold {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_float_eq;
    use crate::test_utils::{day, make_daily_series};

    #[test]
    fn step_up_after_flat_month_is_rising() {
        let mut amounts = vec![100.0; 28];
        amounts.push(200.0);
        let records = make_daily_series("total", &amounts);
        let result = rolling_trend(&records, &TrendParams::default()).unwrap();
        assert_eq!(result.direction, TrendDirection::Rising);
        assert_float_eq!(result.baseline, 100.0);
        assert_float_eq!(result.relative_change.unwrap(), 1.0);
        assert_eq!(result.rolling.len(), 1);
        assert_eq!(result.latest_day, day(28));
        assert!(result.window_over_window.is_none());
        assert_eq!(result.basis, TrendBasis::LatestPeriod);
    }

    #[test]
    fn doubled_level_stays_rising_after_window_catches_up() {
        let mut amounts = vec![100.0; 28];
        amounts.extend(vec![200.0; 29]);
        let records = make_daily_series("total", &amounts);
        let result = rolling_trend(&records, &TrendParams::default()).unwrap();

        assert_eq!(result.periods, 57);
        assert_eq!(result.basis, TrendBasis::WindowOverWindow);
        assert_float_eq!(result.baseline, 200.0);
        assert_float_eq!(result.relative_change.unwrap(), 0.0);
        assert_float_eq!(result.window_over_window.unwrap(), 1.0);
        assert_eq!(result.direction, TrendDirection::Rising);
    }

    #[test]
    fn long_flat_history_ignores_a_single_day_blip() {
        let mut amounts = vec![100.0; 56];
        amounts.push(150.0);
        let records = make_daily_series("total", &amounts);
        let result = rolling_trend(&records, &TrendParams::default()).unwrap();

        assert_eq!(result.basis, TrendBasis::WindowOverWindow);
        assert_eq!(result.direction, TrendDirection::Stable);
    }

    #[test]
    fn too_few_periods_is_insufficient() {
        let records = make_daily_series("total", &[1.0; 28]);
        let err = rolling_trend(&records, &TrendParams::default()).unwrap_err();
        assert!(matches!(
            err,
            AutocostError::InsufficientData {
                required: 29,
                found: 28,
                ..
            }
        ));
    }

    #[test]
    fn missing_days_are_not_padded() {
        // 5 observations spread over 9 calendar days
        let records: Vec<_> = [0u32, 2, 4, 6, 8]
            .iter()
            .map(|d| crate::test_utils::make_daily_record("total", day(*d), 10.0))
            .collect();
        let params = TrendParams {
            window: 4,
            threshold: 0.1,
        };
        let result = rolling_trend(&records, &params).unwrap();
        assert_eq!(result.periods, 5);
        assert_eq!(result.direction, TrendDirection::Stable);
    }

    #[test]
    fn falling_and_stable() {
        let params = TrendParams {
            window: 3,
            threshold: 0.1,
        };
        let falling = rolling_trend(&make_daily_series("total", &[10.0, 10.0, 10.0, 5.0]), &params)
            .unwrap();
        assert_eq!(falling.direction, TrendDirection::Falling);

        let stable = rolling_trend(&make_daily_series("total", &[10.0, 10.0, 10.0, 10.5]), &params)
            .unwrap();
        assert_eq!(stable.direction, TrendDirection::Stable);
    }

    #[test]
    fn zero_baseline() {
        let params = TrendParams {
            window: 2,
            threshold: 0.1,
        };
        let rising = rolling_trend(&make_daily_series("total", &[0.0, 0.0, 3.0]), &params).unwrap();
        assert_eq!(rising.direction, TrendDirection::Rising);
        assert!(rising.relative_change.is_none());

        let flat = rolling_trend(&make_daily_series("total", &[0.0, 0.0, 0.0]), &params).unwrap();
        assert_eq!(flat.direction, TrendDirection::Stable);
    }

    #[test]
    fn rolling_series_and_window_over_window() {
        let params = TrendParams {
            window: 2,
            threshold: 0.1,
        };
        let result =
            rolling_trend(&make_daily_series("total", &[1.0, 3.0, 5.0, 7.0, 9.0]), &params).unwrap();
        let averages: Vec<f64> = result.rolling.iter().map(|p| p.average).collect();
        assert_eq!(averages, vec![2.0, 4.0, 6.0]);
        assert_float_eq!(result.window_over_window.unwrap(), 2.0);
        assert_eq!(result.basis, TrendBasis::WindowOverWindow);
        assert_eq!(result.direction, TrendDirection::Rising);
    }

    #[test]
    fn raising_threshold_never_creates_a_trend() {
        let series = [
            vec![10.0, 10.0, 10.0, 11.0],
            vec![10.0, 10.0, 10.0, 14.0],
            vec![10.0, 10.0, 10.0, 6.0],
            vec![10.0, 12.0, 8.0, 10.2],
        ];
        let thresholds = [0.0, 0.05, 0.1, 0.2, 0.5, 1.0];
        for amounts in &series {
            let records = make_daily_series("total", amounts);
            let mut seen_stable = false;
            for threshold in thresholds {
                let result =
                    rolling_trend(&records, &TrendParams { window: 3, threshold }).unwrap();
                if seen_stable {
                    assert_eq!(result.direction, TrendDirection::Stable);
                }
                seen_stable |= result.direction == TrendDirection::Stable;
            }
        }
    }

    #[test]
    fn zero_window_is_rejected() {
        let records = make_daily_series("total", &[1.0, 2.0]);
        let params = TrendParams {
            window: 0,
            threshold: 0.1,
        };
        assert!(matches!(
            rolling_trend(&records, &params),
            Err(AutocostError::ConfigInvalid { .. })
        ));
    }
}
