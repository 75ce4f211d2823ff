//! Cost analytics.
//!
//! Pure, synchronous algorithms over [`CostRecord`](crate::core::models::CostRecord)
//! slices. Records are aggregated into daily series first; see [`series`].

pub mod anomaly;
pub mod series;
pub mod spillover;
pub mod trend;

pub use anomaly::{AnomalyFinding, AnomalyParams, AnomalyResult, AnomalyStatus, detect_anomalies};
pub use series::DailySeries;
pub use spillover::{
    SpilloverParams, SpilloverPeriod, SpilloverResult, TriggerShare, attribute_spillover,
};
pub use trend::{RollingPoint, TrendBasis, TrendDirection, TrendParams, TrendResult, rolling_trend};
