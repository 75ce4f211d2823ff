//! Utility functions.

pub mod env;
pub mod format;
pub mod time;

pub use env::EnvSnapshot;
pub use format::{format_amount, format_change, format_ratio};
pub use time::{format_countdown, format_expiry, format_relative_time, utc_today};
