//! autocost - cloud cost analysis with provider credential management
//!
//! Manages per-provider authentication contexts (named profiles, environment
//! credentials, captured sessions, cross-account roles), probes read-only
//! permissions, and runs trend, anomaly and spillover analysis over daily
//! cost records.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod providers;
pub mod render;
pub mod storage;
pub mod util;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{AutocostError, ExitCode, Result};

// Re-export test utilities for external test crates
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
