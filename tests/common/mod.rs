//! Common test utilities and fixtures for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: credential files, billing exports and isolated environments
//! - `logger`: phase-tagged test output

pub mod fixtures;
pub mod logger;
