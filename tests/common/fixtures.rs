//! Test fixtures for integration tests.
//!
//! A [`Workspace`] is an isolated home directory with optional AWS shared
//! credentials and billing exports, plus the environment that points
//! autocost at it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::fixtures::*;
//!
//! let ws = Workspace::new().with_aws_profiles();
//! ws.write_export("aws", &[export_row("service:AmazonEC2", day(0), 10.0)]);
//! let env = ws.env();
//! ```
#![allow(dead_code)]

use std::path::PathBuf;

use chrono::NaiveDate;

pub use autocost::test_utils::{TestDir, base_day, day, make_daily_record, make_daily_series};
use autocost::util::EnvSnapshot;

/// Shared credentials file with a usable `default` and `dev` profile and an
/// unusable `broken` one.
pub const AWS_CREDENTIALS: &str = "\
[default]
aws_access_key_id = AKIADEFAULT
aws_secret_access_key = default-secret

[dev]
aws_access_key_id = AKIADEV
aws_secret_access_key = dev-secret

[broken]
region = eu-west-1
";

/// One JSON-lines export row.
#[must_use]
pub fn export_row(key: &str, date: NaiveDate, amount: f64) -> String {
    format!(r#"{{"key": "{key}", "date": "{date}", "amount": {amount}, "currency": "USD"}}"#)
}

/// Rows for consecutive days starting at `day(0)`.
#[must_use]
pub fn export_series(key: &str, amounts: &[f64]) -> Vec<String> {
    amounts
        .iter()
        .zip(0u32..)
        .map(|(amount, n)| export_row(key, day(n), *amount))
        .collect()
}

/// Isolated home, session and export directories.
pub struct Workspace {
    pub dir: TestDir,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TestDir::new(),
        }
    }

    #[must_use]
    pub fn with_aws_profiles(self) -> Self {
        self.dir.write(".aws/credentials", AWS_CREDENTIALS);
        self
    }

    pub fn write_export(&self, provider: &str, rows: &[String]) -> PathBuf {
        self.dir
            .write(&format!("exports/{provider}/costs.jsonl"), &rows.join("\n"))
    }

    #[must_use]
    pub fn home(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    #[must_use]
    pub fn sessions_dir(&self) -> PathBuf {
        self.dir.path().join("sessions")
    }

    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.dir.path().join("exports")
    }

    /// Environment variables for a process running against this workspace.
    #[must_use]
    pub fn vars(&self) -> Vec<(String, String)> {
        let home = self.home();
        vec![
            ("HOME".into(), home.display().to_string()),
            (
                "XDG_CONFIG_HOME".into(),
                home.join(".config").display().to_string(),
            ),
            (
                "XDG_DATA_HOME".into(),
                home.join(".local/share").display().to_string(),
            ),
            ("AUTOCOST_PROVIDERS".into(), "aws".into()),
            (
                "AUTOCOST_SESSION_DIR".into(),
                self.sessions_dir().display().to_string(),
            ),
            (
                "AUTOCOST_EXPORT_DIR".into(),
                self.exports_dir().display().to_string(),
            ),
            ("NO_COLOR".into(), "1".into()),
        ]
    }

    #[must_use]
    pub fn env(&self) -> EnvSnapshot {
        EnvSnapshot::from_pairs(self.vars())
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}
