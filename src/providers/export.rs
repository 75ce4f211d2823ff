//! File-based client over billing exports.
//!
//! Reads JSON-lines exports laid out as:
//!
//! ```text
//! <export dir>/<provider>/<dataset>.jsonl
//! <export dir>/<provider>/<account>/<dataset>.jsonl   (preferred when present)
//! ```
//!
//! Each line is one cost row:
//!
//! ```json
//! {"key": "service:AmazonEC2", "date": "2026-01-05", "amount": 12.5, "currency": "USD"}
//! ```
//!
//! `start`/`end` RFC 3339 timestamps may replace `date`. Capability checks
//! map to datasets: a readable dataset is allowed, a permission error is
//! denied, a missing dataset says nothing about permissions.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::core::client::{CapabilityCheck, ClientFactory, ProviderClient};
use crate::core::context::{AuthenticationContext, CredentialMaterial};
use crate::core::models::{CostQuery, CostRecord, DimensionKey, DimensionKind};
use crate::core::operations::validate_dataset;
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::storage::paths::is_plain_file_name;

/// Error code for a dataset that does not exist.
pub const CODE_NOT_FOUND: &str = "NotFound";

const DEFAULT_CURRENCY: &str = "USD";

// =============================================================================
// Export Rows
// =============================================================================

#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(alias = "dimension")]
    key: String,
    amount: f64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

impl ExportRow {
    fn into_record(self, provider: Provider) -> Result<CostRecord> {
        let key: DimensionKey = self.key.parse()?;
        let currency = self.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        match (self.date, self.start, self.end) {
            (Some(day), _, _) => CostRecord::daily(provider, key, day, self.amount, currency),
            (None, Some(start), Some(end)) => {
                CostRecord::new(provider, key, self.amount, currency, start, end)
            }
            _ => Err(AutocostError::InvalidRecords(
                "row needs either date or start and end".to_string(),
            )),
        }
    }
}

/// Parse JSON-lines export content. Blank lines and `#` comments are skipped.
///
/// # Errors
/// [`AutocostError::InvalidRecords`] naming the first bad line.
pub fn parse_export(provider: Provider, content: &str) -> Result<Vec<CostRecord>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            let line_no = index + 1;
            let row: ExportRow = serde_json::from_str(line).map_err(|e| {
                AutocostError::InvalidRecords(format!("line {line_no}: {e}"))
            })?;
            row.into_record(provider).map_err(|e| match e {
                AutocostError::InvalidRecords(msg) => {
                    AutocostError::InvalidRecords(format!("line {line_no}: {msg}"))
                }
                other => AutocostError::InvalidRecords(format!("line {line_no}: {other}")),
            })
        })
        .collect()
}

// =============================================================================
// Client
// =============================================================================

/// Client reading one provider's export directory.
#[derive(Debug, Clone)]
pub struct ExportClient {
    provider: Provider,
    dir: PathBuf,
}

impl ExportClient {
    #[must_use]
    pub const fn new(provider: Provider, dir: PathBuf) -> Self {
        Self { provider, dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dataset_path(&self, dataset: &str) -> Result<PathBuf> {
        let dataset = validate_dataset(dataset)?;
        Ok(self.dir.join(format!("{dataset}.jsonl")))
    }

    async fn read_dataset(&self, dataset: &str, operation: &str) -> Result<String> {
        let path = self.dataset_path(dataset)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| self.map_io_error(&path, operation, &e))
    }

    fn map_io_error(&self, path: &Path, operation: &str, error: &std::io::Error) -> AutocostError {
        match error.kind() {
            ErrorKind::NotFound => AutocostError::ProviderApiError {
                provider: self.provider.to_string(),
                code: Some(CODE_NOT_FOUND.to_string()),
                message: format!("no export at {}", path.display()),
            },
            ErrorKind::PermissionDenied => AutocostError::InsufficientPermission {
                provider: self.provider.to_string(),
                operation: operation.to_string(),
                message: format!("cannot read {}", path.display()),
            },
            _ => AutocostError::ProviderUnavailable {
                provider: self.provider.to_string(),
                message: format!("{}: {error}", path.display()),
            },
        }
    }
}

#[async_trait]
impl ProviderClient for ExportClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_costs(&self, query: &CostQuery) -> Result<Vec<CostRecord>> {
        let content = self.read_dataset(&query.dataset, "read cost export").await?;
        let records = parse_export(self.provider, &content)?;
        let in_range: Vec<CostRecord> = records
            .into_iter()
            .filter(|r| query.contains(r.day()))
            .collect();

        let mut selected: Vec<CostRecord> = in_range
            .iter()
            .filter(|r| r.key().kind == query.group_by)
            .cloned()
            .collect();
        if selected.is_empty() && query.group_by == DimensionKind::Total {
            selected = daily_totals(self.provider, &in_range)?;
        }

        tracing::debug!(
            provider = %self.provider,
            dataset = %query.dataset,
            group_by = %query.group_by,
            records = selected.len(),
            "Read cost export"
        );
        Ok(selected)
    }

    async fn run_check(&self, check: &CapabilityCheck) -> Result<()> {
        self.read_dataset(&check.dataset, &check.operation)
            .await
            .map(|_| ())
    }
}

/// Per-day totals summed from service rows.
fn daily_totals(provider: Provider, records: &[CostRecord]) -> Result<Vec<CostRecord>> {
    let mut totals: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();
    for record in records.iter().filter(|r| r.key().kind == DimensionKind::Service) {
        *totals
            .entry((record.day(), record.currency().to_string()))
            .or_insert(0.0) += record.amount();
    }
    totals
        .into_iter()
        .map(|((day, currency), amount)| {
            CostRecord::daily(provider, DimensionKey::total(), day, amount, currency)
        })
        .collect()
}

// =============================================================================
// Factory
// =============================================================================

/// Builds [`ExportClient`]s rooted at an export directory.
#[derive(Debug, Clone)]
pub struct ExportClientFactory {
    provider: Provider,
    root: PathBuf,
}

impl ExportClientFactory {
    #[must_use]
    pub const fn new(provider: Provider, root: PathBuf) -> Self {
        Self { provider, root }
    }

    /// Directory the client for `context` reads from.
    #[must_use]
    pub fn dir_for(&self, context: &AuthenticationContext) -> PathBuf {
        let provider_dir = self.root.join(self.provider.cli_name());
        context
            .account()
            .filter(|account| is_plain_file_name(account))
            .map(|account| provider_dir.join(account))
            .filter(|dir| dir.is_dir())
            .unwrap_or(provider_dir)
    }
}

#[async_trait]
impl ClientFactory for ExportClientFactory {
    async fn authenticate(&self, context: &AuthenticationContext) -> Result<()> {
        if context.provider() != self.provider {
            return Err(AutocostError::InvalidCredentials {
                provider: self.provider.to_string(),
                profile: context.profile().map(ToString::to_string),
                reason: format!("context belongs to {}", context.provider()),
            });
        }
        if context.is_expired() {
            return Err(AutocostError::AuthExpired {
                provider: self.provider.to_string(),
            });
        }
        if let CredentialMaterial::ServiceAccount { key_file } = context.material() {
            if !tokio::fs::try_exists(key_file).await.unwrap_or(false) {
                return Err(AutocostError::InvalidCredentials {
                    provider: self.provider.to_string(),
                    profile: context.profile().map(ToString::to_string),
                    reason: format!("key file {} does not exist", key_file.display()),
                });
            }
        }
        Ok(())
    }

    async fn connect(&self, context: &AuthenticationContext) -> Result<Arc<dyn ProviderClient>> {
        let dir = self.dir_for(context);
        tracing::debug!(
            provider = %self.provider,
            dir = %dir.display(),
            fingerprint = %context.fingerprint().short(),
            "Connected export client"
        );
        Ok(Arc::new(ExportClient::new(self.provider, dir)))
    }
}
