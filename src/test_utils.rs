//! Test utilities for autocost.
//!
//! Provides mock provider clients and factories, a static profile registry,
//! cost record factories, and assertion macros for use across all test
//! modules.
//!
//! # Usage
//!
//! ```rust,ignore
//! use autocost::test_utils::*;
//!
//! let records = make_daily_series("service:AmazonEC2", &[10.0, 12.0, 40.0]);
//! let factory = MockClientFactory::new(Provider::Aws).with_records(records);
//! let dir = TestDir::new();
//! dir.write("aws/costs.jsonl", "");
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as DayDelta, NaiveDate};

use crate::core::client::{CapabilityCheck, ClientFactory, ProviderClient};
use crate::core::context::{
    AuthenticationContext, ContextBuilder, CredentialMaterial, CredentialSource, Secret,
};
use crate::core::models::{CostQuery, CostRecord, DimensionKey};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::storage::profiles::{ProfileDescriptor, ProfileRegistry};

// =============================================================================
// Record Factories
// =============================================================================

/// First day used by the record factories.
#[must_use]
pub fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default()
}

/// `base_day() + n` days.
#[must_use]
pub fn day(n: u32) -> NaiveDate {
    base_day() + DayDelta::days(i64::from(n))
}

/// A one-day AWS record in USD.
///
/// # Panics
///
/// Panics if `key` is not a valid dimension key.
#[must_use]
pub fn make_daily_record(key: &str, day: NaiveDate, amount: f64) -> CostRecord {
    let key: DimensionKey = key.parse().expect("valid dimension key");
    CostRecord::daily(Provider::Aws, key, day, amount, "USD").expect("valid record")
}

/// Consecutive daily records starting at `day(0)`.
#[must_use]
pub fn make_daily_series(key: &str, amounts: &[f64]) -> Vec<CostRecord> {
    amounts
        .iter()
        .zip(0u32..)
        .map(|(amount, n)| make_daily_record(key, day(n), *amount))
        .collect()
}

/// AWS access-key context builder for a profile name.
#[must_use]
pub fn aws_profile_builder(name: &str) -> ContextBuilder {
    AuthenticationContext::builder(
        Provider::Aws,
        CredentialSource::Profile,
        CredentialMaterial::AccessKey {
            access_key_id: format!("AKIA{}", name.to_uppercase()),
            secret_access_key: Secret::new(format!("{name}-secret")),
            session_token: None,
        },
    )
    .profile(name)
}

// =============================================================================
// Mock Client
// =============================================================================

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable [`ProviderClient`].
///
/// Every capability check succeeds unless configured otherwise; cost fetches
/// return the configured records that fall inside the query range.
#[derive(Debug, Clone)]
pub struct MockClient {
    provider: Provider,
    denied: HashSet<String>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    records: Vec<CostRecord>,
    deny_fetch: bool,
    queries: Arc<Mutex<Vec<CostQuery>>>,
}

impl MockClient {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            denied: HashSet::new(),
            failures: HashMap::new(),
            delays: HashMap::new(),
            records: Vec::new(),
            deny_fetch: false,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the capability with a permission error.
    #[must_use]
    pub fn deny(mut self, capability: &str) -> Self {
        self.denied.insert(capability.to_string());
        self
    }

    /// Fail the capability with an availability error.
    #[must_use]
    pub fn fail(mut self, capability: &str, message: &str) -> Self {
        self.failures
            .insert(capability.to_string(), message.to_string());
        self
    }

    /// Delay the capability check.
    #[must_use]
    pub fn delay(mut self, capability: &str, delay: Duration) -> Self {
        self.delays.insert(capability.to_string(), delay);
        self
    }

    #[must_use]
    pub fn with_records(mut self, records: Vec<CostRecord>) -> Self {
        self.records = records;
        self
    }

    /// Fail cost fetches with a permission error.
    #[must_use]
    pub const fn deny_fetch(mut self) -> Self {
        self.deny_fetch = true;
        self
    }

    /// Queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<CostQuery> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_costs(&self, query: &CostQuery) -> Result<Vec<CostRecord>> {
        lock(&self.queries).push(query.clone());
        if self.deny_fetch {
            return Err(AutocostError::InsufficientPermission {
                provider: self.provider.to_string(),
                operation: "ce:GetCostAndUsage".to_string(),
                message: "access denied".to_string(),
            });
        }
        Ok(self
            .records
            .iter()
            .filter(|r| query.contains(r.day()))
            .cloned()
            .collect())
    }

    async fn run_check(&self, check: &CapabilityCheck) -> Result<()> {
        if let Some(delay) = self.delays.get(&check.capability) {
            tokio::time::sleep(*delay).await;
        }
        if self.denied.contains(&check.capability) {
            return Err(AutocostError::InsufficientPermission {
                provider: self.provider.to_string(),
                operation: check.operation.clone(),
                message: "access denied".to_string(),
            });
        }
        if let Some(message) = self.failures.get(&check.capability) {
            return Err(AutocostError::ProviderUnavailable {
                provider: self.provider.to_string(),
                message: message.clone(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Mock Factory
// =============================================================================

/// [`ClientFactory`] that hands out clones of a template [`MockClient`] and
/// counts calls.
#[derive(Debug)]
pub struct MockClientFactory {
    template: Mutex<MockClient>,
    connects: AtomicUsize,
    authentications: AtomicUsize,
    rejection: Mutex<Option<String>>,
    connect_delay: Mutex<Duration>,
}

impl MockClientFactory {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self::with_client(MockClient::new(provider))
    }

    #[must_use]
    pub fn with_client(client: MockClient) -> Self {
        Self {
            template: Mutex::new(client),
            connects: AtomicUsize::new(0),
            authentications: AtomicUsize::new(0),
            rejection: Mutex::new(None),
            connect_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Serve `records` from every client built from now on.
    #[must_use]
    pub fn with_records(self, records: Vec<CostRecord>) -> Self {
        {
            let mut template = lock(&self.template);
            *template = template.clone().with_records(records);
        }
        self
    }

    /// Clients built so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Successful and failed authentications so far.
    pub fn authenticate_count(&self) -> usize {
        self.authentications.load(Ordering::SeqCst)
    }

    /// Reject every later authentication with `reason`.
    pub fn reject_authentication(&self, reason: &str) {
        *lock(&self.rejection) = Some(reason.to_string());
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *lock(&self.connect_delay) = delay;
    }

    /// Queries received by clients built from the template.
    #[must_use]
    pub fn queries(&self) -> Vec<CostQuery> {
        lock(&self.template).queries()
    }
}

#[async_trait]
impl ClientFactory for MockClientFactory {
    async fn authenticate(&self, context: &AuthenticationContext) -> Result<()> {
        self.authentications.fetch_add(1, Ordering::SeqCst);
        let rejection = lock(&self.rejection).clone();
        match rejection {
            Some(reason) => Err(AutocostError::InvalidCredentials {
                provider: context.provider().to_string(),
                profile: context.profile().map(ToString::to_string),
                reason,
            }),
            None => Ok(()),
        }
    }

    async fn connect(&self, _context: &AuthenticationContext) -> Result<Arc<dyn ProviderClient>> {
        let delay = *lock(&self.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        let client = lock(&self.template).clone();
        Ok(Arc::new(client))
    }
}

// =============================================================================
// Static Profile Registry
// =============================================================================

/// In-memory profile registry.
#[derive(Debug, Clone)]
pub struct StaticProfileRegistry {
    provider: Provider,
    profiles: Vec<String>,
    unresolvable: HashSet<String>,
}

impl StaticProfileRegistry {
    /// AWS access-key profiles, each with a distinct key id.
    #[must_use]
    pub fn aws(names: &[&str]) -> Self {
        Self {
            provider: Provider::Aws,
            profiles: names.iter().map(ToString::to_string).collect(),
            unresolvable: HashSet::new(),
        }
    }

    /// gcloud configurations backed by application-default credentials.
    #[must_use]
    pub fn gcp(names: &[&str]) -> Self {
        Self {
            provider: Provider::Gcp,
            ..Self::aws(names)
        }
    }

    /// List `name` but fail to resolve it.
    #[must_use]
    pub fn with_unresolvable(mut self, name: &str) -> Self {
        self.profiles.push(name.to_string());
        self.unresolvable.insert(name.to_string());
        self
    }
}

impl ProfileRegistry for StaticProfileRegistry {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn list(&self) -> Vec<ProfileDescriptor> {
        self.profiles
            .iter()
            .map(|name| ProfileDescriptor {
                name: name.clone(),
                source: PathBuf::from("static"),
                resolvable: !self.unresolvable.contains(name),
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<ContextBuilder> {
        if !self.profiles.iter().any(|p| p == name) {
            return Err(AutocostError::ProfileNotFound {
                provider: self.provider.to_string(),
                profile: name.to_string(),
            });
        }
        if self.unresolvable.contains(name) {
            return Err(AutocostError::InvalidCredentials {
                provider: self.provider.to_string(),
                profile: Some(name.to_string()),
                reason: "no credentials".to_string(),
            });
        }
        match self.provider {
            Provider::Gcp => Ok(AuthenticationContext::builder(
                Provider::Gcp,
                CredentialSource::Profile,
                CredentialMaterial::ApplicationDefault {
                    account: Some(format!("{name}@example.com")),
                },
            )
            .profile(name)),
            _ => Ok(aws_profile_builder(name)),
        }
    }
}

// =============================================================================
// Temporary Directories
// =============================================================================

/// A temporary directory that is cleaned up on drop.
///
/// # Examples
///
/// ```rust,ignore
/// use autocost::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// let path = dir.write("aws/costs.jsonl", "");
/// assert!(path.exists());
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Write a file relative to the directory, creating parents; returns its path.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write test file");
        path
    }

    /// Read a file relative to the directory.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read.
    #[must_use]
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.inner.path().join(name)).expect("Failed to read test file")
    }

    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
///
/// # Examples
///
/// ```rust,ignore
/// use autocost::assert_contains;
///
/// assert_contains!("profile 'dev' not found", "dev");
/// ```
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert approximate floating point equality.
///
/// # Examples
///
/// ```rust,ignore
/// use autocost::assert_float_eq;
///
/// assert_float_eq!(70.0, 70.0000001, 1e-6);
/// ```
#[macro_export]
macro_rules! assert_float_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_float_eq!($left, $right, 1e-9)
    };
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left;
        let right: f64 = $right;
        let epsilon: f64 = $epsilon;
        assert!(
            (left - right).abs() < epsilon,
            "Float equality assertion failed: {} != {} (epsilon: {})",
            left,
            right,
            epsilon
        );
    }};
}
