//! Provider manager: the composition root behind every operation.
//!
//! Built once from resolved [`Settings`], it owns the [`SessionManager`],
//! the provider definitions and their start-up statuses. Operations validate
//! their request, optionally switch profile, fetch records through the
//! current client and hand them to the analytics engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use futures::future::join_all;

use crate::core::analytics::{
    AnomalyParams, AnomalyResult, SpilloverParams, SpilloverResult, TrendParams, TrendResult,
    attribute_spillover, detect_anomalies, rolling_trend,
};
use crate::core::client::{ClientFactory, ProviderClient};
use crate::core::context::AuthenticationContext;
use crate::core::models::{CostQuery, CostRecord};
use crate::core::operations::{
    AnomalyRequest, CaptureResult, ConnectionResult, ContextSummary, CostAnalysis, ProfileInfo,
    SpilloverRequest, TrendRequest, validate_days, validate_profile,
};
use crate::core::probe::{PermissionProbe, ProbeReport};
use crate::core::provider::{Provider, ProviderStatus};
use crate::core::session::{ProviderBinding, SessionManager};
use crate::error::{AutocostError, Result};
use crate::providers::export::ExportClientFactory;
use crate::providers::{self, CloudProvider};
use crate::storage::config::{ENV_CUSTOM_TOOLS, MAX_ANALYSIS_DAYS, Settings};
use crate::storage::credentials::{CredentialStore, SnapshotStatus};
use crate::util::env::EnvSnapshot;
use crate::util::time::utc_today;

/// Owns sessions, definitions and statuses of the enabled providers.
pub struct ProviderManager {
    settings: Arc<Settings>,
    definitions: BTreeMap<Provider, Arc<dyn CloudProvider>>,
    sessions: SessionManager,
    statuses: BTreeMap<Provider, ProviderStatus>,
}

impl ProviderManager {
    /// Build the manager and load every provider's default context.
    ///
    /// # Errors
    /// [`AutocostError::Config`] when a definition has no client factory.
    pub async fn new(
        settings: Settings,
        definitions: Vec<Arc<dyn CloudProvider>>,
        factories: HashMap<Provider, Arc<dyn ClientFactory>>,
    ) -> Result<Self> {
        let settings = Arc::new(settings);

        let mut bindings = Vec::with_capacity(definitions.len());
        for definition in &definitions {
            let provider = definition.kind();
            let factory = factories.get(&provider).cloned().ok_or_else(|| {
                AutocostError::Config(format!("no client factory registered for {provider}"))
            })?;
            let provider_settings = settings.provider(provider);
            let role = provider_settings
                .cross_account_role
                .filter(|_| provider.supports_assume_role());
            bindings.push(
                ProviderBinding::new(provider, factory, definition.profile_registry(&settings))
                    .with_explicit_profile(definition.startup_profile(&settings))
                    .with_default_region(provider_settings.region)
                    .with_environment(definition.environment_context())
                    .with_cross_account_role(role),
            );
        }

        let store = Arc::new(CredentialStore::new(settings.session_dir.clone()));
        let sessions = SessionManager::new(bindings, store);
        sessions.initialize().await;

        let mut statuses = BTreeMap::new();
        for definition in &definitions {
            let provider = definition.kind();
            let mut status = definition.validate(&settings);
            if !status.is_usable() && sessions.current_context(provider).await?.is_some() {
                status = ProviderStatus::ready(provider, definition.capabilities())
                    .with_warning("using captured session");
            }
            tracing::debug!(provider = %provider, state = %status.state.label(), "Provider status");
            statuses.insert(provider, status);
        }

        let definitions = definitions.into_iter().map(|d| (d.kind(), d)).collect();

        Ok(Self {
            settings,
            definitions,
            sessions,
            statuses,
        })
    }

    /// Manager for the enabled providers, backed by the bundled export client.
    pub async fn from_environment(settings: Settings, env: &EnvSnapshot) -> Result<Self> {
        let definitions = providers::definitions(&settings.providers, env);
        let factories = settings
            .providers
            .iter()
            .map(|p| {
                let factory: Arc<dyn ClientFactory> =
                    Arc::new(ExportClientFactory::new(*p, settings.export_dir.clone()));
                (*p, factory)
            })
            .collect();
        Self::new(settings, definitions, factories).await
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Enabled providers in display order.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        self.definitions.keys().copied().collect()
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<&ProviderStatus> {
        self.statuses.values().collect()
    }

    #[must_use]
    pub fn status(&self, provider: Provider) -> Option<&ProviderStatus> {
        self.statuses.get(&provider)
    }

    /// Providers whose start-up status allows operations.
    #[must_use]
    pub fn ready_providers(&self) -> Vec<Provider> {
        self.statuses
            .values()
            .filter(|s| s.is_usable())
            .map(|s| s.provider)
            .collect()
    }

    #[must_use]
    pub fn is_ready(&self, provider: Provider) -> bool {
        self.statuses.get(&provider).is_some_and(ProviderStatus::is_usable)
    }

    /// Definition of an enabled provider.
    pub fn definition(&self, provider: Provider) -> Result<&Arc<dyn CloudProvider>> {
        self.definitions.get(&provider).ok_or_else(|| {
            AutocostError::Config(format!(
                "provider {provider} is not enabled; add it to AUTOCOST_PROVIDERS"
            ))
        })
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn store(&self) -> &CredentialStore {
        self.sessions.store()
    }

    // =========================================================================
    // Connections and permissions
    // =========================================================================

    /// Run every enabled provider's connectivity check concurrently.
    pub async fn test_all_connections(&self) -> Vec<ConnectionResult> {
        join_all(self.providers().into_iter().map(|p| self.test_connection(p))).await
    }

    async fn test_connection(&self, provider: Provider) -> ConnectionResult {
        let started = Instant::now();
        let timeout = self.settings.probe_timeout;
        let outcome = match tokio::time::timeout(timeout, async {
            let definition = self.definition(provider)?;
            let client = self.sessions.get_client(provider).await?;
            definition.test_connection(client.as_ref()).await
        })
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AutocostError::Timeout {
                provider: provider.to_string(),
                seconds: timeout.as_secs(),
            }),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(()) => {
                tracing::info!(provider = %provider, duration_ms, "Connection test passed");
                ConnectionResult {
                    provider,
                    ok: true,
                    error: None,
                    duration_ms,
                }
            }
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "Connection test failed");
                ConnectionResult {
                    provider,
                    ok: false,
                    error: Some(e.to_string()),
                    duration_ms,
                }
            }
        }
    }

    /// Probe every capability of a provider with its current context.
    pub async fn probe(&self, provider: Provider) -> Result<ProbeReport> {
        let definition = self.definition(provider)?;
        let client = self.sessions.get_client(provider).await?;
        Ok(PermissionProbe::new(self.settings.probe_timeout)
            .probe(definition.as_ref(), client.as_ref())
            .await)
    }

    /// Fail unless the provider's cost capability is allowed.
    async fn require_cost_access(
        &self,
        definition: &dyn CloudProvider,
        client: &dyn ProviderClient,
    ) -> Result<()> {
        let Some(check) = definition.capability_checks().into_iter().next() else {
            return Ok(());
        };
        let report = PermissionProbe::new(self.settings.probe_timeout)
            .probe(definition, client)
            .await;
        if report.missing(&[check.capability.as_str()]).is_empty() {
            return Ok(());
        }
        let outcome = report
            .verdicts
            .iter()
            .find(|v| v.capability == check.capability)
            .map_or("not probed", |v| v.outcome.label());
        Err(AutocostError::InsufficientPermission {
            provider: definition.kind().to_string(),
            operation: check.operation.clone(),
            message: format!("capability '{}' is {outcome}", check.capability),
        })
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Named profiles of a provider, marking the current one.
    pub async fn profiles(&self, provider: Provider) -> Result<Vec<ProfileInfo>> {
        self.definition(provider)?;
        let registry = self.sessions.registry(provider)?;
        let current = self.sessions.current_context(provider).await?;
        let current_name = current.as_deref().and_then(AuthenticationContext::profile);

        Ok(registry
            .list()
            .into_iter()
            .map(|descriptor| ProfileInfo {
                provider,
                current: current_name == Some(descriptor.name.as_str()),
                issue: (!descriptor.resolvable).then(|| "no usable credentials".to_string()),
                resolvable: descriptor.resolvable,
                source: Some(descriptor.source.display().to_string()),
                name: Some(descriptor.name),
                context: None,
            })
            .collect())
    }

    /// Details of the current context, or of a named profile without switching to it.
    pub async fn profile_info(&self, provider: Provider, name: Option<&str>) -> Result<ProfileInfo> {
        self.definition(provider)?;
        let current = self.sessions.current_context(provider).await?;

        let Some(name) = name else {
            return Ok(match current {
                Some(context) => ProfileInfo {
                    provider,
                    name: context.profile().map(ToString::to_string),
                    current: true,
                    resolvable: true,
                    source: Some(context.source().as_str().to_string()),
                    issue: context.is_expired().then(|| "context expired".to_string()),
                    context: Some(ContextSummary::from(context.as_ref())),
                },
                None => ProfileInfo {
                    provider,
                    name: None,
                    current: false,
                    resolvable: false,
                    source: None,
                    context: None,
                    issue: Some("no current context".to_string()),
                },
            });
        };

        let name = validate_profile(name)?;
        let registry = self.sessions.registry(provider)?;
        let source = registry
            .list()
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.source.display().to_string());
        let is_current = current.as_deref().and_then(AuthenticationContext::profile) == Some(name);

        match registry.resolve(name) {
            Ok(builder) => {
                let context = builder
                    .default_region(self.settings.provider(provider).region)
                    .build();
                Ok(ProfileInfo {
                    provider,
                    name: Some(name.to_string()),
                    current: is_current,
                    resolvable: true,
                    source,
                    issue: context.is_expired().then(|| "credentials expired".to_string()),
                    context: Some(ContextSummary::from(&context)),
                })
            }
            Err(AutocostError::InvalidCredentials { reason, .. }) => Ok(ProfileInfo {
                provider,
                name: Some(name.to_string()),
                current: is_current,
                resolvable: false,
                source,
                context: None,
                issue: Some(reason),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn switch_profile(&self, provider: Provider, profile: &str) -> Result<ContextSummary> {
        self.definition(provider)?;
        let profile = validate_profile(profile)?;
        let context = self.sessions.switch(provider, profile).await?;
        Ok(ContextSummary::from(context.as_ref()))
    }

    pub async fn reset_profile(&self, provider: Provider) -> Result<ContextSummary> {
        self.definition(provider)?;
        let context = self.sessions.reset(provider).await?;
        Ok(ContextSummary::from(context.as_ref()))
    }

    pub async fn assume_role(&self, provider: Provider, account_id: &str) -> Result<ContextSummary> {
        self.definition(provider)?;
        let context = self.sessions.assume_role(provider, account_id.trim()).await?;
        Ok(ContextSummary::from(context.as_ref()))
    }

    // =========================================================================
    // Captured sessions
    // =========================================================================

    /// Persist the current context so later runs can fall back to it.
    pub async fn capture_session(&self, provider: Provider) -> Result<CaptureResult> {
        self.definition(provider)?;
        let context = self
            .sessions
            .current_context(provider)
            .await?
            .ok_or_else(|| AutocostError::AuthNotConfigured {
                provider: provider.to_string(),
            })?;
        let path = self.store().save(&context)?;
        tracing::info!(
            provider = %provider,
            path = %path.display(),
            fingerprint = %context.fingerprint().short(),
            "Captured session"
        );
        Ok(CaptureResult {
            path: path.display().to_string(),
            context: ContextSummary::from(context.as_ref()),
        })
    }

    pub fn session_status(&self, provider: Provider) -> Result<SnapshotStatus> {
        self.definition(provider)?;
        Ok(self.store().status(provider))
    }

    /// Remove the captured session; `false` when there was none.
    pub fn clear_session(&self, provider: Provider) -> Result<bool> {
        self.definition(provider)?;
        self.store().clear(provider)
    }

    // =========================================================================
    // Cost operations
    // =========================================================================

    fn require_extended_analytics(&self, operation: &str) -> Result<()> {
        if self.settings.extended_analytics {
            Ok(())
        } else {
            Err(AutocostError::Config(format!(
                "{operation} requires extended analytics; set {ENV_CUSTOM_TOOLS}=true"
            )))
        }
    }

    /// Switch if asked, then return the client and the context it serves.
    async fn prepare(
        &self,
        provider: Provider,
        profile: Option<&str>,
    ) -> Result<(Arc<dyn ProviderClient>, ContextSummary)> {
        self.definition(provider)?;
        if let Some(profile) = profile {
            self.switch_profile(provider, profile).await?;
        }
        let (client, context) = self.sessions.client_with_context(provider).await?;
        Ok((client, ContextSummary::from(context.as_ref())))
    }

    async fn fetch(
        client: &dyn ProviderClient,
        query: &CostQuery,
    ) -> Result<Vec<CostRecord>> {
        let records = client.fetch_costs(query).await?;
        tracing::debug!(
            provider = %client.provider(),
            start = %query.start,
            end = %query.end,
            group_by = %query.group_by,
            records = records.len(),
            "Fetched cost records"
        );
        Ok(records)
    }

    /// Rolling-average trend of the provider's daily costs.
    pub async fn cost_trend(&self, request: &TrendRequest) -> Result<CostAnalysis<TrendResult>> {
        request.validate()?;
        let analytics = &self.settings.analytics;
        let params = TrendParams {
            window: request.window.unwrap_or(analytics.trend_window),
            threshold: request.threshold.unwrap_or(analytics.trend_threshold),
        };
        params.validate()?;
        let days = match request.days {
            Some(days) => days,
            None => validate_days(clamp_days(params.window.saturating_mul(2).saturating_add(1)))?,
        };

        let (client, context) = self.prepare(request.provider, request.profile.as_deref()).await?;
        let query = CostQuery::through(days, request.group_by.clone(), as_of(request.as_of))
            .with_dataset(&request.dataset);
        let mut records = Self::fetch(client.as_ref(), &query).await?;
        if let Some(key) = &request.key {
            records.retain(|r| r.key() == key);
        }

        let result = rolling_trend(&records, &params)?;
        tracing::info!(
            provider = %request.provider,
            direction = result.direction.label(),
            periods = result.periods,
            "Trend computed"
        );
        Ok(CostAnalysis {
            provider: request.provider,
            context,
            start: query.start,
            end: query.end,
            records: records.len(),
            result,
        })
    }

    /// Per-key anomalies of the current window against the reference window.
    pub async fn cost_anomalies(
        &self,
        request: &AnomalyRequest,
    ) -> Result<CostAnalysis<AnomalyResult>> {
        self.require_extended_analytics("anomaly detection")?;
        request.validate()?;
        let analytics = &self.settings.analytics;
        let as_of = as_of(request.as_of);
        let params = AnomalyParams {
            reference_days: request
                .reference_days
                .unwrap_or_else(|| clamp_days(analytics.anomaly_reference_days)),
            current_days: request
                .current_days
                .unwrap_or_else(|| clamp_days(analytics.anomaly_current_days)),
            threshold: request.threshold.unwrap_or(analytics.anomaly_threshold),
            min_observations: request
                .min_observations
                .unwrap_or(analytics.anomaly_min_observations),
            as_of: Some(as_of),
        };
        params.validate()?;
        let days = validate_days(params.reference_days.saturating_add(params.current_days))?;

        let (client, context) = self.prepare(request.provider, request.profile.as_deref()).await?;
        if request.require_permissions {
            let definition = self.definition(request.provider)?;
            self.require_cost_access(definition.as_ref(), client.as_ref())
                .await?;
        }
        let query = CostQuery::through(days, request.group_by.clone(), as_of)
            .with_dataset(&request.dataset);
        let records = Self::fetch(client.as_ref(), &query).await?;

        let result = detect_anomalies(&records, &params)?;
        tracing::info!(
            provider = %request.provider,
            keys = result.findings.len(),
            anomalies = result.anomalies().count(),
            "Anomaly detection finished"
        );
        Ok(CostAnalysis {
            provider: request.provider,
            context,
            start: query.start,
            end: query.end,
            records: records.len(),
            result,
        })
    }

    /// Attribute dependent-key cost changes to trigger keys.
    pub async fn spillover(
        &self,
        request: &SpilloverRequest,
    ) -> Result<CostAnalysis<SpilloverResult>> {
        self.require_extended_analytics("spillover attribution")?;
        request.validate()?;
        let analytics = &self.settings.analytics;
        let params = SpilloverParams {
            rel_tolerance: request
                .rel_tolerance
                .unwrap_or(analytics.spillover_rel_tolerance),
            min_abs: request.min_abs.unwrap_or(analytics.spillover_min_abs),
        };
        params.validate()?;
        let days = validate_days(request.days.unwrap_or(self.settings.analysis_days))?;
        let as_of = as_of(request.as_of);

        let (client, context) = self.prepare(request.provider, request.profile.as_deref()).await?;
        if request.require_permissions {
            let definition = self.definition(request.provider)?;
            self.require_cost_access(definition.as_ref(), client.as_ref())
                .await?;
        }

        let mut triggers = Vec::new();
        let mut dependent = Vec::new();
        let mut window = None;
        for kind in request.kinds() {
            let query = CostQuery::through(days, kind, as_of).with_dataset(&request.dataset);
            for record in Self::fetch(client.as_ref(), &query).await? {
                if record.key() == &request.dependent {
                    dependent.push(record);
                } else if request.triggers.contains(record.key()) {
                    triggers.push(record);
                }
            }
            window = Some((query.start, query.end));
        }
        let (start, end) = window.unwrap_or((as_of, as_of));

        let result = attribute_spillover(&triggers, &dependent, &params)?;
        tracing::info!(
            provider = %request.provider,
            dependent = %request.dependent,
            triggers = request.triggers.len(),
            periods = result.periods.len(),
            "Spillover attributed"
        );
        Ok(CostAnalysis {
            provider: request.provider,
            context,
            start,
            end,
            records: triggers.len() + dependent.len(),
            result,
        })
    }
}

fn as_of(requested: Option<NaiveDate>) -> NaiveDate {
    requested.unwrap_or_else(utc_today)
}

fn clamp_days(days: usize) -> u32 {
    u32::try_from(days).map_or(MAX_ANALYSIS_DAYS, |d| d.min(MAX_ANALYSIS_DAYS))
}
