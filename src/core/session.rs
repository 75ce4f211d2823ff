//! Authentication context lifecycle and client cache.
//!
//! The [`SessionManager`] owns, per provider, the current
//! [`AuthenticationContext`] and the clients built from it. Each provider has
//! one async mutex guarding the `(context, cache)` pair; `get_client`,
//! `switch`, `reset` and `assume_role` run entirely inside it, so a
//! `get_client` racing a `switch` either completes first or sees the new
//! context. Providers never share a lock.
//!
//! Replacing a context always evicts every cached client of that provider.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::core::client::{ClientFactory, ProviderClient};
use crate::core::context::{AuthenticationContext, ContextBuilder, ContextFingerprint};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::storage::credentials::CredentialStore;
use crate::storage::profiles::ProfileRegistry;

// =============================================================================
// Provider Binding
// =============================================================================

/// Everything the session manager needs to manage one provider.
pub struct ProviderBinding {
    pub provider: Provider,
    pub factory: Arc<dyn ClientFactory>,
    pub registry: Arc<dyn ProfileRegistry>,
    /// Explicitly configured profile, highest default precedence.
    pub explicit_profile: Option<String>,
    /// Region applied to contexts that do not carry one.
    pub default_region: Option<String>,
    /// Context derived from ambient environment variables.
    pub environment: Option<ContextBuilder>,
    /// Role assumed for cross-account contexts.
    pub cross_account_role: Option<String>,
    /// Timeout for factory calls.
    pub timeout: Duration,
}

impl ProviderBinding {
    /// Binding with no explicit profile, environment context, or role.
    #[must_use]
    pub fn new(
        provider: Provider,
        factory: Arc<dyn ClientFactory>,
        registry: Arc<dyn ProfileRegistry>,
    ) -> Self {
        Self {
            provider,
            factory,
            registry,
            explicit_profile: None,
            default_region: None,
            environment: None,
            cross_account_role: None,
            timeout: provider.default_timeout(),
        }
    }

    #[must_use]
    pub fn with_explicit_profile(mut self, profile: Option<String>) -> Self {
        self.explicit_profile = profile;
        self
    }

    #[must_use]
    pub fn with_default_region(mut self, region: Option<String>) -> Self {
        self.default_region = region;
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Option<ContextBuilder>) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_cross_account_role(mut self, role: Option<String>) -> Self {
        self.cross_account_role = role;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// =============================================================================
// Cache
// =============================================================================

/// A constructed client and the context it was built for.
#[derive(Debug, Clone)]
pub struct ClientCacheEntry {
    pub provider: Provider,
    pub fingerprint: ContextFingerprint,
    pub client: Arc<dyn ProviderClient>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct SessionSlot {
    context: Option<Arc<AuthenticationContext>>,
    cache: HashMap<ContextFingerprint, ClientCacheEntry>,
}

impl SessionSlot {
    /// Replace the context and drop every cached client.
    fn replace(&mut self, context: Option<Arc<AuthenticationContext>>) -> usize {
        let evicted = self.cache.len();
        self.cache.clear();
        self.context = context;
        evicted
    }
}

struct ProviderSession {
    binding: ProviderBinding,
    slot: Mutex<SessionSlot>,
}

/// How an unresolvable explicit profile is treated while computing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileFailure {
    /// Log and fall through to the next source (start-up).
    FallThrough,
    /// Surface the error (`reset`).
    Surface,
}

// =============================================================================
// Session Manager
// =============================================================================

/// Per-provider authentication state and client cache.
pub struct SessionManager {
    sessions: HashMap<Provider, ProviderSession>,
    store: Arc<CredentialStore>,
}

impl SessionManager {
    /// Create a manager with no contexts; call [`Self::initialize`] to load defaults.
    #[must_use]
    pub fn new(bindings: Vec<ProviderBinding>, store: Arc<CredentialStore>) -> Self {
        let sessions = bindings
            .into_iter()
            .map(|binding| {
                (
                    binding.provider,
                    ProviderSession {
                        binding,
                        slot: Mutex::new(SessionSlot::default()),
                    },
                )
            })
            .collect();
        Self { sessions, store }
    }

    /// Registered providers in display order.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<_> = self.sessions.keys().copied().collect();
        providers.sort();
        providers
    }

    /// Whether a provider is registered.
    #[must_use]
    pub fn is_registered(&self, provider: Provider) -> bool {
        self.sessions.contains_key(&provider)
    }

    /// Credential store backing captured sessions.
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Profile registry of a provider.
    pub fn registry(&self, provider: Provider) -> Result<Arc<dyn ProfileRegistry>> {
        Ok(Arc::clone(&self.session(provider)?.binding.registry))
    }

    fn session(&self, provider: Provider) -> Result<&ProviderSession> {
        self.sessions
            .get(&provider)
            .ok_or_else(|| AutocostError::InvalidProvider(provider.to_string()))
    }

    /// Load the default context of every provider.
    ///
    /// Providers without any source stay unauthenticated; that is not an error.
    pub async fn initialize(&self) {
        for provider in self.providers() {
            let Ok(session) = self.session(provider) else {
                continue;
            };
            let mut slot = session.slot.lock().await;
            match self.default_context(session, ProfileFailure::FallThrough) {
                Ok(Some(context)) => {
                    tracing::info!(
                        provider = %provider,
                        source = %context.source(),
                        profile = context.profile().unwrap_or("-"),
                        fingerprint = %context.fingerprint().short(),
                        "Default context loaded"
                    );
                    slot.replace(Some(Arc::new(context)));
                }
                Ok(None) => {
                    tracing::info!(provider = %provider, "No credentials found; provider unavailable");
                    slot.replace(None);
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Failed to load default context");
                    slot.replace(None);
                }
            }
        }
    }

    /// Compute the default context following the source precedence.
    fn default_context(
        &self,
        session: &ProviderSession,
        on_profile_failure: ProfileFailure,
    ) -> Result<Option<AuthenticationContext>> {
        let binding = &session.binding;

        if let Some(profile) = &binding.explicit_profile {
            match binding.registry.resolve(profile) {
                Ok(builder) => {
                    return Ok(Some(
                        builder
                            .default_region(binding.default_region.clone())
                            .build(),
                    ));
                }
                Err(e) if on_profile_failure == ProfileFailure::FallThrough => {
                    tracing::warn!(
                        provider = %binding.provider,
                        profile = %profile,
                        error = %e,
                        "Configured profile unusable; trying next credential source"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(environment) = &binding.environment {
            return Ok(Some(
                environment
                    .clone()
                    .default_region(binding.default_region.clone())
                    .build(),
            ));
        }

        if let Some(captured) = self.store.load(binding.provider) {
            if captured.is_expired() {
                tracing::debug!(provider = %binding.provider, "Captured session expired; ignoring");
            } else {
                return Ok(Some(captured));
            }
        }

        Ok(None)
    }

    /// Client for the provider's current context, constructed on first use.
    ///
    /// # Errors
    /// [`AutocostError::AuthNotConfigured`] without a context,
    /// [`AutocostError::AuthExpired`] when the context has expired.
    pub async fn get_client(&self, provider: Provider) -> Result<Arc<dyn ProviderClient>> {
        self.client_with_context(provider)
            .await
            .map(|(client, _)| client)
    }

    /// Client together with the context it was built for, read under one
    /// lock so a concurrent switch cannot pair them up wrongly.
    ///
    /// # Errors
    /// As [`SessionManager::get_client`].
    pub async fn client_with_context(
        &self,
        provider: Provider,
    ) -> Result<(Arc<dyn ProviderClient>, Arc<AuthenticationContext>)> {
        let session = self.session(provider)?;
        let mut slot = session.slot.lock().await;

        let context = slot
            .context
            .clone()
            .ok_or_else(|| AutocostError::AuthNotConfigured {
                provider: provider.to_string(),
            })?;
        if context.is_expired() {
            return Err(AutocostError::AuthExpired {
                provider: provider.to_string(),
            });
        }

        let fingerprint = context.fingerprint();
        if let Some(entry) = slot.cache.get(&fingerprint) {
            tracing::debug!(provider = %provider, fingerprint = %fingerprint.short(), "Client cache hit");
            return Ok((Arc::clone(&entry.client), context));
        }

        tracing::debug!(provider = %provider, fingerprint = %fingerprint.short(), "Client cache miss");
        let client = with_timeout(
            provider,
            session.binding.timeout,
            session.binding.factory.connect(&context),
        )
        .await?;
        slot.cache.insert(
            fingerprint.clone(),
            ClientCacheEntry {
                provider,
                fingerprint,
                client: Arc::clone(&client),
                created_at: Utc::now(),
            },
        );
        Ok((client, context))
    }

    /// Switch to a named profile.
    ///
    /// On failure the previous context and cache are left untouched.
    ///
    /// # Errors
    /// [`AutocostError::ProfileNotFound`] or [`AutocostError::InvalidCredentials`].
    pub async fn switch(
        &self,
        provider: Provider,
        profile: &str,
    ) -> Result<Arc<AuthenticationContext>> {
        let session = self.session(provider)?;
        let mut slot = session.slot.lock().await;

        let context = session
            .binding
            .registry
            .resolve(profile)?
            .default_region(session.binding.default_region.clone())
            .build();
        self.authenticate(session, &context).await?;

        let context = Arc::new(context);
        let evicted = slot.replace(Some(Arc::clone(&context)));
        tracing::info!(
            provider = %provider,
            profile = %profile,
            fingerprint = %context.fingerprint().short(),
            evicted,
            "Switched context"
        );
        Ok(context)
    }

    /// Recompute the default context and make it current.
    ///
    /// When no source yields a context the provider becomes unauthenticated
    /// and [`AutocostError::AuthNotConfigured`] is returned.
    pub async fn reset(&self, provider: Provider) -> Result<Arc<AuthenticationContext>> {
        let session = self.session(provider)?;
        let mut slot = session.slot.lock().await;

        match self.default_context(session, ProfileFailure::Surface)? {
            Some(context) => {
                let context = Arc::new(context);
                let evicted = slot.replace(Some(Arc::clone(&context)));
                tracing::info!(
                    provider = %provider,
                    source = %context.source(),
                    fingerprint = %context.fingerprint().short(),
                    evicted,
                    "Reset to default context"
                );
                Ok(context)
            }
            None => {
                let evicted = slot.replace(None);
                tracing::info!(provider = %provider, evicted, "Reset left provider unauthenticated");
                Err(AutocostError::AuthNotConfigured {
                    provider: provider.to_string(),
                })
            }
        }
    }

    /// Assume the cross-account role in `account_id` from the current context.
    ///
    /// # Errors
    /// [`AutocostError::AuthNotConfigured`] without a current context,
    /// [`AutocostError::Config`] when the provider has no cross-account role.
    pub async fn assume_role(
        &self,
        provider: Provider,
        account_id: &str,
    ) -> Result<Arc<AuthenticationContext>> {
        let session = self.session(provider)?;
        let role = session.binding.cross_account_role.as_deref().ok_or_else(|| {
            AutocostError::Config(format!("{provider} does not support assumed-role contexts"))
        })?;
        if account_id.len() != 12 || !account_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(AutocostError::ConfigInvalid {
                key: "account_id".to_string(),
                value: account_id.to_string(),
                message: "expected a 12-digit AWS account id".to_string(),
            });
        }
        let role_arn = format!("arn:aws:iam::{account_id}:role/{role}");

        let mut slot = session.slot.lock().await;
        let base = slot
            .context
            .clone()
            .ok_or_else(|| AutocostError::AuthNotConfigured {
                provider: provider.to_string(),
            })?;

        let context = with_timeout(
            provider,
            session.binding.timeout,
            session.binding.factory.assume_role(&base, &role_arn, account_id),
        )
        .await?;
        self.authenticate(session, &context).await?;

        let context = Arc::new(context);
        let evicted = slot.replace(Some(Arc::clone(&context)));
        tracing::info!(
            provider = %provider,
            account = %account_id,
            role = %role,
            fingerprint = %context.fingerprint().short(),
            evicted,
            "Assumed cross-account role"
        );
        Ok(context)
    }

    async fn authenticate(
        &self,
        session: &ProviderSession,
        context: &AuthenticationContext,
    ) -> Result<()> {
        with_timeout(
            session.binding.provider,
            session.binding.timeout,
            session.binding.factory.authenticate(context),
        )
        .await
    }

    /// Current context, if any. Never changes state.
    pub async fn current_context(
        &self,
        provider: Provider,
    ) -> Result<Option<Arc<AuthenticationContext>>> {
        let session = self.session(provider)?;
        Ok(session.slot.lock().await.context.clone())
    }

    /// Fingerprints of the cached clients, sorted.
    pub async fn cached_fingerprints(&self, provider: Provider) -> Result<Vec<ContextFingerprint>> {
        let session = self.session(provider)?;
        let slot = session.slot.lock().await;
        let mut fingerprints: Vec<_> = slot.cache.keys().cloned().collect();
        fingerprints.sort();
        Ok(fingerprints)
    }
}

async fn with_timeout<T>(
    provider: Provider,
    timeout: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| AutocostError::Timeout {
            provider: provider.to_string(),
            seconds: timeout.as_secs(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{CredentialMaterial, CredentialSource, Secret};
    use crate::test_utils::{MockClientFactory, StaticProfileRegistry};
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn env_builder() -> ContextBuilder {
        AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Environment,
            CredentialMaterial::AccessKey {
                access_key_id: "AKIAENV".into(),
                secret_access_key: Secret::new("env-secret"),
                session_token: None,
            },
        )
    }

    fn manager(dir: &TempDir, binding: impl FnOnce(ProviderBinding) -> ProviderBinding) -> (SessionManager, Arc<MockClientFactory>) {
        let factory = Arc::new(MockClientFactory::new(Provider::Aws));
        let registry = Arc::new(StaticProfileRegistry::aws(&["dev", "prod"]));
        let binding = binding(ProviderBinding::new(
            Provider::Aws,
            Arc::clone(&factory) as Arc<dyn ClientFactory>,
            registry,
        ));
        let store = Arc::new(CredentialStore::new(dir.path()));
        (SessionManager::new(vec![binding], store), factory)
    }

    #[tokio::test]
    async fn get_client_without_context_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| b);
        manager.initialize().await;
        let err = manager.get_client(Provider::Aws).await.unwrap_err();
        assert!(matches!(err, AutocostError::AuthNotConfigured { .. }));
    }

    #[tokio::test]
    async fn unregistered_provider_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| b);
        assert!(matches!(
            manager.get_client(Provider::Gcp).await,
            Err(AutocostError::InvalidProvider(_))
        ));
    }

    #[tokio::test]
    async fn client_is_cached_per_fingerprint() {
        let dir = TempDir::new().unwrap();
        let (manager, factory) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        manager.initialize().await;

        let a = manager.get_client(Provider::Aws).await.unwrap();
        let b = manager.get_client(Provider::Aws).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.connect_count(), 1);
        assert_eq!(manager.cached_fingerprints(Provider::Aws).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn client_with_context_pairs_client_and_context() {
        let dir = TempDir::new().unwrap();
        let (manager, factory) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        manager.initialize().await;

        let (first, env_ctx) = manager.client_with_context(Provider::Aws).await.unwrap();
        assert_eq!(env_ctx.source(), CredentialSource::Environment);

        let dev = manager.switch(Provider::Aws, "dev").await.unwrap();
        let (second, ctx) = manager.client_with_context(Provider::Aws).await.unwrap();
        assert_eq!(ctx.fingerprint(), dev.fingerprint());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(
            manager.cached_fingerprints(Provider::Aws).await.unwrap(),
            vec![ctx.fingerprint()]
        );
        assert_eq!(factory.connect_count(), 2);
    }

    #[tokio::test]
    async fn switch_evicts_cached_clients() {
        let dir = TempDir::new().unwrap();
        let (manager, factory) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        manager.initialize().await;

        let before = manager.get_client(Provider::Aws).await.unwrap();
        let ctx = manager.switch(Provider::Aws, "dev").await.unwrap();
        assert_eq!(ctx.profile(), Some("dev"));
        assert!(manager.cached_fingerprints(Provider::Aws).await.unwrap().is_empty());

        let after = manager.get_client(Provider::Aws).await.unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(factory.connect_count(), 2);
        assert_eq!(factory.authenticate_count(), 1);
    }

    #[tokio::test]
    async fn switch_to_unknown_profile_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        manager.initialize().await;
        let before_ctx = manager.current_context(Provider::Aws).await.unwrap().unwrap();
        let client = manager.get_client(Provider::Aws).await.unwrap();

        let err = manager
            .switch(Provider::Aws, "nonexistent-profile")
            .await
            .unwrap_err();
        assert!(matches!(err, AutocostError::ProfileNotFound { .. }));

        let after_ctx = manager.current_context(Provider::Aws).await.unwrap().unwrap();
        assert_eq!(before_ctx.fingerprint(), after_ctx.fingerprint());
        let again = manager.get_client(Provider::Aws).await.unwrap();
        assert!(Arc::ptr_eq(&client, &again));
    }

    #[tokio::test]
    async fn rejected_credentials_leave_state_untouched() {
        let dir = TempDir::new().unwrap();
        let (manager, factory) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        manager.initialize().await;
        factory.reject_authentication("InvalidClientTokenId");

        let err = manager.switch(Provider::Aws, "prod").await.unwrap_err();
        assert!(matches!(err, AutocostError::InvalidCredentials { .. }));
        let ctx = manager.current_context(Provider::Aws).await.unwrap().unwrap();
        assert_eq!(ctx.source(), CredentialSource::Environment);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        manager.initialize().await;
        manager.switch(Provider::Aws, "dev").await.unwrap();

        let first = manager.reset(Provider::Aws).await.unwrap();
        let second = manager.reset(Provider::Aws).await.unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(*first, *second);
        assert_eq!(first.source(), CredentialSource::Environment);
    }

    #[tokio::test]
    async fn explicit_profile_beats_environment() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| {
            b.with_environment(Some(env_builder()))
                .with_explicit_profile(Some("prod".into()))
                .with_default_region(Some("us-east-1".into()))
        });
        manager.initialize().await;
        let ctx = manager.current_context(Provider::Aws).await.unwrap().unwrap();
        assert_eq!(ctx.profile(), Some("prod"));
        assert_eq!(ctx.region(), Some("us-east-1"));
    }

    #[tokio::test]
    async fn unresolvable_explicit_profile_falls_through_at_start_but_fails_reset() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| {
            b.with_environment(Some(env_builder()))
                .with_explicit_profile(Some("gone".into()))
        });
        manager.initialize().await;
        let ctx = manager.current_context(Provider::Aws).await.unwrap().unwrap();
        assert_eq!(ctx.source(), CredentialSource::Environment);

        assert!(matches!(
            manager.reset(Provider::Aws).await,
            Err(AutocostError::ProfileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn captured_session_is_last_resort() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&env_builder().profile("captured").build()).unwrap();

        let (manager, _) = manager(&dir, |b| b);
        manager.initialize().await;
        let ctx = manager.current_context(Provider::Aws).await.unwrap().unwrap();
        assert_eq!(ctx.source(), CredentialSource::CapturedSession);
        assert_eq!(ctx.profile(), Some("captured"));
    }

    #[tokio::test]
    async fn reset_without_sources_clears_context() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| b);
        manager.initialize().await;
        manager.switch(Provider::Aws, "dev").await.unwrap();
        manager.get_client(Provider::Aws).await.unwrap();

        let err = manager.reset(Provider::Aws).await.unwrap_err();
        assert!(matches!(err, AutocostError::AuthNotConfigured { .. }));
        assert!(manager.current_context(Provider::Aws).await.unwrap().is_none());
        assert!(manager.cached_fingerprints(Provider::Aws).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn assume_role_builds_cross_account_context() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| {
            b.with_environment(Some(env_builder()))
                .with_cross_account_role(Some("AutocostCrossAccount".into()))
        });
        manager.initialize().await;
        manager.get_client(Provider::Aws).await.unwrap();

        let ctx = manager.assume_role(Provider::Aws, "123456789012").await.unwrap();
        assert_eq!(ctx.source(), CredentialSource::AssumedRole);
        assert_eq!(ctx.account(), Some("123456789012"));
        assert_eq!(
            ctx.material().public_id(),
            "assume-role:arn:aws:iam::123456789012:role/AutocostCrossAccount"
        );
        assert!(manager.cached_fingerprints(Provider::Aws).await.unwrap().is_empty());

        assert!(matches!(
            manager.assume_role(Provider::Aws, "12345").await,
            Err(AutocostError::ConfigInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn assume_role_requires_current_context() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| {
            b.with_cross_account_role(Some("AutocostCrossAccount".into()))
        });
        manager.initialize().await;
        assert!(matches!(
            manager.assume_role(Provider::Aws, "123456789012").await,
            Err(AutocostError::AuthNotConfigured { .. })
        ));
    }

    #[tokio::test]
    async fn slow_connect_times_out() {
        let dir = TempDir::new().unwrap();
        let (manager, factory) = manager(&dir, |b| {
            b.with_environment(Some(env_builder()))
                .with_timeout(Duration::from_millis(20))
        });
        manager.initialize().await;
        factory.set_connect_delay(Duration::from_millis(500));
        assert!(matches!(
            manager.get_client(Provider::Aws).await,
            Err(AutocostError::Timeout { .. })
        ));
        assert!(manager.cached_fingerprints(Provider::Aws).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_client_racing_switch_never_caches_the_old_context() {
        let dir = TempDir::new().unwrap();
        let (manager, factory) = manager(&dir, |b| b.with_environment(Some(env_builder())));
        let manager = Arc::new(manager);
        manager.initialize().await;
        factory.set_connect_delay(Duration::from_millis(150));

        let before = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_client(Provider::Aws).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let switch = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.switch(Provider::Aws, "dev").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_client(Provider::Aws).await })
        };

        let (before, switch, after) = tokio::join!(before, switch, after);
        before.unwrap().unwrap();
        let dev = switch.unwrap().unwrap();
        after.unwrap().unwrap();

        assert_eq!(
            manager.cached_fingerprints(Provider::Aws).await.unwrap(),
            vec![dev.fingerprint()]
        );
        assert_eq!(factory.connect_count(), 2);
    }

    #[tokio::test]
    async fn slow_provider_does_not_block_another() {
        let dir = TempDir::new().unwrap();
        let aws_factory = Arc::new(MockClientFactory::new(Provider::Aws));
        let gcp_factory = Arc::new(MockClientFactory::new(Provider::Gcp));
        let bindings = vec![
            ProviderBinding::new(
                Provider::Aws,
                Arc::clone(&aws_factory) as Arc<dyn ClientFactory>,
                Arc::new(StaticProfileRegistry::aws(&["dev"])),
            )
            .with_environment(Some(env_builder())),
            ProviderBinding::new(
                Provider::Gcp,
                Arc::clone(&gcp_factory) as Arc<dyn ClientFactory>,
                Arc::new(StaticProfileRegistry::gcp(&["analytics"])),
            ),
        ];
        let manager = Arc::new(SessionManager::new(
            bindings,
            Arc::new(CredentialStore::new(dir.path())),
        ));
        manager.initialize().await;
        aws_factory.set_connect_delay(Duration::from_millis(500));

        let stuck = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_client(Provider::Aws).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        let gcp = tokio::time::timeout(Duration::from_millis(250), async {
            let context = manager.switch(Provider::Gcp, "analytics").await?;
            manager.get_client(Provider::Gcp).await?;
            Ok::<_, AutocostError>(context)
        })
        .await
        .expect("gcp switch waited on the aws connect")
        .unwrap();
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(gcp.profile(), Some("analytics"));
        assert!(!stuck.is_finished());

        stuck.await.unwrap().unwrap();
        assert_eq!(aws_factory.connect_count(), 1);
        assert_eq!(gcp_factory.connect_count(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn switch_is_logged_without_secrets() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(&dir, |b| b);
        manager.initialize().await;
        manager.switch(Provider::Aws, "dev").await.unwrap();

        assert!(logs_contain("Switched context"));
        assert!(logs_contain("profile=dev"));
        assert!(!logs_contain("dev-secret"));
    }
}
