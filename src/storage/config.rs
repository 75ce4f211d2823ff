//! Configuration file loading and resolution.
//!
//! Loads configuration from:
//! - Linux: `~/.config/autocost/config.toml`
//! - macOS: `~/Library/Application Support/dev.autocost.autocost/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! The result is an immutable [`Settings`] value, resolved once at start-up.
//!
//! ## Environment Variables
//!
//! - `AUTOCOST_PROVIDERS` (or `ENABLED_PROVIDERS`): comma-separated provider list
//! - `AUTOCOST_ENDPOINT`: endpoint identifier
//! - `AUTOCOST_ENABLE_CUSTOM_TOOLS`: extended analytics toggle
//! - `AUTOCOST_EXPORT_DIR`: root of billing exports
//! - `AUTOCOST_SESSION_DIR`: directory for captured sessions
//! - `AUTOCOST_CONFIG`: override config file path
//! - `DEFAULT_ANALYSIS_DAYS`: default look-back window
//! - `AWS_PROFILE`, `CLOUDSDK_ACTIVE_CONFIG_NAME`, `AUTOCOST_AZURE_PROFILE`,
//!   `AUTOCOST_DATADOG_PROFILE`: explicit profile per provider
//! - `AWS_DEFAULT_REGION`/`AWS_REGION`, `GCP_REGION`, `AZURE_REGION`,
//!   `DATADOG_SITE`: region per provider
//! - `AWS_CROSS_ACCOUNT_ROLE_NAME`: role assumed for cross-account access

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::util::env::EnvSnapshot;

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable for comma-separated provider list.
pub const ENV_PROVIDERS: &str = "AUTOCOST_PROVIDERS";
/// Legacy name for the provider list.
pub const ENV_PROVIDERS_LEGACY: &str = "ENABLED_PROVIDERS";
/// Environment variable for the endpoint identifier.
pub const ENV_ENDPOINT: &str = "AUTOCOST_ENDPOINT";
/// Environment variable toggling extended analytics.
pub const ENV_CUSTOM_TOOLS: &str = "AUTOCOST_ENABLE_CUSTOM_TOOLS";
/// Environment variable for the export root.
pub const ENV_EXPORT_DIR: &str = "AUTOCOST_EXPORT_DIR";
/// Environment variable for the captured session directory.
pub const ENV_SESSION_DIR: &str = "AUTOCOST_SESSION_DIR";
/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "AUTOCOST_CONFIG";
/// Environment variable for the default look-back window.
pub const ENV_ANALYSIS_DAYS: &str = "DEFAULT_ANALYSIS_DAYS";
/// Environment variable for the AWS cross-account role name.
pub const ENV_CROSS_ACCOUNT_ROLE: &str = "AWS_CROSS_ACCOUNT_ROLE_NAME";

/// Default AWS region.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";
/// Default Datadog site.
pub const DEFAULT_DATADOG_SITE: &str = "datadoghq.com";
/// Default role assumed for cross-account access.
pub const DEFAULT_CROSS_ACCOUNT_ROLE: &str = "AutocostCrossAccount";
/// Default look-back window in days.
pub const DEFAULT_ANALYSIS_DAYS: u32 = 7;
/// Largest accepted look-back window in days.
pub const MAX_ANALYSIS_DAYS: u32 = 365;

/// Environment variables naming an explicit profile, per provider.
#[must_use]
pub const fn profile_env_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Aws => &["AWS_PROFILE"],
        Provider::Gcp => &["CLOUDSDK_ACTIVE_CONFIG_NAME"],
        Provider::Azure => &["AUTOCOST_AZURE_PROFILE"],
        Provider::Datadog => &["AUTOCOST_DATADOG_PROFILE"],
    }
}

/// Environment variables naming a region (or site), per provider.
#[must_use]
pub const fn region_env_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Aws => &["AWS_DEFAULT_REGION", "AWS_REGION"],
        Provider::Gcp => &["GCP_REGION", "CLOUDSDK_COMPUTE_REGION"],
        Provider::Azure => &["AZURE_REGION"],
        Provider::Datadog => &["DATADOG_SITE", "DD_SITE"],
    }
}

const fn default_region(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Aws => Some(DEFAULT_AWS_REGION),
        Provider::Datadog => Some(DEFAULT_DATADOG_SITE),
        Provider::Gcp | Provider::Azure => None,
    }
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Providers to manage.
    pub providers: Vec<Provider>,
    /// Endpoint identifier.
    pub endpoint: String,
    /// Whether anomaly and spillover operations are enabled.
    pub extended_analytics: bool,
    /// Default look-back window in days.
    pub analysis_days: u32,
    /// Root of billing exports.
    pub export_dir: PathBuf,
    /// Directory for captured sessions.
    pub session_dir: PathBuf,
    /// Timeout for each permission probe call.
    pub probe_timeout: Duration,
    /// Per-provider settings.
    pub provider_settings: BTreeMap<Provider, ProviderSettings>,
    /// Named profiles declared in the config file, in file order.
    pub configured_profiles: BTreeMap<Provider, Vec<(String, ConfiguredProfile)>>,
    /// Analytics parameters.
    pub analytics: AnalyticsConfig,
    /// Config file the settings were read from.
    pub config_path: PathBuf,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Resolved settings for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Explicitly configured profile.
    pub profile: Option<String>,
    /// Where the profile came from.
    pub profile_source: ConfigSource,
    /// Region (or Datadog site).
    pub region: Option<String>,
    /// Role assumed for cross-account access (AWS only).
    pub cross_account_role: Option<String>,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub providers: ConfigSource,
    pub endpoint: ConfigSource,
    pub extended_analytics: ConfigSource,
    pub analysis_days: ConfigSource,
    pub export_dir: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub providers: Option<Vec<Provider>>,
    pub export_dir: Option<PathBuf>,
    pub probe_timeout: Option<Duration>,
}

impl Settings {
    /// Resolve final settings from CLI overrides, the environment, and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or any
    /// resolved value is invalid (e.g. unknown provider).
    pub fn resolve(cli: &CliOverrides, env: &EnvSnapshot, paths: &AppPaths) -> Result<Self> {
        let config_path = cli
            .config_path
            .clone()
            .or_else(|| env.path(ENV_CONFIG))
            .unwrap_or_else(|| paths.config_file());
        let config = Config::load_from(&config_path)?;
        Self::from_config(config, config_path, cli, env, paths)
    }

    /// Resolve settings against an already loaded config file.
    pub fn from_config(
        config: Config,
        config_path: PathBuf,
        cli: &CliOverrides,
        env: &EnvSnapshot,
        paths: &AppPaths,
    ) -> Result<Self> {
        config.validate()?;

        let mut sources = ConfigSources::default();

        let providers = Self::resolve_providers(cli, env, &config, &mut sources.providers)?;
        let endpoint = Self::resolve_endpoint(env, &config, &mut sources.endpoint);
        let extended_analytics =
            Self::resolve_extended_analytics(env, &config, &mut sources.extended_analytics);
        let analysis_days = Self::resolve_analysis_days(env, &config, &mut sources.analysis_days)?;
        let export_dir = Self::resolve_export_dir(cli, env, &config, paths, &mut sources.export_dir);
        let session_dir = env
            .path(ENV_SESSION_DIR)
            .or_else(|| config.general.session_dir.clone())
            .unwrap_or_else(|| paths.sessions_dir());
        let probe_timeout = cli
            .probe_timeout
            .unwrap_or_else(|| Duration::from_secs(config.general.probe_timeout_seconds));

        let provider_settings = Provider::ALL
            .iter()
            .map(|p| (*p, Self::resolve_provider_settings(*p, env, &config)))
            .collect();

        let configured_profiles = config.configured_profiles()?;

        Ok(Self {
            providers,
            endpoint,
            extended_analytics,
            analysis_days,
            export_dir,
            session_dir,
            probe_timeout,
            provider_settings,
            configured_profiles,
            analytics: config.analytics,
            config_path,
            sources,
        })
    }

    fn resolve_providers(
        cli: &CliOverrides,
        env: &EnvSnapshot,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<Vec<Provider>> {
        // 1. CLI flag
        if let Some(providers) = &cli.providers {
            *source = ConfigSource::Cli;
            return Ok(providers.clone());
        }

        // 2. Environment variable
        if let Some(list) = env.get_any(&[ENV_PROVIDERS, ENV_PROVIDERS_LEGACY]) {
            *source = ConfigSource::Env;
            return Provider::parse_list(list);
        }

        // 3. Config file
        if let Some(list) = &config.general.providers {
            *source = ConfigSource::ConfigFile;
            return list.iter().map(|s| Provider::from_cli_name(s)).collect();
        }

        // 4. Default
        *source = ConfigSource::Default;
        Ok(vec![Provider::Aws])
    }

    fn resolve_endpoint(env: &EnvSnapshot, config: &Config, source: &mut ConfigSource) -> String {
        if let Some(endpoint) = env.get(ENV_ENDPOINT) {
            *source = ConfigSource::Env;
            return endpoint.to_string();
        }
        if let Some(endpoint) = &config.general.endpoint {
            *source = ConfigSource::ConfigFile;
            return endpoint.clone();
        }
        *source = ConfigSource::Default;
        "default".to_string()
    }

    fn resolve_extended_analytics(
        env: &EnvSnapshot,
        config: &Config,
        source: &mut ConfigSource,
    ) -> bool {
        if let Some(enabled) = env.get_bool(ENV_CUSTOM_TOOLS) {
            *source = ConfigSource::Env;
            return enabled;
        }
        if let Some(enabled) = config.general.enable_custom_tools {
            *source = ConfigSource::ConfigFile;
            return enabled;
        }
        *source = ConfigSource::Default;
        true
    }

    fn resolve_analysis_days(
        env: &EnvSnapshot,
        config: &Config,
        source: &mut ConfigSource,
    ) -> Result<u32> {
        if let Some(raw) = env.get(ENV_ANALYSIS_DAYS) {
            *source = ConfigSource::Env;
            let days = raw.parse::<u32>().map_err(|_| AutocostError::ConfigInvalid {
                key: ENV_ANALYSIS_DAYS.to_string(),
                value: raw.to_string(),
                message: "expected a whole number of days".to_string(),
            })?;
            return validate_days(ENV_ANALYSIS_DAYS, days);
        }
        if let Some(days) = config.general.default_analysis_days {
            *source = ConfigSource::ConfigFile;
            return Ok(days);
        }
        *source = ConfigSource::Default;
        Ok(DEFAULT_ANALYSIS_DAYS)
    }

    fn resolve_export_dir(
        cli: &CliOverrides,
        env: &EnvSnapshot,
        config: &Config,
        paths: &AppPaths,
        source: &mut ConfigSource,
    ) -> PathBuf {
        if let Some(dir) = &cli.export_dir {
            *source = ConfigSource::Cli;
            return dir.clone();
        }
        if let Some(dir) = env.path(ENV_EXPORT_DIR) {
            *source = ConfigSource::Env;
            return dir;
        }
        if let Some(dir) = &config.general.export_dir {
            *source = ConfigSource::ConfigFile;
            return dir.clone();
        }
        *source = ConfigSource::Default;
        paths.exports_dir()
    }

    fn resolve_provider_settings(
        provider: Provider,
        env: &EnvSnapshot,
        config: &Config,
    ) -> ProviderSettings {
        let file = config.providers.get(provider.cli_name());

        let (profile, profile_source) = if let Some(p) = env.get_any(profile_env_vars(provider)) {
            (Some(p.to_string()), ConfigSource::Env)
        } else if let Some(p) = file.and_then(|f| f.profile.clone()) {
            (Some(p), ConfigSource::ConfigFile)
        } else {
            (None, ConfigSource::Default)
        };

        let region = env
            .get_any(region_env_vars(provider))
            .map(ToString::to_string)
            .or_else(|| file.and_then(|f| f.region.clone()))
            .or_else(|| default_region(provider).map(ToString::to_string));

        let cross_account_role = provider.supports_assume_role().then(|| {
            env.get(ENV_CROSS_ACCOUNT_ROLE)
                .map(ToString::to_string)
                .or_else(|| file.and_then(|f| f.cross_account_role.clone()))
                .unwrap_or_else(|| DEFAULT_CROSS_ACCOUNT_ROLE.to_string())
        });

        ProviderSettings {
            profile,
            profile_source,
            region,
            cross_account_role,
        }
    }

    /// Settings for a provider.
    #[must_use]
    pub fn provider(&self, provider: Provider) -> ProviderSettings {
        self.provider_settings
            .get(&provider)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the provider is enabled.
    #[must_use]
    pub fn is_enabled(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }

    /// Config-file profiles for a provider, in file order.
    #[must_use]
    pub fn profiles_for(&self, provider: Provider) -> &[(String, ConfiguredProfile)] {
        self.configured_profiles
            .get(&provider)
            .map_or(&[], Vec::as_slice)
    }
}

fn validate_days(key: &str, days: u32) -> Result<u32> {
    if days == 0 || days > MAX_ANALYSIS_DAYS {
        return Err(AutocostError::ConfigInvalid {
            key: key.to_string(),
            value: days.to_string(),
            message: format!("must be between 1 and {MAX_ANALYSIS_DAYS}"),
        });
    }
    Ok(days)
}

// =============================================================================
// Config File
// =============================================================================

/// Application configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Per-provider settings keyed by provider name.
    pub providers: BTreeMap<String, ProviderFileConfig>,
    /// Named profiles per provider; inner tables keep file order.
    pub profiles: BTreeMap<String, toml::Table>,
    /// Analytics parameters.
    pub analytics: AnalyticsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enabled providers.
    pub providers: Option<Vec<String>>,
    /// Endpoint identifier.
    pub endpoint: Option<String>,
    /// Extended analytics toggle.
    pub enable_custom_tools: Option<bool>,
    /// Default look-back window.
    pub default_analysis_days: Option<u32>,
    /// Root of billing exports.
    pub export_dir: Option<PathBuf>,
    /// Directory for captured sessions.
    pub session_dir: Option<PathBuf>,
    /// Timeout for each permission probe call.
    pub probe_timeout_seconds: u64,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            providers: None,
            endpoint: None,
            enable_custom_tools: None,
            default_analysis_days: None,
            export_dir: None,
            session_dir: None,
            probe_timeout_seconds: 10,
            log_level: None,
        }
    }
}

/// `[providers.<name>]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderFileConfig {
    /// Explicit profile used by default.
    pub profile: Option<String>,
    /// Region (or Datadog site).
    pub region: Option<String>,
    /// Cross-account role name (AWS).
    pub cross_account_role: Option<String>,
}

/// `[profiles.<provider>.<name>]` table.
///
/// Fields are interpreted by the provider's profile registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfiguredProfile {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub subscription_id: Option<String>,
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub site: Option<String>,
    pub region: Option<String>,
    /// Credential mechanism resolved by the provider SDK (e.g. `azure-cli`).
    pub mechanism: Option<String>,
}

/// `[analytics]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Rolling window in days for trend detection.
    pub trend_window: usize,
    /// Relative change classifying a trend as rising or falling.
    pub trend_threshold: f64,
    /// Days in the anomaly reference window.
    pub anomaly_reference_days: usize,
    /// Days in the anomaly current period.
    pub anomaly_current_days: usize,
    /// Relative deviation from baseline flagged as anomalous.
    pub anomaly_threshold: f64,
    /// Minimum observed reference days for a verdict.
    pub anomaly_min_observations: usize,
    /// Relative tolerance under which a trigger deviation is ignored.
    pub spillover_rel_tolerance: f64,
    /// Absolute tolerance under which a trigger deviation is ignored.
    pub spillover_min_abs: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_window: 28,
            trend_threshold: 0.10,
            anomaly_reference_days: 14,
            anomaly_current_days: 1,
            anomaly_threshold: 0.5,
            anomaly_min_observations: 5,
            spillover_rel_tolerance: 0.05,
            spillover_min_abs: 0.0,
        }
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse configuration text; `path` is used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| AutocostError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Validate configuration values.
    ///
    /// Checks that provider names are valid, the look-back window and probe
    /// timeout are within bounds, and analytics parameters are usable.
    pub fn validate(&self) -> Result<()> {
        if let Some(providers) = &self.general.providers {
            for name in providers {
                Provider::from_cli_name(name)?;
            }
        }
        for name in self.providers.keys().chain(self.profiles.keys()) {
            Provider::from_cli_name(name)?;
        }

        if let Some(days) = self.general.default_analysis_days {
            validate_days("general.default_analysis_days", days)?;
        }

        if self.general.probe_timeout_seconds == 0 || self.general.probe_timeout_seconds > 300 {
            return Err(AutocostError::ConfigInvalid {
                key: "general.probe_timeout_seconds".to_string(),
                value: self.general.probe_timeout_seconds.to_string(),
                message: "must be between 1 and 300 seconds".to_string(),
            });
        }

        self.analytics.validate()
    }

    /// Decode `[profiles.*]` into typed entries, keeping file order.
    pub fn configured_profiles(&self) -> Result<BTreeMap<Provider, Vec<(String, ConfiguredProfile)>>> {
        let mut out = BTreeMap::new();
        for (provider_name, table) in &self.profiles {
            let provider = Provider::from_cli_name(provider_name)?;
            let mut entries = Vec::with_capacity(table.len());
            for (name, value) in table {
                let profile: ConfiguredProfile =
                    value.clone().try_into().map_err(|e: toml::de::Error| {
                        AutocostError::ConfigInvalid {
                            key: format!("profiles.{provider_name}.{name}"),
                            value: value.to_string(),
                            message: e.to_string(),
                        }
                    })?;
                entries.push((name.clone(), profile));
            }
            out.insert(provider, entries);
        }
        Ok(out)
    }
}

impl AnalyticsConfig {
    /// Check parameters are usable by the analytics engine.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, value: String, message: &str| AutocostError::ConfigInvalid {
            key: format!("analytics.{key}"),
            value,
            message: message.to_string(),
        };
        if self.trend_window == 0 {
            return Err(invalid("trend_window", "0".into(), "must be at least 1"));
        }
        if self.anomaly_reference_days == 0 {
            return Err(invalid("anomaly_reference_days", "0".into(), "must be at least 1"));
        }
        if self.anomaly_current_days == 0 {
            return Err(invalid("anomaly_current_days", "0".into(), "must be at least 1"));
        }
        for (key, value) in [
            ("trend_threshold", self.trend_threshold),
            ("anomaly_threshold", self.anomaly_threshold),
            ("spillover_rel_tolerance", self.spillover_rel_tolerance),
            ("spillover_min_abs", self.spillover_min_abs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(key, value.to_string(), "must be a non-negative number"));
            }
        }
        Ok(())
    }
}
