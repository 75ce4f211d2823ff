//! Named profile discovery.
//!
//! Each provider lists profiles from its native local configuration:
//! - AWS: `~/.aws/credentials` then `~/.aws/config`
//! - GCP: gcloud named configurations
//! - Azure, Datadog: `[profiles.<provider>.<name>]` tables in the autocost config file
//!
//! Profiles are listed in discovery order, never sorted. Files are re-read
//! on every call so edits made while autocost runs are picked up.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::context::{
    AuthenticationContext, ContextBuilder, CredentialMaterial, CredentialSource, Secret,
};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::storage::config::ConfiguredProfile;
use crate::storage::paths::is_plain_file_name;
use crate::util::env::EnvSnapshot;

/// A profile found in a provider's local configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescriptor {
    pub name: String,
    /// File the profile was first discovered in.
    pub source: PathBuf,
    /// Whether the profile carries enough to build a context.
    pub resolvable: bool,
}

/// Enumerates and resolves a provider's named profiles.
pub trait ProfileRegistry: Send + Sync {
    /// Provider the profiles belong to.
    fn provider(&self) -> Provider;

    /// Profiles in discovery order.
    fn list(&self) -> Vec<ProfileDescriptor>;

    /// Build a context for the named profile.
    ///
    /// # Errors
    /// [`AutocostError::ProfileNotFound`] for unknown names,
    /// [`AutocostError::InvalidCredentials`] for known but unresolvable profiles.
    fn resolve(&self, name: &str) -> Result<ContextBuilder>;
}

fn not_found(provider: Provider, name: &str) -> AutocostError {
    AutocostError::ProfileNotFound {
        provider: provider.to_string(),
        profile: name.to_string(),
    }
}

fn unresolvable(provider: Provider, name: &str, reason: &str) -> AutocostError {
    AutocostError::InvalidCredentials {
        provider: provider.to_string(),
        profile: Some(name.to_string()),
        reason: reason.to_string(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Ordered sections of an INI file.
#[derive(Debug, Default)]
struct IniDocument {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl IniDocument {
    fn parse(content: &str) -> Self {
        let mut doc = Self::default();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                doc.sections.push((name.trim().to_string(), Vec::new()));
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            // Indented lines continue a nested block (e.g. s3 settings); skip them.
            if raw.starts_with(char::is_whitespace) {
                continue;
            }
            if let Some((_, entries)) = doc.sections.last_mut() {
                entries.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        doc
    }

    fn read(path: &Path) -> Option<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Some(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read profile source");
                None
            }
        }
    }

    fn section(&self, name: &str) -> Option<&[(String, String)]> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.as_slice())
    }
}

fn lookup<'a>(entries: &'a [(String, String)], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// AWS
// =============================================================================

/// AWS shared credentials and config files.
#[derive(Debug, Clone)]
pub struct AwsProfileRegistry {
    credentials_file: PathBuf,
    config_file: PathBuf,
}

/// One AWS profile merged across both files.
#[derive(Debug, Default)]
struct AwsProfile {
    source: PathBuf,
    values: HashMap<String, String>,
}

impl AwsProfile {
    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn has_static_keys(&self) -> bool {
        self.get("aws_access_key_id").is_some() && self.get("aws_secret_access_key").is_some()
    }

    fn has_sso(&self) -> bool {
        self.values.keys().any(|k| k.starts_with("sso_"))
    }

    fn is_resolvable(&self) -> bool {
        self.has_static_keys()
            || self.get("role_arn").is_some()
            || self.has_sso()
            || self.get("credential_process").is_some()
    }
}

impl AwsProfileRegistry {
    #[must_use]
    pub const fn new(credentials_file: PathBuf, config_file: PathBuf) -> Self {
        Self {
            credentials_file,
            config_file,
        }
    }

    /// Locate the files from `AWS_SHARED_CREDENTIALS_FILE` / `AWS_CONFIG_FILE` or `~/.aws`.
    #[must_use]
    pub fn from_env(env: &EnvSnapshot) -> Self {
        let aws_dir = env
            .home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".aws");
        Self::new(
            env.path("AWS_SHARED_CREDENTIALS_FILE")
                .unwrap_or_else(|| aws_dir.join("credentials")),
            env.path("AWS_CONFIG_FILE")
                .unwrap_or_else(|| aws_dir.join("config")),
        )
    }

    /// Merge both files; credentials-file values win.
    fn load(&self) -> Vec<(String, AwsProfile)> {
        let mut profiles: Vec<(String, AwsProfile)> = Vec::new();

        let mut merge = |name: String, path: &Path, entries: &[(String, String)]| {
            let index = profiles.iter().position(|(n, _)| *n == name).unwrap_or_else(|| {
                profiles.push((
                    name,
                    AwsProfile {
                        source: path.to_path_buf(),
                        values: HashMap::new(),
                    },
                ));
                profiles.len() - 1
            });
            let profile = &mut profiles[index].1;
            for (k, v) in entries {
                profile.values.entry(k.clone()).or_insert_with(|| v.clone());
            }
        };

        if let Some(doc) = IniDocument::read(&self.credentials_file) {
            for (name, entries) in &doc.sections {
                merge(name.clone(), &self.credentials_file, entries);
            }
        }
        if let Some(doc) = IniDocument::read(&self.config_file) {
            for (section, entries) in &doc.sections {
                let name = if section == "default" {
                    section.clone()
                } else if let Some(name) = section.strip_prefix("profile ") {
                    name.trim().to_string()
                } else {
                    // sso-session and services sections are not profiles
                    continue;
                };
                merge(name, &self.config_file, entries);
            }
        }
        profiles
    }
}

/// Account id from `arn:aws:iam::<account>:role/<name>`.
#[must_use]
pub fn account_from_role_arn(arn: &str) -> Option<&str> {
    arn.split(':').nth(4).filter(|a| !a.is_empty())
}

impl ProfileRegistry for AwsProfileRegistry {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn list(&self) -> Vec<ProfileDescriptor> {
        self.load()
            .into_iter()
            .map(|(name, profile)| ProfileDescriptor {
                resolvable: profile.is_resolvable(),
                name,
                source: profile.source,
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<ContextBuilder> {
        let profiles = self.load();
        let (_, profile) = profiles
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| not_found(Provider::Aws, name))?;

        let mut builder = if let Some(role_arn) = profile.get("role_arn") {
            let mut b = AuthenticationContext::builder(
                Provider::Aws,
                CredentialSource::AssumedRole,
                CredentialMaterial::Delegated {
                    mechanism: format!("assume-role:{role_arn}"),
                },
            );
            if let Some(account) = account_from_role_arn(role_arn) {
                b = b.account(account);
            }
            b
        } else if profile.has_static_keys() {
            let (Some(id), Some(secret)) = (
                profile.get("aws_access_key_id"),
                profile.get("aws_secret_access_key"),
            ) else {
                return Err(unresolvable(Provider::Aws, name, "incomplete access keys"));
            };
            AuthenticationContext::builder(
                Provider::Aws,
                CredentialSource::Profile,
                CredentialMaterial::AccessKey {
                    access_key_id: id.to_string(),
                    secret_access_key: Secret::new(secret),
                    session_token: profile.get("aws_session_token").map(Secret::new),
                },
            )
        } else if profile.has_sso() {
            let mut b = AuthenticationContext::builder(
                Provider::Aws,
                CredentialSource::Profile,
                CredentialMaterial::Delegated {
                    mechanism: "sso".to_string(),
                },
            );
            if let Some(account) = profile.get("sso_account_id") {
                b = b.account(account);
            }
            b
        } else if profile.get("credential_process").is_some() {
            AuthenticationContext::builder(
                Provider::Aws,
                CredentialSource::Profile,
                CredentialMaterial::Delegated {
                    mechanism: "credential-process".to_string(),
                },
            )
        } else {
            return Err(unresolvable(
                Provider::Aws,
                name,
                "profile has no access keys, role_arn, sso settings or credential_process",
            ));
        };

        builder = builder.profile(name);
        if let Some(region) = profile.get("region") {
            builder = builder.region(region);
        }
        Ok(builder)
    }
}

// =============================================================================
// GCP
// =============================================================================

/// gcloud named configurations.
#[derive(Debug, Clone)]
pub struct GcloudProfileRegistry {
    config_dir: PathBuf,
}

impl GcloudProfileRegistry {
    #[must_use]
    pub const fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Locate the gcloud config dir from `CLOUDSDK_CONFIG` or `~/.config/gcloud`.
    #[must_use]
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self::new(env.path("CLOUDSDK_CONFIG").unwrap_or_else(|| {
            env.home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config/gcloud")
        }))
    }

    fn configurations_dir(&self) -> PathBuf {
        self.config_dir.join("configurations")
    }

    /// Configuration files sorted by file name.
    fn entries(&self) -> Vec<(String, PathBuf)> {
        let Ok(read_dir) = fs::read_dir(self.configurations_dir()) else {
            return Vec::new();
        };
        let mut entries: Vec<(String, PathBuf)> = read_dir
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let file_name = entry.file_name().to_str()?.to_string();
                let name = file_name.strip_prefix("config_")?.to_string();
                Some((name, entry.path()))
            })
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1));
        entries
    }

    fn is_resolvable(doc: &IniDocument) -> bool {
        let core = doc.section("core").unwrap_or(&[]);
        let auth = doc.section("auth").unwrap_or(&[]);
        lookup(core, "account").is_some() || lookup(auth, "credential_file_override").is_some()
    }
}

impl ProfileRegistry for GcloudProfileRegistry {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn list(&self) -> Vec<ProfileDescriptor> {
        self.entries()
            .into_iter()
            .map(|(name, path)| {
                let resolvable = IniDocument::read(&path).is_some_and(|d| Self::is_resolvable(&d));
                ProfileDescriptor {
                    name,
                    source: path,
                    resolvable,
                }
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<ContextBuilder> {
        if !is_plain_file_name(name) {
            return Err(not_found(Provider::Gcp, name));
        }
        let path = self.configurations_dir().join(format!("config_{name}"));
        let doc = IniDocument::read(&path).ok_or_else(|| not_found(Provider::Gcp, name))?;
        let core = doc.section("core").unwrap_or(&[]);
        let auth = doc.section("auth").unwrap_or(&[]);
        let compute = doc.section("compute").unwrap_or(&[]);

        let material = if let Some(key_file) = lookup(auth, "credential_file_override") {
            CredentialMaterial::ServiceAccount {
                key_file: PathBuf::from(key_file),
            }
        } else if let Some(account) = lookup(core, "account") {
            CredentialMaterial::ApplicationDefault {
                account: Some(account.to_string()),
            }
        } else {
            return Err(unresolvable(
                Provider::Gcp,
                name,
                "configuration has no account; run gcloud auth login",
            ));
        };

        let mut builder =
            AuthenticationContext::builder(Provider::Gcp, CredentialSource::Profile, material)
                .profile(name);
        if let Some(project) = lookup(core, "project") {
            builder = builder.account(project);
        }
        if let Some(region) = lookup(compute, "region") {
            builder = builder.region(region);
        }
        Ok(builder)
    }
}

// =============================================================================
// Config-file profiles (Azure, Datadog)
// =============================================================================

/// Profiles declared in the autocost config file.
#[derive(Debug, Clone)]
pub struct ConfigProfileRegistry {
    provider: Provider,
    source: PathBuf,
    profiles: Vec<(String, ConfiguredProfile)>,
}

impl ConfigProfileRegistry {
    #[must_use]
    pub const fn new(
        provider: Provider,
        source: PathBuf,
        profiles: Vec<(String, ConfiguredProfile)>,
    ) -> Self {
        Self {
            provider,
            source,
            profiles,
        }
    }

    fn material(&self, profile: &ConfiguredProfile) -> Option<CredentialMaterial> {
        if let Some(mechanism) = &profile.mechanism {
            return Some(CredentialMaterial::Delegated {
                mechanism: mechanism.clone(),
            });
        }
        match self.provider {
            Provider::Azure => match (&profile.tenant_id, &profile.client_id, &profile.client_secret) {
                (Some(tenant_id), Some(client_id), Some(secret)) => {
                    Some(CredentialMaterial::ClientSecret {
                        tenant_id: tenant_id.clone(),
                        client_id: client_id.clone(),
                        client_secret: Secret::new(secret.clone()),
                    })
                }
                _ => None,
            },
            Provider::Datadog => profile.api_key.as_ref().map(|key| CredentialMaterial::ApiKey {
                api_key: Secret::new(key.clone()),
                app_key: profile.app_key.clone().map(Secret::new),
            }),
            Provider::Aws | Provider::Gcp => None,
        }
    }
}

impl ProfileRegistry for ConfigProfileRegistry {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn list(&self) -> Vec<ProfileDescriptor> {
        self.profiles
            .iter()
            .map(|(name, profile)| ProfileDescriptor {
                name: name.clone(),
                source: self.source.clone(),
                resolvable: self.material(profile).is_some(),
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<ContextBuilder> {
        let (_, profile) = self
            .profiles
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| not_found(self.provider, name))?;
        let material = self.material(profile).ok_or_else(|| {
            let reason = match self.provider {
                Provider::Datadog => "profile has no api_key",
                _ => "profile needs tenant_id, client_id and client_secret, or a mechanism",
            };
            unresolvable(self.provider, name, reason)
        })?;

        let mut builder =
            AuthenticationContext::builder(self.provider, CredentialSource::Profile, material)
                .profile(name);
        if let Some(subscription) = &profile.subscription_id {
            builder = builder.account(subscription);
        }
        if let Some(region) = profile.region.as_ref().or(profile.site.as_ref()) {
            builder = builder.region(region);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn aws_registry(dir: &TempDir, credentials: &str, config: &str) -> AwsProfileRegistry {
        let creds = dir.path().join("credentials");
        let conf = dir.path().join("config");
        fs::write(&creds, credentials).unwrap();
        fs::write(&conf, config).unwrap();
        AwsProfileRegistry::new(creds, conf)
    }

    #[test]
    fn aws_lists_in_discovery_order_and_merges() {
        let dir = TempDir::new().unwrap();
        let registry = aws_registry(
            &dir,
            "[zeta]\naws_access_key_id = AKIA1\naws_secret_access_key = s\n\n[default]\naws_access_key_id = AKIA2\naws_secret_access_key = s\n",
            "[default]\nregion = eu-west-1\n\n[profile billing]\nrole_arn = arn:aws:iam::111122223333:role/Billing\nsource_profile = default\n\n[sso-session corp]\nsso_start_url = https://x\n\n[profile empty]\noutput = json\n",
        );
        let names: Vec<_> = registry.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["zeta", "default", "billing", "empty"]);

        let list = registry.list();
        assert!(list[0].resolvable);
        assert!(list[2].resolvable);
        assert!(!list[3].resolvable);
        assert!(list[1].source.ends_with("credentials"));

        let ctx = registry.resolve("default").unwrap().build();
        assert_eq!(ctx.region(), Some("eu-west-1"));
        assert_eq!(ctx.material().public_id(), "AKIA2");
    }

    #[test]
    fn aws_role_profile_is_assumed_role() {
        let dir = TempDir::new().unwrap();
        let registry = aws_registry(
            &dir,
            "",
            "[profile billing]\nrole_arn = arn:aws:iam::111122223333:role/Billing\nregion = us-west-2\n",
        );
        let ctx = registry.resolve("billing").unwrap().build();
        assert_eq!(ctx.source(), CredentialSource::AssumedRole);
        assert_eq!(ctx.account(), Some("111122223333"));
        assert_eq!(ctx.profile(), Some("billing"));
        assert_eq!(ctx.region(), Some("us-west-2"));
    }

    #[test]
    fn aws_sso_profile_carries_account() {
        let dir = TempDir::new().unwrap();
        let registry = aws_registry(
            &dir,
            "",
            "[profile dev]\nsso_session = corp\nsso_account_id = 444455556666\nsso_role_name = ReadOnly\n",
        );
        let ctx = registry.resolve("dev").unwrap().build();
        assert_eq!(ctx.material().kind(), "delegated");
        assert_eq!(ctx.account(), Some("444455556666"));
    }

    #[test]
    fn aws_unknown_and_unresolvable() {
        let dir = TempDir::new().unwrap();
        let registry = aws_registry(&dir, "", "[profile empty]\noutput = json\n");
        assert!(matches!(
            registry.resolve("nonexistent-profile"),
            Err(AutocostError::ProfileNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("empty"),
            Err(AutocostError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn aws_missing_files_list_nothing() {
        let dir = TempDir::new().unwrap();
        let registry =
            AwsProfileRegistry::new(dir.path().join("nope"), dir.path().join("nope2"));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn ini_skips_comments_and_nested_blocks() {
        let doc = IniDocument::parse(
            "# comment\n[profile a]\nregion = us-east-1\ns3 =\n  max_concurrent_requests = 20\n; other\noutput = json\n",
        );
        let entries = doc.section("profile a").unwrap();
        assert_eq!(lookup(entries, "region"), Some("us-east-1"));
        assert_eq!(lookup(entries, "max_concurrent_requests"), None);
        assert_eq!(lookup(entries, "output"), Some("json"));
    }

    #[test]
    fn gcloud_lists_configurations_by_file_name() {
        let dir = TempDir::new().unwrap();
        let configs = dir.path().join("configurations");
        fs::create_dir_all(&configs).unwrap();
        fs::write(
            configs.join("config_prod"),
            "[core]\naccount = ops@example.com\nproject = prod-123\n\n[compute]\nregion = europe-west1\n",
        )
        .unwrap();
        fs::write(configs.join("config_default"), "[core]\nproject = sandbox\n").unwrap();
        let registry = GcloudProfileRegistry::new(dir.path().to_path_buf());

        let list = registry.list();
        let names: Vec<_> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["default", "prod"]);
        assert!(!list[0].resolvable);
        assert!(list[1].resolvable);

        let ctx = registry.resolve("prod").unwrap().build();
        assert_eq!(ctx.account(), Some("prod-123"));
        assert_eq!(ctx.region(), Some("europe-west1"));
        assert_eq!(ctx.material().public_id(), "ops@example.com");

        assert!(matches!(
            registry.resolve("missing"),
            Err(AutocostError::ProfileNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("default"),
            Err(AutocostError::InvalidCredentials { .. })
        ));
    }

    #[test]
    fn gcloud_name_cannot_leave_configurations_dir() {
        let dir = TempDir::new().unwrap();
        let configs = dir.path().join("configurations");
        fs::create_dir_all(configs.join("config_")).unwrap();
        fs::write(dir.path().join("outside"), "[core]\naccount = ops@example.com\n").unwrap();
        let registry = GcloudProfileRegistry::new(dir.path().to_path_buf());

        assert!(matches!(
            registry.resolve("/../../outside"),
            Err(AutocostError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn config_profiles_for_azure_and_datadog() {
        let azure = ConfigProfileRegistry::new(
            Provider::Azure,
            PathBuf::from("config.toml"),
            vec![
                (
                    "prod".into(),
                    ConfiguredProfile {
                        tenant_id: Some("t".into()),
                        client_id: Some("c".into()),
                        client_secret: Some("s".into()),
                        subscription_id: Some("sub-1".into()),
                        ..ConfiguredProfile::default()
                    },
                ),
                ("half".into(), ConfiguredProfile {
                    tenant_id: Some("t".into()),
                    ..ConfiguredProfile::default()
                }),
            ],
        );
        let list = azure.list();
        assert!(list[0].resolvable);
        assert!(!list[1].resolvable);
        let ctx = azure.resolve("prod").unwrap().build();
        assert_eq!(ctx.account(), Some("sub-1"));
        assert_eq!(ctx.material().public_id(), "t/c");

        let datadog = ConfigProfileRegistry::new(
            Provider::Datadog,
            PathBuf::from("config.toml"),
            vec![(
                "eu".into(),
                ConfiguredProfile {
                    api_key: Some("k".into()),
                    site: Some("datadoghq.eu".into()),
                    ..ConfiguredProfile::default()
                },
            )],
        );
        let ctx = datadog.resolve("eu").unwrap().build();
        assert_eq!(ctx.region(), Some("datadoghq.eu"));
        assert!(matches!(
            datadog.resolve("us"),
            Err(AutocostError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn role_arn_account_parsing() {
        assert_eq!(
            account_from_role_arn("arn:aws:iam::123456789012:role/X"),
            Some("123456789012")
        );
        assert_eq!(account_from_role_arn("not-an-arn"), None);
    }
}
