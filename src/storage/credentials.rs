//! Captured session snapshots.
//!
//! One JSON file per provider at `<dir>/<provider>-session.json`, written
//! atomically (temp file + rename) and readable by the owner only.
//!
//! Loading is soft: a missing or corrupt snapshot yields `None` so start-up
//! falls through to the next credential source.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::context::{AuthenticationContext, CredentialMaterial, CredentialSource};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSnapshot {
    version: u32,
    provider: Provider,
    /// Source of the context that was captured.
    source: CredentialSource,
    material: CredentialMaterial,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    account: Option<String>,
    saved_at: DateTime<Utc>,
}

impl SessionSnapshot {
    fn from_context(context: &AuthenticationContext, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            provider: context.provider(),
            source: context.source(),
            material: context.material().clone(),
            expires_at: context.expires_at(),
            region: context.region().map(ToString::to_string),
            profile: context.profile().map(ToString::to_string),
            account: context.account().map(ToString::to_string),
            saved_at,
        }
    }

    fn into_context(self) -> AuthenticationContext {
        let mut builder = AuthenticationContext::builder(
            self.provider,
            CredentialSource::CapturedSession,
            self.material,
        )
        .established_at(self.saved_at);
        if let Some(expiry) = self.expires_at {
            builder = builder.expires_at(expiry);
        }
        if let Some(region) = self.region {
            builder = builder.region(region);
        }
        if let Some(profile) = self.profile {
            builder = builder.profile(profile);
        }
        if let Some(account) = self.account {
            builder = builder.account(account);
        }
        builder.build()
    }
}

/// Snapshot state for one provider, computed without network access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStatus {
    pub provider: Provider,
    pub present: bool,
    pub expired: bool,
    /// Present, parseable and not expired.
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Source of the captured context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_from: Option<CredentialSource>,
    pub path: PathBuf,
}

/// Filesystem store for captured sessions.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot path for a provider.
    #[must_use]
    pub fn path_for(&self, provider: Provider) -> PathBuf {
        self.dir.join(format!("{}-session.json", provider.cli_name()))
    }

    /// Persist a context, overwriting any previous snapshot.
    ///
    /// # Errors
    /// [`AutocostError::AuthExpired`] for an expired context; I/O errors otherwise.
    pub fn save(&self, context: &AuthenticationContext) -> Result<PathBuf> {
        let now = Utc::now();
        if context.is_expired_at(now) {
            return Err(AutocostError::AuthExpired {
                provider: context.provider().to_string(),
            });
        }
        let snapshot = SessionSnapshot::from_context(context, now);
        let content = serde_json::to_string_pretty(&snapshot)?;
        let path = self.path_for(context.provider());
        fs::create_dir_all(&self.dir)?;
        write_private(&path, content.as_bytes())?;
        tracing::info!(
            provider = %context.provider(),
            fingerprint = %context.fingerprint().short(),
            path = %path.display(),
            "Captured session saved"
        );
        Ok(path)
    }

    /// Load a snapshot as a captured-session context.
    ///
    /// Missing files and parse failures yield `None`. Expired snapshots are
    /// returned as-is; callers decide whether to use them.
    #[must_use]
    pub fn load(&self, provider: Provider) -> Option<AuthenticationContext> {
        self.read_snapshot(provider).map(SessionSnapshot::into_context)
    }

    fn read_snapshot(&self, provider: Provider) -> Option<SessionSnapshot> {
        let path = self.path_for(provider);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(provider = %provider, path = %path.display(), error = %e, "Failed to read session snapshot");
                return None;
            }
        };
        let snapshot: SessionSnapshot = match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(provider = %provider, path = %path.display(), error = %e, "Ignoring corrupt session snapshot");
                return None;
            }
        };
        if snapshot.version != SNAPSHOT_VERSION || snapshot.provider != provider {
            tracing::warn!(
                provider = %provider,
                version = snapshot.version,
                stored_provider = %snapshot.provider,
                "Ignoring incompatible session snapshot"
            );
            return None;
        }
        Some(snapshot)
    }

    /// Snapshot status against the wall clock.
    #[must_use]
    pub fn status(&self, provider: Provider) -> SnapshotStatus {
        self.status_at(provider, Utc::now())
    }

    /// Snapshot status against `now`.
    #[must_use]
    pub fn status_at(&self, provider: Provider, now: DateTime<Utc>) -> SnapshotStatus {
        let path = self.path_for(provider);
        let present = path.exists();
        match self.read_snapshot(provider) {
            Some(snapshot) => {
                let expired = snapshot.expires_at.is_some_and(|e| e <= now);
                SnapshotStatus {
                    provider,
                    present,
                    expired,
                    valid: !expired,
                    saved_at: Some(snapshot.saved_at),
                    expires_at: snapshot.expires_at,
                    captured_from: Some(snapshot.source),
                    path,
                }
            }
            None => SnapshotStatus {
                provider,
                present,
                expired: false,
                valid: false,
                saved_at: None,
                expires_at: None,
                captured_from: None,
                path,
            },
        }
    }

    /// Remove a provider's snapshot. Returns whether one existed.
    pub fn clear(&self, provider: Provider) -> Result<bool> {
        let path = self.path_for(provider);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(provider = %provider, "Captured session cleared");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write bytes atomically with owner-only permissions.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("session"),
        std::process::id()
    ));

    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    // mode() only applies on creation; tighten a leftover temp file too
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::Secret;
    use chrono::Duration;
    use tempfile::TempDir;

    fn aws_context(expires_at: Option<DateTime<Utc>>) -> AuthenticationContext {
        let mut builder = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Environment,
            CredentialMaterial::AccessKey {
                access_key_id: "AKIATEST".into(),
                secret_access_key: Secret::new("secret"),
                session_token: Some(Secret::new("token")),
            },
        )
        .region("us-east-1")
        .account("123456789012");
        if let Some(expiry) = expires_at {
            builder = builder.expires_at(expiry);
        }
        builder.build()
    }

    #[test]
    fn save_then_load_returns_captured_session() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        let ctx = aws_context(Some(Utc::now() + Duration::hours(1)));
        let path = store.save(&ctx).unwrap();
        assert!(path.ends_with("aws-session.json"));

        let loaded = store.load(Provider::Aws).unwrap();
        assert_eq!(loaded.source(), CredentialSource::CapturedSession);
        assert_eq!(loaded.material(), ctx.material());
        assert_eq!(loaded.region(), Some("us-east-1"));
        assert_eq!(loaded.account(), Some("123456789012"));
        assert_eq!(loaded.expires_at(), ctx.expires_at());
    }

    #[cfg(unix)]
    #[test]
    fn snapshot_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        let path = store.save(&aws_context(None)).unwrap();
        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn save_refuses_expired_context() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        let err = store
            .save(&aws_context(Some(Utc::now() - Duration::minutes(1))))
            .unwrap_err();
        assert!(matches!(err, AutocostError::AuthExpired { .. }));
        assert!(!store.path_for(Provider::Aws).exists());
    }

    #[test]
    fn load_missing_and_corrupt_is_none() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(store.load(Provider::Gcp).is_none());

        fs::write(store.path_for(Provider::Gcp), "{not json").unwrap();
        assert!(store.load(Provider::Gcp).is_none());
        let status = store.status(Provider::Gcp);
        assert!(status.present);
        assert!(!status.valid);
    }

    #[test]
    fn load_ignores_snapshot_for_other_provider() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        let path = store.save(&aws_context(None)).unwrap();
        fs::copy(&path, store.path_for(Provider::Gcp)).unwrap();
        assert!(store.load(Provider::Gcp).is_none());
    }

    #[test]
    fn status_reports_expiry_against_clock() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        let expiry = Utc::now() + Duration::hours(1);
        store.save(&aws_context(Some(expiry))).unwrap();

        let now = store.status(Provider::Aws);
        assert!(now.present && now.valid && !now.expired);
        assert_eq!(now.captured_from, Some(CredentialSource::Environment));

        let later = store.status_at(Provider::Aws, expiry + Duration::seconds(1));
        assert!(later.expired);
        assert!(!later.valid);
    }

    #[test]
    fn clear_removes_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&aws_context(None)).unwrap();
        assert!(store.clear(Provider::Aws).unwrap());
        assert!(!store.clear(Provider::Aws).unwrap());
        assert!(!store.status(Provider::Aws).present);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&aws_context(None)).unwrap();
        let second = AuthenticationContext::builder(
            Provider::Aws,
            CredentialSource::Profile,
            CredentialMaterial::Delegated {
                mechanism: "sso".into(),
            },
        )
        .profile("billing")
        .build();
        store.save(&second).unwrap();
        let loaded = store.load(Provider::Aws).unwrap();
        assert_eq!(loaded.profile(), Some("billing"));
        assert_eq!(loaded.material().kind(), "delegated");
    }
}
