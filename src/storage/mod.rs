//! Storage for configuration, profiles, and captured sessions.

pub mod config;
pub mod credentials;
pub mod paths;
pub mod profiles;

pub use config::{
    CliOverrides, Config, ConfigSource, ConfigSources, ENV_CONFIG, ENV_PROVIDERS, Settings,
};
pub use credentials::{CredentialStore, SnapshotStatus};
pub use paths::AppPaths;
pub use profiles::{ProfileDescriptor, ProfileRegistry};
