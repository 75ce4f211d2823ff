//! Core data models, session lifecycle, and analytics.

pub mod analytics;
pub mod client;
pub mod context;
pub mod logging;
pub mod manager;
pub mod models;
pub mod operations;
pub mod probe;
pub mod provider;
pub mod session;

pub use client::{CapabilityCheck, ClientFactory, ProviderClient};
pub use context::{AuthenticationContext, ContextFingerprint, CredentialMaterial, CredentialSource};
pub use manager::ProviderManager;
pub use models::{CostQuery, CostRecord, DimensionKey, DimensionKind};
pub use probe::{PermissionProbe, ProbeReport, VerdictOutcome};
pub use provider::{Provider, ProviderSelection, ProviderStatus};
pub use session::{ProviderBinding, SessionManager};
