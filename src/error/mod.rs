//! Error types for autocost.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into six main categories:
//! - **Authentication**: no usable context, expired or rejected credentials
//! - **Network**: provider unreachable or timed out
//! - **Configuration**: config file, snapshot, or profile problems
//! - **Provider**: permission failures and API errors surfaced by provider calls
//! - **Analysis**: analytics given too little or inconsistent data
//! - **Internal**: unexpected errors, bugs, or unclassified issues
//!
//! Each error has a stable error code (e.g., `ACST-A001`) for programmatic handling,
//! and [`AutocostError::fix_suggestions()`] names the corrective action.

pub mod suggestions;

use thiserror::Error;

pub use suggestions::FixSuggestion;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Authentication issues (missing, expired, or rejected credentials).
    Authentication,
    /// Network issues (timeout, provider unreachable).
    Network,
    /// Configuration issues (parse errors, invalid values, unknown profiles).
    Configuration,
    /// Provider-specific issues (permissions, API errors).
    Provider,
    /// Analytics issues (insufficient or inconsistent input data).
    Analysis,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Provider => "Provider error",
            Self::Analysis => "Analysis error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Authentication => "A",
            Self::Network => "N",
            Self::Configuration => "C",
            Self::Provider => "P",
            Self::Analysis => "D",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// No usable credentials for the provider
    AuthError = 2,
    /// Configuration, profile or input errors
    ConfigError = 3,
    /// Timeout or provider unreachable
    Unavailable = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for autocost operations.
#[derive(Error, Debug)]
pub enum AutocostError {
    // ==========================================================================
    // Authentication errors (Category: Authentication)
    // ==========================================================================
    /// No usable authentication context exists for the provider.
    #[error("no usable credentials for {provider}")]
    AuthNotConfigured { provider: String },

    /// Authentication material has expired.
    #[error("credentials for {provider} expired")]
    AuthExpired { provider: String },

    /// The context resolved but the provider rejected it.
    #[error("invalid credentials for {provider}{}: {reason}", profile_suffix(.profile.as_deref()))]
    InvalidCredentials {
        provider: String,
        profile: Option<String>,
        reason: String,
    },

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Named profile does not exist in the provider's profile sources.
    #[error("profile '{profile}' not found for {provider}")]
    ProfileNotFound { provider: String, profile: String },

    /// Error parsing a configuration file or stored snapshot.
    #[error("parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration or an operation request.
    #[error("invalid value for '{key}': {message}")]
    ConfigInvalid {
        key: String,
        value: String,
        message: String,
    },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unknown or unregistered provider name.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),

    // ==========================================================================
    // Provider errors (Category: Provider)
    // ==========================================================================
    /// Provider call rejected for lack of permission.
    #[error("{provider} denied '{operation}': {message}")]
    InsufficientPermission {
        provider: String,
        operation: String,
        message: String,
    },

    /// Provider API returned an error.
    #[error("{provider} API error{}: {message}", code_suffix(.code.as_deref()))]
    ProviderApiError {
        provider: String,
        code: Option<String>,
        message: String,
    },

    // ==========================================================================
    // Network errors (Category: Network)
    // ==========================================================================
    /// Provider unreachable.
    #[error("provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Provider call timed out.
    #[error("request to {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    // ==========================================================================
    // Analysis errors (Category: Analysis)
    // ==========================================================================
    /// Too few periods for the requested algorithm.
    #[error("insufficient data for {analysis}: need {required} daily periods, found {found}")]
    InsufficientData {
        analysis: String,
        required: usize,
        found: usize,
    },

    /// Records violate an input invariant (mixed currency, bad period).
    #[error("invalid cost records: {0}")]
    InvalidRecords(String),

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn profile_suffix(profile: Option<&str>) -> String {
    profile.map(|p| format!(" (profile '{p}')")).unwrap_or_default()
}

fn code_suffix(code: Option<&str>) -> String {
    code.map(|c| format!(" [{c}]")).unwrap_or_default()
}

impl AutocostError {
    /// Map error to a process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::AuthNotConfigured { .. }
            | Self::AuthExpired { .. }
            | Self::InvalidCredentials { .. } => ExitCode::AuthError,

            Self::ProfileNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::InvalidProvider(_)
            | Self::InsufficientData { .. }
            | Self::InvalidRecords(_) => ExitCode::ConfigError,

            Self::ProviderUnavailable { .. } | Self::Timeout { .. } => ExitCode::Unavailable,

            Self::InsufficientPermission { .. }
            | Self::ProviderApiError { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthNotConfigured { .. }
            | Self::AuthExpired { .. }
            | Self::InvalidCredentials { .. } => ErrorCategory::Authentication,

            Self::ProviderUnavailable { .. } | Self::Timeout { .. } => ErrorCategory::Network,

            Self::ProfileNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::InvalidProvider(_) => ErrorCategory::Configuration,

            Self::InsufficientPermission { .. } | Self::ProviderApiError { .. } => {
                ErrorCategory::Provider
            }

            Self::InsufficientData { .. } | Self::InvalidRecords(_) => ErrorCategory::Analysis,

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `ACST-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AuthNotConfigured { .. } => "ACST-A001",
            Self::AuthExpired { .. } => "ACST-A002",
            Self::InvalidCredentials { .. } => "ACST-A003",

            Self::ProviderUnavailable { .. } => "ACST-N001",
            Self::Timeout { .. } => "ACST-N002",

            Self::ProfileNotFound { .. } => "ACST-C001",
            Self::ConfigParse { .. } => "ACST-C002",
            Self::ConfigInvalid { .. } => "ACST-C003",
            Self::Config(_) => "ACST-C004",
            Self::InvalidProvider(_) => "ACST-C010",

            Self::InsufficientPermission { .. } => "ACST-P001",
            Self::ProviderApiError { .. } => "ACST-P002",

            Self::InsufficientData { .. } => "ACST-D001",
            Self::InvalidRecords(_) => "ACST-D002",

            Self::Io(_) => "ACST-X001",
            Self::Json(_) => "ACST-X002",
            Self::Other(_) => "ACST-X099",
        }
    }

    /// Returns whether the caller may reasonably retry the same call.
    ///
    /// Nothing in autocost retries automatically; this only informs callers.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable { .. } | Self::Timeout { .. }
        )
    }

    /// Returns the provider name if this error is provider-specific.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::AuthNotConfigured { provider }
            | Self::AuthExpired { provider }
            | Self::InvalidCredentials { provider, .. }
            | Self::ProfileNotFound { provider, .. }
            | Self::InsufficientPermission { provider, .. }
            | Self::ProviderApiError { provider, .. }
            | Self::ProviderUnavailable { provider, .. }
            | Self::Timeout { provider, .. } => Some(provider),
            Self::InvalidProvider(p) => Some(p),
            _ => None,
        }
    }

    /// Returns actionable fix suggestions for this error.
    #[must_use]
    pub fn fix_suggestions(&self) -> Vec<FixSuggestion> {
        match self {
            Self::AuthNotConfigured { provider } => {
                suggestions::auth_not_configured_suggestions(provider)
            }
            Self::AuthExpired { provider } => suggestions::auth_expired_suggestions(provider),
            Self::InvalidCredentials {
                provider,
                profile,
                reason,
            } => suggestions::invalid_credentials_suggestions(provider, profile.as_deref(), reason),
            Self::ProfileNotFound { provider, profile } => {
                suggestions::profile_not_found_suggestions(provider, profile)
            }
            Self::InsufficientPermission {
                provider,
                operation,
                ..
            } => suggestions::insufficient_permission_suggestions(provider, operation),
            Self::ProviderUnavailable { provider, message } => {
                suggestions::provider_unavailable_suggestions(provider, message)
            }
            Self::Timeout { provider, seconds } => {
                suggestions::timeout_suggestions(provider, *seconds)
            }
            Self::InsufficientData {
                analysis,
                required,
                found,
            } => suggestions::insufficient_data_suggestions(analysis, *required, *found),
            Self::ConfigParse { path, message } => {
                suggestions::config_parse_suggestions(path, message)
            }
            Self::ConfigInvalid { key, value, message } => {
                suggestions::config_invalid_suggestions(key, value, message)
            }
            Self::InvalidProvider(name) => suggestions::invalid_provider_suggestions(name),
            Self::ProviderApiError { provider, message, .. } => vec![FixSuggestion::new(
                vec![format!("autocost probe --provider {provider}")],
                format!("{provider} returned an error: {message}"),
            )],
            Self::Config(msg) => vec![FixSuggestion::new(
                vec!["autocost status".to_string()],
                format!("Configuration error: {msg}"),
            )],
            Self::InvalidRecords(msg) => vec![FixSuggestion::new(
                Vec::new(),
                format!("The fetched cost records cannot be analyzed together: {msg}"),
            )],
            Self::Io(_) | Self::Json(_) | Self::Other(_) => Vec::new(),
        }
    }

    /// Human-readable message naming the provider and the corrective action.
    #[must_use]
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        if let Some(first) = self.fix_suggestions().first() {
            message.push_str(". ");
            message.push_str(&first.context);
        }
        message
    }
}

/// Result type alias for autocost operations.
pub type Result<T> = std::result::Result<T, AutocostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_prefixed_by_category() {
        let errors = [
            AutocostError::AuthNotConfigured {
                provider: "aws".into(),
            },
            AutocostError::ProfileNotFound {
                provider: "aws".into(),
                profile: "x".into(),
            },
            AutocostError::Timeout {
                provider: "gcp".into(),
                seconds: 5,
            },
            AutocostError::InsufficientData {
                analysis: "trend".into(),
                required: 29,
                found: 3,
            },
        ];
        for err in &errors {
            let code = err.error_code();
            let prefix = err.category().code_prefix();
            assert!(
                code.starts_with(&format!("ACST-{prefix}")),
                "{code} should carry prefix {prefix}"
            );
        }
    }

    #[test]
    fn invalid_credentials_message_names_profile() {
        let err = AutocostError::InvalidCredentials {
            provider: "aws".into(),
            profile: Some("billing".into()),
            reason: "ExpiredToken".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid credentials for aws (profile 'billing'): ExpiredToken"
        );
        assert_eq!(err.exit_code(), ExitCode::AuthError);
    }

    #[test]
    fn user_message_includes_corrective_action() {
        let err = AutocostError::InsufficientPermission {
            provider: "aws".into(),
            operation: "ce:GetCostAndUsage".into(),
            message: "AccessDenied".into(),
        };
        let message = err.user_message();
        assert!(message.contains("aws"));
        assert!(message.contains("switch to a profile"));
    }

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(
            AutocostError::Timeout {
                provider: "aws".into(),
                seconds: 10
            }
            .is_retryable()
        );
        assert!(
            !AutocostError::ProfileNotFound {
                provider: "aws".into(),
                profile: "p".into()
            }
            .is_retryable()
        );
    }
}
