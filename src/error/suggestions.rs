//! Fix suggestion database for autocost errors.
//!
//! Provides actionable fix suggestions mapped to specific error types,
//! including commands, context explanations, and prevention tips.

// =============================================================================
// Fix Suggestion Types
// =============================================================================

/// A fix suggestion for an error.
///
/// Contains actionable information to help users resolve errors.
#[derive(Debug, Clone)]
pub struct FixSuggestion {
    /// Primary fix commands in order of preference.
    /// These should be copy-paste ready for the terminal.
    pub commands: Vec<String>,

    /// Explanation of why this error occurred and what to do about it.
    pub context: String,

    /// Tips to prevent this error in the future.
    pub prevention: Option<String>,

    /// Link to documentation for more information.
    pub doc_url: Option<String>,
}

impl FixSuggestion {
    /// Creates a new fix suggestion with required fields.
    #[must_use]
    pub fn new(commands: Vec<String>, context: impl Into<String>) -> Self {
        Self {
            commands,
            context: context.into(),
            prevention: None,
            doc_url: None,
        }
    }

    /// Builder: adds prevention tips.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = Some(prevention.into());
        self
    }

    /// Builder: adds documentation URL.
    #[must_use]
    pub fn with_doc_url(mut self, url: impl Into<String>) -> Self {
        self.doc_url = Some(url.into());
        self
    }
}

// =============================================================================
// Provider Helpers
// =============================================================================

/// Returns the provider-native login commands for a provider.
#[must_use]
pub fn login_commands_for_provider(provider: &str) -> Vec<String> {
    match provider {
        "aws" => vec![
            "aws configure".to_string(),
            "aws sso login --profile <name>".to_string(),
        ],
        "gcp" => vec![
            "gcloud auth application-default login".to_string(),
            "gcloud config configurations activate <name>".to_string(),
        ],
        "azure" => vec!["az login".to_string()],
        "datadog" => vec!["export DATADOG_API_KEY=<key> DATADOG_APP_KEY=<app-key>".to_string()],
        _ => Vec::new(),
    }
}

/// Returns the documentation URL for a provider's credential setup.
#[must_use]
pub fn credential_doc_for_provider(provider: &str) -> Option<String> {
    let url = match provider {
        "aws" => "https://docs.aws.amazon.com/cli/latest/userguide/cli-configure-files.html",
        "gcp" => "https://cloud.google.com/docs/authentication/application-default-credentials",
        "azure" => "https://learn.microsoft.com/cli/azure/authenticate-azure-cli",
        "datadog" => "https://docs.datadoghq.com/account_management/api-app-keys/",
        _ => return None,
    };
    Some(url.to_string())
}

fn with_provider_doc(suggestion: FixSuggestion, provider: &str) -> FixSuggestion {
    match credential_doc_for_provider(provider) {
        Some(url) => suggestion.with_doc_url(url),
        None => suggestion,
    }
}

// =============================================================================
// Authentication Suggestions
// =============================================================================

/// Generates fix suggestions for providers without any usable context.
#[must_use]
pub fn auth_not_configured_suggestions(provider: &str) -> Vec<FixSuggestion> {
    let mut commands = vec![
        format!("autocost profiles list --provider {provider}"),
        format!("autocost probe --provider {provider} --profile <name>"),
    ];
    commands.extend(login_commands_for_provider(provider));
    vec![with_provider_doc(
        FixSuggestion::new(
            commands,
            format!(
                "No credentials found for {provider}. Configure a profile, export \
                 the provider's credential variables, or run `autocost session capture` \
                 after logging in."
            ),
        ),
        provider,
    )]
}

/// Generates fix suggestions for expired credentials.
#[must_use]
pub fn auth_expired_suggestions(provider: &str) -> Vec<FixSuggestion> {
    let mut commands = login_commands_for_provider(provider);
    commands.push(format!("autocost session capture --provider {provider}"));
    vec![
        FixSuggestion::new(
            commands,
            format!(
                "The credentials for {provider} have expired. Log in again with the \
                 provider tooling and re-run `autocost session capture`."
            ),
        )
        .with_prevention(
            "Temporary credentials expire; prefer a named profile that the provider SDK \
             can refresh on its own.",
        ),
    ]
}

/// Generates fix suggestions for rejected credentials.
#[must_use]
pub fn invalid_credentials_suggestions(
    provider: &str,
    profile: Option<&str>,
    reason: &str,
) -> Vec<FixSuggestion> {
    let which = profile.map_or_else(
        || "the current credentials".to_string(),
        |p| format!("profile '{p}'"),
    );
    vec![with_provider_doc(
        FixSuggestion::new(
            vec![
                format!("autocost profiles info --provider {provider}"),
                format!("autocost session clear --provider {provider}"),
            ],
            format!(
                "{provider} rejected {which}: {reason}. Check the keys in the profile \
                 source or switch to another profile."
            ),
        ),
        provider,
    )]
}

/// Generates fix suggestions for unknown profiles.
#[must_use]
pub fn profile_not_found_suggestions(provider: &str, profile: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("autocost profiles list --provider {provider}")],
        format!(
            "Profile '{profile}' is not declared for {provider}. List the available \
             profiles and switch to one of them."
        ),
    )]
}

// =============================================================================
// Provider Suggestions
// =============================================================================

/// Generates fix suggestions for permission failures.
#[must_use]
pub fn insufficient_permission_suggestions(provider: &str, operation: &str) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![
                format!("autocost probe --provider {provider}"),
                format!("autocost profiles list --provider {provider}"),
            ],
            format!("switch to a profile with {operation} permission"),
        )
        .with_prevention(format!(
            "Run `autocost probe --provider {provider}` after switching to see the \
             full permission surface of the new context."
        )),
    ]
}

/// Generates fix suggestions for unreachable providers.
#[must_use]
pub fn provider_unavailable_suggestions(provider: &str, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["autocost status --test".to_string()],
        format!("{provider} could not be reached ({message}). Retry once the provider is reachable."),
    )]
}

/// Generates fix suggestions for timeouts.
#[must_use]
pub fn timeout_suggestions(provider: &str, seconds: u64) -> Vec<FixSuggestion> {
    vec![
        FixSuggestion::new(
            vec![format!(
                "autocost --probe-timeout {} probe --provider {provider}",
                seconds * 2
            )],
            format!("{provider} did not respond within {seconds}s. Retry with a longer timeout."),
        )
        .with_prevention("Set a larger per-check timeout in the config file."),
    ]
}

// =============================================================================
// Configuration Suggestions
// =============================================================================

/// Generates fix suggestions for config parse errors.
#[must_use]
pub fn config_parse_suggestions(path: &str, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!("$EDITOR {path}")],
        format!("The file at {path} could not be parsed: {message}. Fix the syntax or remove the file."),
    )]
}

/// Generates fix suggestions for invalid config values.
#[must_use]
pub fn config_invalid_suggestions(key: &str, value: &str, message: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        Vec::new(),
        format!("The value '{value}' for '{key}' is invalid: {message}."),
    )]
}

/// Generates fix suggestions for unknown provider names.
#[must_use]
pub fn invalid_provider_suggestions(name: &str) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec!["autocost status".to_string()],
        format!(
            "'{name}' is not an enabled provider. Valid names are aws, gcp, azure and \
             datadog; enable them with AUTOCOST_PROVIDERS."
        ),
    )]
}

// =============================================================================
// Analysis Suggestions
// =============================================================================

/// Generates fix suggestions for analytics run on too little data.
#[must_use]
pub fn insufficient_data_suggestions(
    analysis: &str,
    required: usize,
    found: usize,
) -> Vec<FixSuggestion> {
    vec![FixSuggestion::new(
        vec![format!(
            "autocost {analysis} --{} {}",
            if analysis == "anomalies" { "reference-days" } else { "days" },
            required.max(found + 1)
        )],
        format!(
            "{analysis} needs at least {required} daily periods but only {found} were \
             returned. Widen the look-back window or shrink the analysis window."
        ),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_configured_mentions_session_capture() {
        let suggestions = auth_not_configured_suggestions("aws");
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].context.contains("autocost session capture"));
        assert!(suggestions[0].commands.iter().any(|c| c == "aws configure"));
        assert!(suggestions[0].doc_url.is_some());
    }

    #[test]
    fn permission_suggestion_names_operation() {
        let suggestions = insufficient_permission_suggestions("aws", "ce:GetCostAndUsage");
        assert_eq!(
            suggestions[0].context,
            "switch to a profile with ce:GetCostAndUsage permission"
        );
        assert!(suggestions[0].prevention.is_some());
    }

    #[test]
    fn unknown_provider_has_no_login_commands() {
        assert!(login_commands_for_provider("oracle").is_empty());
        assert!(credential_doc_for_provider("oracle").is_none());
    }

    #[test]
    fn insufficient_data_suggests_wider_window() {
        let suggestions = insufficient_data_suggestions("trend", 29, 10);
        assert_eq!(suggestions[0].commands, vec!["autocost trend --days 29"]);
    }
}
