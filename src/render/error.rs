//! Error rendering.
//!
//! Human mode prints the message, error code and the first fix command;
//! JSON mode emits a structured object on stderr for machine consumption.

use colored::Colorize;
use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::error::AutocostError;

/// Render an error for the chosen output format.
#[must_use]
pub fn render_error(error: &AutocostError, format: OutputFormat, pretty: bool) -> String {
    match format {
        OutputFormat::Json => render_error_json(error, pretty),
        OutputFormat::Human => render_human(error),
    }
}

fn render_human(error: &AutocostError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines = vec![format!(
        "{} [{}]: {}",
        "Error".red().bold(),
        error.error_code(),
        error
    )];

    if let Some(suggestion) = suggestions.first() {
        if !suggestion.context.is_empty() {
            lines.push(suggestion.context.clone());
        }
        if let Some(cmd) = suggestion.commands.iter().find(|c| !c.starts_with('#')) {
            lines.push(format!("{} {}", "Fix:".bold(), cmd));
        }
        if let Some(prevention) = &suggestion.prevention {
            lines.push(format!("{} {prevention}", "Tip:".dimmed()));
        }
    }

    lines.join("\n")
}

/// JSON representation of an error for machine consumption.
#[derive(Serialize)]
struct ErrorJson {
    error_code: &'static str,
    category: String,
    message: String,
    is_retryable: bool,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    suggestions: Vec<SuggestionJson>,
}

#[derive(Serialize)]
struct SuggestionJson {
    commands: Vec<String>,
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prevention: Option<String>,
}

impl ErrorJson {
    fn from_error(error: &AutocostError) -> Self {
        Self {
            error_code: error.error_code(),
            category: error.category().to_string(),
            message: error.to_string(),
            is_retryable: error.is_retryable(),
            exit_code: error.exit_code().into(),
            provider: error.provider().map(String::from),
            suggestions: error
                .fix_suggestions()
                .into_iter()
                .map(|s| SuggestionJson {
                    commands: s.commands,
                    context: s.context,
                    prevention: s.prevention,
                })
                .collect(),
        }
    }
}

/// Render an error as structured JSON.
#[must_use]
pub fn render_error_json(error: &AutocostError, pretty: bool) -> String {
    let json = ErrorJson::from_error(error);
    let rendered = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    rendered.unwrap_or_else(|_| format!("Error [{}]: {error}", error.error_code()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_carries_code_and_provider() {
        let error = AutocostError::ProfileNotFound {
            provider: "aws".into(),
            profile: "nonexistent-profile".into(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&render_error_json(&error, false)).unwrap();
        assert_eq!(json["error_code"], "ACST-C001");
        assert_eq!(json["provider"], "aws");
        assert_eq!(json["exit_code"], 3);
        assert!(json["suggestions"].as_array().is_some_and(|s| !s.is_empty()));
    }

    #[test]
    fn human_error_names_the_fix() {
        colored::control::set_override(false);
        let error = AutocostError::AuthNotConfigured {
            provider: "aws".into(),
        };
        let text = render_error(&error, OutputFormat::Human, false);
        assert!(text.starts_with("Error [ACST-A001]: no usable credentials for aws"));
        assert!(text.contains("Fix:"));
    }
}
