//! Human-readable terminal output.

use chrono::Utc;
use colored::{ColoredString, Colorize};

use crate::core::analytics::{
    AnomalyResult, AnomalyStatus, SpilloverResult, TrendBasis, TrendDirection, TrendResult,
};
use crate::core::operations::{
    CaptureResult, ConnectionResult, ContextSummary, CostAnalysis, ProfileInfo,
};
use crate::core::probe::{ProbeReport, VerdictOutcome};
use crate::core::provider::{Provider, ProviderState, ProviderStatus};
use crate::storage::credentials::SnapshotStatus;
use crate::util::format::{format_amount, format_change, format_ratio};
use crate::util::time::format_expiry;

fn state_label(state: ProviderState) -> ColoredString {
    match state {
        ProviderState::Ready => state.label().green(),
        ProviderState::Warning => state.label().yellow(),
        ProviderState::Error => state.label().red(),
        ProviderState::Disabled => state.label().dimmed(),
    }
}

fn context_line(context: &ContextSummary) -> String {
    let mut parts = vec![
        format!("{} {}", context.credential_kind, context.credential_id),
        format!("via {}", context.source),
    ];
    if let Some(profile) = &context.profile {
        parts.push(format!("profile {profile}"));
    }
    if let Some(region) = &context.region {
        parts.push(format!("region {region}"));
    }
    if let Some(account) = &context.account {
        parts.push(format!("account {account}"));
    }
    parts.push(format_expiry(context.expires_at, Utc::now()));
    parts.join(", ")
}

fn header(provider: Provider, title: &str) -> String {
    format!("{} {}\n", provider.display_name().bold(), title.dimmed())
}

// =============================================================================
// Status and connections
// =============================================================================

#[must_use]
pub fn render_statuses(statuses: &[&ProviderStatus], connections: &[ConnectionResult]) -> String {
    if statuses.is_empty() {
        return "No providers enabled. Set AUTOCOST_PROVIDERS.\n".to_string();
    }

    let mut out = String::new();
    for status in statuses {
        out.push_str(&format!(
            "{:<10} {}\n",
            status.provider.display_name().bold(),
            state_label(status.state)
        ));
        if let Some(message) = &status.error_message {
            out.push_str(&format!("  {message}\n"));
        }
        if !status.missing_config.is_empty() {
            out.push_str(&format!("  missing: {}\n", status.missing_config.join(", ")));
        }
        if !status.capabilities.is_empty() {
            out.push_str(&format!(
                "  capabilities: {}\n",
                status.capabilities.join(", ").dimmed()
            ));
        }
        if let Some(result) = connections.iter().find(|c| c.provider == status.provider) {
            match &result.error {
                None => out.push_str(&format!(
                    "  connection: {} ({} ms)\n",
                    "ok".green(),
                    result.duration_ms
                )),
                Some(error) => out.push_str(&format!("  connection: {} {error}\n", "failed".red())),
            }
        }
    }
    out
}

// =============================================================================
// Profiles and sessions
// =============================================================================

#[must_use]
pub fn render_profiles(provider: Provider, profiles: &[ProfileInfo]) -> String {
    let mut out = header(provider, "profiles");
    if profiles.is_empty() {
        out.push_str("  (none found)\n");
        return out;
    }
    for profile in profiles {
        let marker = if profile.current { "*".green() } else { " ".normal() };
        let name = profile.name.as_deref().unwrap_or("-");
        let name = if profile.resolvable {
            name.normal()
        } else {
            name.dimmed()
        };
        out.push_str(&format!("{marker} {name:<24}"));
        if let Some(source) = &profile.source {
            out.push_str(&format!(" {}", source.dimmed()));
        }
        if let Some(issue) = &profile.issue {
            out.push_str(&format!(" ({})", issue.yellow()));
        }
        out.push('\n');
    }
    out
}

#[must_use]
pub fn render_profile_info(info: &ProfileInfo) -> String {
    let title = match (&info.name, info.current) {
        (Some(name), true) => format!("profile {name} (current)"),
        (Some(name), false) => format!("profile {name}"),
        (None, true) => "current context".to_string(),
        (None, false) => "no context".to_string(),
    };
    let mut out = header(info.provider, &title);
    if let Some(context) = &info.context {
        out.push_str(&format!("  {}\n", context_line(context)));
        out.push_str(&format!("  fingerprint {}\n", context.fingerprint.dimmed()));
    }
    if let Some(source) = info.source.as_ref().filter(|_| info.context.is_none()) {
        out.push_str(&format!("  source {source}\n"));
    }
    if let Some(issue) = &info.issue {
        out.push_str(&format!("  {}\n", issue.yellow()));
    }
    out
}

#[must_use]
pub fn render_context(context: &ContextSummary) -> String {
    format!(
        "{} now using {}\n",
        context.provider.display_name().bold(),
        context_line(context)
    )
}

#[must_use]
pub fn render_capture(capture: &CaptureResult) -> String {
    format!(
        "Captured {} session to {}\n  {}\n",
        capture.context.provider.display_name().bold(),
        capture.path,
        context_line(&capture.context)
    )
}

#[must_use]
pub fn render_snapshot_status(status: &SnapshotStatus) -> String {
    let state = if !status.present {
        "none".dimmed()
    } else if status.valid {
        "valid".green()
    } else if status.expired {
        "expired".yellow()
    } else {
        "unreadable".red()
    };
    let mut out = format!(
        "{:<10} {state}\n",
        status.provider.display_name().bold()
    );
    if status.present {
        if let Some(source) = status.captured_from {
            out.push_str(&format!("  captured from {source}\n"));
        }
        if let Some(saved_at) = status.saved_at {
            out.push_str(&format!("  saved {}\n", saved_at.format("%Y-%m-%d %H:%M UTC")));
        }
        out.push_str(&format!("  {}\n", format_expiry(status.expires_at, Utc::now())));
    }
    out.push_str(&format!("  {}\n", status.path.display().to_string().dimmed()));
    out
}

#[must_use]
pub fn render_cleared(provider: Provider, removed: bool) -> String {
    if removed {
        format!("Cleared captured {} session\n", provider.display_name())
    } else {
        format!("No captured {} session\n", provider.display_name())
    }
}

// =============================================================================
// Permissions
// =============================================================================

#[must_use]
pub fn render_probe(report: &ProbeReport) -> String {
    let mut out = header(report.provider, "permissions");
    for verdict in &report.verdicts {
        let outcome = match verdict.outcome {
            VerdictOutcome::Allowed => verdict.outcome.label().green(),
            VerdictOutcome::Denied => verdict.outcome.label().red(),
            VerdictOutcome::Indeterminate => verdict.outcome.label().yellow(),
        };
        out.push_str(&format!(
            "  {:<22} {:<14} {}",
            verdict.capability,
            outcome,
            verdict.operation.dimmed()
        ));
        if let Some(detail) = &verdict.detail {
            out.push_str(&format!("\n    {detail}"));
        }
        out.push('\n');
    }
    out
}

// =============================================================================
// Analytics
// =============================================================================

fn analysis_header<T>(analysis: &CostAnalysis<T>, title: &str) -> String {
    let mut out = header(analysis.provider, title);
    out.push_str(&format!(
        "  {} to {} ({} records), {}\n",
        analysis.start,
        analysis.end.pred_opt().unwrap_or(analysis.end),
        analysis.records,
        context_line(&analysis.context).dimmed()
    ));
    out
}

#[must_use]
pub fn render_trend(analysis: &CostAnalysis<TrendResult>) -> String {
    let result = &analysis.result;
    let currency = result.currency.as_deref();
    let mut out = analysis_header(analysis, "cost trend");

    let direction = match result.direction {
        TrendDirection::Rising => result.direction.label().red().bold(),
        TrendDirection::Falling => result.direction.label().green().bold(),
        TrendDirection::Stable => result.direction.label().normal(),
    };
    out.push_str(&format!("  direction   {direction}\n"));
    out.push_str(&format!(
        "  latest      {} on {}\n",
        format_amount(result.latest_value, currency),
        result.latest_day
    ));
    out.push_str(&format!(
        "  baseline    {} ({}-day average)\n",
        format_amount(result.baseline, currency),
        result.window
    ));
    if let Some(change) = result.relative_change {
        out.push_str(&format!(
            "  change      {} (threshold {})\n",
            format_change(change),
            format_ratio(result.threshold)
        ));
    }
    if let Some(wow) = result.window_over_window {
        out.push_str(&format!("  window/window {}\n", format_change(wow)));
    }
    if result.basis == TrendBasis::WindowOverWindow {
        out.push_str("  direction from window/window change\n");
    }
    out
}

#[must_use]
pub fn render_anomalies(analysis: &CostAnalysis<AnomalyResult>) -> String {
    let result = &analysis.result;
    let currency = result.currency.as_deref();
    let mut out = analysis_header(analysis, "cost anomalies");
    out.push_str(&format!(
        "  reference from {}, current from {} through {}\n",
        result.reference_start, result.current_start, result.as_of
    ));
    if result.findings.is_empty() {
        out.push_str("  (no keys)\n");
        return out;
    }

    for finding in &result.findings {
        let status = match finding.status {
            AnomalyStatus::AnomalousHigh => finding.status.label().red().bold(),
            AnomalyStatus::AnomalousLow => finding.status.label().yellow().bold(),
            AnomalyStatus::Normal => finding.status.label().green(),
            AnomalyStatus::Indeterminate => finding.status.label().dimmed(),
        };
        out.push_str(&format!(
            "  {:<36} {:<16} {}",
            finding.key.to_string(),
            status,
            format_amount(finding.current, currency)
        ));
        match (finding.baseline, finding.deviation) {
            (Some(baseline), Some(deviation)) => out.push_str(&format!(
                " vs {} ({})",
                format_amount(baseline, currency),
                format_change(deviation)
            )),
            (Some(baseline), None) => {
                out.push_str(&format!(" vs {}", format_amount(baseline, currency)));
            }
            _ => out.push_str(&format!(
                " ({} reference days)",
                finding.reference_observations
            )),
        }
        out.push('\n');
    }
    out
}

#[must_use]
pub fn render_spillover(analysis: &CostAnalysis<SpilloverResult>) -> String {
    let result = &analysis.result;
    let currency = result.currency.as_deref();
    let mut out = analysis_header(analysis, "spillover");
    out.push_str(&format!(
        "  dependent baseline {}\n",
        format_amount(result.dependent_baseline, currency)
    ));

    for period in &result.periods {
        out.push_str(&format!(
            "  {}  {} ({})",
            period.day,
            format_amount(period.dependent_value, currency),
            format_amount(period.dependent_delta, currency)
        ));
        if !period.any_measurable() {
            out.push_str(&format!(" {}", "no trigger moved".dimmed()));
        }
        out.push('\n');
        for share in period.shares.iter().filter(|s| s.measurable) {
            out.push_str(&format!(
                "      {:<32} {}\n",
                share.key.to_string(),
                format_amount(share.attributed, currency)
            ));
        }
    }

    out.push_str(&format!("  {}\n", "totals".bold()));
    for (key, total) in &result.totals {
        out.push_str(&format!(
            "    {:<32} {}\n",
            key.to_string(),
            format_amount(*total, currency)
        ));
    }
    out
}
