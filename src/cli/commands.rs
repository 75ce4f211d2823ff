//! Command execution against a [`ProviderManager`].

use crate::cli::args::{
    AnomalyArgs, Commands, ProfilesCommand, ProviderArgs, SessionCommand, SpilloverArgs,
    StatusArgs, TrendArgs,
};
use crate::core::manager::ProviderManager;
use crate::core::operations::{AnomalyRequest, SpilloverRequest, TrendRequest};
use crate::core::provider::Provider;
use crate::error::{AutocostError, Result};
use crate::render::OutputOptions;
use crate::render::human;

/// Run one command and return its rendered output.
pub async fn execute(
    manager: &ProviderManager,
    command: Commands,
    output: OutputOptions,
) -> Result<String> {
    match command {
        Commands::Status(args) => status(manager, &args, output).await,
        Commands::Profiles(cmd) => profiles(manager, cmd, output).await,
        Commands::Probe(args) => probe(manager, &args, output).await,
        Commands::Trend(args) => trend(manager, args, output).await,
        Commands::Anomalies(args) => anomalies(manager, args, output).await,
        Commands::Spillover(args) => spillover(manager, args, output).await,
        Commands::Session(cmd) => session(manager, cmd, output).await,
    }
}

/// Explicit provider, else the first enabled one.
fn resolve_provider(manager: &ProviderManager, name: Option<&str>) -> Result<Provider> {
    let provider = match name {
        Some(name) => Provider::from_cli_name(name)?,
        None => manager
            .providers()
            .first()
            .copied()
            .ok_or_else(|| AutocostError::Config("no providers enabled".to_string()))?,
    };
    manager.definition(provider)?;
    Ok(provider)
}

/// Resolve the target provider and apply `--profile`.
async fn target(manager: &ProviderManager, args: &ProviderArgs) -> Result<Provider> {
    let provider = resolve_provider(manager, args.provider.as_deref())?;
    if let Some(profile) = &args.profile {
        manager.switch_profile(provider, profile).await?;
    }
    Ok(provider)
}

async fn status(
    manager: &ProviderManager,
    args: &StatusArgs,
    output: OutputOptions,
) -> Result<String> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct StatusData<'a> {
        providers: Vec<&'a crate::core::provider::ProviderStatus>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        connections: Vec<crate::core::operations::ConnectionResult>,
    }

    let connections = if args.test {
        manager.test_all_connections().await
    } else {
        Vec::new()
    };
    let data = StatusData {
        providers: manager.statuses(),
        connections,
    };
    output.render("status", &data, |d| {
        human::render_statuses(&d.providers, &d.connections)
    })
}

async fn profiles(
    manager: &ProviderManager,
    command: ProfilesCommand,
    output: OutputOptions,
) -> Result<String> {
    match command {
        ProfilesCommand::List { provider } => {
            let provider = resolve_provider(manager, provider.as_deref())?;
            let profiles = manager.profiles(provider).await?;
            output.render("profiles list", &profiles, |p| {
                human::render_profiles(provider, p)
            })
        }
        ProfilesCommand::Info { provider, name } => {
            let provider = resolve_provider(manager, provider.as_deref())?;
            let info = manager.profile_info(provider, name.as_deref()).await?;
            output.render("profiles info", &info, human::render_profile_info)
        }
        ProfilesCommand::Reset { provider } => {
            let provider = resolve_provider(manager, provider.as_deref())?;
            let context = manager.reset_profile(provider).await?;
            output.render("profiles reset", &context, human::render_context)
        }
        ProfilesCommand::AssumeRole {
            provider,
            account_id,
        } => {
            let provider = resolve_provider(manager, provider.as_deref())?;
            let context = manager.assume_role(provider, &account_id).await?;
            output.render("profiles assume-role", &context, human::render_context)
        }
    }
}

async fn probe(
    manager: &ProviderManager,
    args: &ProviderArgs,
    output: OutputOptions,
) -> Result<String> {
    let provider = target(manager, args).await?;
    let report = manager.probe(provider).await?;
    output.render("probe", &report, human::render_probe)
}

async fn trend(manager: &ProviderManager, args: TrendArgs, output: OutputOptions) -> Result<String> {
    let provider = resolve_provider(manager, args.target.provider.as_deref())?;
    let request = TrendRequest {
        provider,
        profile: args.target.profile,
        days: args.days,
        window: args.window,
        threshold: args.threshold,
        group_by: args.group_by,
        key: args.key,
        dataset: args.fetch.dataset,
        as_of: args.fetch.as_of,
    };
    let analysis = manager.cost_trend(&request).await?;
    output.render("trend", &analysis, human::render_trend)
}

async fn anomalies(
    manager: &ProviderManager,
    args: AnomalyArgs,
    output: OutputOptions,
) -> Result<String> {
    let provider = resolve_provider(manager, args.target.provider.as_deref())?;
    let request = AnomalyRequest {
        provider,
        profile: args.target.profile,
        reference_days: args.reference_days,
        current_days: args.current_days,
        threshold: args.threshold,
        min_observations: args.min_observations,
        group_by: args.group_by,
        dataset: args.fetch.dataset,
        as_of: args.fetch.as_of,
        require_permissions: args.require_permissions,
    };
    let analysis = manager.cost_anomalies(&request).await?;
    output.render("anomalies", &analysis, human::render_anomalies)
}

async fn spillover(
    manager: &ProviderManager,
    args: SpilloverArgs,
    output: OutputOptions,
) -> Result<String> {
    let provider = resolve_provider(manager, args.target.provider.as_deref())?;
    let request = SpilloverRequest {
        provider,
        profile: args.target.profile,
        triggers: args.triggers,
        dependent: args.dependent,
        days: args.days,
        rel_tolerance: args.rel_tolerance,
        min_abs: args.min_abs,
        dataset: args.fetch.dataset,
        as_of: args.fetch.as_of,
        require_permissions: args.require_permissions,
    };
    let analysis = manager.spillover(&request).await?;
    output.render("spillover", &analysis, human::render_spillover)
}

async fn session(
    manager: &ProviderManager,
    command: SessionCommand,
    output: OutputOptions,
) -> Result<String> {
    match command {
        SessionCommand::Capture(args) => {
            let provider = target(manager, &args).await?;
            let capture = manager.capture_session(provider).await?;
            output.render("session capture", &capture, human::render_capture)
        }
        SessionCommand::Status { provider } => {
            let provider = resolve_provider(manager, provider.as_deref())?;
            let status = manager.session_status(provider)?;
            output.render("session status", &status, human::render_snapshot_status)
        }
        SessionCommand::Clear { provider } => {
            let provider = resolve_provider(manager, provider.as_deref())?;
            let removed = manager.clear_session(provider)?;
            output.render("session clear", &removed, |r| {
                human::render_cleared(provider, *r)
            })
        }
    }
}
