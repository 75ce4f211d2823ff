//! CLI argument definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::models::{DimensionKey, DimensionKind};
use crate::core::provider::Provider;
use crate::error::Result;
use crate::storage::config::CliOverrides;

/// Autocost - multi-cloud cost analysis with provider credential management.
#[derive(Parser, Debug)]
#[command(name = "autocost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Comma-separated providers to enable (overrides AUTOCOST_PROVIDERS)
    #[arg(long, value_name = "LIST", global = true)]
    pub providers: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Root directory of billing exports
    #[arg(long, value_name = "DIR", global = true)]
    pub export_dir: Option<PathBuf>,

    /// Timeout for each capability check in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub probe_timeout: Option<u64>,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }

    /// Global flags that feed settings resolution.
    pub fn overrides(&self) -> Result<CliOverrides> {
        Ok(CliOverrides {
            config_path: self.config.clone(),
            providers: self.providers.as_deref().map(Provider::parse_list).transpose()?,
            export_dir: self.export_dir.clone(),
            probe_timeout: self.probe_timeout.map(Duration::from_secs),
        })
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable terminal output
    #[default]
    Human,
    /// JSON for scripts and agents
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show provider readiness
    Status(StatusArgs),

    /// Inspect named profiles
    #[command(subcommand)]
    Profiles(ProfilesCommand),

    /// Probe which read-only capabilities the current credentials allow
    Probe(ProviderArgs),

    /// Classify the rolling cost trend
    Trend(TrendArgs),

    /// Detect per-key cost anomalies
    Anomalies(AnomalyArgs),

    /// Attribute dependent cost changes to trigger keys
    Spillover(SpilloverArgs),

    /// Manage the captured session snapshot
    #[command(subcommand)]
    Session(SessionCommand),
}

/// Provider selection shared by provider commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ProviderArgs {
    /// Provider (defaults to the first enabled provider)
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Switch to this profile before running
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,
}

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also test connectivity of every enabled provider
    #[arg(long)]
    pub test: bool,
}

/// Profile subcommands.
#[derive(Subcommand, Debug)]
pub enum ProfilesCommand {
    /// List named profiles
    List {
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
    },

    /// Show the current context, or a named profile without switching to it
    Info {
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,

        /// Profile name (defaults to the current context)
        name: Option<String>,
    },

    /// Switch back to the startup profile
    Reset {
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
    },

    /// Assume the cross-account role in another account (AWS only)
    AssumeRole {
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,

        /// Target account ID
        account_id: String,
    },
}

/// Captured-session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Save the current context as the captured session
    Capture(ProviderArgs),

    /// Show the captured session state
    Status {
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
    },

    /// Delete the captured session
    Clear {
        #[arg(long, value_name = "PROVIDER")]
        provider: Option<String>,
    },
}

/// Fetch window options shared by cost commands.
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Export dataset to read
    #[arg(long, default_value = crate::core::models::DEFAULT_DATASET)]
    pub dataset: String,

    /// Last day included (YYYY-MM-DD, defaults to today UTC)
    #[arg(long, value_name = "DATE")]
    pub as_of: Option<NaiveDate>,
}

/// Arguments for the `trend` command.
#[derive(Args, Debug)]
pub struct TrendArgs {
    #[command(flatten)]
    pub target: ProviderArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Look-back days (defaults to 2 * window + 1)
    #[arg(long)]
    pub days: Option<u32>,

    /// Rolling window in days
    #[arg(long)]
    pub window: Option<usize>,

    /// Relative change that counts as rising or falling
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Dimension to group by
    #[arg(long, default_value = "total")]
    pub group_by: DimensionKind,

    /// Only this key, e.g. service:AmazonEC2
    #[arg(long, value_name = "KIND:VALUE")]
    pub key: Option<DimensionKey>,
}

/// Arguments for the `anomalies` command.
#[derive(Args, Debug)]
pub struct AnomalyArgs {
    #[command(flatten)]
    pub target: ProviderArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Reference window in days
    #[arg(long)]
    pub reference_days: Option<u32>,

    /// Current window in days
    #[arg(long)]
    pub current_days: Option<u32>,

    /// Relative deviation that counts as anomalous
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Reference observations required for a verdict
    #[arg(long)]
    pub min_observations: Option<usize>,

    /// Dimension to group by
    #[arg(long, default_value = "service")]
    pub group_by: DimensionKind,

    /// Fail unless the cost capability probes as allowed
    #[arg(long)]
    pub require_permissions: bool,
}

/// Arguments for the `spillover` command.
#[derive(Args, Debug)]
pub struct SpilloverArgs {
    #[command(flatten)]
    pub target: ProviderArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Trigger key (repeatable), e.g. service:AmazonEC2
    #[arg(long = "trigger", value_name = "KIND:VALUE", required = true)]
    pub triggers: Vec<DimensionKey>,

    /// Dependent key, e.g. service:AWSDataTransfer
    #[arg(long, value_name = "KIND:VALUE")]
    pub dependent: DimensionKey,

    /// Look-back days (defaults to DEFAULT_ANALYSIS_DAYS)
    #[arg(long)]
    pub days: Option<u32>,

    /// Trigger deviation relative to baseline below which it did not move
    #[arg(long)]
    pub rel_tolerance: Option<f64>,

    /// Absolute trigger deviation below which it did not move
    #[arg(long)]
    pub min_abs: Option<f64>,

    /// Fail unless the cost capability probes as allowed
    #[arg(long)]
    pub require_permissions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn spillover_parses_repeated_triggers() {
        let cli = Cli::try_parse_from([
            "autocost",
            "spillover",
            "--trigger",
            "service:AmazonEC2",
            "--trigger",
            "region:us-east-1",
            "--dependent",
            "service:AWSDataTransfer",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.effective_format(), OutputFormat::Json);
        let Some(Commands::Spillover(args)) = cli.command else {
            panic!("expected spillover");
        };
        assert_eq!(args.triggers.len(), 2);
        assert_eq!(args.dependent, DimensionKey::service("AWSDataTransfer"));
    }

    #[test]
    fn bad_dimension_key_is_rejected() {
        let result = Cli::try_parse_from(["autocost", "trend", "--key", "nonsense"]);
        assert!(result.is_err());
    }

    #[test]
    fn provider_list_override() {
        let cli = Cli::try_parse_from(["autocost", "--providers", "aws,gcp", "status"]).unwrap();
        let overrides = cli.overrides().unwrap();
        assert_eq!(overrides.providers, Some(vec![Provider::Aws, Provider::Gcp]));
    }
}
