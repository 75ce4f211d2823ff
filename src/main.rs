//! autocost - cloud cost analysis with provider credential management
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use autocost::cli::{Cli, commands};
use autocost::core::ProviderManager;
use autocost::core::logging::{self, LogOptions};
use autocost::render::OutputOptions;
use autocost::render::error::render_error;
use autocost::storage::{AppPaths, Settings};
use autocost::util::EnvSnapshot;
use autocost::util::env::should_use_color;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = EnvSnapshot::capture();

    logging::init(&LogOptions::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        cli.verbose,
        &env,
    ));

    if !should_use_color(cli.no_color, &env) {
        colored::control::set_override(false);
    }

    let output = OutputOptions {
        format: cli.effective_format(),
        pretty: cli.pretty,
    };

    match run(cli, &env, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            eprintln!("{}", render_error(&e, output.format, output.pretty));
            let code: i32 = e.exit_code().into();
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(mut cli: Cli, env: &EnvSnapshot, output: OutputOptions) -> autocost::Result<()> {
    let Some(command) = cli.command.take() else {
        print_quickstart();
        return Ok(());
    };

    let settings = Settings::resolve(&cli.overrides()?, env, &AppPaths::new())?;
    let manager = ProviderManager::from_environment(settings, env).await?;
    let rendered = commands::execute(&manager, command, output).await?;
    print!("{rendered}");
    Ok(())
}

/// Print quickstart help when no command is given.
fn print_quickstart() {
    println!(
        r"autocost - cloud cost analysis with provider credential management

USAGE:
    autocost [OPTIONS] <COMMAND>

COMMANDS:
    status          Show provider readiness
    profiles        List, inspect, reset or assume profiles
    probe           Check which read-only capabilities are allowed
    trend           Classify the rolling cost trend
    anomalies       Detect per-key cost anomalies
    spillover       Attribute dependent cost changes to trigger keys
    session         Capture, inspect or clear the saved session

QUICK START:
    autocost status --test                      # Check every enabled provider
    autocost profiles list --provider aws       # Named AWS profiles
    autocost trend --provider aws --days 29     # 28-day rolling trend
    autocost anomalies --provider aws           # Today against the last 14 days

ROBOT MODE (for scripts and agents):
    autocost status --json

For more help: autocost --help
"
    );
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
}
