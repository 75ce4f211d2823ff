//! Logging setup.
//!
//! Logs go to stderr (or `AUTOCOST_LOG_FILE`) so stdout stays clean for
//! command output, including `--json`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::util::env::EnvSnapshot;

pub const LOG_LEVEL_ENV: &str = "AUTOCOST_LOG";
pub const LOG_FORMAT_ENV: &str = "AUTOCOST_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "AUTOCOST_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Log level from CLI argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Parse from CLI argument.
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "critical" => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to tracing filter string.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn as_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

/// Level from `AUTOCOST_LOG`.
#[must_use]
pub fn log_level_from_env(env: &EnvSnapshot) -> Option<LogLevel> {
    env.get(LOG_LEVEL_ENV).and_then(LogLevel::from_arg)
}

/// Format from `AUTOCOST_LOG_FORMAT`.
#[must_use]
pub fn log_format_from_env(env: &EnvSnapshot) -> Option<LogFormat> {
    env.get(LOG_FORMAT_ENV).and_then(LogFormat::from_arg)
}

/// Log file from `AUTOCOST_LOG_FILE`.
#[must_use]
pub fn log_file_from_env(env: &EnvSnapshot) -> Option<PathBuf> {
    env.path(LOG_FILE_ENV)
}

/// Resolved logging options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogOptions {
    /// Combine CLI flags with the environment; flags win.
    #[must_use]
    pub fn resolve(
        cli_level: Option<&str>,
        json: bool,
        verbose: bool,
        env: &EnvSnapshot,
    ) -> Self {
        let level = cli_level
            .and_then(LogLevel::from_arg)
            .or_else(|| log_level_from_env(env))
            .unwrap_or_default();
        let level = if verbose && matches!(level, LogLevel::Warn | LogLevel::Error) {
            LogLevel::Debug
        } else {
            level
        };
        let format = if json {
            LogFormat::Json
        } else {
            log_format_from_env(env).unwrap_or_default()
        };
        Self {
            level,
            format,
            file: log_file_from_env(env),
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(options: &LogOptions) {
    let file = options.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let make_writer = |file: Option<&std::fs::File>| -> BoxMakeWriter {
        if let Some(file) = file.and_then(|inner| inner.try_clone().ok()) {
            BoxMakeWriter::new(file)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    };

    let level = options.level;
    let make_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("autocost={}", level.as_filter())))
    };

    match options.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .json()
                .with_writer(make_writer(file.as_ref()))
                .with_span_events(FmtSpan::CLOSE)
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .compact()
                .with_writer(make_writer(file.as_ref()))
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .with_writer(make_writer(file.as_ref()))
                .with_target(false)
                .without_time()
                .try_init()
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_log_level_parsing() {
        let env = EnvSnapshot::from_pairs([(LOG_LEVEL_ENV, "trace")]);
        assert_eq!(log_level_from_env(&env), Some(LogLevel::Trace));

        let env = EnvSnapshot::from_pairs([(LOG_LEVEL_ENV, "  ")]);
        assert_eq!(log_level_from_env(&env), None);

        let env = EnvSnapshot::from_pairs([(LOG_LEVEL_ENV, "loud")]);
        assert_eq!(log_level_from_env(&env), None);
    }

    #[test]
    fn cli_flags_beat_environment() {
        let env = EnvSnapshot::from_pairs([
            (LOG_LEVEL_ENV, "error"),
            (LOG_FORMAT_ENV, "compact"),
            (LOG_FILE_ENV, "/tmp/autocost.log"),
        ]);
        let options = LogOptions::resolve(Some("info"), true, false, &env);
        assert_eq!(options.level, LogLevel::Info);
        assert_eq!(options.format, LogFormat::Json);
        assert_eq!(options.file, Some(PathBuf::from("/tmp/autocost.log")));

        let options = LogOptions::resolve(None, false, false, &env);
        assert_eq!(options.level, LogLevel::Error);
        assert_eq!(options.format, LogFormat::Compact);
    }

    #[test]
    fn verbose_raises_quiet_levels_only() {
        let env = EnvSnapshot::default();
        assert_eq!(LogOptions::resolve(None, false, true, &env).level, LogLevel::Debug);
        assert_eq!(
            LogOptions::resolve(Some("trace"), false, true, &env).level,
            LogLevel::Trace
        );
        assert_eq!(LogOptions::resolve(None, false, false, &env).level, LogLevel::Warn);
    }
}
