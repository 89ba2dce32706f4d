// src/logging.rs

//! Logging setup for `scriptrun` using `tracing` + `tracing-subscriber`.
//!
//! Filter priority:
//! 1. `--log-level` CLI flag, applied to every target;
//! 2. `SCRIPTRUN_LOG`, read as `EnvFilter` directives, so command output
//!    can be tuned apart from the orchestrator
//!    (`SCRIPTRUN_LOG=info,scriptrun::output=off`);
//! 3. `info`.
//!
//! Logs go to STDERR; STDOUT carries only the JSON result.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "SCRIPTRUN_LOG";

/// Target under which lines printed by the executed command are logged.
pub const OUTPUT_TARGET: &str = "scriptrun::output";

const DEFAULT_DIRECTIVE: &str = "info";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();

    fmt()
        .with_env_filter(log_filter(cli_level, env.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn log_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(directive(level));
    }
    env.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    fn hint(cli_level: Option<LogLevel>, env: Option<&str>) -> Option<LevelFilter> {
        log_filter(cli_level, env).max_level_hint()
    }

    #[test]
    fn cli_flag_beats_environment() {
        assert_eq!(hint(Some(LogLevel::Warn), Some("trace")), Some(LevelFilter::WARN));
        assert_eq!(hint(None, Some("debug")), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn missing_or_invalid_environment_falls_back_to_info() {
        assert_eq!(hint(None, None), Some(LevelFilter::INFO));
        assert_eq!(hint(None, Some("  ")), Some(LevelFilter::INFO));
        assert_eq!(hint(None, Some("scriptrun=notalevel")), Some(LevelFilter::INFO));
    }

    #[test]
    fn output_target_can_be_silenced_separately() {
        let filter = log_filter(None, Some(&format!("info,{OUTPUT_TARGET}=off")));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
        assert!(filter.to_string().contains(OUTPUT_TARGET));
    }
}
