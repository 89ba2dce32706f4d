// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde_json::Value;

/// Command-line arguments for `scriptrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptrun",
    version,
    about = "Run a task's commands as a host process or in a container and report a structured result.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the task file (TOML).
    #[arg(long, value_name = "PATH", default_value = "task.toml")]
    pub config: PathBuf,

    /// Namespace the execution belongs to.
    #[arg(long, value_name = "NS", default_value = "default")]
    pub namespace: String,

    /// Tenant owning the namespace.
    #[arg(long, value_name = "TENANT")]
    pub tenant: Option<String>,

    /// Template variable, repeatable. Values that parse as JSON are used as
    /// JSON, anything else as a string.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, Value)>,

    /// Directory backing the artifact store.
    #[arg(long, value_name = "DIR", default_value = ".scriptrun/artifacts")]
    pub artifacts_dir: PathBuf,

    /// Root of the namespace files (`<root>/[<tenant>/]<namespace>/...`).
    #[arg(long, value_name = "DIR")]
    pub namespace_files_dir: Option<PathBuf>,

    /// Where working directories are created. Defaults to the system temp dir.
    #[arg(long, value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Render the command line and environment, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Treat a warning result (stderr output) as a failure.
    #[arg(long)]
    pub strict: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_var(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{s}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
