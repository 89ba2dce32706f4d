// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::default_interpreter;
use crate::runner::DockerOptions;
use crate::storage::NamespaceFileSelector;
use crate::types::RunnerType;

/// A task file as read from TOML, before validation.
///
/// ```toml
/// runner = "process"
/// before_commands = ["set -e"]
/// commands = ["echo {{ workingDir }}"]
/// timeout = "30s"
///
/// [env]
/// GREETING = "hello {{ name }}"
/// ```
///
/// Everything except the command (`commands` or `[script]`) is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTaskConfig {
    #[serde(default)]
    pub runner: RunnerType,

    /// Prefix the joined script is appended to.
    #[serde(default = "default_interpreter")]
    pub interpreter: Vec<String>,

    /// Lines prepended to the commands, in the same script.
    #[serde(default)]
    pub before_commands: Vec<String>,

    #[serde(default)]
    pub commands: Vec<String>,

    /// Generic script front-end, alternative to `commands`.
    #[serde(default)]
    pub script: Option<ScriptSection>,

    /// Whether stderr output degrades the result to a warning.
    #[serde(default = "default_warning_on_std_err")]
    pub warning_on_std_err: bool,

    /// Duration string such as `"500ms"`, `"30s"`, `"5m"` or `"1h"`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// `relative path -> inline content or artifact:// URI`.
    #[serde(default)]
    pub input_files: Option<BTreeMap<String, String>>,

    /// Glob patterns, relative to the working directory, of files to upload
    /// after the run.
    #[serde(default)]
    pub output_files: Option<Vec<String>>,

    /// Fail the run when an `output_files` pattern matches nothing.
    #[serde(default)]
    pub require_output_files: bool,

    #[serde(default)]
    pub namespace_files: Option<NamespaceFileSelector>,

    #[serde(default)]
    pub docker: Option<DockerOptions>,
}

fn default_warning_on_std_err() -> bool {
    true
}

/// `[script]` section: the source is written to a file in the working
/// directory and run as `<launcher> <file>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptSection {
    pub source: String,

    #[serde(default = "default_launcher")]
    pub launcher: String,

    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_launcher() -> String {
    "sh".to_string()
}

fn default_extension() -> String {
    ".sh".to_string()
}

/// What the task runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskBody {
    Commands(Vec<String>),
    Script(ScriptSection),
}

/// A validated task, built from [`RawTaskConfig`] through `TryFrom`.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub runner: RunnerType,
    pub interpreter: Vec<String>,
    pub before_commands: Vec<String>,
    pub body: TaskBody,
    pub warning_on_std_err: bool,
    pub timeout: Option<Duration>,
    pub env: BTreeMap<String, String>,
    pub input_files: Option<BTreeMap<String, String>>,
    pub output_files: Option<Vec<String>>,
    pub require_output_files: bool,
    pub namespace_files: Option<NamespaceFileSelector>,
    pub docker: DockerOptions,
}

impl TaskConfig {
    /// A process-runner task running `commands` with every default.
    pub fn from_commands(commands: Vec<String>) -> Self {
        Self {
            runner: RunnerType::Process,
            interpreter: default_interpreter(),
            before_commands: Vec::new(),
            body: TaskBody::Commands(commands),
            warning_on_std_err: default_warning_on_std_err(),
            timeout: None,
            env: BTreeMap::new(),
            input_files: None,
            output_files: None,
            require_output_files: false,
            namespace_files: None,
            docker: DockerOptions::default(),
        }
    }
}

/// Parse a duration string like `"500ms"`, `"3s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration(" 3s ").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());

        let err = parse_duration("18446744073709551h").unwrap_err();
        assert!(err.contains("too large"), "{err}");
        assert!(parse_duration("307445734561825861m").is_err());
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn raw_defaults() {
        let raw: RawTaskConfig = toml::from_str(r#"commands = ["echo hi"]"#).unwrap();
        assert_eq!(raw.runner, RunnerType::Process);
        assert_eq!(raw.interpreter, vec!["/bin/sh", "-c"]);
        assert!(raw.warning_on_std_err);
        assert!(raw.docker.is_none());
        assert!(raw.namespace_files.is_none());
    }

    #[test]
    fn script_section_defaults() {
        let raw: RawTaskConfig = toml::from_str(
            r#"
[script]
source = "echo from script"
"#,
        )
        .unwrap();
        let script = raw.script.unwrap();
        assert_eq!(script.launcher, "sh");
        assert_eq!(script.extension, ".sh");
    }
}
