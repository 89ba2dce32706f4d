// src/config/validate.rs

use crate::config::model::{RawTaskConfig, TaskBody, TaskConfig, parse_duration};
use crate::errors::{Result, ScriptError};
use crate::storage::resolve_within;
use crate::types::RunnerType;

impl TryFrom<RawTaskConfig> for TaskConfig {
    type Error = ScriptError;

    fn try_from(raw: RawTaskConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let body = match raw.script {
            Some(script) => TaskBody::Script(script),
            None => TaskBody::Commands(raw.commands),
        };
        let timeout = raw
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| ScriptError::Config(format!("invalid `timeout`: {e}")))?;

        Ok(TaskConfig {
            runner: raw.runner,
            interpreter: raw.interpreter,
            before_commands: raw.before_commands,
            body,
            warning_on_std_err: raw.warning_on_std_err,
            timeout,
            env: raw.env,
            input_files: raw.input_files,
            output_files: raw.output_files,
            require_output_files: raw.require_output_files,
            namespace_files: raw.namespace_files,
            docker: raw.docker.unwrap_or_default(),
        })
    }
}

/// Check a raw task for problems that would only surface mid-run otherwise.
pub fn validate_raw_config(cfg: &RawTaskConfig) -> Result<()> {
    validate_body(cfg)?;
    validate_interpreter(cfg)?;
    validate_runner(cfg)?;
    validate_env(cfg)?;
    validate_input_files(cfg)?;
    validate_output_files(cfg)?;
    Ok(())
}

fn validate_body(cfg: &RawTaskConfig) -> Result<()> {
    let has_commands = cfg.commands.iter().any(|c| !c.trim().is_empty());
    match (&cfg.script, has_commands) {
        (Some(_), true) => Err(ScriptError::Config(
            "`commands` and [script] are mutually exclusive".to_string(),
        )),
        (None, false) => Err(ScriptError::Config(
            "task must define non-empty `commands` or a [script] section".to_string(),
        )),
        (Some(script), false) if script.source.trim().is_empty() => Err(ScriptError::Config(
            "[script].source must not be empty".to_string(),
        )),
        (Some(script), false) if script.launcher.trim().is_empty() => Err(ScriptError::Config(
            "[script].launcher must not be empty".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_interpreter(cfg: &RawTaskConfig) -> Result<()> {
    if cfg.interpreter.is_empty() || cfg.interpreter[0].trim().is_empty() {
        return Err(ScriptError::Config(
            "`interpreter` must name a program".to_string(),
        ));
    }
    Ok(())
}

fn validate_runner(cfg: &RawTaskConfig) -> Result<()> {
    if cfg.runner != RunnerType::Docker {
        return Ok(());
    }
    let image_missing = cfg
        .docker
        .as_ref()
        .is_some_and(|docker| docker.image.trim().is_empty());
    if image_missing {
        return Err(ScriptError::Config(
            "runner \"docker\" requires a non-empty [docker].image".to_string(),
        ));
    }
    Ok(())
}

fn validate_env(cfg: &RawTaskConfig) -> Result<()> {
    if cfg.env.keys().any(|k| k.trim().is_empty()) {
        return Err(ScriptError::Config(
            "[env] keys must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_input_files(cfg: &RawTaskConfig) -> Result<()> {
    let Some(inputs) = &cfg.input_files else {
        return Ok(());
    };
    // Any root works: only the shape of the relative path is checked here.
    let probe = std::path::Path::new("/");
    for path in inputs.keys() {
        resolve_within(probe, path).map_err(|e| {
            ScriptError::Config(format!("invalid [input_files] path '{path}': {e}"))
        })?;
    }
    Ok(())
}

fn validate_output_files(cfg: &RawTaskConfig) -> Result<()> {
    let Some(patterns) = &cfg.output_files else {
        return Ok(());
    };
    for pattern in patterns {
        globset::GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| {
                ScriptError::Config(format!("invalid `output_files` pattern '{pattern}': {e}"))
            })?;
    }
    Ok(())
}
