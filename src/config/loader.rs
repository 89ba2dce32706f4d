// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawTaskConfig, TaskConfig};
use crate::errors::Result;

/// Load a task file and return the raw `RawTaskConfig`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to also
/// check it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawTaskConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawTaskConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a task file and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` default functions).
/// - Checks the command, interpreter, runner, env and file declarations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<TaskConfig> {
    let raw_config = load_from_path(&path)?;
    let config = TaskConfig::try_from(raw_config)?;
    Ok(config)
}
