// src/config/mod.rs

//! Task configuration.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a task file from disk.
//! - `validate.rs`: turning a raw task into a validated [`TaskConfig`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{RawTaskConfig, ScriptSection, TaskBody, TaskConfig, parse_duration};
pub use validate::validate_raw_config;
