// src/exec/mod.rs

//! Command execution orchestration.
//!
//! - [`request`] holds [`ExecutionRequest`], which prepares the working
//!   directory, renders commands and environment, and drives a run.
//! - [`log_consumer`] counts output lines and extracts output markers.
//! - [`stager`] moves input/output files between the stores and the working
//!   directory.
//! - [`script`] assembles interpreter command lines.
//! - [`task`] builds a request from a validated task configuration.
//! - [`result`] is what a run reports back.

pub mod log_consumer;
pub mod request;
pub mod result;
pub mod script;
pub mod stager;
pub mod task;

pub use log_consumer::{LogConsumer, parse_marker};
pub use request::ExecutionRequest;
pub use result::ExecutionResult;
pub use script::{default_interpreter, script_commands};
pub use task::build_request;
