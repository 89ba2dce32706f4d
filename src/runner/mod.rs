// src/runner/mod.rs

//! Execution backends.
//!
//! The orchestrator talks to a [`Runner`] instead of spawning anything
//! itself. Two backends ship with the crate:
//!
//! - [`process::HostProcessRunner`] spawns the command as a child process.
//! - [`docker::DockerRunner`] runs it in a container through the docker CLI.
//!
//! Tests can provide their own `Runner` that doesn't spawn real processes.
//!
//! Contract shared by every backend:
//! - every stdout/stderr line produced before termination reaches the
//!   request's [`LogConsumer`] before `run` returns;
//! - a non-zero exit code is returned as a value, never as an error;
//! - cancellation or timeout from the execution context kills the execution
//!   and is reported as [`ScriptError::Cancelled`] / [`ScriptError::Timeout`].

pub mod docker;
pub mod process;
pub mod streams;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::errors::{Result, ScriptError};
use crate::exec::{ExecutionRequest, LogConsumer};
use crate::types::BoxFuture;

pub use docker::{DockerOptions, DockerRunner, PullPolicy};
pub use process::HostProcessRunner;

/// How long a killed execution gets to release its streams before the
/// readers are abandoned.
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Outcome of a finished (not interrupted) execution.
#[derive(Debug, Clone)]
pub struct RunnerResult {
    exit_code: i32,
    log_consumer: Arc<LogConsumer>,
}

impl RunnerResult {
    pub fn new(exit_code: i32, log_consumer: Arc<LogConsumer>) -> Self {
        Self {
            exit_code,
            log_consumer,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn log_consumer(&self) -> &Arc<LogConsumer> {
        &self.log_consumer
    }
}

/// Capability every execution backend provides.
pub trait Runner: Send + Sync {
    /// Execute the fully rendered `request` and wait for it to finish.
    fn run<'a>(&'a self, request: &'a ExecutionRequest) -> BoxFuture<'a, Result<RunnerResult>>;
}

/// Why an execution was stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

impl From<Interrupt> for ScriptError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => ScriptError::Cancelled,
            Interrupt::TimedOut(after) => ScriptError::Timeout(after),
        }
    }
}

/// Resolves when the token is cancelled or the timeout elapses, whichever
/// comes first. Without a timeout only cancellation ends it.
pub async fn interrupted(cancel: &CancellationToken, timeout: Option<Duration>) -> Interrupt {
    match timeout {
        Some(after) => tokio::select! {
            _ = cancel.cancelled() => Interrupt::Cancelled,
            _ = tokio::time::sleep(after) => Interrupt::TimedOut(after),
        },
        None => {
            cancel.cancelled().await;
            Interrupt::Cancelled
        }
    }
}
