use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Boxed future returned by the object-safe collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which backend executes the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerType {
    /// Spawn the command directly as a child of this process.
    Process,
    /// Run the command inside a container through the docker CLI.
    Docker,
}

impl Default for RunnerType {
    fn default() -> Self {
        RunnerType::Process
    }
}

impl FromStr for RunnerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "process" => Ok(RunnerType::Process),
            "docker" => Ok(RunnerType::Docker),
            other => Err(format!(
                "invalid runner: {other} (expected \"process\" or \"docker\")"
            )),
        }
    }
}

/// The output stream a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Caller-facing classification of a finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Success,
    /// Degraded but not failed (stderr output with `warning_on_std_err`).
    Warning,
    Failed,
}
