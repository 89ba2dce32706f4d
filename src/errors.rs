// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every fatal error names the phase it came from (render, stage, launch,
//! run, config) so callers can report where an execution stopped.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::render::RenderError;

/// Phase of an execution a [`ScriptError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Config,
    Render,
    Stage,
    Launch,
    Run,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Config => "config",
            Phase::Render => "render",
            Phase::Stage => "stage",
            Phase::Launch => "launch",
            Phase::Run => "run",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("staging failed: {0}")]
    Staging(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("run timed out after {0:?}")]
    Timeout(Duration),

    /// Only produced by caller-side policy (`ExecutionResult::ensure_success`);
    /// runners report non-zero exits as values.
    #[error("run failed: process exited with code {exit_code}")]
    NonZeroExit { exit_code: i32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScriptError {
    /// Build a staging error from any error chain, keeping the full context.
    pub fn staging(err: impl Into<anyhow::Error>) -> Self {
        ScriptError::Staging(format!("{:#}", err.into()))
    }

    pub fn launch(err: impl Into<anyhow::Error>) -> Self {
        ScriptError::Launch(format!("{:#}", err.into()))
    }

    pub fn phase(&self) -> Phase {
        match self {
            ScriptError::Render(_) => Phase::Render,
            ScriptError::Staging(_) | ScriptError::Io(_) => Phase::Stage,
            ScriptError::Launch(_) => Phase::Launch,
            ScriptError::Cancelled
            | ScriptError::Timeout(_)
            | ScriptError::NonZeroExit { .. }
            | ScriptError::Other(_) => Phase::Run,
            ScriptError::Config(_) | ScriptError::Toml(_) => Phase::Config,
        }
    }

    /// True when the execution was interrupted rather than finishing on its own.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ScriptError::Cancelled | ScriptError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_phase() {
        let err = ScriptError::Launch("no such binary".to_string());
        assert_eq!(err.to_string(), "launch failed: no such binary");
        assert_eq!(err.phase(), Phase::Launch);
    }

    #[test]
    fn staging_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("writing data.csv");
        let err = ScriptError::staging(inner);
        assert_eq!(err.to_string(), "staging failed: writing data.csv: disk full");
    }

    #[test]
    fn timeout_counts_as_cancellation() {
        assert!(ScriptError::Timeout(Duration::from_secs(1)).is_cancellation());
        assert!(ScriptError::Cancelled.is_cancellation());
        assert!(!ScriptError::NonZeroExit { exit_code: 3 }.is_cancellation());
    }
}
