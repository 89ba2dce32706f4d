// src/exec/result.rs

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::errors::{Result, ScriptError};
use crate::storage::ArtifactUri;
use crate::types::TaskState;

/// What a finished execution reports back to its caller.
///
/// A non-zero exit is data here, not an error; use [`state`](Self::state) or
/// [`ensure_success`](Self::ensure_success) to apply a policy on top.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub std_out_line_count: usize,
    pub std_err_line_count: usize,
    pub warning_on_std_err: bool,
    /// Outputs extracted from marker lines.
    pub vars: BTreeMap<String, Value>,
    /// Uploaded output files, keyed by relative path.
    pub output_files: BTreeMap<String, ArtifactUri>,
}

impl ExecutionResult {
    pub fn state(&self) -> TaskState {
        let degraded = self.warning_on_std_err && self.std_err_line_count > 0;
        match (self.exit_code, degraded) {
            (0, false) => TaskState::Success,
            (_, true) => TaskState::Warning,
            (_, false) => TaskState::Failed,
        }
    }

    /// Turn a [`TaskState::Failed`] result into [`ScriptError::NonZeroExit`].
    pub fn ensure_success(self) -> Result<Self> {
        match self.state() {
            TaskState::Failed => Err(ScriptError::NonZeroExit {
                exit_code: self.exit_code,
            }),
            TaskState::Success | TaskState::Warning => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, std_err_line_count: usize, warning_on_std_err: bool) -> ExecutionResult {
        ExecutionResult {
            exit_code,
            std_out_line_count: 1,
            std_err_line_count,
            warning_on_std_err,
            vars: BTreeMap::new(),
            output_files: BTreeMap::new(),
        }
    }

    #[test]
    fn state_table() {
        assert_eq!(result(0, 0, true).state(), TaskState::Success);
        assert_eq!(result(0, 2, false).state(), TaskState::Success);
        assert_eq!(result(0, 2, true).state(), TaskState::Warning);
        assert_eq!(result(1, 2, true).state(), TaskState::Warning);
        assert_eq!(result(1, 2, false).state(), TaskState::Failed);
        assert_eq!(result(3, 0, true).state(), TaskState::Failed);
    }

    #[test]
    fn ensure_success_only_rejects_failures() {
        assert!(result(0, 1, true).ensure_success().is_ok());

        let err = result(3, 0, true).ensure_success().unwrap_err();
        assert!(matches!(err, ScriptError::NonZeroExit { exit_code: 3 }));
    }

    #[test]
    fn serializes_with_snake_case_fields() {
        let json = serde_json::to_value(result(0, 0, true)).unwrap();
        assert_eq!(json["exit_code"], 0);
        assert_eq!(json["warning_on_std_err"], true);
        assert!(json["output_files"].as_object().unwrap().is_empty());
    }
}
