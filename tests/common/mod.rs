#![allow(dead_code)]

use std::error::Error;

pub use scriptrun_test_utils::{
    FakeRunner, SeenRequest, TaskConfigBuilder, TestEnv, init_tracing, with_timeout,
};

pub type TestResult = Result<(), Box<dyn Error>>;

/// `sh -c <script>` as a raw command line.
pub fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}
