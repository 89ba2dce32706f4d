#![cfg(unix)]

//! Needs a reachable docker daemon: `cargo test -- --ignored`.

mod common;
use crate::common::{TaskConfigBuilder, TestEnv, TestResult, init_tracing, with_timeout};

use std::time::Duration;

use scriptrun::errors::ScriptError;
use scriptrun::exec::build_request;
use scriptrun::runner::DockerOptions;
use scriptrun::types::TaskState;

#[tokio::test]
#[ignore]
async fn container_sees_working_dir_and_env() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    let task = TaskConfigBuilder::new("cat {{ workingDir }}/in.txt; echo \"$WHO\"; echo '::{\"outputs\":{\"in\":\"container\"}}::'")
        .env("WHO", "container")
        .input_file("in.txt", "staged")
        .docker(DockerOptions::with_image("alpine:3.20"))
        .build();

    let request = build_request(env.context(), &task).await?;
    let result = with_timeout(request.run()).await?;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.std_out_line_count, 3);
    assert_eq!(result.vars["in"], "container");
    assert_eq!(result.state(), TaskState::Success);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn unknown_image_is_a_launch_error() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    let task = TaskConfigBuilder::new("true")
        .docker(DockerOptions::with_image("scriptrun.invalid/no-such-image:0"))
        .build();

    let request = build_request(env.context(), &task).await?;
    let err = with_timeout(request.run()).await.unwrap_err();
    assert!(matches!(err, ScriptError::Launch(_)), "got {err:?}");
    Ok(())
}

#[tokio::test]
#[ignore]
async fn container_exit_125_is_a_plain_exit_code() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    let task = TaskConfigBuilder::new("exit 125")
        .docker(DockerOptions::with_image("alpine:3.20"))
        .build();

    let request = build_request(env.context(), &task).await?;
    let result = with_timeout(request.run()).await?;
    assert_eq!(result.exit_code, 125);
    assert_eq!(result.state(), TaskState::Failed);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn timeout_stops_the_container() -> TestResult {
    init_tracing();
    let env = TestEnv::new();
    let task = TaskConfigBuilder::new("sleep 60")
        .timeout(Duration::from_secs(2))
        .docker(DockerOptions::with_image("alpine:3.20"))
        .build();

    let request = build_request(env.context(), &task).await?;
    let err = with_timeout(request.run()).await.unwrap_err();
    assert!(err.is_cancellation());
    Ok(())
}
