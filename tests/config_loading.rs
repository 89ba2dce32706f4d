mod common;
use crate::common::{TestResult, init_tracing};

use std::path::PathBuf;
use std::time::Duration;

use scriptrun::config::{TaskBody, load_and_validate, load_from_path};
use scriptrun::errors::ScriptError;
use scriptrun::runner::PullPolicy;
use scriptrun::types::RunnerType;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

#[test]
fn every_demo_validates() -> TestResult {
    init_tracing();
    for entry in std::fs::read_dir(demo(""))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            load_and_validate(&path).map_err(|e| format!("{}: {e}", path.display()))?;
        }
    }
    Ok(())
}

#[test]
fn hello_uses_defaults() -> TestResult {
    let task = load_and_validate(demo("hello.toml"))?;
    assert_eq!(task.runner, RunnerType::Process);
    assert_eq!(task.interpreter, ["/bin/sh", "-c"]);
    assert!(task.warning_on_std_err);
    assert_eq!(task.env["GREETING"], "hello from {{ workingDir }}");
    Ok(())
}

#[test]
fn outputs_demo_declares_files_and_timeout() -> TestResult {
    let task = load_and_validate(demo("outputs.toml"))?;
    assert_eq!(task.output_files.as_deref(), Some(&["summary.txt".to_string()][..]));
    assert!(task.require_output_files);
    assert_eq!(task.timeout, Some(Duration::from_secs(30)));
    assert_eq!(task.input_files.unwrap().len(), 1);
    match task.body {
        TaskBody::Commands(commands) => assert_eq!(commands.len(), 3),
        other => panic!("unexpected body {other:?}"),
    }
    Ok(())
}

#[test]
fn script_demo_uses_script_body() -> TestResult {
    let task = load_and_validate(demo("script.toml"))?;
    let TaskBody::Script(script) = task.body else {
        panic!("expected a script body");
    };
    assert_eq!(script.launcher, "python3");
    assert_eq!(script.extension, ".py");
    assert!(!task.warning_on_std_err);
    Ok(())
}

#[test]
fn docker_demo_carries_container_options() -> TestResult {
    let raw = load_from_path(demo("docker.toml"))?;
    let docker = raw.docker.clone().expect("docker section");
    assert_eq!(docker.image, "alpine:3.20");
    assert_eq!(docker.pull_policy, PullPolicy::IfNotPresent);
    assert_eq!(docker.cpus, Some(0.5));

    let task = load_and_validate(demo("docker.toml"))?;
    assert_eq!(task.runner, RunnerType::Docker);
    assert_eq!(task.namespace_files.unwrap().include, ["scripts/**"]);
    Ok(())
}

#[test]
fn missing_file_and_bad_toml_are_reported() {
    let err = load_and_validate(demo("does-not-exist.toml")).unwrap_err();
    assert!(matches!(err, ScriptError::Io(_)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "commands = [").unwrap();
    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, ScriptError::Toml(_)));

    std::fs::write(&path, "runner = \"vm\"\ncommands = [\"x\"]").unwrap();
    assert!(matches!(load_and_validate(&path).unwrap_err(), ScriptError::Toml(_)));
}
