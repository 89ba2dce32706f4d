// src/exec/task.rs

//! Builds a ready-to-run [`ExecutionRequest`] from a validated task.

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::config::{TaskBody, TaskConfig};
use crate::context::ExecutionContext;
use crate::errors::{Result, ScriptError};

use super::request::ExecutionRequest;
use super::script::{launch_script, script_commands};

/// Prepare a request for `task` in `ctx`.
///
/// The task's timeout, when set, replaces the one carried by `ctx`. A
/// `[script]` source is rendered and written into the working directory
/// first; the command line is then assembled from interpreter,
/// before-commands and commands, and rendered.
pub async fn build_request(ctx: ExecutionContext, task: &TaskConfig) -> Result<ExecutionRequest> {
    let timeout = task.timeout.or(ctx.timeout());
    let ctx = Arc::new(ctx.with_timeout(timeout));
    let base = ExecutionRequest::prepare(ctx)?;

    let commands = match &task.body {
        TaskBody::Commands(commands) => commands.clone(),
        TaskBody::Script(script) => {
            let source = base
                .context()
                .renderer()
                .render(&script.source, &base.vars())?;
            let path = base
                .working_directory()
                .join(format!("script-{}{}", base.id(), script.extension));
            tokio::fs::write(&path, source)
                .await
                .with_context(|| format!("writing script file {:?}", path))
                .map_err(ScriptError::staging)?;
            debug!(exec_id = %base.id(), path = %path.display(), "wrote script file");

            vec![launch_script(&script.launcher, &path.display().to_string())]
        }
    };

    let line = script_commands(&task.interpreter, &task.before_commands, &commands);

    let request = base
        .with_commands(&line)
        .await?
        .with_env(Some(&task.env))?
        .with_runner_type(task.runner)
        .with_docker_options(task.docker.clone())
        .with_warning_on_std_err(task.warning_on_std_err)
        .with_namespace_files(task.namespace_files.clone())
        .with_input_files(task.input_files.clone())
        .with_output_files(task.output_files.clone())
        .with_require_output_files(task.require_output_files);

    Ok(request)
}
