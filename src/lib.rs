// src/lib.rs

pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod render;
pub mod runner;
pub mod storage;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::context::ExecutionContext;
use crate::exec::{ExecutionRequest, build_request};
use crate::storage::{LocalArtifactStore, LocalNamespaceFileStore};
use crate::types::TaskState;

pub use crate::errors::{Phase, ScriptError};
pub use crate::exec::ExecutionResult;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - task loading and validation
/// - the execution context (local stores, variables, temp root)
/// - Ctrl-C handling through the context's cancellation token
/// - running the task and printing its result as JSON on stdout
///
/// Returns `None` for a dry run, the result state otherwise.
pub async fn run(args: CliArgs) -> Result<Option<TaskState>> {
    let task = load_and_validate(&args.config)
        .with_context(|| format!("loading task file {:?}", args.config))?;

    let ctx = build_context(&args);
    let cancel = ctx.cancellation().clone();
    let request = build_request(ctx, &task).await?;

    if args.dry_run {
        print_dry_run(&request)?;
        return Ok(None);
    }

    // Ctrl-C → cancel the running execution.
    let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel));

    let outcome = request.run().await;
    ctrl_c.abort();
    let result = outcome?;

    let state = result.state();
    println!("{}", serde_json::to_string_pretty(&result)?);
    match state {
        TaskState::Success => info!(exit_code = result.exit_code, "task succeeded"),
        TaskState::Warning => warn!(
            exit_code = result.exit_code,
            std_err = result.std_err_line_count,
            "task finished with warnings"
        ),
        TaskState::Failed => warn!(exit_code = result.exit_code, "task failed"),
    }
    Ok(Some(state))
}

/// Process exit status for a finished task.
pub fn exit_status(state: TaskState, strict: bool) -> i32 {
    match state {
        TaskState::Success => 0,
        TaskState::Warning if !strict => 0,
        TaskState::Warning | TaskState::Failed => 1,
    }
}

fn build_context(args: &CliArgs) -> ExecutionContext {
    let artifacts = Arc::new(LocalArtifactStore::new(&args.artifacts_dir));
    let mut ctx = ExecutionContext::new(args.namespace.clone(), artifacts);

    if let Some(tenant) = &args.tenant {
        ctx = ctx.with_tenant(tenant.clone());
    }
    if let Some(dir) = &args.namespace_files_dir {
        ctx = ctx.with_namespace_files(Arc::new(LocalNamespaceFileStore::new(dir)));
    }
    if let Some(root) = &args.work_root {
        ctx = ctx.with_temp_root(root.clone());
    }
    for (name, value) in &args.vars {
        ctx = ctx.with_variable(name.clone(), value.clone());
    }
    ctx
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        return;
    }
    info!("Ctrl+C received; cancelling execution");
    cancel.cancel();
}

/// Print the fully rendered command line and environment.
fn print_dry_run(request: &ExecutionRequest) -> Result<()> {
    let preview = serde_json::json!({
        "runner": request.runner_type(),
        "working_dir": request.working_directory().display().to_string(),
        "commands": request.commands(),
        "env": request.env(),
    });
    println!("{}", serde_json::to_string_pretty(&preview)?);
    debug!("dry-run complete (no execution)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_only_fail_in_strict_mode() {
        assert_eq!(exit_status(TaskState::Success, true), 0);
        assert_eq!(exit_status(TaskState::Warning, false), 0);
        assert_eq!(exit_status(TaskState::Warning, true), 1);
        assert_eq!(exit_status(TaskState::Failed, false), 1);
    }
}
