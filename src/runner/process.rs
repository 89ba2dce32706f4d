// src/runner/process.rs

//! Host process backend.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, ScriptError};
use crate::exec::{ExecutionRequest, LogConsumer};
use crate::types::{BoxFuture, StreamKind};

use super::streams::{join_readers, spawn_line_reader};
use super::{KILL_GRACE, Runner, RunnerResult, interrupted};

/// Runs the rendered command line directly as a child process.
///
/// The child inherits this process's environment with the request's
/// environment merged on top, and runs in the request's working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcessRunner;

impl HostProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for HostProcessRunner {
    fn run<'a>(&'a self, request: &'a ExecutionRequest) -> BoxFuture<'a, Result<RunnerResult>> {
        Box::pin(async move {
            let (program, args) = request
                .commands()
                .split_first()
                .ok_or_else(|| ScriptError::Launch("empty command line".to_string()))?;

            info!(
                exec_id = %request.id(),
                program = %program,
                args = ?args,
                working_dir = %request.working_directory().display(),
                "starting host process"
            );

            let mut cmd = Command::new(program);
            cmd.args(args)
                .envs(request.env())
                .current_dir(request.working_directory());

            let child = spawn_piped(&mut cmd)
                .with_context(|| format!("spawning process '{program}'"))
                .map_err(ScriptError::launch)?;

            let ctx = request.context();
            let exit_code = supervise(
                child,
                request.log_consumer(),
                ctx.cancellation(),
                ctx.timeout(),
            )
            .await?;

            info!(exec_id = %request.id(), exit_code, "host process exited");
            Ok(RunnerResult::new(exit_code, Arc::clone(request.log_consumer())))
        })
    }
}

/// Spawn `cmd` with piped stdout/stderr in its own process group, so the
/// whole tree can be killed on interruption.
pub(crate) fn spawn_piped(cmd: &mut Command) -> std::io::Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn()
}

/// Stream the child's output into `consumer` and wait for it to exit.
///
/// Either the child exits on its own (its exit code is returned once both
/// streams are drained), or the token/timeout fires first: then the process
/// group is killed and the interruption is returned as an error. The
/// interruption is still honoured while the streams drain after exit.
pub(crate) async fn supervise(
    mut child: Child,
    consumer: &Arc<LogConsumer>,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<i32> {
    let pgid = child.id();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, StreamKind::Stdout, Arc::clone(consumer)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, StreamKind::Stderr, Arc::clone(consumer)));
    }
    let abort_handles: Vec<_> = readers.iter().map(|r| r.abort_handle()).collect();

    let interrupt = interrupted(cancel, timeout);
    tokio::pin!(interrupt);

    let status = tokio::select! {
        status = child.wait() => status
            .context("waiting for child process")
            .map_err(ScriptError::Other)?,

        reason = &mut interrupt => {
            info!(?reason, "execution interrupted; killing child process");
            kill_tree(pgid, &mut child).await;
            join_readers(readers, Some(KILL_GRACE)).await;
            return Err(reason.into());
        }
    };

    tokio::select! {
        _ = join_readers(readers, None) => {}

        reason = &mut interrupt => {
            info!(?reason, "execution interrupted while draining output");
            kill_tree(pgid, &mut child).await;
            for handle in abort_handles {
                handle.abort();
            }
            return Err(reason.into());
        }
    }

    let code = status.code().unwrap_or(-1);
    debug!(exit_code = code, success = status.success(), "child exited");
    Ok(code)
}

async fn kill_tree(pgid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    if let Some(pgid) = pgid.and_then(|p| i32::try_from(p).ok()) {
        // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
        // addresses the process group created in `spawn_piped`.
        let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if rc != 0 {
            debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "child already gone");
    }

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "killed child reaped"),
        Ok(Err(e)) => warn!(error = %e, "failed to reap killed child"),
        Err(_) => warn!(grace = ?KILL_GRACE, "child still running after kill grace period"),
    }
}
