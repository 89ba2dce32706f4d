use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use scriptrun::errors::{Result, ScriptError};
use scriptrun::exec::ExecutionRequest;
use scriptrun::runner::{Runner, RunnerResult};
use scriptrun::storage::{relative_key, resolve_within, walk_files};
use scriptrun::types::{BoxFuture, StreamKind};

/// What the fake runner observed when it was invoked.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub commands: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_directory: PathBuf,
    pub output_directory: PathBuf,
    /// Every file present in the working directory when the run started.
    pub files: BTreeMap<String, Vec<u8>>,
}

/// A runner that spawns nothing:
/// - records each request it receives
/// - feeds scripted lines to the request's log consumer
/// - writes scripted files into the working / output directory
/// - returns a scripted exit code (or launch failure).
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    lines: Vec<(StreamKind, String)>,
    exit_code: i32,
    launch_failure: Option<String>,
    output_files: Vec<(String, Vec<u8>)>,
    working_files: Vec<(String, Vec<u8>)>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(mut self, line: &str) -> Self {
        self.lines.push((StreamKind::Stdout, line.to_string()));
        self
    }

    pub fn stderr(mut self, line: &str) -> Self {
        self.lines.push((StreamKind::Stderr, line.to_string()));
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn fail_launch(mut self, message: &str) -> Self {
        self.launch_failure = Some(message.to_string());
        self
    }

    /// File written relative to the output directory during the run.
    pub fn writes_output(mut self, rel: &str, content: &str) -> Self {
        self.output_files.push((rel.to_string(), content.as_bytes().to_vec()));
        self
    }

    /// File written relative to the working directory during the run.
    pub fn writes_working_file(mut self, rel: &str, content: &str) -> Self {
        self.working_files.push((rel.to_string(), content.as_bytes().to_vec()));
        self
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_seen(&self) -> SeenRequest {
        self.seen().pop().expect("fake runner was never invoked")
    }
}

impl Runner for FakeRunner {
    fn run<'a>(&'a self, request: &'a ExecutionRequest) -> BoxFuture<'a, Result<RunnerResult>> {
        Box::pin(async move {
            let working_dir = request.working_directory();
            let mut files = BTreeMap::new();
            for path in walk_files(working_dir).await? {
                let key = relative_key(working_dir, &path).map_err(ScriptError::Other)?;
                files.insert(key, tokio::fs::read(&path).await?);
            }

            self.seen.lock().unwrap().push(SeenRequest {
                commands: request.commands().to_vec(),
                env: request.env().clone(),
                working_directory: working_dir.to_path_buf(),
                output_directory: request.output_directory().to_path_buf(),
                files,
            });

            if let Some(message) = &self.launch_failure {
                return Err(ScriptError::Launch(message.clone()));
            }

            for (root, scripted) in [
                (request.output_directory(), &self.output_files),
                (working_dir, &self.working_files),
            ] {
                for (rel, content) in scripted {
                    let dest = resolve_within(root, rel).map_err(ScriptError::Other)?;
                    if let Some(parent) = dest.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&dest, content).await?;
                }
            }

            let consumer = request.log_consumer();
            for (stream, line) in &self.lines {
                consumer.accept(*stream, line);
            }

            Ok(RunnerResult::new(self.exit_code, Arc::clone(consumer)))
        })
    }
}
