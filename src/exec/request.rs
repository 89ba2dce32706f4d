// src/exec/request.rs

//! The execution request and the orchestration around it.
//!
//! A request is built in steps, each returning a new value:
//!
//! ```text
//! prepare(ctx) -> with_commands(..) -> with_env(..) -> with_*(..) -> run()
//! ```
//!
//! Copies share the working directory, which is deleted once the last copy
//! is dropped (at the latest when `run` returns).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use regex::Regex;
use tempfile::TempDir;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::errors::{Result, ScriptError};
use crate::render::Vars;
use crate::runner::{DockerOptions, DockerRunner, HostProcessRunner, Runner};
use crate::storage::{ArtifactUri, NamespaceFileSelector, resolve_within};
use crate::types::RunnerType;

use super::log_consumer::LogConsumer;
use super::result::ExecutionResult;
use super::stager;

/// URI path characters only, so shell punctuation after a reference
/// (`;`, `)`, `|`, quotes, ...) is left in the command.
const ARTIFACT_REF_PATTERN: &str = r"artifact://[-A-Za-z0-9%._+~#=/]+";

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    id: String,
    context: Arc<ExecutionContext>,
    /// Keeps the working directory alive while any copy exists.
    _workdir: Arc<TempDir>,
    working_directory: PathBuf,
    output_directory: PathBuf,
    additional_vars: Vars,
    commands: Vec<String>,
    env: BTreeMap<String, String>,
    log_consumer: Arc<LogConsumer>,
    runner_type: RunnerType,
    docker_options: DockerOptions,
    warning_on_std_err: bool,
    namespace_files: Option<NamespaceFileSelector>,
    input_files: Option<BTreeMap<String, String>>,
    output_files: Option<Vec<String>>,
    require_output_files: bool,
}

impl ExecutionRequest {
    /// Allocate a fresh working directory with a nested output directory and
    /// seed `workingDir` / `outputDir` with their absolute paths.
    pub fn prepare(context: Arc<ExecutionContext>) -> Result<Self> {
        let workdir = context
            .temp_dir()
            .with_context(|| format!("allocating working dir under {:?}", context.temp_root()))
            .map_err(ScriptError::staging)?;
        let working_directory = std::path::absolute(workdir.path())?;

        let id = Uuid::new_v4().simple().to_string();
        let output_directory = working_directory.join(Uuid::new_v4().simple().to_string());
        std::fs::create_dir_all(&output_directory)
            .with_context(|| format!("creating output dir {:?}", output_directory))
            .map_err(ScriptError::staging)?;

        let mut additional_vars = Vars::new();
        additional_vars.insert(
            "workingDir".to_string(),
            working_directory.display().to_string().into(),
        );
        additional_vars.insert(
            "outputDir".to_string(),
            output_directory.display().to_string().into(),
        );

        debug!(
            exec_id = %id,
            working_dir = %working_directory.display(),
            "prepared execution request"
        );

        Ok(Self {
            id,
            context,
            _workdir: Arc::new(workdir),
            working_directory,
            output_directory,
            additional_vars,
            commands: Vec::new(),
            env: BTreeMap::new(),
            log_consumer: Arc::new(LogConsumer::new()),
            runner_type: RunnerType::default(),
            docker_options: DockerOptions::default(),
            warning_on_std_err: true,
            namespace_files: None,
            input_files: None,
            output_files: None,
            require_output_files: false,
        })
    }

    /// Render every command, then download each `artifact://` reference it
    /// contains into the working directory and substitute the local path.
    pub async fn with_commands(&self, raw: &[String]) -> Result<Self> {
        let vars = self.vars();
        let rendered = self.context.renderer().render_all(raw, &vars)?;

        let refs = Regex::new(ARTIFACT_REF_PATTERN).map_err(anyhow::Error::from)?;
        let mut local_paths: BTreeMap<String, String> = BTreeMap::new();
        let mut commands = Vec::with_capacity(rendered.len());

        for command in rendered {
            for found in refs.find_iter(&command) {
                let uri = found.as_str();
                if local_paths.contains_key(uri) {
                    continue;
                }
                let local = self.download_reference(uri).await?;
                local_paths.insert(uri.to_string(), local.display().to_string());
            }

            let replaced = refs.replace_all(&command, |caps: &regex::Captures<'_>| {
                local_paths
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            });
            commands.push(replaced.into_owned());
        }

        Ok(Self {
            commands,
            ..self.clone()
        })
    }

    async fn download_reference(&self, uri: &str) -> Result<PathBuf> {
        let fetch = async {
            let uri = ArtifactUri::parse(uri)?;
            let source = self.context.artifacts().download(&uri).await?;
            let dest = resolve_within(&self.working_directory, uri.path())?;
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(&source, &dest).await?;
            anyhow::Ok(dest)
        };

        let dest = fetch
            .await
            .with_context(|| format!("fetching {uri} referenced by a command"))
            .map_err(ScriptError::staging)?;
        debug!(exec_id = %self.id, uri, path = %dest.display(), "downloaded command input");
        Ok(dest)
    }

    /// Render every key and value of `raw`; `None` means no variables.
    pub fn with_env(&self, raw: Option<&BTreeMap<String, String>>) -> Result<Self> {
        let env = match raw {
            Some(raw) => self.context.renderer().render_map(raw, &self.vars())?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            env,
            ..self.clone()
        })
    }

    /// Merge already rendered variables into the environment.
    pub fn add_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Add template variables for the following render steps.
    pub fn add_vars(mut self, vars: Vars) -> Self {
        self.additional_vars.extend(vars);
        self
    }

    pub fn with_runner_type(mut self, runner_type: RunnerType) -> Self {
        self.runner_type = runner_type;
        self
    }

    pub fn with_docker_options(mut self, options: DockerOptions) -> Self {
        self.docker_options = options;
        self
    }

    pub fn with_warning_on_std_err(mut self, warning_on_std_err: bool) -> Self {
        self.warning_on_std_err = warning_on_std_err;
        self
    }

    pub fn with_namespace_files(mut self, selector: Option<NamespaceFileSelector>) -> Self {
        self.namespace_files = selector;
        self
    }

    pub fn with_input_files(mut self, input_files: Option<BTreeMap<String, String>>) -> Self {
        self.input_files = input_files;
        self
    }

    pub fn with_output_files(mut self, patterns: Option<Vec<String>>) -> Self {
        self.output_files = patterns;
        self
    }

    pub fn with_require_output_files(mut self, require: bool) -> Self {
        self.require_output_files = require;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn log_consumer(&self) -> &Arc<LogConsumer> {
        &self.log_consumer
    }

    pub fn runner_type(&self) -> RunnerType {
        self.runner_type
    }

    pub fn docker_options(&self) -> &DockerOptions {
        &self.docker_options
    }

    pub fn warning_on_std_err(&self) -> bool {
        self.warning_on_std_err
    }

    /// Context variables overlaid with this request's own variables.
    pub fn vars(&self) -> Vars {
        let mut vars = self.context.variables().clone();
        vars.extend(self.additional_vars.clone());
        vars
    }

    /// Run with the backend selected by [`with_runner_type`](Self::with_runner_type).
    pub async fn run(self) -> Result<ExecutionResult> {
        match self.runner_type {
            RunnerType::Process => self.run_with(&HostProcessRunner::new()).await,
            RunnerType::Docker => {
                let runner = DockerRunner::new(self.docker_options.clone());
                self.run_with(&runner).await
            }
        }
    }

    /// Stage files, execute with `runner`, then collect outputs.
    pub async fn run_with<R: Runner + ?Sized>(self, runner: &R) -> Result<ExecutionResult> {
        let ctx = Arc::clone(&self.context);

        if let Some(selector) = &self.namespace_files {
            let store = ctx.namespace_file_store().ok_or_else(|| {
                ScriptError::Staging(
                    "namespace files requested but no namespace file store is configured"
                        .to_string(),
                )
            })?;
            stager::stage_namespace_files(
                store,
                ctx.tenant_id(),
                ctx.namespace(),
                &self.working_directory,
                selector,
            )
            .await?;
        }

        if let Some(input_files) = &self.input_files {
            let rendered = ctx.renderer().render_map(input_files, &self.vars())?;
            stager::stage_inputs(ctx.artifacts(), &rendered, &self.working_directory).await?;
        }

        info!(
            exec_id = %self.id,
            runner = ?self.runner_type,
            namespace = ctx.namespace(),
            "running execution"
        );
        let outcome = runner.run(&self).await?;

        let mut output_files =
            stager::collect_outputs(ctx.artifacts(), &self.output_directory).await?;
        if let Some(patterns) = &self.output_files {
            let declared = stager::collect_declared_outputs(
                ctx.artifacts(),
                patterns,
                &self.working_directory,
                &self.output_directory,
                self.require_output_files,
            )
            .await?;
            output_files.extend(declared);
        }

        let consumer = outcome.log_consumer();
        let result = ExecutionResult {
            exit_code: outcome.exit_code(),
            std_out_line_count: consumer.std_out_count(),
            std_err_line_count: consumer.std_err_count(),
            warning_on_std_err: self.warning_on_std_err,
            vars: consumer.outputs().into_iter().collect(),
            output_files,
        };

        info!(
            exec_id = %self.id,
            exit_code = result.exit_code,
            std_out = result.std_out_line_count,
            std_err = result.std_err_line_count,
            outputs = result.vars.len(),
            files = result.output_files.len(),
            state = ?result.state(),
            "execution finished"
        );
        Ok(result)
    }
}
