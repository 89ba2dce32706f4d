// src/runner/docker.rs

//! Containerized backend driven through the docker CLI.
//!
//! The container is made with `docker create`, whose failure (bad image,
//! daemon error, ...) is a launch error. It then runs under `docker start -a`,
//! so its stdout and stderr arrive split on the client's pipes and go through
//! the same line pumps as a host process, and the client exits with the
//! container's own exit code. The working directory is bind-mounted (at the
//! same absolute path by default, so rendered `{{ workingDir }}` paths stay
//! valid inside the container). `docker rm -f` runs after every execution,
//! whatever its outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{Result, ScriptError};
use crate::exec::ExecutionRequest;
use crate::types::BoxFuture;

use super::process::{spawn_piped, supervise};
use super::{KILL_GRACE, Runner, RunnerResult, interrupted};

/// Image used when the task does not name one.
pub const DEFAULT_IMAGE: &str = "ubuntu";

/// When to pull the image before starting the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullPolicy {
    Always,
    #[default]
    IfNotPresent,
    Never,
}

impl PullPolicy {
    fn as_flag(self) -> &'static str {
        match self {
            PullPolicy::Always => "--pull=always",
            PullPolicy::IfNotPresent => "--pull=missing",
            PullPolicy::Never => "--pull=never",
        }
    }
}

/// Container options, as read from a task's `[docker]` table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DockerOptions {
    pub image: String,
    /// CLI used to drive containers (`docker`, `podman`, ...).
    pub binary: String,
    /// Daemon address passed as `-H`.
    pub host: Option<String>,
    pub pull_policy: PullPolicy,
    pub network_mode: Option<String>,
    /// Extra bind mounts in `docker -v` syntax.
    pub volumes: Vec<String>,
    pub cpus: Option<f64>,
    pub memory: Option<String>,
    pub user: Option<String>,
    /// First element overrides the image entrypoint, the rest is prepended to
    /// the command. The default (`[""]`) clears the entrypoint so the command
    /// runs as-is; an empty list keeps the image's entrypoint.
    pub entry_point: Vec<String>,
    pub extra_hosts: Vec<String>,
    /// Where the working directory is mounted; defaults to its host path.
    pub mount_path: Option<PathBuf>,
}

impl Default for DockerOptions {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            binary: "docker".to_string(),
            host: None,
            pull_policy: PullPolicy::default(),
            network_mode: None,
            volumes: Vec::new(),
            cpus: None,
            memory: None,
            user: None,
            entry_point: vec![String::new()],
            extra_hosts: Vec::new(),
            mount_path: None,
        }
    }
}

impl DockerOptions {
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    fn global_args(&self) -> Vec<String> {
        match &self.host {
            Some(host) => vec!["-H".to_string(), host.clone()],
            None => Vec::new(),
        }
    }

    /// Full argument list for `docker create`.
    pub fn create_args(
        &self,
        container_name: &str,
        working_dir: &Path,
        env: &BTreeMap<String, String>,
        commands: &[String],
    ) -> Vec<String> {
        let mount = self
            .mount_path
            .clone()
            .unwrap_or_else(|| working_dir.to_path_buf());
        let mount = mount.display().to_string();

        let mut args = self.global_args();
        args.extend([
            "create".to_string(),
            "--name".to_string(),
            container_name.to_string(),
            self.pull_policy.as_flag().to_string(),
            "-v".to_string(),
            format!("{}:{}", working_dir.display(), mount),
            "-w".to_string(),
            mount,
        ]);

        if let Some(network) = &self.network_mode {
            args.push(format!("--network={network}"));
        }
        for volume in &self.volumes {
            args.push("-v".to_string());
            args.push(volume.clone());
        }
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }

        // Resource limits must come before the image; anything after it is
        // passed to the container.
        if let Some(cpus) = self.cpus {
            args.push(format!("--cpus={cpus}"));
        }
        if let Some(memory) = &self.memory {
            args.push(format!("--memory={memory}"));
        }
        if let Some(user) = &self.user {
            args.push(format!("--user={user}"));
        }
        for host in &self.extra_hosts {
            args.push(format!("--add-host={host}"));
        }

        let mut entry_point = self.entry_point.iter();
        if let Some(first) = entry_point.next() {
            args.push("--entrypoint".to_string());
            args.push(first.clone());
        }

        args.push(self.image.clone());
        args.extend(entry_point.cloned());
        args.extend(commands.iter().cloned());
        args
    }

    /// Argument list attaching to and starting a created container.
    pub fn start_args(&self, container_name: &str) -> Vec<String> {
        let mut args = self.global_args();
        args.extend(["start".to_string(), "-a".to_string(), container_name.to_string()]);
        args
    }
}

/// Runs the rendered command line inside a container.
#[derive(Debug, Clone)]
pub struct DockerRunner {
    options: DockerOptions,
}

impl DockerRunner {
    pub fn new(options: DockerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DockerOptions {
        &self.options
    }

    async fn remove_container(&self, name: &str) {
        let mut cmd = Command::new(&self.options.binary);
        cmd.args(self.options.global_args())
            .args(["rm", "-f", name])
            .kill_on_drop(true);

        match tokio::time::timeout(KILL_GRACE, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                debug!(container = %name, "container removed");
            }
            Ok(Ok(output)) => {
                // Nothing to remove when creation failed.
                debug!(
                    container = %name,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "container removal reported an error"
                );
            }
            Ok(Err(e)) => warn!(container = %name, error = %e, "failed to run container removal"),
            Err(_) => warn!(container = %name, "container removal timed out"),
        }
    }

    /// `docker create`, racing the request's interruption since it may pull
    /// the image first.
    async fn create_container(
        &self,
        request: &ExecutionRequest,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let args = self.options.create_args(
            name,
            request.working_directory(),
            request.env(),
            request.commands(),
        );
        debug!(binary = %self.options.binary, ?args, "container create command line");

        let mut cmd = Command::new(&self.options.binary);
        cmd.args(&args).kill_on_drop(true);

        let output = tokio::select! {
            output = cmd.output() => output
                .with_context(|| format!("spawning '{}'", self.options.binary))
                .map_err(ScriptError::launch)?,
            reason = interrupted(request.context().cancellation(), timeout) => {
                return Err(reason.into());
            }
        };

        if !output.status.success() {
            return Err(ScriptError::Launch(format!(
                "{} create could not create container '{}' from image '{}': {}",
                self.options.binary,
                name,
                self.options.image,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn start_container(
        &self,
        request: &ExecutionRequest,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<i32> {
        let mut cmd = Command::new(&self.options.binary);
        cmd.args(self.options.start_args(name));
        let child = spawn_piped(&mut cmd)
            .with_context(|| format!("spawning '{}'", self.options.binary))
            .map_err(ScriptError::launch)?;

        supervise(
            child,
            request.log_consumer(),
            request.context().cancellation(),
            timeout,
        )
        .await
    }
}

impl Runner for DockerRunner {
    fn run<'a>(&'a self, request: &'a ExecutionRequest) -> BoxFuture<'a, Result<RunnerResult>> {
        Box::pin(async move {
            if request.commands().is_empty() {
                return Err(ScriptError::Launch("empty command line".to_string()));
            }

            let name = format!("scriptrun-{}", request.id());
            info!(
                exec_id = %request.id(),
                container = %name,
                image = %self.options.image,
                "starting container"
            );

            let timeout = request.context().timeout();
            let started = Instant::now();
            let outcome = match self.create_container(request, &name, timeout).await {
                // The timeout covers creation and the run together.
                Ok(()) => {
                    let remaining = timeout.map(|t| t.saturating_sub(started.elapsed()));
                    self.start_container(request, &name, remaining)
                        .await
                        .map_err(|e| match (e, timeout) {
                            (ScriptError::Timeout(_), Some(t)) => ScriptError::Timeout(t),
                            (e, _) => e,
                        })
                }
                Err(e) => Err(e),
            };

            self.remove_container(&name).await;

            let exit_code = outcome?;
            info!(exec_id = %request.id(), container = %name, exit_code, "container exited");
            Ok(RunnerResult::new(exit_code, Arc::clone(request.log_consumer())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands() -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), "echo hi".to_string()]
    }

    #[test]
    fn default_options_mount_working_dir_at_same_path() {
        let mut env = BTreeMap::new();
        env.insert("KEY".to_string(), "v=1".to_string());

        let args = DockerOptions::default().create_args(
            "scriptrun-abc",
            Path::new("/tmp/work"),
            &env,
            &commands(),
        );

        assert_eq!(
            args,
            vec![
                "create",
                "--name",
                "scriptrun-abc",
                "--pull=missing",
                "-v",
                "/tmp/work:/tmp/work",
                "-w",
                "/tmp/work",
                "-e",
                "KEY=v=1",
                "--entrypoint",
                "",
                "ubuntu",
                "/bin/sh",
                "-c",
                "echo hi",
            ]
        );
    }

    #[test]
    fn limits_and_network_come_before_image() {
        let options = DockerOptions {
            host: Some("tcp://10.0.0.1:2375".to_string()),
            network_mode: Some("host".to_string()),
            volumes: vec!["/cache:/cache:ro".to_string()],
            cpus: Some(1.5),
            memory: Some("512m".to_string()),
            user: Some("1000:1000".to_string()),
            extra_hosts: vec!["db:10.0.0.2".to_string()],
            mount_path: Some(PathBuf::from("/app")),
            pull_policy: PullPolicy::Never,
            ..DockerOptions::with_image("python:3.12")
        };

        let args = options.create_args("c1", Path::new("/tmp/w"), &BTreeMap::new(), &commands());
        let image_at = args.iter().position(|a| a == "python:3.12").unwrap();

        assert_eq!(&args[..2], ["-H", "tcp://10.0.0.1:2375"]);
        for flag in [
            "--network=host",
            "--cpus=1.5",
            "--memory=512m",
            "--user=1000:1000",
            "--add-host=db:10.0.0.2",
            "--pull=never",
            "/tmp/w:/app",
            "/cache:/cache:ro",
        ] {
            let pos = args.iter().position(|a| a == flag).unwrap();
            assert!(pos < image_at, "{flag} must precede the image");
        }
        assert_eq!(&args[image_at + 1..], commands().as_slice());
    }

    #[test]
    fn entry_point_rest_is_prepended_to_command() {
        let options = DockerOptions {
            entry_point: vec!["tini".to_string(), "--".to_string()],
            ..DockerOptions::default()
        };
        let args = options.create_args("c", Path::new("/w"), &BTreeMap::new(), &commands());
        let image_at = args.iter().position(|a| a == "ubuntu").unwrap();

        assert_eq!(args[image_at - 1], "tini");
        assert_eq!(args[image_at + 1], "--");

        let keep_image_entrypoint = DockerOptions {
            entry_point: Vec::new(),
            ..DockerOptions::default()
        };
        let args =
            keep_image_entrypoint.create_args("c", Path::new("/w"), &BTreeMap::new(), &commands());
        assert!(!args.iter().any(|a| a == "--entrypoint"));
    }

    #[test]
    fn container_is_created_without_rm_and_started_attached() {
        let options = DockerOptions {
            host: Some("unix:///run/docker.sock".to_string()),
            ..DockerOptions::default()
        };
        let create = options.create_args("c1", Path::new("/w"), &BTreeMap::new(), &commands());
        assert_eq!(&create[2..4], ["create", "--name"]);
        assert!(!create.iter().any(|a| a == "--rm"));

        assert_eq!(
            options.start_args("c1"),
            ["-H", "unix:///run/docker.sock", "start", "-a", "c1"]
        );
    }

    #[test]
    fn pull_policy_parses_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            docker: DockerOptions,
        }
        let parsed: Wrapper = toml::from_str(
            r#"
[docker]
image = "alpine"
pull_policy = "always"
"#,
        )
        .unwrap();
        assert_eq!(parsed.docker.pull_policy, PullPolicy::Always);
        assert_eq!(parsed.docker.binary, "docker");
        assert_eq!(parsed.docker.entry_point, vec![String::new()]);
    }
}
