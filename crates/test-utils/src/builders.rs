#![allow(dead_code)]

use std::time::Duration;

use scriptrun::config::{ScriptSection, TaskBody, TaskConfig};
use scriptrun::runner::DockerOptions;
use scriptrun::storage::NamespaceFileSelector;
use scriptrun::types::RunnerType;

/// Builder for `TaskConfig`, starting from a process-runner task.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            task: TaskConfig::from_commands(vec![command.to_string()]),
        }
    }

    pub fn script(source: &str, launcher: &str, extension: &str) -> Self {
        let mut task = TaskConfig::from_commands(Vec::new());
        task.body = TaskBody::Script(ScriptSection {
            source: source.to_string(),
            launcher: launcher.to_string(),
            extension: extension.to_string(),
        });
        Self { task }
    }

    pub fn command(mut self, command: &str) -> Self {
        if let TaskBody::Commands(commands) = &mut self.task.body {
            commands.push(command.to_string());
        }
        self
    }

    pub fn before(mut self, command: &str) -> Self {
        self.task.before_commands.push(command.to_string());
        self
    }

    pub fn interpreter(mut self, interpreter: &[&str]) -> Self {
        self.task.interpreter = interpreter.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn input_file(mut self, rel: &str, content: &str) -> Self {
        self.task
            .input_files
            .get_or_insert_with(Default::default)
            .insert(rel.to_string(), content.to_string());
        self
    }

    pub fn output_pattern(mut self, pattern: &str) -> Self {
        self.task
            .output_files
            .get_or_insert_with(Vec::new)
            .push(pattern.to_string());
        self
    }

    pub fn require_output_files(mut self, val: bool) -> Self {
        self.task.require_output_files = val;
        self
    }

    pub fn namespace_files(mut self, include: &[&str]) -> Self {
        self.task.namespace_files = Some(NamespaceFileSelector {
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
        });
        self
    }

    pub fn warning_on_std_err(mut self, val: bool) -> Self {
        self.task.warning_on_std_err = val;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.task.timeout = Some(timeout);
        self
    }

    pub fn docker(mut self, options: DockerOptions) -> Self {
        self.task.runner = RunnerType::Docker;
        self.task.docker = options;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
