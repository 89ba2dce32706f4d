//! The execution context handed to the orchestrator.
//!
//! Everything an execution needs from its host is passed in explicitly here
//! instead of being looked up globally: tenant/namespace identity, base
//! template variables, where temporary directories are allocated, how long
//! the run may take, how to cancel it, and the external collaborators
//! (renderer, artifact store, namespace file store).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::render::{Renderer, TemplateRenderer, Vars};
use crate::storage::{ArtifactStore, NamespaceFileStore};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    tenant_id: Option<String>,
    namespace: String,
    variables: Vars,
    temp_root: PathBuf,
    timeout: Option<Duration>,
    cancellation: CancellationToken,
    renderer: Arc<dyn Renderer>,
    artifacts: Arc<dyn ArtifactStore>,
    namespace_files: Option<Arc<dyn NamespaceFileStore>>,
}

impl ExecutionContext {
    /// A context for `namespace` with the default renderer, the system temp
    /// directory, no timeout and a fresh cancellation token.
    pub fn new(namespace: impl Into<String>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self {
            tenant_id: None,
            namespace: namespace.into(),
            variables: Vars::new(),
            temp_root: std::env::temp_dir(),
            timeout: None,
            cancellation: CancellationToken::new(),
            renderer: Arc::new(TemplateRenderer),
            artifacts,
            namespace_files: None,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_variables(mut self, variables: Vars) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_namespace_files(mut self, store: Arc<dyn NamespaceFileStore>) -> Self {
        self.namespace_files = Some(store);
        self
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn variables(&self) -> &Vars {
        &self.variables
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    pub fn artifacts(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }

    pub fn namespace_file_store(&self) -> Option<&dyn NamespaceFileStore> {
        self.namespace_files.as_deref()
    }

    /// Allocate a fresh private directory under the temp root. It is removed
    /// when the returned guard is dropped.
    pub fn temp_dir(&self) -> std::io::Result<TempDir> {
        std::fs::create_dir_all(&self.temp_root)?;
        tempfile::Builder::new()
            .prefix("scriptrun-")
            .tempdir_in(&self.temp_root)
    }
}
