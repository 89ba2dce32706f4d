use std::path::{Path, PathBuf};
use std::sync::Arc;

use scriptrun::context::ExecutionContext;
use scriptrun::storage::{ArtifactStore, ArtifactUri, LocalArtifactStore, LocalNamespaceFileStore};
use tempfile::TempDir;

/// Scratch area for one test: artifact store, namespace files and working
/// directories all live under a single temp dir.
pub struct TestEnv {
    root: TempDir,
}

impl TestEnv {
    pub const NAMESPACE: &'static str = "tests";

    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("failed to create test root"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root().join("artifacts")
    }

    pub fn namespaces_dir(&self) -> PathBuf {
        self.root().join("namespaces")
    }

    pub fn work_root(&self) -> PathBuf {
        self.root().join("work")
    }

    pub fn artifact_store(&self) -> Arc<LocalArtifactStore> {
        Arc::new(LocalArtifactStore::new(self.artifacts_dir()))
    }

    pub fn namespace_store(&self) -> Arc<LocalNamespaceFileStore> {
        Arc::new(LocalNamespaceFileStore::new(self.namespaces_dir()))
    }

    /// Context in [`Self::NAMESPACE`] wired to this env's stores.
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::new(Self::NAMESPACE, self.artifact_store())
            .with_namespace_files(self.namespace_store())
            .with_temp_root(self.work_root())
    }

    pub fn write_namespace_file(&self, tenant: Option<&str>, namespace: &str, rel: &str, content: &str) {
        let path = self.namespace_store().namespace_dir(tenant, namespace).join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Upload `content` under `name` and return its URI.
    pub async fn upload(&self, name: &str, content: &[u8]) -> ArtifactUri {
        let staging = self.root().join("uploads");
        std::fs::create_dir_all(&staging).unwrap();
        let path = staging.join(name);
        std::fs::write(&path, content).unwrap();
        self.artifact_store().upload(&path).await.unwrap()
    }

    pub async fn read_artifact(&self, uri: &ArtifactUri) -> Vec<u8> {
        let path = self.artifact_store().download(uri).await.unwrap();
        std::fs::read(path).unwrap()
    }

    /// Number of working directories still present under the work root.
    pub fn leftover_work_dirs(&self) -> usize {
        std::fs::read_dir(self.work_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
