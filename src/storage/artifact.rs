// src/storage/artifact.rs

use std::fmt;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::debug;

use crate::types::BoxFuture;

use super::resolve_within;

/// URI scheme of every artifact reference.
pub const ARTIFACT_SCHEME: &str = "artifact://";

/// Reference to a file held by an [`ArtifactStore`], e.g.
/// `artifact:///0b6c.../report.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ArtifactUri(String);

impl ArtifactUri {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let path = s
            .strip_prefix(ARTIFACT_SCHEME)
            .ok_or_else(|| anyhow!("'{s}' is not an {ARTIFACT_SCHEME} URI"))?;
        if path.trim_matches('/').is_empty() {
            return Err(anyhow!("artifact URI '{s}' has no path"));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path part after the scheme, without the leading `/`.
    pub fn path(&self) -> &str {
        self.0[ARTIFACT_SCHEME.len()..].trim_start_matches('/')
    }

    /// Last path segment, used as the local file name on download.
    pub fn file_name(&self) -> &str {
        self.path().rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object store used to persist files produced (and consumed) by executions.
pub trait ArtifactStore: Send + Sync + Debug {
    /// Persist the file at `path` and return its URI.
    fn upload<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ArtifactUri>>;

    /// Resolve `uri` to a local file the caller may read.
    fn download<'a>(&'a self, uri: &'a ArtifactUri) -> BoxFuture<'a, Result<PathBuf>>;
}

/// Artifact store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn upload<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<ArtifactUri>> {
        Box::pin(async move {
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("cannot upload {:?}: no file name", path))?
                .to_string_lossy()
                .into_owned();
            let key = format!("{}/{}", uuid::Uuid::new_v4().simple(), file_name);
            let dest = self.root.join(&key);

            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
            tokio::fs::copy(path, &dest)
                .await
                .with_context(|| format!("copying {:?} into artifact store", path))?;

            debug!(path = %path.display(), key = %key, "uploaded artifact");
            ArtifactUri::parse(&format!("{ARTIFACT_SCHEME}/{key}"))
        })
    }

    fn download<'a>(&'a self, uri: &'a ArtifactUri) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            let path = resolve_within(&self.root, uri.path())
                .with_context(|| format!("resolving {uri}"))?;
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(anyhow!("artifact {uri} not found"));
            }
            Ok(path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_only_artifact_scheme() {
        let uri = ArtifactUri::parse("artifact:///abc/data.csv").unwrap();
        assert_eq!(uri.path(), "abc/data.csv");
        assert_eq!(uri.file_name(), "data.csv");
        assert!(ArtifactUri::parse("s3://bucket/data.csv").is_err());
        assert!(ArtifactUri::parse("artifact:///").is_err());
    }

    #[tokio::test]
    async fn local_store_returns_uploaded_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path().join("store"));
        let src = dir.path().join("report.txt");
        std::fs::write(&src, b"42").unwrap();

        let uri = store.upload(&src).await.unwrap();
        assert!(uri.as_str().starts_with(ARTIFACT_SCHEME));
        assert_eq!(uri.file_name(), "report.txt");

        let local = store.download(&uri).await.unwrap();
        assert_eq!(std::fs::read(local).unwrap(), b"42");
    }

    #[tokio::test]
    async fn download_of_unknown_uri_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let uri = ArtifactUri::parse("artifact:///nope/missing.txt").unwrap();
        assert!(store.download(&uri).await.is_err());
    }
}
