// src/storage/namespace.rs

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::types::BoxFuture;

use super::{relative_key, walk_files};

/// Which namespace files to inject into the working directory.
///
/// ```toml
/// [namespace_files]
/// include = ["scripts/**"]
/// exclude = ["**/*.tmp"]
/// ```
///
/// An empty `include` selects every file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamespaceFileSelector {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl NamespaceFileSelector {
    pub fn all() -> Self {
        Self::default()
    }

    /// Compile into a matcher for `/`-separated relative paths.
    pub fn compile(&self) -> Result<SelectorMatcher> {
        Ok(SelectorMatcher {
            include: build_set(&self.include)?,
            exclude: build_set(&self.exclude)?,
        })
    }
}

pub struct SelectorMatcher {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl SelectorMatcher {
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(rel_path) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("invalid glob pattern '{pattern}'"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

/// One resolved namespace file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFile {
    /// `/`-separated path relative to the namespace root.
    pub relative_path: String,
    pub content: Vec<u8>,
}

/// Store of files owned by a tenant/namespace.
pub trait NamespaceFileStore: Send + Sync + Debug {
    fn resolve<'a>(
        &'a self,
        tenant: Option<&'a str>,
        namespace: &'a str,
        selector: &'a NamespaceFileSelector,
    ) -> BoxFuture<'a, Result<Vec<NamespaceFile>>>;
}

/// Namespace files laid out on disk as `<root>/<tenant>/<namespace>/...`.
///
/// The tenant segment is left out when no tenant is given.
#[derive(Debug, Clone)]
pub struct LocalNamespaceFileStore {
    root: PathBuf,
}

impl LocalNamespaceFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn namespace_dir(&self, tenant: Option<&str>, namespace: &str) -> PathBuf {
        match tenant {
            Some(tenant) => self.root.join(tenant).join(namespace),
            None => self.root.join(namespace),
        }
    }
}

impl NamespaceFileStore for LocalNamespaceFileStore {
    fn resolve<'a>(
        &'a self,
        tenant: Option<&'a str>,
        namespace: &'a str,
        selector: &'a NamespaceFileSelector,
    ) -> BoxFuture<'a, Result<Vec<NamespaceFile>>> {
        Box::pin(async move {
            let matcher = selector.compile()?;
            let dir = self.namespace_dir(tenant, namespace);
            if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                return Ok(Vec::new());
            }

            let mut files = Vec::new();
            for path in walk_files(&dir)
                .await
                .with_context(|| format!("listing namespace dir {:?}", dir))?
            {
                let rel = relative_key(&dir, &path)?;
                if !matcher.matches(&rel) {
                    continue;
                }
                let content = read(&path).await?;
                files.push(NamespaceFile {
                    relative_path: rel,
                    content,
                });
            }
            Ok(files)
        })
    }
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading namespace file {:?}", path))
}
