// src/exec/stager.rs

//! Moves files between the stores and an execution's working directory.
//!
//! Every failure here is a staging failure and aborts the execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use globset::{GlobBuilder, GlobSetBuilder};
use tracing::{debug, info};

use crate::errors::{Result, ScriptError};
use crate::storage::{
    ARTIFACT_SCHEME, ArtifactStore, ArtifactUri, NamespaceFileSelector, NamespaceFileStore,
    relative_key, resolve_within, walk_files,
};

/// Where the content of a declared input file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Inline(String),
    Artifact(ArtifactUri),
}

impl InputSource {
    /// Values starting with the artifact scheme are references, anything
    /// else is literal content.
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        if value.trim_start().starts_with(ARTIFACT_SCHEME) {
            Ok(InputSource::Artifact(ArtifactUri::parse(value)?))
        } else {
            Ok(InputSource::Inline(value.to_string()))
        }
    }
}

/// Materialize each `relative path -> content` entry inside `working_dir`.
///
/// Existing files are overwritten, so staging twice is idempotent.
pub async fn stage_inputs(
    artifacts: &dyn ArtifactStore,
    inputs: &BTreeMap<String, String>,
    working_dir: &Path,
) -> Result<()> {
    for (rel, value) in inputs {
        stage_input(artifacts, rel, value, working_dir)
            .await
            .with_context(|| format!("staging input file '{rel}'"))
            .map_err(ScriptError::staging)?;
    }
    Ok(())
}

async fn stage_input(
    artifacts: &dyn ArtifactStore,
    rel: &str,
    value: &str,
    working_dir: &Path,
) -> anyhow::Result<()> {
    let dest = resolve_within(working_dir, rel)?;
    create_parent(&dest).await?;

    match InputSource::parse(value)? {
        InputSource::Inline(content) => {
            tokio::fs::write(&dest, content.as_bytes())
                .await
                .with_context(|| format!("writing {:?}", dest))?;
        }
        InputSource::Artifact(uri) => {
            let local = artifacts.download(&uri).await?;
            tokio::fs::copy(&local, &dest)
                .await
                .with_context(|| format!("copying {uri} to {:?}", dest))?;
        }
    }

    debug!(path = %dest.display(), "staged input file");
    Ok(())
}

/// Write the selected namespace files into `working_dir`, keeping their
/// relative layout.
pub async fn stage_namespace_files(
    store: &dyn NamespaceFileStore,
    tenant: Option<&str>,
    namespace: &str,
    working_dir: &Path,
    selector: &NamespaceFileSelector,
) -> Result<usize> {
    let files = store
        .resolve(tenant, namespace, selector)
        .await
        .with_context(|| format!("resolving namespace files of '{namespace}'"))
        .map_err(ScriptError::staging)?;

    for file in &files {
        let dest = resolve_within(working_dir, &file.relative_path)
            .map_err(ScriptError::staging)?;
        create_parent(&dest).await.map_err(ScriptError::staging)?;
        tokio::fs::write(&dest, &file.content)
            .await
            .with_context(|| format!("writing namespace file {:?}", dest))
            .map_err(ScriptError::staging)?;
    }

    info!(
        namespace,
        tenant = tenant.unwrap_or("-"),
        count = files.len(),
        "injected namespace files"
    );
    Ok(files.len())
}

/// Upload every regular file under `output_dir`, keyed by its path relative
/// to `output_dir`. An empty or missing directory yields an empty map.
pub async fn collect_outputs(
    artifacts: &dyn ArtifactStore,
    output_dir: &Path,
) -> Result<BTreeMap<String, ArtifactUri>> {
    if !tokio::fs::try_exists(output_dir).await.unwrap_or(false) {
        return Ok(BTreeMap::new());
    }

    let files = walk_files(output_dir)
        .await
        .with_context(|| format!("listing output dir {:?}", output_dir))
        .map_err(ScriptError::staging)?;

    upload_all(artifacts, output_dir, files).await
}

/// Upload files under `working_dir` matching any of `patterns`, keyed by
/// their path relative to `working_dir`. `*` does not cross `/`.
///
/// Files under `collected_dir` count as matches but are not uploaded again,
/// since [`collect_outputs`] already covers them.
///
/// A pattern matching nothing is ignored unless `require_match` is set.
pub async fn collect_declared_outputs(
    artifacts: &dyn ArtifactStore,
    patterns: &[String],
    working_dir: &Path,
    collected_dir: &Path,
    require_match: bool,
) -> Result<BTreeMap<String, ArtifactUri>> {
    if patterns.is_empty() {
        return Ok(BTreeMap::new());
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid output file pattern '{pattern}'"))
            .map_err(ScriptError::staging)?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| ScriptError::staging(anyhow!(e)))?;

    let files = walk_files(working_dir)
        .await
        .with_context(|| format!("listing working dir {:?}", working_dir))
        .map_err(ScriptError::staging)?;

    let mut matched_patterns = vec![false; patterns.len()];
    let mut matched_files = Vec::new();
    for path in files {
        let rel = relative_key(working_dir, &path).map_err(ScriptError::staging)?;
        let hits = set.matches(&rel);
        if hits.is_empty() {
            continue;
        }
        for idx in hits {
            matched_patterns[idx] = true;
        }
        if !path.starts_with(collected_dir) {
            matched_files.push(path);
        }
    }

    let unmatched: Vec<&str> = patterns
        .iter()
        .zip(&matched_patterns)
        .filter(|(_, matched)| !**matched)
        .map(|(p, _)| p.as_str())
        .collect();
    if !unmatched.is_empty() {
        if require_match {
            return Err(ScriptError::Staging(format!(
                "output file patterns matched no files: {}",
                unmatched.join(", ")
            )));
        }
        debug!(?unmatched, "output file patterns matched no files");
    }

    upload_all(artifacts, working_dir, matched_files).await
}

async fn upload_all(
    artifacts: &dyn ArtifactStore,
    root: &Path,
    files: Vec<PathBuf>,
) -> Result<BTreeMap<String, ArtifactUri>> {
    let mut uploaded = BTreeMap::new();
    for path in files {
        let key = relative_key(root, &path).map_err(ScriptError::staging)?;
        let uri = artifacts
            .upload(&path)
            .await
            .with_context(|| format!("uploading output file '{key}'"))
            .map_err(ScriptError::staging)?;
        debug!(key = %key, uri = %uri, "uploaded output file");
        uploaded.insert(key, uri);
    }
    Ok(uploaded)
}

async fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating dir {:?}", parent))?;
    }
    Ok(())
}
