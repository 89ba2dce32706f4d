// src/storage/mod.rs

//! External file stores the orchestrator talks to.
//!
//! - [`artifact`] persists files by URI (`upload` / `download`).
//! - [`namespace`] resolves the files owned by a tenant/namespace.
//!
//! Both are traits so the orchestrator stays independent of where files live;
//! the local directory-backed implementations are what the CLI and the tests
//! use.

pub mod artifact;
pub mod namespace;

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

pub use artifact::{ARTIFACT_SCHEME, ArtifactStore, ArtifactUri, LocalArtifactStore};
pub use namespace::{
    LocalNamespaceFileStore, NamespaceFile, NamespaceFileSelector, NamespaceFileStore,
};

/// Join a relative path onto `root`, refusing anything that would escape it.
pub fn resolve_within(root: &Path, relative: impl AsRef<Path>) -> Result<PathBuf> {
    let relative = relative.as_ref();
    if relative.as_os_str().is_empty() {
        bail!("empty relative path");
    }

    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("path {:?} must be relative and stay inside {:?}", relative, root)
            }
        }
    }
    Ok(resolved)
}

/// `/`-separated key for `path` relative to `root`.
pub fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root)?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Recursively list regular files under `root` (symlinks are not followed).
pub async fn walk_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_within_rejects_escapes() {
        let root = Path::new("/work");
        assert_eq!(
            resolve_within(root, "a/./b.txt").unwrap(),
            PathBuf::from("/work/a/b.txt")
        );
        assert!(resolve_within(root, "../etc/passwd").is_err());
        assert!(resolve_within(root, "/etc/passwd").is_err());
        assert!(resolve_within(root, "").is_err());
    }

    #[test]
    fn relative_key_uses_forward_slashes() {
        let key = relative_key(Path::new("/work/out"), Path::new("/work/out/a/b.txt")).unwrap();
        assert_eq!(key, "a/b.txt");
    }

    #[tokio::test]
    async fn walk_files_descends_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("x/y")).unwrap();
        std::fs::write(dir.path().join("top.txt"), "1").unwrap();
        std::fs::write(dir.path().join("x/y/deep.txt"), "2").unwrap();

        let files = walk_files(dir.path()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&dir.path().join("x/y/deep.txt")));
    }
}
