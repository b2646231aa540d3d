//! File surface the executor mutates

use super::{ActionError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Editor or filesystem view of the project
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Project root; relative action paths resolve against it
    fn root(&self) -> &Path;

    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Write a file, creating parent directories as needed
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;
}

/// Normalise a relative path, rejecting absolute paths and `..` escapes
///
/// Returns `None` when the path is absolute, empty, or climbs above its
/// starting directory.
pub fn normalize_relative(path: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

/// Workspace backed by the local filesystem
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a workspace path to an absolute location under the root
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.root)
                .map_err(|_| ActionError::PathOutsideWorkspace(path.to_path_buf()))?
        } else {
            path
        };
        let normalized = normalize_relative(relative)
            .ok_or_else(|| ActionError::PathOutsideWorkspace(path.to_path_buf()))?;
        Ok(self.root.join(normalized))
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full).await.map_err(|e| ActionError::io(path, e))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| ActionError::io(path, e))?;
        }
        debug!("Writing {} bytes to {}", content.len(), full.display());
        tokio::fs::write(&full, content).await.map_err(|e| ActionError::io(path, e))
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        let full = self.resolve(path)?;
        debug!("Deleting {}", full.display());
        tokio::fs::remove_file(&full).await.map_err(|e| ActionError::io(path, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative(Path::new("./src/../src/a.rs")), Some(PathBuf::from("src/a.rs")));
        assert_eq!(normalize_relative(Path::new("../secret")), None);
        assert_eq!(normalize_relative(Path::new("a/../../b")), None);
        assert_eq!(normalize_relative(Path::new("/etc/passwd")), None);
        assert_eq!(normalize_relative(Path::new(".")), None);
    }

    #[tokio::test]
    async fn test_local_workspace_round_trip() {
        let dir = TempDir::new().unwrap();
        let ws = LocalWorkspace::new(dir.path());

        ws.write_file(Path::new("nested/dir/file.txt"), "hello").await.unwrap();
        assert!(ws.exists(Path::new("nested/dir/file.txt")).await);
        assert_eq!(ws.read_file(Path::new("nested/dir/file.txt")).await.unwrap(), "hello");

        let absolute = dir.path().join("nested/dir/file.txt");
        assert_eq!(ws.read_file(&absolute).await.unwrap(), "hello");

        ws.delete_file(Path::new("nested/dir/file.txt")).await.unwrap();
        assert!(!ws.exists(Path::new("nested/dir/file.txt")).await);
    }

    #[tokio::test]
    async fn test_local_workspace_rejects_escape() {
        let dir = TempDir::new().unwrap();
        let ws = LocalWorkspace::new(dir.path());
        let err = ws.write_file(Path::new("../outside.txt"), "x").await.unwrap_err();
        assert!(matches!(err, ActionError::PathOutsideWorkspace(_)));
        assert!(ws.read_file(Path::new("/etc/hostname")).await.is_err());
    }
}
