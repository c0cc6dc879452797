//! Local filesystem backend.
//!
//! Every site directory lives under one data root on disk.

use super::traits::{DirEntry, Filesystem};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/var/lib/pagegit`, then `read("alice_blog/public/index.md")` reads
/// `/var/lib/pagegit/alice_blog/public/index.md`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Create a new local filesystem rooted at the given path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path within the root without touching the disk.
    ///
    /// `..` components are rejected rather than resolved.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(c) => resolved.push(c),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("path escapes root: {}", path.display()),
                    ));
                }
            }
        }
        Ok(resolved)
    }

    fn entry_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let full = self.resolve(path)?;
        fs::read(&full).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full = self.resolve(path)?;
        fs::write(&full, data).await
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let full = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full).await?;

        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if metadata.is_dir() {
                entries.push(DirEntry::directory(name));
            } else {
                entries.push(DirEntry::file(name, metadata.len()));
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full).await?;
        let name = Self::entry_name(&full);
        if metadata.is_dir() {
            Ok(DirEntry::directory(name))
        } else {
            Ok(DirEntry::file(name, metadata.len()))
        }
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        let full = self.resolve(path)?;
        fs::create_dir_all(&full).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        let full = self.resolve(path)?;
        if fs::metadata(&full).await?.is_dir() {
            fs::remove_dir(&full).await
        } else {
            fs::remove_file(&full).await
        }
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        self.resolve(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalFs) {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new(dir.path());
        (dir, fs)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (_dir, fs) = setup();
        fs.write(Path::new("a.txt"), b"hello").await.unwrap();
        assert_eq!(fs.read(Path::new("a.txt")).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_write_requires_parent() {
        let (_dir, fs) = setup();
        let err = fs.write(Path::new("missing/a.txt"), b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_mkdir_is_idempotent() {
        let (_dir, fs) = setup();
        fs.mkdir(Path::new("a/b/c")).await.unwrap();
        fs.mkdir(Path::new("a/b/c")).await.unwrap();
        assert!(fs.stat(Path::new("a/b")).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let (_dir, fs) = setup();
        fs.write(Path::new("b.txt"), b"b").await.unwrap();
        fs.write(Path::new("a.txt"), b"aa").await.unwrap();
        fs.mkdir(Path::new("c")).await.unwrap();

        let entries = fs.list(Path::new("")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c"]);
        assert_eq!(entries[0].size, 2);
        assert!(entries[2].is_dir());
    }

    #[tokio::test]
    async fn test_remove_empty_directory() {
        let (_dir, fs) = setup();
        fs.mkdir(Path::new("d/e")).await.unwrap();
        assert!(fs.remove(Path::new("d")).await.is_err());
        fs.remove(Path::new("d/e")).await.unwrap();
        fs.remove(Path::new("d")).await.unwrap();
        assert!(!fs.exists(Path::new("d")).await);
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let (_dir, fs) = setup();
        let err = fs.remove(Path::new("nope")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_parent_dir_rejected() {
        let (_dir, fs) = setup();
        let err = fs.read(Path::new("../etc/passwd")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(fs.real_path(Path::new("../x")).is_none());
    }
}
