//! Per-site scope over a [`Filesystem`].
//!
//! Each site gets one directory whose name is derived from its identifier.
//! Everything the repository and sync layers touch goes through here.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::traits::{DirEntry, Filesystem};
use crate::storage::{RepoPath, SiteId};

/// Name of the repository marker inside a site directory.
pub const REPO_MARKER: &str = ".git";

/// Whether a site-relative path lies inside the repository metadata directory.
///
/// Only the `.git` segment itself counts; `.gitignore` and `.github/` are
/// ordinary working files.
pub fn is_repo_metadata(path: &str) -> bool {
    path.split('/').next() == Some(REPO_MARKER)
}

/// A filesystem view scoped to one site's virtual directory.
#[derive(Clone)]
pub struct SiteFs {
    fs: Arc<dyn Filesystem>,
    site: SiteId,
    dir: PathBuf,
}

impl std::fmt::Debug for SiteFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteFs")
            .field("site", &self.site)
            .field("dir", &self.dir)
            .finish()
    }
}

impl SiteFs {
    pub fn new(fs: Arc<dyn Filesystem>, site: SiteId) -> Self {
        let dir = PathBuf::from(site.dir_name());
        Self { fs, site, dir }
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    /// The site directory, relative to the backing filesystem root.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Real on-disk location of the site directory, if the backend has one.
    pub fn real_dir(&self) -> Option<PathBuf> {
        self.fs.real_path(&self.dir)
    }

    fn scoped(&self, path: &Path) -> PathBuf {
        self.dir.join(path)
    }

    /// Create `path` (relative to the site directory) and all missing ancestors.
    pub async fn ensure_directory(&self, path: &Path) -> io::Result<()> {
        self.fs.mkdir(&self.scoped(path)).await
    }

    /// Write a file, optionally creating its parent directories first.
    pub async fn write_file(&self, path: &Path, data: &[u8], create_parents: bool) -> io::Result<()> {
        let full = self.scoped(path);
        if create_parents {
            if let Some(parent) = full.parent() {
                self.fs.mkdir(parent).await?;
            }
        }
        self.fs.write(&full, data).await
    }

    pub async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.fs.read(&self.scoped(path)).await
    }

    pub async fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.fs.remove(&self.scoped(path)).await
    }

    pub async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        self.fs.stat(&self.scoped(path)).await
    }

    /// Check for the repository marker.
    pub async fn has_repository(&self) -> bool {
        self.stat(Path::new(REPO_MARKER)).await.is_ok()
    }

    /// Recursively list every file below `path`, as `/`-separated paths
    /// relative to `path`, in lexical order.
    pub async fn list_files_under(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![String::new()];

        while let Some(prefix) = pending.pop() {
            let entries = self.fs.list(&self.scoped(path).join(&prefix)).await?;
            for entry in entries {
                let relative = if prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{}/{}", prefix, entry.name)
                };
                if entry.is_dir() {
                    pending.push(relative);
                } else {
                    files.push(relative);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Remove `path` and everything below it. A missing path is not an error.
    pub async fn remove_tree(&self, path: &Path) -> io::Result<()> {
        let root = self.scoped(path);
        match self.fs.stat(&root).await {
            Ok(entry) if !entry.is_dir() => return self.fs.remove(&root).await,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        }

        // directories are removed deepest first, after their files
        let mut dirs = vec![root.clone()];
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            for entry in self.fs.list(&dir).await? {
                let child = dir.join(&entry.name);
                if entry.is_dir() {
                    dirs.push(child.clone());
                    pending.push(child);
                } else {
                    self.fs.remove(&child).await?;
                }
            }
        }
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            self.fs.remove(&dir).await?;
        }

        debug!(site = %self.site, path = %path.display(), "removed tree");
        Ok(())
    }

    /// All working-tree files, excluding repository metadata.
    ///
    /// A site directory that does not exist yet has no files.
    pub async fn working_files(&self) -> io::Result<Vec<RepoPath>> {
        let listed = match self.list_files_under(Path::new("")).await {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut paths = Vec::with_capacity(listed.len());
        for file in listed {
            if is_repo_metadata(&file) {
                continue;
            }
            match RepoPath::new(file.as_str()) {
                Ok(path) => paths.push(path),
                Err(e) => debug!(file = %file, error = %e, "skipping unaddressable working file"),
            }
        }
        Ok(paths)
    }
}
