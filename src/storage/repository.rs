//! Per-site repository state tracker.
//!
//! This is the central component of the storage layer. It wraps
//! `git2::Repository` with thread-safe access and gives the status and sync
//! layers Git semantics over a site's virtual directory: a working tree, a
//! stage (the git index) and a linear commit history.
//!
//! Working-tree bytes always travel through the [`SiteFs`]; git2 only ever
//! sees them as buffers. Async filesystem calls happen before the repository
//! lock is taken, never while it is held.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use git2::{IndexEntry, IndexTime, Repository, RepositoryInitOptions};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::blob::{self, BlobId};
use crate::storage::commit::{self, CommitBuilder, CommitInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::types::{
    BranchName, Change, CommitId, GitSignature, RepoPath, SiteId, TreeId,
};
use crate::vfs::{is_repo_metadata, SiteFs};

/// regular, non-executable file
const FILE_MODE: u32 = 0o100644;

/// The repository of one site.
///
/// Clone this to share it - it uses Arc internally.
#[derive(Clone)]
pub struct SiteRepository {
    inner: Arc<SiteRepositoryInner>,
}

struct SiteRepositoryInner {
    repo: Mutex<Repository>,
    fs: SiteFs,
}

impl std::fmt::Debug for SiteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteRepository")
            .field("fs", &self.inner.fs)
            .finish()
    }
}

/// The three facts the status engine classifies a path from.
///
/// Each side is the blob id the path has there, or `None` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub path: RepoPath,
    pub head: Option<BlobId>,
    pub stage: Option<BlobId>,
    pub workdir: Option<BlobId>,
}

impl SiteRepository {
    /// Create the site directory and an empty repository, or open the one
    /// already there. Calling this again is a no-op.
    pub async fn initialize(fs: SiteFs) -> StorageResult<Self> {
        match Self::create(fs.clone()).await {
            Ok(repo) => Ok(repo),
            Err(StorageError::AlreadyExists(_)) => {
                debug!(site = %fs.site(), "repository already initialized");
                Self::open(fs)
            }
            Err(e) => Err(e),
        }
    }

    /// Create a repository, failing with `AlreadyExists` if one is present.
    pub async fn create(fs: SiteFs) -> StorageResult<Self> {
        if fs.has_repository().await {
            return Err(StorageError::AlreadyExists(fs.dir().to_path_buf()));
        }

        fs.ensure_directory(Path::new("")).await?;
        let dir = fs
            .real_dir()
            .ok_or_else(|| StorageError::Unsupported(fs.dir().to_path_buf()))?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(BranchName::MAIN);
        let repo = Repository::init_opts(&dir, &opts)?;

        info!(site = %fs.site(), path = %dir.display(), "initialized repository");
        Ok(Self::from_parts(repo, fs))
    }

    /// Open an existing repository.
    pub fn open(fs: SiteFs) -> StorageResult<Self> {
        let dir = fs
            .real_dir()
            .ok_or_else(|| StorageError::Unsupported(fs.dir().to_path_buf()))?;
        let repo =
            Repository::open(&dir).map_err(|_| StorageError::NotInitialized(fs.dir().to_path_buf()))?;
        Ok(Self::from_parts(repo, fs))
    }

    fn from_parts(repo: Repository, fs: SiteFs) -> Self {
        Self {
            inner: Arc::new(SiteRepositoryInner {
                repo: Mutex::new(repo),
                fs,
            }),
        }
    }

    pub fn site(&self) -> &SiteId {
        self.inner.fs.site()
    }

    pub fn fs(&self) -> &SiteFs {
        &self.inner.fs
    }

    /// Execute a function with exclusive access to the repository.
    pub fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    // ==================== References ====================

    /// The current HEAD commit, `None` until the first commit.
    pub fn head(&self) -> StorageResult<Option<CommitId>> {
        self.with_repo(RefManager::head_commit)
    }

    pub fn current_branch(&self) -> StorageResult<BranchName> {
        self.with_repo(RefManager::current_branch)
    }

    // ==================== Working tree ====================

    /// Write a file to the working tree, creating parent directories, and stage it.
    pub async fn write_file(&self, path: &RepoPath, data: &[u8]) -> StorageResult<()> {
        self.inner
            .fs
            .write_file(path.as_path(), data, true)
            .await
            .map_err(|e| StorageError::from_io(path.as_str(), e))?;
        debug!(site = %self.site(), path = %path, bytes = data.len(), "wrote file");
        self.stage(path).await
    }

    /// Raw working-tree bytes; `NotFound` when absent.
    pub async fn read_file(&self, path: &RepoPath) -> StorageResult<Vec<u8>> {
        self.inner
            .fs
            .read_file(path.as_path())
            .await
            .map_err(|e| StorageError::from_io(path.as_str(), e))
    }

    /// Working-tree text, or `None` when the file does not exist.
    pub async fn read_text(&self, path: &RepoPath) -> StorageResult<Option<String>> {
        match self.read_file(path).await {
            Ok(data) => Ok(Some(blob::decode_text(&data))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a file from both the working tree and the stage.
    pub async fn delete_file(&self, path: &RepoPath) -> StorageResult<()> {
        self.remove(path).await
    }

    /// Rename by reading the old file, writing the new one and removing the old.
    ///
    /// History records a deletion and an unrelated addition.
    pub async fn rename_file(&self, from: &RepoPath, to: &RepoPath) -> StorageResult<()> {
        let data = self.read_file(from).await?;
        self.write_file(to, &data).await?;
        self.remove(from).await?;
        info!(site = %self.site(), from = %from, to = %to, "renamed file");
        Ok(())
    }

    // ==================== Stage ====================

    /// Stage the working-tree state of `path`.
    ///
    /// A path missing from the working tree stages its deletion.
    pub async fn stage(&self, path: &RepoPath) -> StorageResult<()> {
        match self.inner.fs.read_file(path.as_path()).await {
            Ok(data) => self.with_repo(|repo| {
                let mut index = repo.index()?;
                index.add_frombuffer(&index_entry(path, data.len()), &data)?;
                index.write()?;
                debug!(path = %path, "staged");
                Ok(())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.with_repo(|repo| {
                let mut index = repo.index()?;
                index.remove_path(path.as_path())?;
                index.write()?;
                debug!(path = %path, "staged deletion");
                Ok(())
            }),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Reset the stage entry of `path` to its HEAD state.
    pub fn unstage(&self, path: &RepoPath) -> StorageResult<()> {
        self.with_repo(|repo| {
            let head = match RefManager::head_commit(repo)? {
                Some(id) => Some(repo.find_object(id.raw(), None)?),
                None => None,
            };
            repo.reset_default(head.as_ref(), [path.as_str()])?;
            debug!(path = %path, "unstaged");
            Ok(())
        })
    }

    /// Remove `path` from the stage and the working tree together.
    ///
    /// An already-absent working file is not an error.
    pub async fn remove(&self, path: &RepoPath) -> StorageResult<()> {
        match self.inner.fs.delete_file(path.as_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path, "file already gone from working tree");
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        self.with_repo(|repo| {
            let mut index = repo.index()?;
            index.remove_path(path.as_path())?;
            index.write()?;
            Ok(())
        })?;

        info!(site = %self.site(), path = %path, "removed file");
        Ok(())
    }

    /// Stage every pending change in the working tree, deletions included.
    pub async fn stage_all(&self) -> StorageResult<()> {
        let files = self.read_working_tree().await?;

        self.with_repo(|repo| {
            let mut index = repo.index()?;
            let staged = staged_blobs(&index);

            for (path, data) in &files {
                let id = blob::hash_bytes(data)?;
                if staged.get(path) != Some(&id) {
                    index.add_frombuffer(&index_entry(path, data.len()), data)?;
                }
            }
            for path in staged.keys() {
                if !files.contains_key(path) {
                    index.remove_path(path.as_path())?;
                }
            }

            index.write()?;
            Ok(())
        })
    }

    // ==================== Commits ====================

    /// Stage everything and commit it on the current branch.
    ///
    /// Fails with `NothingToCommit` when the result would equal HEAD.
    pub async fn commit(&self, message: &str, author: &GitSignature) -> StorageResult<CommitId> {
        self.stage_all().await?;

        let id = self.with_repo(|repo| {
            let tree_id = TreeId::new(repo.index()?.write_tree()?);
            let parent = RefManager::head_commit(repo)?;

            match parent {
                Some(head) => {
                    if commit::get_commit(repo, head)?.tree_id == tree_id {
                        return Err(StorageError::NothingToCommit);
                    }
                }
                None => {
                    if repo.find_tree(tree_id.raw())?.is_empty() {
                        return Err(StorageError::NothingToCommit);
                    }
                }
            }

            let mut builder = CommitBuilder::new(repo)
                .tree(tree_id)
                .message(message)
                .signature(author.clone())
                .update_ref("HEAD");
            if let Some(head) = parent {
                builder = builder.parent(head);
            }
            builder.commit()
        })?;

        info!(site = %self.site(), commit = %id.short(), author = %author.name, "committed");
        Ok(id)
    }

    /// Walk history from HEAD backwards along first parents, at most `depth` commits.
    pub fn log(&self, depth: usize) -> StorageResult<CommitLog> {
        Ok(CommitLog {
            repo: self.clone(),
            next: self.head()?,
            remaining: depth,
        })
    }

    pub fn get_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        self.with_repo(|repo| commit::get_commit(repo, id))
    }

    /// Paths added, modified or deleted by `id` relative to its first parent.
    pub fn commit_changes(&self, id: CommitId) -> StorageResult<Vec<Change>> {
        self.with_repo(|repo| commit::commit_changes(repo, id))
    }

    /// Every file of the commit's tree.
    pub fn files_at_commit(&self, id: CommitId) -> StorageResult<BTreeMap<RepoPath, BlobId>> {
        self.with_repo(|repo| commit::get_tree_at_commit(repo, id)?.files())
    }

    /// Content of `path` as it was at `id`; `NotFound` if it did not exist there.
    pub fn read_blob_at_commit(&self, id: CommitId, path: &RepoPath) -> StorageResult<Vec<u8>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, id)?;
            let blob_id = tree
                .blob_at(path)?
                .ok_or_else(|| StorageError::NotFound(format!("{} at {}", path, id.short())))?;
            blob::read_blob(repo, blob_id)
        })
    }

    pub fn read_text_at_commit(&self, id: CommitId, path: &RepoPath) -> StorageResult<String> {
        self.read_blob_at_commit(id, path)
            .map(|data| blob::decode_text(&data))
    }

    pub fn read_blob(&self, id: BlobId) -> StorageResult<Vec<u8>> {
        self.with_repo(|repo| blob::read_blob(repo, id))
    }

    // ==================== Snapshot ====================

    /// Head, stage and working-tree blob ids of every path known to any of
    /// the three, in lexical path order.
    pub async fn snapshot(&self) -> StorageResult<Vec<FileSnapshot>> {
        let working = self.read_working_tree().await?;
        let mut workdir = BTreeMap::new();
        for (path, data) in working {
            let id = blob::hash_bytes(&data)?;
            workdir.insert(path, id);
        }

        let (head, stage) = self.with_repo(|repo| {
            let head = match RefManager::head_commit(repo)? {
                Some(id) => commit::get_tree_at_commit(repo, id)?.files()?,
                None => BTreeMap::new(),
            };
            let stage = staged_blobs(&repo.index()?);
            Ok((head, stage))
        })?;

        let paths: BTreeSet<&RepoPath> = head
            .keys()
            .chain(stage.keys())
            .chain(workdir.keys())
            .collect();

        Ok(paths
            .into_iter()
            .map(|path| FileSnapshot {
                path: path.clone(),
                head: head.get(path).copied(),
                stage: stage.get(path).copied(),
                workdir: workdir.get(path).copied(),
            })
            .collect())
    }

    /// Repository summary.
    pub async fn stats(&self) -> StorageResult<RepositoryStats> {
        let tracked = self.inner.fs.working_files().await?.len();
        let branch = self.current_branch()?;
        let head = self.head()?;

        let mut commits = 0;
        for entry in self.log(usize::MAX)? {
            entry?;
            commits += 1;
        }

        Ok(RepositoryStats {
            site: self.site().clone(),
            branch,
            head,
            commit_count: commits,
            working_files: tracked,
        })
    }

    async fn read_working_tree(&self) -> StorageResult<BTreeMap<RepoPath, Vec<u8>>> {
        let mut files = BTreeMap::new();
        for path in self.inner.fs.working_files().await? {
            match self.inner.fs.read_file(path.as_path()).await {
                Ok(data) => {
                    files.insert(path, data);
                }
                // removed between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        Ok(files)
    }
}

fn index_entry(path: &RepoPath, len: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: FILE_MODE,
        uid: 0,
        gid: 0,
        file_size: u32::try_from(len).unwrap_or(u32::MAX),
        id: git2::Oid::zero(),
        flags: 0,
        flags_extended: 0,
        path: path.as_str().as_bytes().to_vec(),
    }
}

fn staged_blobs(index: &git2::Index) -> BTreeMap<RepoPath, BlobId> {
    let mut staged = BTreeMap::new();
    for entry in index.iter() {
        let raw = String::from_utf8_lossy(&entry.path).into_owned();
        if is_repo_metadata(&raw) {
            continue;
        }
        match RepoPath::new(raw.as_str()) {
            Ok(path) => {
                staged.insert(path, BlobId::new(entry.id));
            }
            Err(e) => debug!(path = %raw, error = %e, "skipping index entry"),
        }
    }
    staged
}

/// Lazy first-parent walk from HEAD, bounded by a depth.
///
/// Each step locks the repository only while reading one commit. The
/// iterator cannot be restarted; call [`SiteRepository::log`] again.
pub struct CommitLog {
    repo: SiteRepository,
    next: Option<CommitId>,
    remaining: usize,
}

impl Iterator for CommitLog {
    type Item = StorageResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next.take()?;
        self.remaining -= 1;

        match self.repo.get_commit(id) {
            Ok(info) => {
                self.next = info.first_parent();
                Some(Ok(info))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Summary of a site repository.
#[derive(Debug, Clone)]
pub struct RepositoryStats {
    pub site: SiteId,
    pub branch: BranchName,
    pub head: Option<CommitId>,
    pub commit_count: usize,
    pub working_files: usize,
}

impl std::fmt::Display for RepositoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Site: {}", self.site)?;
        writeln!(f, "  Branch: {}", self.branch)?;
        match self.head {
            Some(head) => writeln!(f, "  HEAD: {}", head.short())?,
            None => writeln!(f, "  HEAD: (no commits yet)")?,
        }
        writeln!(f, "  Commits: {}", self.commit_count)?;
        write!(f, "  Working files: {}", self.working_files)
    }
}
