//! tree operations for commit snapshots.
//!
//! in Git, a tree is a directory. A site's tree mirrors its working
//! directory: `public/` holds page markdown, rendered HTML and the JSON
//! manifests. This module flattens trees into path → blob maps, which is
//! the shape the status and diff layers work with.

use std::collections::BTreeMap;

use git2::{ErrorCode, ObjectType, Tree, TreeWalkMode, TreeWalkResult};
use tracing::debug;

use crate::storage::blob::BlobId;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::RepoPath;

/// A read only handle to a git tree at a specific commit
///
/// think of it as a snapshot - it won't change even if new commits are made.
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    /// every file in the tree, recursively, keyed by repository path
    pub fn files(&self) -> StorageResult<BTreeMap<RepoPath, BlobId>> {
        let mut files = BTreeMap::new();

        self.tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            let Some(name) = entry.name() else {
                return TreeWalkResult::Ok;
            };
            let full = format!("{}{}", root, name);
            match RepoPath::new(full.as_str()) {
                Ok(path) => {
                    files.insert(path, BlobId::new(entry.id()));
                }
                Err(e) => debug!(path = %full, error = %e, "skipping tree entry"),
            }
            TreeWalkResult::Ok
        })?;

        Ok(files)
    }

    /// blob id of the file at `path`, if present
    pub fn blob_at(&self, path: &RepoPath) -> StorageResult<Option<BlobId>> {
        match self.tree.get_path(path.as_path()) {
            Ok(entry) => {
                if entry.kind() != Some(ObjectType::Blob) {
                    return Err(StorageError::CorruptedData {
                        path: path.to_string(),
                        reason: format!("expected a file, found {:?}", entry.kind()),
                    });
                }
                Ok(Some(BlobId::new(entry.id())))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(StorageError::Git(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{FileMode, Repository};
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    /// builds `public/index.md` and `readme.txt`
    fn build_tree(repo: &Repository) -> git2::Oid {
        let page = repo.blob(b"# Hi").unwrap();
        let readme = repo.blob(b"readme").unwrap();

        let mut public = repo.treebuilder(None).unwrap();
        public.insert("index.md", page, FileMode::Blob.into()).unwrap();
        let public_id = public.write().unwrap();

        let mut root = repo.treebuilder(None).unwrap();
        root.insert("public", public_id, FileMode::Tree.into()).unwrap();
        root.insert("readme.txt", readme, FileMode::Blob.into()).unwrap();
        root.write().unwrap()
    }

    #[test]
    fn test_files_flattens_subtrees() {
        let (_dir, repo) = setup_repo();
        let tree = repo.find_tree(build_tree(&repo)).unwrap();
        let handle = TreeHandle::new(tree);

        let files = handle.files().unwrap();
        let paths: Vec<_> = files.keys().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["public/index.md", "readme.txt"]);
    }

    #[test]
    fn test_blob_at() {
        let (_dir, repo) = setup_repo();
        let tree = repo.find_tree(build_tree(&repo)).unwrap();
        let handle = TreeHandle::new(tree);

        let found = handle.blob_at(&RepoPath::new("public/index.md").unwrap()).unwrap();
        assert!(found.is_some());

        let missing = handle.blob_at(&RepoPath::new("public/about.md").unwrap()).unwrap();
        assert!(missing.is_none());

        // a directory is not a file
        let dir_entry = handle.blob_at(&RepoPath::new("public").unwrap());
        assert!(matches!(dir_entry, Err(StorageError::CorruptedData { .. })));
    }

    #[test]
    fn test_empty_tree() {
        let (_dir, repo) = setup_repo();
        let empty = repo.treebuilder(None).unwrap().write().unwrap();
        let handle = TreeHandle::new(repo.find_tree(empty).unwrap());
        assert!(handle.files().unwrap().is_empty());
    }
}
