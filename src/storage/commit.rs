//!  Commit creation and history lookups
//!
//!  Every user-facing "save" in the editor becomes exactly one commit on
//!  the site's main branch. This module handles commit creation, commit
//!  metadata and the per-commit change list shown in the history view.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Delta, Diff, DiffOptions, Oid, Repository};

use crate::storage::blob::BlobId;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::TreeHandle;
use crate::storage::types::{Change, ChangeStatus, CommitId, GitSignature, RepoPath, TreeId};

/// information about a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = author.when();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("Unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    pub fn short_id(&self) -> String {
        self.id.short()
    }
}

/// builder for creating commits with a fluent interface
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: Option<GitSignature>,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: None,
            update_ref: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// update a ref (branch) to point to this commit
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;
        let signature = self
            .signature
            .ok_or_else(|| StorageError::Internal("commit requires an author".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let sig = signature.to_git2_signature()?;

        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// get the tree snapshot at a specific commit
pub fn get_tree_at_commit(repo: &Repository, commit_id: CommitId) -> StorageResult<TreeHandle<'_>> {
    let commit = repo
        .find_commit(commit_id.raw())
        .map_err(|_| StorageError::CommitNotFound(commit_id.to_string()))?;

    let tree = commit.tree()?;
    Ok(TreeHandle::new(tree))
}

/// compute the changes a commit introduced relative to its first parent
///
/// a root commit is compared against the empty tree, so every file is added
pub fn commit_changes(repo: &Repository, id: CommitId) -> StorageResult<Vec<Change>> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::CommitNotFound(id.to_string()))?;

    let new_tree = commit.tree()?;
    let old_tree = match commit.parent_ids().next() {
        Some(parent) => Some(repo.find_commit(parent)?.tree()?),
        None => None,
    };

    let mut opts = DiffOptions::new();
    let diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;

    extract_changes_from_diff(&diff)
}

fn blob_or_none(oid: Oid) -> Option<BlobId> {
    if oid.is_zero() {
        None
    } else {
        Some(BlobId::new(oid))
    }
}

/// compute changes from a diff
fn extract_changes_from_diff(diff: &Diff<'_>) -> StorageResult<Vec<Change>> {
    let mut changes = Vec::new();

    for delta in diff.deltas() {
        let status = match delta.status() {
            Delta::Added => ChangeStatus::Added,
            Delta::Deleted => ChangeStatus::Deleted,
            Delta::Modified => ChangeStatus::Modified,
            // renames and copies are not detected; anything else is not a content change
            _ => continue,
        };

        let Some(raw_path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
            continue;
        };
        let path = RepoPath::new(raw_path.to_string_lossy().into_owned())?;

        changes.push(Change {
            path,
            status,
            old_blob: blob_or_none(delta.old_file().id()),
            new_blob: blob_or_none(delta.new_file().id()),
        });
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::FileMode;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn sig() -> GitSignature {
        GitSignature::for_user(Some("alice"), "agorapages.com")
    }

    fn tree_with(repo: &Repository, files: &[(&str, &[u8])]) -> TreeId {
        let mut builder = repo.treebuilder(None).unwrap();
        for (name, content) in files {
            let blob = repo.blob(content).unwrap();
            builder.insert(*name, blob, FileMode::Blob.into()).unwrap();
        }
        TreeId::new(builder.write().unwrap())
    }

    #[test]
    fn test_commit_builder() {
        let (_dir, repo) = setup_repo();

        let first = CommitBuilder::new(&repo)
            .tree(tree_with(&repo, &[("a.md", b"a")]))
            .message("First")
            .signature(sig())
            .update_ref("HEAD")
            .commit()
            .unwrap();

        let second = CommitBuilder::new(&repo)
            .tree(tree_with(&repo, &[("a.md", b"b")]))
            .parent(first)
            .message("Second commit\n\nwith a body")
            .signature(sig())
            .update_ref("HEAD")
            .commit()
            .unwrap();

        let info = get_commit(&repo, second).unwrap();
        assert_eq!(info.parent_ids, vec![first]);
        assert_eq!(info.first_parent(), Some(first));
        assert_eq!(info.summary(), "Second commit");
        assert_eq!(info.author_name, "alice");
        assert_eq!(info.author_email, "alice@noreply.agorapages.com");
        assert_eq!(info.short_id().len(), 7);
    }

    #[test]
    fn test_commit_requires_author() {
        let (_dir, repo) = setup_repo();
        let result = CommitBuilder::new(&repo)
            .tree(tree_with(&repo, &[]))
            .message("anonymous")
            .commit();
        assert!(matches!(result, Err(StorageError::Internal(_))));
    }

    #[test]
    fn test_missing_commit() {
        let (_dir, repo) = setup_repo();
        let bogus = CommitId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert!(matches!(get_commit(&repo, bogus), Err(StorageError::CommitNotFound(_))));
    }

    #[test]
    fn test_commit_changes() {
        let (_dir, repo) = setup_repo();

        let c1 = CommitBuilder::new(&repo)
            .tree(tree_with(&repo, &[("a.md", b"a"), ("b.md", b"b")]))
            .message("c1")
            .signature(sig())
            .commit()
            .unwrap();

        let root_changes = commit_changes(&repo, c1).unwrap();
        assert_eq!(root_changes.len(), 2);
        assert!(root_changes.iter().all(|c| c.status == ChangeStatus::Added));
        assert!(root_changes.iter().all(|c| c.old_blob.is_none()));

        let c2 = CommitBuilder::new(&repo)
            .tree(tree_with(&repo, &[("a.md", b"a2"), ("c.md", b"c")]))
            .parent(c1)
            .message("c2")
            .signature(sig())
            .commit()
            .unwrap();

        let changes = commit_changes(&repo, c2).unwrap();
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.path.as_str(), c.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a.md", ChangeStatus::Modified),
                ("b.md", ChangeStatus::Deleted),
                ("c.md", ChangeStatus::Added),
            ]
        );
        assert!(changes[1].new_blob.is_none());
        assert!(changes[0].old_blob.is_some() && changes[0].new_blob.is_some());
    }
}
