//!  Branch and reference management.
//!
//!  Site repositories only ever move one branch forward: HEAD points at
//!  `refs/heads/main` from the moment the repository is created, and the
//!  branch is born with the first commit.

use git2::{ErrorCode, Repository};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

/// Manages Git references (branches).
pub struct RefManager;

impl RefManager {
    /// Get the current HEAD commit, or `None` while the branch is unborn.
    pub fn head_commit(repo: &Repository) -> StorageResult<Option<CommitId>> {
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(StorageError::Git(e)),
        };

        let commit = head.peel_to_commit()?;
        Ok(Some(CommitId::new(commit.id())))
    }

    /// Short name of the branch HEAD points at, even when it is unborn.
    pub fn current_branch(repo: &Repository) -> StorageResult<BranchName> {
        let head = repo.find_reference("HEAD")?;
        let target = head
            .symbolic_target()
            .and_then(|t| t.strip_prefix("refs/heads/"))
            .unwrap_or(BranchName::MAIN);
        Ok(BranchName::new(target)?)
    }
}
