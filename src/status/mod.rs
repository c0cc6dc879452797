//! Status and diff engine.
//!
//! Everything here is recomputed from the repository on every call; no state
//! is kept between calls.
//!
//! ```text
//!   SiteRepository::snapshot()
//!          │  (head, stage, workdir) blob ids per path
//!          ▼
//!   PathState::from ──► classify ──► [StatusEntry]
//!
//!   diff(path) ──► FileDiff { old, new } ──► line_diff ──► DiffPreview
//! ```

mod classify;
mod diff;
mod history;

pub use classify::{classify, FileStatus, HeadState, PathState, StageState, StatusEntry, WorkdirState};
pub use diff::{line_diff, minimal_diff, whole_file, DiffLine, DiffOp, DiffPreview};
pub use history::{detailed_commit_changes, CommitFileChange, PUBLIC_DIR};

use crate::storage::{RepoPath, SiteRepository, StorageResult};

/// Pending changes in lexical path order, excluding repository metadata.
pub async fn status(repo: &SiteRepository) -> StorageResult<Vec<StatusEntry>> {
    let entries = repo
        .snapshot()
        .await?
        .iter()
        .filter_map(|snapshot| {
            classify(PathState::from(snapshot)).map(|status| StatusEntry {
                path: snapshot.path.clone(),
                status,
            })
        })
        .collect();
    Ok(entries)
}

/// Last-commit and working-tree text of one file.
///
/// An absent side reads as the empty string, so an emptied file and a
/// deleted file look the same here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub old: String,
    pub new: String,
}

impl FileDiff {
    pub fn lines(&self) -> Vec<DiffLine> {
        line_diff(&self.old, &self.new)
    }
}

pub async fn diff(repo: &SiteRepository, path: &RepoPath) -> StorageResult<FileDiff> {
    let new = repo.read_text(path).await?.unwrap_or_default();

    let old = match repo.head()? {
        Some(head) => match repo.read_text_at_commit(head, path) {
            Ok(text) => text,
            Err(e) if e.is_not_found() => String::new(),
            Err(e) => return Err(e),
        },
        None => String::new(),
    };

    Ok(FileDiff { old, new })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GitSignature, SiteId};
    use crate::vfs::{Filesystem, LocalFs, SiteFs};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SiteRepository) {
        let dir = TempDir::new().unwrap();
        let fs: Arc<dyn Filesystem> = Arc::new(LocalFs::new(dir.path()));
        let site_fs = SiteFs::new(fs, SiteId::new("alice/blog").unwrap());
        (dir, SiteRepository::initialize(site_fs).await.unwrap())
    }

    fn path(p: &str) -> RepoPath {
        RepoPath::new(p).unwrap()
    }

    fn sig() -> GitSignature {
        GitSignature::for_user(Some("alice"), "agorapages.com")
    }

    fn summary(entries: &[StatusEntry]) -> Vec<(&str, FileStatus)> {
        entries.iter().map(|e| (e.path.as_str(), e.status)).collect()
    }

    #[tokio::test]
    async fn test_status_clean_after_commit() {
        let (_dir, repo) = setup().await;
        assert!(status(&repo).await.unwrap().is_empty());

        repo.write_file(&path("public/index.md"), b"# Hi").await.unwrap();
        repo.commit("first", &sig()).await.unwrap();
        assert!(status(&repo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_classifications() {
        let (_dir, repo) = setup().await;
        repo.write_file(&path("public/keep.md"), b"keep").await.unwrap();
        repo.write_file(&path("public/edit.md"), b"v1").await.unwrap();
        repo.write_file(&path("public/gone.md"), b"bye").await.unwrap();
        repo.commit("first", &sig()).await.unwrap();

        // staged edit
        repo.write_file(&path("public/edit.md"), b"v2").await.unwrap();
        // staged deletion
        repo.delete_file(&path("public/gone.md")).await.unwrap();
        // staged new file
        repo.write_file(&path("public/new.md"), b"new").await.unwrap();
        // raw writes are not staged
        repo.fs()
            .write_file(Path::new("public/keep.md"), b"keep 2", false)
            .await
            .unwrap();
        repo.fs()
            .write_file(Path::new("public/loose.md"), b"loose", false)
            .await
            .unwrap();

        let entries = status(&repo).await.unwrap();
        assert_eq!(
            summary(&entries),
            vec![
                ("public/edit.md", FileStatus::Modified),
                ("public/gone.md", FileStatus::Deleted),
                ("public/keep.md", FileStatus::Modified),
                ("public/loose.md", FileStatus::Untracked),
                ("public/new.md", FileStatus::Added),
            ]
        );
    }

    #[tokio::test]
    async fn test_status_added_then_deleted() {
        let (_dir, repo) = setup().await;
        repo.write_file(&path("public/index.md"), b"# Hi").await.unwrap();
        repo.commit("first", &sig()).await.unwrap();

        repo.write_file(&path("public/draft.md"), b"draft").await.unwrap();
        assert_eq!(
            summary(&status(&repo).await.unwrap()),
            vec![("public/draft.md", FileStatus::Added)]
        );

        repo.delete_file(&path("public/draft.md")).await.unwrap();
        assert!(status(&repo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_dot_git_lookalikes() {
        let (_dir, repo) = setup().await;
        repo.write_file(&path(".gitignore"), b"dist/").await.unwrap();
        repo.write_file(&path(".github/workflows/ci.yml"), b"on: push")
            .await
            .unwrap();

        assert_eq!(
            summary(&status(&repo).await.unwrap()),
            vec![
                (".github/workflows/ci.yml", FileStatus::Added),
                (".gitignore", FileStatus::Added),
            ]
        );

        // status and commit agree on what is pending
        repo.commit("ci", &sig()).await.unwrap();
        assert!(status(&repo).await.unwrap().is_empty());
        let err = repo.commit("again", &sig()).await.unwrap_err();
        assert!(matches!(err, crate::storage::StorageError::NothingToCommit));
    }

    #[tokio::test]
    async fn test_diff_sides() {
        let (_dir, repo) = setup().await;

        let before = diff(&repo, &path("public/index.md")).await.unwrap();
        assert_eq!(before, FileDiff { old: String::new(), new: String::new() });

        repo.write_file(&path("public/index.md"), b"# Hi").await.unwrap();
        repo.commit("first", &sig()).await.unwrap();
        repo.write_file(&path("public/index.md"), b"# Hi there").await.unwrap();

        let d = diff(&repo, &path("public/index.md")).await.unwrap();
        assert_eq!(d.old, "# Hi");
        assert_eq!(d.new, "# Hi there");
        assert_eq!(d.lines().len(), 2);

        // deleted and emptied files read the same
        repo.delete_file(&path("public/index.md")).await.unwrap();
        let deleted = diff(&repo, &path("public/index.md")).await.unwrap();
        repo.write_file(&path("public/index.md"), b"").await.unwrap();
        let emptied = diff(&repo, &path("public/index.md")).await.unwrap();
        assert_eq!(deleted, emptied);
    }
}
