//! File classification from head, working-tree and stage facts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::storage::{BlobId, FileSnapshot, RepoPath};

/// Whether the path exists in the HEAD commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadState {
    Absent,
    Present,
}

/// Working-tree state relative to HEAD.
///
/// A file with no HEAD counterpart is always `Changed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkdirState {
    Absent,
    Unchanged,
    Changed,
}

/// Stage state relative to HEAD and the working tree.
///
/// When HEAD and the working tree agree, `MatchesHead` wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Absent,
    MatchesHead,
    MatchesWorkdir,
    Other,
}

/// What the editor shows next to a pending file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Untracked,
}

impl FileStatus {
    /// one-letter marker used in terse listings
    pub fn symbol(&self) -> char {
        match self {
            Self::Added => 'A',
            Self::Modified => 'M',
            Self::Deleted => 'D',
            Self::Untracked => '?',
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Untracked => "untracked",
        };
        f.write_str(s)
    }
}

/// The three independent facts about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathState {
    pub head: HeadState,
    pub workdir: WorkdirState,
    pub stage: StageState,
}

impl PathState {
    pub fn new(head: HeadState, workdir: WorkdirState, stage: StageState) -> Self {
        Self { head, workdir, stage }
    }

    /// Derive the facts from the blob ids a path has on each side.
    pub fn from_blobs(head: Option<BlobId>, workdir: Option<BlobId>, stage: Option<BlobId>) -> Self {
        let head_state = match head {
            Some(_) => HeadState::Present,
            None => HeadState::Absent,
        };

        let workdir_state = match (head, workdir) {
            (_, None) => WorkdirState::Absent,
            (Some(h), Some(w)) if h == w => WorkdirState::Unchanged,
            _ => WorkdirState::Changed,
        };

        let stage_state = match stage {
            None => StageState::Absent,
            Some(s) if Some(s) == head => StageState::MatchesHead,
            Some(s) if Some(s) == workdir => StageState::MatchesWorkdir,
            Some(_) => StageState::Other,
        };

        Self::new(head_state, workdir_state, stage_state)
    }
}

impl From<&FileSnapshot> for PathState {
    fn from(snapshot: &FileSnapshot) -> Self {
        Self::from_blobs(snapshot.head, snapshot.workdir, snapshot.stage)
    }
}

/// Classify one path; `None` means it is not reported.
pub fn classify(state: PathState) -> Option<FileStatus> {
    use HeadState as H;
    use StageState as S;
    use WorkdirState as W;

    match (state.head, state.workdir, state.stage) {
        (H::Absent, W::Changed, S::MatchesWorkdir) => Some(FileStatus::Added),
        (H::Present, W::Absent, S::Absent) => Some(FileStatus::Deleted),
        (H::Present, W::Changed, S::MatchesWorkdir) => Some(FileStatus::Modified),
        (H::Present, W::Changed, S::MatchesHead) => Some(FileStatus::Modified),
        (H::Absent, W::Changed, S::Absent) => Some(FileStatus::Untracked),
        _ => None,
    }
}

/// A reported path and its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub path: RepoPath,
    pub status: FileStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::hash_bytes;

    fn id(s: &str) -> BlobId {
        hash_bytes(s.as_bytes()).unwrap()
    }

    #[test]
    fn test_table_rows() {
        use HeadState as H;
        use StageState as S;
        use WorkdirState as W;

        let rows = [
            (H::Absent, W::Changed, S::MatchesWorkdir, FileStatus::Added),
            (H::Present, W::Absent, S::Absent, FileStatus::Deleted),
            (H::Present, W::Changed, S::MatchesWorkdir, FileStatus::Modified),
            (H::Present, W::Changed, S::MatchesHead, FileStatus::Modified),
            (H::Absent, W::Changed, S::Absent, FileStatus::Untracked),
        ];
        for (h, w, s, expected) in rows {
            assert_eq!(classify(PathState::new(h, w, s)), Some(expected), "{:?} {:?} {:?}", h, w, s);
        }
    }

    #[test]
    fn test_other_combinations_not_reported() {
        use HeadState as H;
        use StageState as S;
        use WorkdirState as W;

        let reported = [
            (H::Absent, W::Changed, S::MatchesWorkdir),
            (H::Present, W::Absent, S::Absent),
            (H::Present, W::Changed, S::MatchesWorkdir),
            (H::Present, W::Changed, S::MatchesHead),
            (H::Absent, W::Changed, S::Absent),
        ];

        for h in [H::Absent, H::Present] {
            for w in [W::Absent, W::Unchanged, W::Changed] {
                for s in [S::Absent, S::MatchesHead, S::MatchesWorkdir, S::Other] {
                    if reported.contains(&(h, w, s)) {
                        continue;
                    }
                    assert_eq!(classify(PathState::new(h, w, s)), None, "{:?} {:?} {:?}", h, w, s);
                }
            }
        }
    }

    #[test]
    fn test_from_blobs() {
        let a = id("a");
        let b = id("b");

        // clean tracked file
        let clean = PathState::from_blobs(Some(a), Some(a), Some(a));
        assert_eq!(clean.workdir, WorkdirState::Unchanged);
        assert_eq!(clean.stage, StageState::MatchesHead);
        assert_eq!(classify(clean), None);

        // new file, staged
        let added = PathState::from_blobs(None, Some(a), Some(a));
        assert_eq!(classify(added), Some(FileStatus::Added));

        // edited, unstaged
        let edited = PathState::from_blobs(Some(a), Some(b), Some(a));
        assert_eq!(classify(edited), Some(FileStatus::Modified));

        // deleted with the deletion staged
        let deleted = PathState::from_blobs(Some(a), None, None);
        assert_eq!(classify(deleted), Some(FileStatus::Deleted));

        // added then deleted before commit: only a stale stage entry remains
        let gone = PathState::from_blobs(None, None, Some(a));
        assert_eq!(gone.stage, StageState::Other);
        assert_eq!(classify(gone), None);
    }

    #[test]
    fn test_status_serialization() {
        let entry = StatusEntry {
            path: RepoPath::new("public/index.md").unwrap(),
            status: FileStatus::Modified,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"path":"public/index.md","status":"modified"}"#);
        assert_eq!(FileStatus::Untracked.symbol(), '?');
    }
}
