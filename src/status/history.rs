//! Per-commit change details for the history view.

use serde::Serialize;

use crate::status::diff::{minimal_diff, DiffLine, DiffPreview};
use crate::storage::{decode_text, ChangeStatus, CommitId, SiteRepository, StorageResult};

/// Only files under this directory are shown in the history view.
pub const PUBLIC_DIR: &str = "public/";

/// A published file changed by a commit, with a bounded diff against the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitFileChange {
    /// path with the `public/` prefix removed
    pub file: String,
    pub status: ChangeStatus,
    pub diff: Vec<DiffLine>,
    pub truncated: bool,
}

/// Changes `id` made to files under `public/`, each with at most `limit` diff lines.
pub fn detailed_commit_changes(
    repo: &SiteRepository,
    id: CommitId,
    limit: usize,
) -> StorageResult<Vec<CommitFileChange>> {
    let mut detailed = Vec::new();

    for change in repo.commit_changes(id)? {
        let Some(file) = change.path.as_str().strip_prefix(PUBLIC_DIR) else {
            continue;
        };

        let old = match change.old_blob {
            Some(blob) => decode_text(&repo.read_blob(blob)?),
            None => String::new(),
        };
        let new = match change.new_blob {
            Some(blob) => decode_text(&repo.read_blob(blob)?),
            None => String::new(),
        };

        let preview = DiffPreview::truncate(minimal_diff(&old, &new), limit);
        detailed.push(CommitFileChange {
            file: file.to_string(),
            status: change.status,
            truncated: preview.is_truncated(),
            diff: preview.lines,
        });
    }

    Ok(detailed)
}
