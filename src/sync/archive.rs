//! Repository history archive.
//!
//! The whole `.git` directory is stored remotely as a single JSON object
//! mapping each file's path (relative to `.git`) to its base64 content, so
//! a fresh machine can pick up a site's history instead of starting over.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info};

use crate::storage::{StorageError, StorageResult};
use crate::vfs::{SiteFs, REPO_MARKER};

/// remote key of the archive, relative to the site
pub const HISTORY_KEY: &str = ".git-history.json";

/// `.git`-relative path → base64 bytes
pub type HistoryArchive = BTreeMap<String, String>;

/// Read every file of the site's `.git` directory into an archive.
pub async fn serialize_git_dir(fs: &SiteFs) -> StorageResult<HistoryArchive> {
    let git_dir = Path::new(REPO_MARKER);
    let files = fs.list_files_under(git_dir).await?;

    let mut archive = HistoryArchive::new();
    for file in files {
        match fs.read_file(&git_dir.join(&file)).await {
            Ok(data) => {
                archive.insert(file, STANDARD.encode(&data));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(file = %file, "git file vanished while archiving");
            }
            Err(e) => return Err(StorageError::Io(e)),
        }
    }

    info!(site = %fs.site(), files = archive.len(), "serialized history");
    Ok(archive)
}

/// Write an archive back into the site's `.git` directory.
///
/// Entries are validated before anything is written.
pub async fn restore_git_dir(fs: &SiteFs, archive: &HistoryArchive) -> StorageResult<usize> {
    let mut decoded = Vec::with_capacity(archive.len());
    for (file, content) in archive {
        let bad = file.is_empty()
            || file.starts_with('/')
            || file.contains('\\')
            || file.split('/').any(|s| s.is_empty() || s == "." || s == "..");
        if bad {
            return Err(StorageError::CorruptedData {
                path: file.clone(),
                reason: "invalid path in history archive".to_string(),
            });
        }

        let data = STANDARD
            .decode(content)
            .map_err(|e| StorageError::CorruptedData {
                path: file.clone(),
                reason: e.to_string(),
            })?;
        decoded.push((file, data));
    }

    let git_dir = Path::new(REPO_MARKER);
    fs.ensure_directory(git_dir).await?;
    for (file, data) in &decoded {
        fs.write_file(&git_dir.join(file), data, true).await?;
    }

    info!(site = %fs.site(), files = decoded.len(), "restored history");
    Ok(decoded.len())
}
