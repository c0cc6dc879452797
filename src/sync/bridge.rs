//! Reconciliation between a site repository and the remote blob store.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::status::{self, whole_file, DiffOp, DiffPreview, FileStatus, PUBLIC_DIR};
use crate::storage::{
    decode_text, CommitId, GitSignature, RepoPath, SiteId, SiteRepository, StorageResult,
    INITIAL_COMMIT_MESSAGE,
};
use crate::sync::archive::{self, HistoryArchive, HISTORY_KEY};
use crate::sync::manifest::{
    self, derive_page_manifest, CachedPage, EditorCache, DOCUMENTS_MANIFEST, IMAGES_MANIFEST,
    PAGES_MANIFEST,
};
use crate::sync::remote::RemoteStore;
use crate::vfs::{SiteFs, REPO_MARKER};

/// What `hydrate_from_remote` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HydrateOutcome {
    /// a repository already existed; nothing was touched
    AlreadyPresent,
    /// history was restored from the archive and working files refreshed
    RestoredHistory { files: usize },
    /// a fresh repository was created from the remote files
    Imported {
        files: usize,
        commit: Option<CommitId>,
    },
}

/// One pending file in the commit-review preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    pub path: RepoPath,
    /// `public/about.md` is shown as `about`
    pub display_name: String,
    pub status: FileStatus,
    pub body: DiffPreview,
}

/// Display-ready summary of every pending change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangePreview {
    pub entries: Vec<PreviewEntry>,
}

impl ChangePreview {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ChangePreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "No changes to commit.");
        }
        for entry in &self.entries {
            writeln!(f, "[{}] {}", entry.status.symbol(), entry.display_name)?;
            for line in entry.body.to_string().lines() {
                writeln!(f, "    {}", line)?;
            }
        }
        Ok(())
    }
}

/// Result of pushing a working tree to the remote store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub uploaded: Vec<String>,
    pub pruned: Vec<String>,
    pub history_saved: bool,
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uploaded {} files, pruned {}, history {}",
            self.uploaded.len(),
            self.pruned.len(),
            if self.history_saved { "saved" } else { "skipped" }
        )
    }
}

/// Display name of a working-tree path in previews.
pub fn display_name(path: &RepoPath) -> String {
    let name = path.as_str();
    match name.strip_prefix(PUBLIC_DIR) {
        Some(rest) => rest.strip_suffix(".md").unwrap_or(rest).to_string(),
        None => name.to_string(),
    }
}

/// Moves content between a site repository and a [`RemoteStore`].
#[derive(Clone)]
pub struct SyncBridge {
    store: Arc<dyn RemoteStore>,
    config: EditorConfig,
}

impl SyncBridge {
    pub fn new(store: Arc<dyn RemoteStore>, config: EditorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ==================== Remote → local ====================

    /// One-time bootstrap of a site's local repository from the remote store.
    ///
    /// Does nothing at all if the repository marker exists, so local work is
    /// never overwritten. Otherwise restores the archived history when there
    /// is one, or creates a fresh repository and commits the remote files.
    pub async fn hydrate_from_remote(
        &self,
        fs: SiteFs,
        author: &GitSignature,
    ) -> StorageResult<(SiteRepository, HydrateOutcome)> {
        if fs.has_repository().await {
            info!(site = %fs.site(), "repository exists, skipping hydration");
            let repo = SiteRepository::open(fs)?;
            return Ok((repo, HydrateOutcome::AlreadyPresent));
        }

        // fetch before touching the disk so a manifest failure leaves nothing behind
        let files = self.fetch_remote_files(fs.site()).await?;

        if self.config.restore_history {
            if let Some(archive) = self.fetch_history(fs.site()).await {
                match Self::restore_history(&fs, &archive).await {
                    Ok(repo) => {
                        // working files are refreshed but not staged
                        for (path, data) in &files {
                            repo.fs().write_file(path.as_path(), data, true).await?;
                        }
                        info!(site = %repo.site(), files = files.len(), "restored history from remote");
                        return Ok((repo, HydrateOutcome::RestoredHistory { files: files.len() }));
                    }
                    Err(e) => {
                        warn!(site = %fs.site(), error = %e, "history archive unusable, importing fresh");
                        fs.remove_tree(Path::new(REPO_MARKER)).await?;
                    }
                }
            }
        }

        let repo = SiteRepository::initialize(fs).await?;
        for (path, data) in &files {
            repo.write_file(path, data).await?;
        }

        let commit = if status::status(&repo).await?.is_empty() {
            None
        } else {
            Some(repo.commit(INITIAL_COMMIT_MESSAGE, author).await?)
        };

        info!(site = %repo.site(), files = files.len(), "imported remote files");
        Ok((
            repo,
            HydrateOutcome::Imported {
                files: files.len(),
                commit,
            },
        ))
    }

    /// Write the archive into `.git` and check that it opens as a repository
    /// with a readable HEAD.
    async fn restore_history(fs: &SiteFs, archive: &HistoryArchive) -> StorageResult<SiteRepository> {
        archive::restore_git_dir(fs, archive).await?;
        let repo = SiteRepository::open(fs.clone())?;
        if let Some(head) = repo.head()? {
            repo.get_commit(head)?;
        }
        Ok(repo)
    }

    async fn fetch_history(&self, site: &SiteId) -> Option<HistoryArchive> {
        let key = site.remote_key(HISTORY_KEY);
        let data = match self.store.get(&key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!(key = %key, "no history archive");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "could not fetch history archive");
                return None;
            }
        };

        match serde_json::from_slice::<HistoryArchive>(&data) {
            Ok(archive) if !archive.is_empty() => Some(archive),
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "ignoring unreadable history archive");
                None
            }
        }
    }

    /// Manifests plus every listed page's markdown and HTML.
    ///
    /// An unreachable or unparsable page manifest fails the whole fetch; a
    /// missing one means no pages. Single pages and the image and document
    /// manifests are skipped on error.
    async fn fetch_remote_files(&self, site: &SiteId) -> StorageResult<Vec<(RepoPath, Vec<u8>)>> {
        let mut files = Vec::new();

        let pages_key = site.remote_key(PAGES_MANIFEST);
        if let Some(data) = self.store.get(&pages_key).await? {
            let pages = manifest::parse_page_manifest(&data)?;
            files.push((RepoPath::new(PAGES_MANIFEST)?, data));

            for page in &pages {
                for path in [page.markdown_path(), page.html_path()] {
                    let path = match path {
                        Ok(path) => path,
                        Err(e) => {
                            warn!(page = %page.file_name, error = %e, "skipping page with invalid name");
                            break;
                        }
                    };
                    if let Some(data) = self.fetch_optional(site, &path).await {
                        files.push((path, data));
                    }
                }
            }
        } else {
            debug!(key = %pages_key, "no page manifest");
        }

        for manifest in [IMAGES_MANIFEST, DOCUMENTS_MANIFEST] {
            let path = RepoPath::new(manifest)?;
            if let Some(data) = self.fetch_optional(site, &path).await {
                files.push((path, data));
            }
        }

        Ok(files)
    }

    async fn fetch_optional(&self, site: &SiteId, path: &RepoPath) -> Option<Vec<u8>> {
        let key = site.remote_key(path.as_str());
        match self.store.get(&key).await {
            Ok(Some(data)) => Some(data),
            Ok(None) => {
                debug!(key = %key, "not in remote store");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "skipping remote object");
                None
            }
        }
    }

    // ==================== Editor cache → working tree ====================

    /// Write the editor cache into the working tree and stage it.
    ///
    /// Files that are no longer in the cache are left where they are.
    pub async fn materialize_cache(
        &self,
        repo: &SiteRepository,
        cache: &EditorCache,
    ) -> StorageResult<()> {
        for page in &cache.pages {
            let path = page.working_path()?;
            repo.write_file(&path, page.content.as_bytes()).await?;
        }

        let pages = derive_page_manifest(&cache.pages);
        repo.write_file(&RepoPath::new(PAGES_MANIFEST)?, &serde_json::to_vec(&pages)?)
            .await?;
        repo.write_file(&RepoPath::new(IMAGES_MANIFEST)?, &serde_json::to_vec(&cache.images)?)
            .await?;
        repo.write_file(
            &RepoPath::new(DOCUMENTS_MANIFEST)?,
            &serde_json::to_vec(&cache.documents)?,
        )
        .await?;

        info!(site = %repo.site(), pages = cache.pages.len(), "cache synced to working tree");
        Ok(())
    }

    // ==================== Review ====================

    pub async fn has_pending_changes(&self, repo: &SiteRepository) -> StorageResult<bool> {
        Ok(!status::status(repo).await?.is_empty())
    }

    /// Pair each pending change with a bounded body.
    ///
    /// Modified files get a line diff, added files their content as additions
    /// and deleted files their last committed content as deletions.
    pub async fn render_change_preview(&self, repo: &SiteRepository) -> StorageResult<ChangePreview> {
        let limit = self.config.preview_lines;
        let mut entries = Vec::new();

        for entry in status::status(repo).await? {
            let lines = match entry.status {
                FileStatus::Modified => status::diff(repo, &entry.path).await?.lines(),
                FileStatus::Added => {
                    let text = repo.read_text(&entry.path).await?.unwrap_or_default();
                    whole_file(&text, DiffOp::Add)
                }
                FileStatus::Deleted => {
                    let old = status::diff(repo, &entry.path).await?.old;
                    whole_file(&old, DiffOp::Delete)
                }
                FileStatus::Untracked => Vec::new(),
            };

            entries.push(PreviewEntry {
                display_name: display_name(&entry.path),
                path: entry.path,
                status: entry.status,
                body: DiffPreview::truncate(lines, limit),
            });
        }

        Ok(ChangePreview { entries })
    }

    /// Every `public/*.md` file at `id`, as editor-cache pages.
    pub fn markdown_pages_at_commit(
        &self,
        repo: &SiteRepository,
        id: CommitId,
    ) -> StorageResult<Vec<CachedPage>> {
        let mut pages = Vec::new();
        for (path, blob) in repo.files_at_commit(id)? {
            if !path.as_str().starts_with(PUBLIC_DIR) || !path.is_markdown() {
                continue;
            }
            match repo.read_blob(blob) {
                Ok(data) => pages.push(CachedPage {
                    display_name: display_name(&path),
                    file_name: path.into_string(),
                    content: decode_text(&data),
                }),
                Err(e) => warn!(path = %path, error = %e, "skipping unreadable page"),
            }
        }
        Ok(pages)
    }

    // ==================== Local → remote ====================

    /// Upload every working-tree file, then optionally prune and archive history.
    pub async fn push_snapshot(&self, repo: &SiteRepository) -> StorageResult<PushReport> {
        let site = repo.site();
        let mut report = PushReport::default();
        let mut local = BTreeSet::new();

        for path in repo.fs().working_files().await? {
            let data = repo.read_file(&path).await?;
            let key = site.remote_key(path.as_str());
            self.store
                .put(&key, &data, manifest::content_type_for(path.as_str()))
                .await?;
            local.insert(key.clone());
            report.uploaded.push(key);
        }

        if self.config.prune_remote {
            let prefix = site.remote_key(PUBLIC_DIR);
            for object in self.store.list(&prefix).await? {
                if !local.contains(&object.key) {
                    self.store.delete(&object.key).await?;
                    debug!(key = %object.key, "pruned remote object");
                    report.pruned.push(object.key);
                }
            }
        }

        if self.config.save_history {
            let archive = archive::serialize_git_dir(repo.fs()).await?;
            self.store
                .put(
                    &site.remote_key(HISTORY_KEY),
                    &serde_json::to_vec(&archive)?,
                    "application/json",
                )
                .await?;
            report.history_saved = true;
        }

        info!(site = %site, uploaded = report.uploaded.len(), pruned = report.pruned.len(), "pushed snapshot");
        Ok(report)
    }

    /// Commit every pending change and push the result.
    pub async fn commit_and_push(
        &self,
        repo: &SiteRepository,
        message: &str,
        author: &GitSignature,
    ) -> StorageResult<(CommitId, PushReport)> {
        let id = repo.commit(message, author).await?;
        let report = self.push_snapshot(repo).await?;
        Ok((id, report))
    }
}

impl fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBridge")
            .field("config", &self.config)
            .finish()
    }
}
