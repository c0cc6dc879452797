//! Editor configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::{GitSignature, SiteId, SiteRepository, StorageResult};
use crate::vfs::{Filesystem, LocalFs, SiteFs};

/// Configuration for an editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Root of the local virtual filesystem; one directory per site below it.
    pub data_dir: PathBuf,
    /// Domain used to synthesize author emails.
    pub platform_domain: String,
    /// Default depth of `log`.
    pub log_depth: usize,
    /// Depth of the history view.
    pub history_depth: usize,
    /// Diff lines shown per file in the change preview.
    pub preview_lines: usize,
    /// Diff lines kept per file in commit details.
    pub commit_diff_lines: usize,
    /// Restore the archived `.git` directory on hydration.
    pub restore_history: bool,
    /// Upload the `.git` archive on push.
    pub save_history: bool,
    /// Delete remote `public/` objects that no longer exist locally on push.
    pub prune_remote: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".pagegit"),
            platform_domain: "agorapages.com".to_string(),
            log_depth: 10,
            history_depth: 50,
            preview_lines: 20,
            commit_diff_lines: 50,
            restore_history: true,
            save_history: true,
            prune_remote: false,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration rooted at the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn platform_domain(mut self, domain: impl Into<String>) -> Self {
        self.platform_domain = domain.into();
        self
    }

    pub fn log_depth(mut self, depth: usize) -> Self {
        self.log_depth = depth;
        self
    }

    pub fn preview_lines(mut self, lines: usize) -> Self {
        self.preview_lines = lines;
        self
    }

    pub fn commit_diff_lines(mut self, lines: usize) -> Self {
        self.commit_diff_lines = lines;
        self
    }

    pub fn restore_history(mut self, value: bool) -> Self {
        self.restore_history = value;
        self
    }

    pub fn save_history(mut self, value: bool) -> Self {
        self.save_history = value;
        self
    }

    pub fn prune_remote(mut self, value: bool) -> Self {
        self.prune_remote = value;
        self
    }

    /// Author identity for `username`, falling back to the anonymous user.
    pub fn signature(&self, username: Option<&str>) -> GitSignature {
        GitSignature::for_user(username, &self.platform_domain)
    }

    /// Site scope over a local filesystem rooted at `data_dir`.
    pub fn site_fs(&self, site: SiteId) -> SiteFs {
        let fs: Arc<dyn Filesystem> = Arc::new(LocalFs::new(self.data_dir.clone()));
        SiteFs::new(fs, site)
    }

    /// Open the site's repository, creating it if needed.
    pub async fn open_site(&self, site: SiteId) -> StorageResult<SiteRepository> {
        SiteRepository::initialize(self.site_fs(site)).await
    }
}
