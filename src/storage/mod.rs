//! storage layer for pagegit
//!
//! this module provides the abstraction over git for a site's version history.
//! The upper layers (status engine, sync bridge) use this API and never touch
//! git2 directly.
//!
//! # Architecture
//!
//! ```text
//!   SiteFs (working tree bytes)
//!      │
//!      ▼
//!   SiteRepository ── index (stage) ──► tree ──► commit ──► refs (HEAD)
//!      │
//!      └── snapshot(): head / stage / workdir blob ids per path
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pagegit::storage::{GitSignature, RepoPath, SiteId, SiteRepository};
//! use pagegit::vfs::{LocalFs, SiteFs};
//!
//! let site = SiteId::new("alice/blog")?;
//! let fs = SiteFs::new(Arc::new(LocalFs::new("./data")), site);
//! let repo = SiteRepository::initialize(fs).await?;
//!
//! let page = RepoPath::new("public/index.md")?;
//! repo.write_file(&page, b"# Hi").await?;
//! let id = repo.commit("first page", &GitSignature::for_user(Some("alice"), "agorapages.com")).await?;
//!
//! assert_eq!(repo.read_text_at_commit(id, &page)?, "# Hi");
//! ```

mod blob;
mod commit;
mod error;
mod refs;
mod repository;
mod tree;
mod types;

// Re-export public API
pub use blob::{decode_text, hash_bytes};
pub use commit::CommitInfo;
pub use error::{StorageError, StorageResult};
pub use repository::{CommitLog, FileSnapshot, RepositoryStats, SiteRepository};
pub use types::{
    BlobId, BranchName, Change, ChangeStatus, CommitId, GitSignature, InvalidNameError, RepoPath,
    SiteId, TreeId,
};

/// message of the baseline commit created by a fresh hydration
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial commit from remote storage";
