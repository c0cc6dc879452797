//! pagegit - per-site version history for a static-site editor
//!
//! Every site gets its own Git repository inside a virtual directory. The
//! editor writes pages into the working tree, asks for pending changes and
//! diffs, commits with the logged-in user as author, and syncs the result
//! with a remote blob store.
//!
//! ```text
//!   sync::SyncBridge ─────► status (classification, diffs)
//!        │                       │
//!        ▼                       ▼
//!   storage::SiteRepository ◄────┘
//!        │
//!        ▼
//!   vfs::SiteFs ──► vfs::Filesystem
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pagegit::config::EditorConfig;
//! use pagegit::storage::{RepoPath, SiteId};
//!
//! # async fn demo() -> Result<(), pagegit::storage::StorageError> {
//! let config = EditorConfig::new("./sites");
//! let repo = config.open_site(SiteId::new("alice/blog")?).await?;
//!
//! repo.write_file(&RepoPath::new("public/index.md")?, b"# Hi").await?;
//! repo.commit("first page", &config.signature(Some("alice"))).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod status;
pub mod storage;
pub mod sync;
pub mod vfs;
