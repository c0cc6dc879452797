//! Virtual filesystem layer.
//!
//! The repository and sync layers never touch `std::fs` or `tokio::fs`
//! directly; they go through a [`SiteFs`], which scopes a [`Filesystem`]
//! backend to one site's directory.
//!
//! ```text
//!   SiteRepository / SyncBridge
//!               │
//!               ▼
//!        SiteFs ("alice/blog" → "alice_blog/")
//!               │
//!               ▼
//!        dyn Filesystem ── LocalFs (data root on disk)
//! ```

mod local;
mod site;
mod traits;

pub use local::LocalFs;
pub use site::{is_repo_metadata, SiteFs, REPO_MARKER};
pub use traits::{DirEntry, DirEntryKind, Filesystem};
