//! Sync bridge between local site repositories and remote blob storage.
//!
//! ```text
//!                 hydrate_from_remote (once per site)
//!   RemoteStore ───────────────────────────────────────► SiteRepository
//!       ▲          manifests, pages, .git archive             │
//!       │                                                     │
//!       └─────────────────────────────────────────────────────┘
//!                 push_snapshot (after each commit)
//!
//!   EditorCache ── materialize_cache ──► working tree + manifests
//! ```

mod archive;
mod bridge;
mod manifest;
mod remote;

pub use archive::{restore_git_dir, serialize_git_dir, HistoryArchive, HISTORY_KEY};
pub use bridge::{
    display_name, ChangePreview, HydrateOutcome, PreviewEntry, PushReport, SyncBridge,
};
pub use manifest::{
    content_type_for, derive_page_manifest, page_stem, parse_page_manifest, CachedPage,
    EditorCache, PageEntry, DOCUMENTS_MANIFEST, HOME_DISPLAY_NAME, HOME_STEM, IMAGES_MANIFEST,
    PAGES_MANIFEST,
};
pub use remote::{DirectoryStore, MemoryStore, RemoteError, RemoteObject, RemoteResult, RemoteStore};
