//! Page, image and document manifests, and the editor cache they are derived from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::status::PUBLIC_DIR;
use crate::storage::{InvalidNameError, RepoPath, StorageResult};

pub const PAGES_MANIFEST: &str = "public/pages.json";
pub const IMAGES_MANIFEST: &str = "public/images.json";
pub const DOCUMENTS_MANIFEST: &str = "public/documents.json";

/// stem of the canonical home page
pub const HOME_STEM: &str = "index";
pub const HOME_DISPLAY_NAME: &str = "Home";

/// One entry of `public/pages.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
    pub display_name: String,
    /// path stem without directory or extension
    pub file_name: String,
}

impl PageEntry {
    pub fn markdown_path(&self) -> Result<RepoPath, InvalidNameError> {
        RepoPath::new(format!("{}{}.md", PUBLIC_DIR, self.file_name))
    }

    pub fn html_path(&self) -> Result<RepoPath, InvalidNameError> {
        RepoPath::new(format!("{}{}.html", PUBLIC_DIR, self.file_name))
    }

    pub fn is_home(&self) -> bool {
        self.file_name == HOME_STEM
    }
}

/// A page as the editor holds it in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPage {
    /// working-tree path (`public/about.md`) or bare stem (`about`)
    pub file_name: String,
    pub content: String,
    pub display_name: String,
}

impl CachedPage {
    pub fn new(
        file_name: impl Into<String>,
        content: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            display_name: display_name.into(),
        }
    }

    /// Where the page's markdown lives in the working tree.
    ///
    /// Always `public/{stem}.md`, whether the name came with the prefix, the
    /// extension, both or neither.
    pub fn working_path(&self) -> Result<RepoPath, InvalidNameError> {
        let stem = page_stem(self.file_name.trim_start_matches('/'));
        RepoPath::new(format!("{}{}.md", PUBLIC_DIR, stem))
    }

    pub fn stem(&self) -> &str {
        page_stem(&self.file_name)
    }
}

/// The editor's in-memory state for one site, passed explicitly to the sync bridge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditorCache {
    pub pages: Vec<CachedPage>,
    /// opaque image descriptors
    pub images: Vec<Value>,
    /// opaque document descriptors
    pub documents: Vec<Value>,
}

impl EditorCache {
    pub fn new(pages: Vec<CachedPage>) -> Self {
        Self {
            pages,
            ..Default::default()
        }
    }

    pub fn with_images(mut self, images: Vec<Value>) -> Self {
        self.images = images;
        self
    }

    pub fn with_documents(mut self, documents: Vec<Value>) -> Self {
        self.documents = documents;
        self
    }
}

/// Strip the `public/` directory and the `.md` extension.
pub fn page_stem(file_name: &str) -> &str {
    let name = file_name.strip_prefix(PUBLIC_DIR).unwrap_or(file_name);
    name.strip_suffix(".md").unwrap_or(name)
}

/// Build the page manifest from cached pages, in cache order.
///
/// The home page is always called "Home", whatever the cache says.
pub fn derive_page_manifest(pages: &[CachedPage]) -> Vec<PageEntry> {
    pages
        .iter()
        .map(|page| {
            let stem = page.stem();
            let display_name = if stem == HOME_STEM {
                HOME_DISPLAY_NAME.to_string()
            } else {
                page.display_name.clone()
            };
            PageEntry {
                display_name,
                file_name: stem.to_string(),
            }
        })
        .collect()
}

pub fn parse_page_manifest(data: &[u8]) -> StorageResult<Vec<PageEntry>> {
    Ok(serde_json::from_slice(data)?)
}

/// Content-type hint for an uploaded file, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "md" => "text/markdown; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}
