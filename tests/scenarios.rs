//! End-to-end editing scenarios over a real data directory and an in-memory remote.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use pagegit::config::EditorConfig;
use pagegit::status::{self, line_diff, FileStatus};
use pagegit::storage::{GitSignature, RepoPath, SiteId, SiteRepository, INITIAL_COMMIT_MESSAGE};
use pagegit::sync::{HydrateOutcome, MemoryStore, SyncBridge};
use pagegit::vfs::{DirEntry, Filesystem, LocalFs, SiteFs};

/// Counts every mutating call that reaches the backend.
struct CountingFs {
    inner: LocalFs,
    writes: AtomicUsize,
}

impl CountingFs {
    fn new(root: &Path) -> Self {
        Self {
            inner: LocalFs::new(root),
            writes: AtomicUsize::new(0),
        }
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Filesystem for CountingFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path).await
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(path, data).await
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        self.inner.list(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        self.inner.stat(path).await
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.mkdir(path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(path).await
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        self.inner.real_path(path)
    }
}

fn alice_blog() -> SiteId {
    SiteId::new("alice/blog").unwrap()
}

fn alice() -> GitSignature {
    GitSignature::for_user(Some("alice"), "agorapages.com")
}

fn path(p: &str) -> RepoPath {
    RepoPath::new(p).unwrap()
}

fn remote_with_home() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert(
        "alice/blog/public/pages.json",
        r#"[{"displayName":"Home","fileName":"index"}]"#,
    );
    store.insert("alice/blog/public/index.md", "# Hi");
    store
}

async fn fresh_site(dir: &TempDir) -> (SiteRepository, SyncBridge) {
    let config = EditorConfig::new(dir.path());
    let bridge = SyncBridge::new(remote_with_home(), config.clone());
    let (repo, _) = bridge
        .hydrate_from_remote(config.site_fs(alice_blog()), &alice())
        .await
        .unwrap();
    (repo, bridge)
}

#[tokio::test]
async fn test_fresh_site() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = fresh_site(&dir).await;

    let log: Vec<_> = repo.log(10).unwrap().map(|c| c.unwrap()).collect();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].message, INITIAL_COMMIT_MESSAGE);
    assert_eq!(log[0].author_email, "alice@noreply.agorapages.com");

    assert!(status::status(&repo).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_and_commit() {
    let dir = TempDir::new().unwrap();
    let (repo, bridge) = fresh_site(&dir).await;

    repo.write_file(&path("public/index.md"), b"# Hi there").await.unwrap();
    let entries = status::status(&repo).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path.as_str(), "public/index.md");
    assert_eq!(entries[0].status, FileStatus::Modified);
    assert!(bridge.has_pending_changes(&repo).await.unwrap());

    repo.commit("update greeting", &alice()).await.unwrap();
    assert!(status::status(&repo).await.unwrap().is_empty());

    let messages: Vec<_> = repo
        .log(10)
        .unwrap()
        .map(|c| c.unwrap().message)
        .collect();
    assert_eq!(messages, vec!["update greeting", INITIAL_COMMIT_MESSAGE]);
}

#[tokio::test]
async fn test_delete_before_commit() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = fresh_site(&dir).await;
    let draft = path("public/draft.md");

    repo.write_file(&draft, b"draft").await.unwrap();
    let entries = status::status(&repo).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, FileStatus::Added);

    repo.delete_file(&draft).await.unwrap();
    assert!(status::status(&repo).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hydration_guard() {
    let dir = TempDir::new().unwrap();
    let (repo, _) = fresh_site(&dir).await;
    let head = repo.head().unwrap();
    drop(repo);

    let counting = Arc::new(CountingFs::new(dir.path()));
    let fs = SiteFs::new(counting.clone(), alice_blog());
    let bridge = SyncBridge::new(remote_with_home(), EditorConfig::new(dir.path()));

    let (repo, outcome) = bridge.hydrate_from_remote(fs, &alice()).await.unwrap();
    assert_eq!(outcome, HydrateOutcome::AlreadyPresent);
    assert_eq!(counting.writes(), 0);
    assert_eq!(repo.head().unwrap(), head);
    assert_eq!(repo.log(10).unwrap().count(), 1);
}

#[tokio::test]
async fn test_idempotent_init() {
    let dir = TempDir::new().unwrap();
    let config = EditorConfig::new(dir.path());

    let first = config.open_site(alice_blog()).await.unwrap();
    first.write_file(&path("public/index.md"), b"# Hi").await.unwrap();
    let id = first.commit("first", &alice()).await.unwrap();

    let second = config.open_site(alice_blog()).await.unwrap();
    assert_eq!(second.head().unwrap(), Some(id));
    assert_eq!(second.log(10).unwrap().count(), 1);
    assert!(status::status(&second).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_round_trip() {
    let dir = TempDir::new().unwrap();
    let repo = EditorConfig::new(dir.path())
        .open_site(alice_blog())
        .await
        .unwrap();

    let samples = [
        ("public/index.md", "# Hi"),
        ("public/about.md", "line one\nline two\n"),
        ("public/unicode.md", "héllo wörld ✓"),
        ("public/empty.md", ""),
    ];
    for (p, content) in samples {
        repo.write_file(&path(p), content.as_bytes()).await.unwrap();
        let head = repo.commit(&format!("write {}", p), &alice()).await.unwrap();
        assert_eq!(repo.read_text_at_commit(head, &path(p)).unwrap(), content);
    }
}

#[test]
fn test_diff_symmetry() {
    let pairs = [
        ("a\nb\nc", "a\nB\nc"),
        ("first\nsecond", "1st\n2nd"),
        ("same\nsame", "same\nsame"),
    ];

    for (a, b) in pairs {
        let forward = line_diff(a, b);
        let backward = line_diff(b, a);
        assert_eq!(forward.len(), backward.len());

        // each changed line pair appears in both, with roles swapped
        for pair in forward.chunks(2).zip(backward.chunks(2)) {
            let (f, b) = pair;
            assert_eq!(f[0].line, b[1].line);
            assert_eq!(f[1].line, b[0].line);
            assert_eq!(f[0].op, b[1].op.inverse());
            assert_eq!(f[1].op, b[0].op.inverse());
        }
    }
}

#[tokio::test]
async fn test_sites_are_isolated() {
    let dir = TempDir::new().unwrap();
    let config = EditorConfig::new(dir.path());

    let alice_repo = config.open_site(alice_blog()).await.unwrap();
    let bob_repo = config
        .open_site(SiteId::new("bob/blog").unwrap())
        .await
        .unwrap();

    alice_repo
        .write_file(&path("public/index.md"), b"alice")
        .await
        .unwrap();
    assert!(status::status(&bob_repo).await.unwrap().is_empty());
    assert_eq!(status::status(&alice_repo).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_dot_files_are_tracked_and_pushed() {
    let dir = TempDir::new().unwrap();
    let (repo, bridge) = fresh_site(&dir).await;

    repo.write_file(&path(".gitignore"), b"dist/").await.unwrap();
    repo.write_file(&path(".github/workflows/ci.yml"), b"on: push")
        .await
        .unwrap();

    let pending: Vec<_> = status::status(&repo)
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.path.into_string(), e.status))
        .collect();
    assert_eq!(
        pending,
        vec![
            (".github/workflows/ci.yml".to_string(), FileStatus::Added),
            (".gitignore".to_string(), FileStatus::Added),
        ]
    );

    let (_, report) = bridge
        .commit_and_push(&repo, "add ci", &alice())
        .await
        .unwrap();
    assert!(report.uploaded.contains(&"alice/blog/.gitignore".to_string()));
    assert!(report
        .uploaded
        .contains(&"alice/blog/.github/workflows/ci.yml".to_string()));
    assert!(!report.uploaded.iter().any(|k| k.starts_with("alice/blog/.git/")));
    assert!(status::status(&repo).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_broken_history_archive_falls_back_to_import() {
    let dir = TempDir::new().unwrap();
    let store = remote_with_home();
    store.insert("alice/blog/.git-history.json", r#"{"HEAD":"!!!not base64!!!"}"#);
    let config = EditorConfig::new(dir.path());
    let bridge = SyncBridge::new(store, config.clone());

    let (repo, outcome) = bridge
        .hydrate_from_remote(config.site_fs(alice_blog()), &alice())
        .await
        .unwrap();
    assert!(matches!(outcome, HydrateOutcome::Imported { commit: Some(_), .. }));

    repo.write_file(&path("public/index.md"), b"# Hi there").await.unwrap();
    repo.commit("update greeting", &alice()).await.unwrap();
    assert_eq!(repo.log(10).unwrap().count(), 2);
}
