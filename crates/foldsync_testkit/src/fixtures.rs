//! Test fixtures: an in-process remote and scratch working copies.
//!
//! Provides convenience functions for setting up working copies that sync
//! against the reference server without any network.

use foldsync_sync_engine::{
    CloneOptions, HttpConnector, HttpResponse, LoopbackClient, LoopbackServer, SyncConfig,
    SyncEngine,
};
use foldsync_sync_server::{HostedRepo, ServerConfig, SyncServer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Server URL used by every fixture.
pub const TEST_SERVER_URL: &str = "http://foldsync.test/sync.php";

/// Connector type returned by [`TestRemote::connector`].
pub type TestConnector = HttpConnector<LoopbackClient<TestRemote>>;

/// The reference server, reachable through the loopback HTTP client.
///
/// Clones share the same server.
#[derive(Debug, Clone)]
pub struct TestRemote {
    server: Arc<SyncServer>,
}

impl TestRemote {
    /// Creates a remote with the default server configuration.
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a remote with a custom server configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            server: Arc::new(SyncServer::new(config)),
        }
    }

    /// The underlying server.
    pub fn server(&self) -> &Arc<SyncServer> {
        &self.server
    }

    /// A hosted repository by id.
    pub fn repo(&self, repo_id: &str) -> Option<Arc<HostedRepo>> {
        self.server.repo(repo_id)
    }

    /// A connector whose requests end up in this remote.
    pub fn connector(&self) -> TestConnector {
        HttpConnector::new(LoopbackClient::new(self.clone()))
    }
}

impl Default for TestRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackServer for TestRemote {
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse {
        let (status, body) = self.server.handle_post(path, body);
        HttpResponse { status, body }
    }
}

/// A scratch directory of working copies sharing one [`TestRemote`].
pub struct TestWorkspace {
    remote: TestRemote,
    connector: TestConnector,
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates an empty workspace with a fresh remote.
    pub fn new() -> Self {
        Self::with_remote(TestRemote::new())
    }

    /// Creates an empty workspace syncing with `remote`.
    pub fn with_remote(remote: TestRemote) -> Self {
        Self {
            connector: remote.connector(),
            remote,
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The shared remote.
    pub fn remote(&self) -> &TestRemote {
        &self.remote
    }

    /// The connector working copies use.
    pub fn connector(&self) -> &TestConnector {
        &self.connector
    }

    /// Path of the working copy `name`.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Engine configuration committing as `name`.
    pub fn config(name: &str) -> SyncConfig {
        SyncConfig::default().with_author(name, format!("{name}@foldsync.test"))
    }

    /// Initializes the working copy `name` with a new remote repository.
    pub fn init(&self, name: &str) -> SyncEngine {
        SyncEngine::init(
            &self.path(name),
            TEST_SERVER_URL,
            Self::config(name),
            &self.connector,
        )
        .expect("Failed to init working copy")
    }

    /// Clones the repository behind `origin` into the working copy `name`.
    pub fn clone_of(&self, origin: &SyncEngine, name: &str) -> SyncEngine {
        SyncEngine::clone_remote(
            &self.path(name),
            TEST_SERVER_URL,
            origin.remote().repo_id(),
            Self::config(name),
            CloneOptions::default(),
            &self.connector,
        )
        .expect("Failed to clone working copy")
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a file below `root`, creating parent directories.
pub fn write_file(root: &Path, path: &str, content: impl AsRef<[u8]>) {
    let target = root.join(path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(target, content).expect("Failed to write file");
}

/// Reads a file below `root` as text, `None` if it does not exist.
pub fn read_file(root: &Path, path: &str) -> Option<String> {
    fs::read_to_string(root.join(path)).ok()
}

/// Every file below `root` as a `/`-separated relative path, sorted.
///
/// Hidden entries (names starting with `.`) are skipped, which hides the
/// metadata directory.
pub fn list_files(root: &Path) -> Vec<String> {
    let mut found = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(rel) = pending.pop() {
        let entries = fs::read_dir(root.join(&rel)).expect("Failed to list directory");
        for entry in entries {
            let entry = entry.expect("Failed to read directory entry");
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let path = rel.join(&name);
            if entry.file_type().expect("Failed to stat entry").is_dir() {
                pending.push(path);
            } else {
                let parts: Vec<_> = path
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                found.push(parts.join("/"));
            }
        }
    }
    found.sort();
    found
}

/// Writes a file into a working copy.
pub fn write_in(engine: &SyncEngine, path: &str, content: impl AsRef<[u8]>) {
    write_file(engine.repository().work_dir(), path, content);
}

/// Reads a file from a working copy.
pub fn read_in(engine: &SyncEngine, path: &str) -> Option<String> {
    read_file(engine.repository().work_dir(), path)
}

/// Root tree hash of the current head of a working copy.
pub fn head_tree(engine: &SyncEngine) -> Option<foldsync_codec::Hash> {
    let head = engine.log().expect("Failed to read log").into_iter().next()?;
    Some(head.commit.tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldsync_sync_engine::{ConflictPolicy, SyncStatus};

    #[test]
    fn list_files_is_recursive_and_sorted() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "b.txt", "b");
        write_file(temp.path(), "a/z.txt", "z");
        write_file(temp.path(), "a/deep/y.txt", "y");
        write_file(temp.path(), ".hidden/x.txt", "x");
        assert_eq!(list_files(temp.path()), ["a/deep/y.txt", "a/z.txt", "b.txt"]);
        assert_eq!(read_file(temp.path(), "a/z.txt").as_deref(), Some("z"));
        assert_eq!(read_file(temp.path(), "missing"), None);
    }

    #[test]
    fn workspace_copies_share_the_remote() {
        let ws = TestWorkspace::new();
        let origin = ws.init("origin");
        write_in(&origin, "f.txt", "data");
        assert_eq!(
            origin.sync(ConflictPolicy::default()).unwrap(),
            SyncStatus::NewlyPushed
        );
        assert_eq!(ws.remote().server().repo_count(), 1);

        let copy = ws.clone_of(&origin, "copy");
        assert_eq!(read_in(&copy, "f.txt").as_deref(), Some("data"));
        assert_eq!(head_tree(&copy), head_tree(&origin));
    }
}
