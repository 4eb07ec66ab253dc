//! Integration tests for the sync engine against the reference server.

use foldsync_codec::Hash;
use foldsync_core::{BranchName, CoreError, RepoConfig};
use foldsync_storage::{ObjectEntry, Timestamp};
use foldsync_sync_engine::{
    AllowNonEmpty, CloneOptions, ConflictPolicy, Downloaded, HttpConnector, HttpResponse,
    LoopbackClient, LoopbackServer, RemoteApi, RemoteConnector, SyncConfig, SyncEngine,
    SyncError, SyncResult, SyncStatus,
};
use foldsync_sync_protocol::HeadUpdate;
use foldsync_sync_server::{ServerConfig, SyncServer};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const SERVER_URL: &str = "http://sync.test/sync.php";

/// Routes loopback requests into an in-memory server.
struct InMemoryServer(Arc<SyncServer>);

impl LoopbackServer for InMemoryServer {
    fn handle_post(&self, path: &str, body: &[u8]) -> HttpResponse {
        let (status, body) = self.0.handle_post(path, body);
        HttpResponse { status, body }
    }
}

type Connector = HttpConnector<LoopbackClient<InMemoryServer>>;

struct Harness {
    temp: TempDir,
    server: Arc<SyncServer>,
    connector: Connector,
}

impl Harness {
    fn new() -> Self {
        let server = Arc::new(SyncServer::new(ServerConfig::default()));
        let connector = HttpConnector::new(LoopbackClient::new(InMemoryServer(Arc::clone(
            &server,
        ))));
        Self {
            temp: tempfile::tempdir().unwrap(),
            server,
            connector,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    fn config(name: &str) -> SyncConfig {
        SyncConfig::default().with_author(name, format!("{name}@example.com"))
    }

    fn init(&self, name: &str) -> SyncEngine {
        SyncEngine::init(&self.path(name), SERVER_URL, Self::config(name), &self.connector)
            .unwrap()
    }

    fn clone_of(&self, origin: &SyncEngine, name: &str) -> SyncEngine {
        self.clone_with(origin, name, CloneOptions::default(), &self.connector)
            .unwrap()
    }

    fn clone_with(
        &self,
        origin: &SyncEngine,
        name: &str,
        options: CloneOptions,
        connector: &dyn RemoteConnector,
    ) -> SyncResult<SyncEngine> {
        SyncEngine::clone_remote(
            &self.path(name),
            SERVER_URL,
            origin.remote().repo_id(),
            Self::config(name),
            options,
            connector,
        )
    }
}

fn write(engine: &SyncEngine, path: &str, content: &str) {
    let target = engine.repository().work_dir().join(path);
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(target, content).unwrap();
}

fn read(engine: &SyncEngine, path: &str) -> Option<String> {
    fs::read_to_string(engine.repository().work_dir().join(path)).ok()
}

fn set_mtime(engine: &SyncEngine, path: &str, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(engine.repository().work_dir().join(path))
        .unwrap()
        .set_modified(time)
        .unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Two working copies that both hold `shared.txt` = "base".
fn pair(h: &Harness) -> (SyncEngine, SyncEngine) {
    let a = h.init("a");
    write(&a, "shared.txt", "base");
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::NewlyPushed);
    let b = h.clone_of(&a, "b");
    (a, b)
}

#[test]
fn first_sync_creates_branch_then_settles() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, "notes/todo.txt", "milk");

    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::NewlyPushed);
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::NoChanges);

    let hosted = h.server.repo(a.remote().repo_id()).unwrap();
    let head = hosted.head("main").unwrap();
    assert_eq!(a.log().unwrap()[0].hash, head);
    // commit, two trees, one blob
    assert_eq!(hosted.objects().len(), 4);
    assert_eq!(a.stats().rounds, 2);
}

#[test]
fn clone_checks_out_remote_head() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, "docs/readme.md", "# hi");
    write(&a, "top.txt", "top");
    a.sync(ConflictPolicy::default()).unwrap();

    let b = h.clone_of(&a, "b");
    assert_eq!(read(&b, "docs/readme.md").as_deref(), Some("# hi"));
    assert_eq!(read(&b, "top.txt").as_deref(), Some("top"));
    assert_eq!(b.branch().unwrap(), BranchName::main());
    assert_eq!(b.sync(ConflictPolicy::default()).unwrap(), SyncStatus::NoChanges);
}

#[test]
fn push_then_pull() {
    let h = Harness::new();
    let (a, b) = pair(&h);

    write(&b, "shared.txt", "from b");
    write(&b, "new/file.txt", "added");
    assert_eq!(b.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pushed);

    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pulled);
    assert_eq!(read(&a, "shared.txt").as_deref(), Some("from b"));
    assert_eq!(read(&a, "new/file.txt").as_deref(), Some("added"));
    assert_eq!(a.log().unwrap()[0].hash, b.log().unwrap()[0].hash);
}

#[test]
fn pull_deletes_and_prunes() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, "keep.txt", "k");
    write(&a, "gone/only.txt", "x");
    a.sync(ConflictPolicy::default()).unwrap();
    let b = h.clone_of(&a, "b");

    fs::remove_dir_all(a.repository().work_dir().join("gone")).unwrap();
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pushed);
    assert_eq!(b.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pulled);

    assert!(!b.repository().work_dir().join("gone").exists());
    assert_eq!(file_names(b.repository().work_dir()), ["keep.txt"]);
}

#[test]
fn diverged_edits_merge_and_converge() {
    let h = Harness::new();
    let (a, b) = pair(&h);

    write(&a, "from_a.txt", "a");
    write(&b, "from_b.txt", "b");
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pushed);

    assert_eq!(
        b.sync_with_retry(ConflictPolicy::default()).unwrap(),
        SyncStatus::AutoMerged
    );
    let log = b.log().unwrap();
    let merge = &log[0];
    assert_eq!(merge.commit.parents.len(), 2);
    assert!(merge.merged_parent().is_some());
    assert_eq!(b.repository().read_merge_head().unwrap(), None);

    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pulled);
    for engine in [&a, &b] {
        assert_eq!(
            file_names(engine.repository().work_dir()),
            ["from_a.txt", "from_b.txt", "shared.txt"]
        );
    }
}

#[test]
fn conflict_saves_remote_copy() {
    let h = Harness::new();
    let (a, b) = pair(&h);

    write(&a, "shared.txt", "a wins?");
    a.sync(ConflictPolicy::default()).unwrap();
    let remote_head = a.log().unwrap()[0].hash.clone();

    write(&b, "shared.txt", "b wins?");
    let status = b.sync(ConflictPolicy::SaveHashedRemote).unwrap();
    let copy = format!("shared({}).txt", remote_head.short(8));
    match &status {
        SyncStatus::Conflicted { paths } => {
            assert_eq!(paths.len(), 1);
            assert_eq!(paths[0].as_str(), copy);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(read(&b, "shared.txt").as_deref(), Some("b wins?"));
    assert_eq!(read(&b, &copy).as_deref(), Some("a wins?"));
    assert_eq!(b.repository().read_merge_head().unwrap(), Some(remote_head));

    // the next round commits the resolution and does not conflict again
    assert_eq!(b.sync(ConflictPolicy::SaveHashedRemote).unwrap(), SyncStatus::Pushed);
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pulled);
    assert_eq!(read(&a, &copy).as_deref(), Some("a wins?"));
    assert_eq!(read(&a, "shared.txt").as_deref(), Some("b wins?"));
}

#[test]
fn line_ending_only_conflicts_are_ignored() {
    let h = Harness::new();
    let (a, b) = pair(&h);

    write(&a, "shared.txt", "one\ntwo\n");
    a.sync(ConflictPolicy::default()).unwrap();
    write(&b, "shared.txt", "one\r\ntwo\r\n");

    assert_eq!(
        b.sync(ConflictPolicy::SaveHashedRemote).unwrap(),
        SyncStatus::AutoMerged
    );
    assert_eq!(file_names(b.repository().work_dir()), ["shared.txt"]);
}

#[test]
fn ignore_local_takes_remote() {
    let h = Harness::new();
    let (a, b) = pair(&h);
    write(&a, "shared.txt", "remote");
    a.sync(ConflictPolicy::default()).unwrap();
    write(&b, "shared.txt", "local");

    assert_eq!(
        b.sync_with_retry(ConflictPolicy::IgnoreLocal).unwrap(),
        SyncStatus::AutoMerged
    );
    assert_eq!(read(&b, "shared.txt").as_deref(), Some("remote"));
}

#[test]
fn ignore_remote_keeps_local_and_pushes_it() {
    let h = Harness::new();
    let (a, b) = pair(&h);
    write(&a, "shared.txt", "remote");
    a.sync(ConflictPolicy::default()).unwrap();
    write(&b, "shared.txt", "local");

    assert_eq!(
        b.sync_with_retry(ConflictPolicy::IgnoreRemote).unwrap(),
        SyncStatus::AutoMerged
    );
    assert_eq!(read(&b, "shared.txt").as_deref(), Some("local"));
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pulled);
    assert_eq!(read(&a, "shared.txt").as_deref(), Some("local"));
}

#[test]
fn newer_policy_compares_commit_date_with_mtime() {
    let h = Harness::new();
    let (a, b) = pair(&h);
    write(&a, "shared.txt", "remote");
    write(&a, "other.txt", "remote");
    a.sync(ConflictPolicy::default()).unwrap();

    write(&b, "shared.txt", "old local");
    write(&b, "other.txt", "new local");
    set_mtime(&b, "shared.txt", SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
    set_mtime(&b, "other.txt", SystemTime::now() + Duration::from_secs(3_600));

    assert_eq!(b.sync(ConflictPolicy::Newer).unwrap(), SyncStatus::AutoMerged);
    assert_eq!(read(&b, "shared.txt").as_deref(), Some("remote"));
    assert_eq!(read(&b, "other.txt").as_deref(), Some("new local"));
}

#[test]
fn ignored_files_stay_local() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, ".gitignore", "*.log\n");
    write(&a, "app.log", "noise");
    write(&a, "kept.txt", "signal");
    a.sync(ConflictPolicy::default()).unwrap();

    let b = h.clone_of(&a, "b");
    assert_eq!(read(&b, "kept.txt").as_deref(), Some("signal"));
    assert_eq!(read(&b, "app.log"), None);
}

/// Wraps a remote and lets another writer move the head right before the
/// first compare-and-swap goes out.
struct RacingRemote {
    inner: Arc<dyn RemoteApi>,
    race: Arc<Mutex<Option<Race>>>,
}

impl RemoteApi for RacingRemote {
    fn repo_id(&self) -> &str {
        self.inner.repo_id()
    }

    fn get_head(&self, branch: &BranchName) -> SyncResult<Option<Hash>> {
        self.inner.get_head(branch)
    }

    fn set_head(
        &self,
        branch: &BranchName,
        current: Option<&Hash>,
        next: &Hash,
    ) -> SyncResult<HeadUpdate> {
        let race = self.race.lock().take();
        if let Some(race) = race {
            race();
        }
        self.inner.set_head(branch, current, next)
    }

    fn upload(&self, objects: &[ObjectEntry]) -> SyncResult<Timestamp> {
        self.inner.upload(objects)
    }

    fn download_since(&self, since: Timestamp) -> SyncResult<Downloaded> {
        self.inner.download_since(since)
    }

    fn download(&self, hashes: &[Hash]) -> SyncResult<Vec<ObjectEntry>> {
        self.inner.download(hashes)
    }
}

struct RacingConnector<'a> {
    inner: &'a Connector,
    race: Arc<Mutex<Option<Race>>>,
}

impl RemoteConnector for RacingConnector<'_> {
    fn create_repository(&self, server_url: &str, api_key: &str) -> SyncResult<String> {
        self.inner.create_repository(server_url, api_key)
    }

    fn connect(&self, config: &RepoConfig) -> SyncResult<Arc<dyn RemoteApi>> {
        Ok(Arc::new(RacingRemote {
            inner: self.inner.connect(config)?,
            race: Arc::clone(&self.race),
        }))
    }
}

type Race = Box<dyn FnOnce() + Send>;

/// Clones `origin` into `b`; `race` runs right before b's first head update.
fn clone_racing(h: &Harness, origin: &SyncEngine, config: SyncConfig, race: Race) -> SyncEngine {
    let connector = RacingConnector {
        inner: &h.connector,
        race: Arc::new(Mutex::new(Some(race))),
    };
    SyncEngine::clone_remote(
        &h.path("b"),
        SERVER_URL,
        origin.remote().repo_id(),
        config,
        CloneOptions::default(),
        &connector,
    )
    .unwrap()
}

fn racing_pair(h: &Harness, config: SyncConfig) -> (Arc<SyncEngine>, SyncEngine) {
    let a = h.init("a");
    write(&a, "shared.txt", "base");
    a.sync(ConflictPolicy::default()).unwrap();
    let a = Arc::new(a);
    let racer = Arc::clone(&a);
    let b = clone_racing(
        h,
        &a,
        config,
        Box::new(move || {
            write(&racer, "from_a.txt", "a");
            assert_eq!(racer.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pushed);
        }),
    );
    (a, b)
}

#[test]
fn lost_head_race_is_retried() {
    let h = Harness::new();
    let (a, b) = racing_pair(&h, Harness::config("b"));

    write(&b, "from_b.txt", "b");
    assert_eq!(
        b.sync_with_retry(ConflictPolicy::default()).unwrap(),
        SyncStatus::AutoMerged
    );
    assert_eq!(b.stats().head_races, 1);

    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pulled);
    assert_eq!(read(&a, "from_b.txt").as_deref(), Some("b"));
    assert_eq!(read(&b, "from_a.txt").as_deref(), Some("a"));
}

#[test]
fn single_round_reports_head_moved() {
    let h = Harness::new();
    let (a, b) = racing_pair(&h, Harness::config("b"));

    write(&b, "from_b.txt", "b");
    let status = b.sync(ConflictPolicy::default()).unwrap();
    assert_eq!(
        status,
        SyncStatus::HeadMoved {
            actual: a.log().unwrap()[0].hash.clone()
        }
    );
}

#[test]
fn retry_budget_is_bounded() {
    let h = Harness::new();
    let (_a, b) = racing_pair(&h, Harness::config("b").with_max_sync_rounds(1));

    write(&b, "from_b.txt", "b");
    let err = b.sync_with_retry(ConflictPolicy::default()).unwrap_err();
    assert!(matches!(err, SyncError::RetryExhausted { rounds: 1 }));
}

#[test]
fn conflict_after_merge_still_reports_merge() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, "shared.txt", "base");
    a.sync(ConflictPolicy::default()).unwrap();
    let a = Arc::new(a);
    let racer = Arc::clone(&a);
    let b = clone_racing(
        &h,
        &a,
        Harness::config("b"),
        Box::new(move || {
            write(&racer, "shared.txt", "edited by a");
            assert_eq!(racer.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pushed);
        }),
    );

    // round one merges from_a.txt, round two loses the race to a's edit
    // of shared.txt, round three conflicts on it
    write(&a, "from_a.txt", "a");
    assert_eq!(a.sync(ConflictPolicy::default()).unwrap(), SyncStatus::Pushed);
    write(&b, "shared.txt", "edited by b");

    assert_eq!(
        b.sync_with_retry(ConflictPolicy::default()).unwrap(),
        SyncStatus::AutoMerged
    );
    let stats = b.stats();
    assert_eq!(stats.rounds, 3);
    assert_eq!(stats.head_races, 1);
    assert!(stats.last_status.as_ref().is_some_and(SyncStatus::is_conflicted));

    let remote_head = a.log().unwrap()[0].hash.clone();
    let copy = format!("shared({}).txt", remote_head.short(8));
    assert_eq!(read(&b, &copy).as_deref(), Some("edited by a"));
    assert_eq!(read(&b, "shared.txt").as_deref(), Some("edited by b"));
    assert_eq!(read(&b, "from_a.txt").as_deref(), Some("a"));
}

#[test]
fn init_refuses_existing_working_copy() {
    let h = Harness::new();
    drop(h.init("a"));
    let err =
        SyncEngine::init(&h.path("a"), SERVER_URL, Harness::config("a"), &h.connector).unwrap_err();
    assert!(matches!(err, SyncError::Core(CoreError::AlreadyExists(_))));
}

#[test]
fn open_locks_the_working_copy() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, "x.txt", "x");
    a.sync(ConflictPolicy::default()).unwrap();

    let nested = h.path("a/sub");
    fs::create_dir_all(&nested).unwrap();
    let err = SyncEngine::open(&nested, Harness::config("a"), &h.connector).unwrap_err();
    assert!(matches!(err, SyncError::Core(CoreError::Locked)));

    let repo_id = a.remote().repo_id().to_string();
    drop(a);
    let reopened = SyncEngine::open(&nested, Harness::config("a"), &h.connector).unwrap();
    assert_eq!(reopened.remote().repo_id(), repo_id);
    assert_eq!(
        reopened.sync(ConflictPolicy::default()).unwrap(),
        SyncStatus::NoChanges
    );
}

#[test]
fn clone_into_non_empty_directory() {
    let h = Harness::new();
    let a = h.init("a");
    write(&a, "shared.txt", "remote");
    a.sync(ConflictPolicy::default()).unwrap();

    for name in ["refused", "skipped", "overwritten"] {
        fs::create_dir_all(h.path(name)).unwrap();
        fs::write(h.path(name).join("shared.txt"), "local").unwrap();
    }

    let err = h
        .clone_with(&a, "refused", CloneOptions::default(), &h.connector)
        .unwrap_err();
    assert!(matches!(err, SyncError::NotEmpty(_)));

    let skipped = h
        .clone_with(
            &a,
            "skipped",
            CloneOptions::default().allow_non_empty(AllowNonEmpty::SkipCheckout),
            &h.connector,
        )
        .unwrap();
    assert_eq!(read(&skipped, "shared.txt").as_deref(), Some("local"));

    let overwritten = h
        .clone_with(
            &a,
            "overwritten",
            CloneOptions::default().allow_non_empty(AllowNonEmpty::Overwrite),
            &h.connector,
        )
        .unwrap();
    assert_eq!(read(&overwritten, "shared.txt").as_deref(), Some("remote"));
}

#[test]
fn clone_of_empty_remote_fails() {
    let h = Harness::new();
    let a = h.init("a");
    let err = h
        .clone_with(&a, "b", CloneOptions::default(), &h.connector)
        .unwrap_err();
    assert!(matches!(err, SyncError::RemoteHeadMissing { .. }));
}
