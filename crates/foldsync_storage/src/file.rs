//! Sharded on-disk object store.
//!
//! Layout under the metadata directory:
//!
//! ```text
//! <meta>/
//! ├─ objects/
//! │  └─ ab/
//! │     └─ cdef...   # 38 hex chars, compressed object
//! └─ state.json      # {"uploadSince": <secs>}
//! ```

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectEntry, ObjectIter, ObjectStore, ObjectValue, SyncCursor, Timestamp};
use foldsync_codec::Hash;
use std::fs::{self, File, ReadDir};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const OBJECTS_DIR: &str = "objects";
const STATE_FILE: &str = "state.json";

/// A durable object store using one file per object.
///
/// Objects are sharded by the first two hex characters of their hash to
/// keep directory fan-out bounded. Writes go through a temporary file and a
/// rename so a crash never leaves a truncated object behind.
///
/// # Example
///
/// ```no_run
/// use foldsync_storage::{FileObjectStore, ObjectStore};
/// use std::path::Path;
///
/// let store = FileObjectStore::open(Path::new(".foldsync")).unwrap();
/// let cursor = store.cursor().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    objects: PathBuf,
    state: PathBuf,
}

impl FileObjectStore {
    /// Opens the store rooted at a metadata directory, creating `objects/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the objects directory cannot be created.
    pub fn open(meta_dir: &Path) -> StorageResult<Self> {
        let objects = meta_dir.join(OBJECTS_DIR);
        fs::create_dir_all(&objects)?;
        Ok(Self {
            objects,
            state: meta_dir.join(STATE_FILE),
        })
    }

    /// Returns the path of the `objects/` directory.
    #[must_use]
    pub fn objects_dir(&self) -> &Path {
        &self.objects
    }

    fn path_of(&self, hash: &Hash) -> PathBuf {
        let hex = hash.as_str();
        self.objects.join(&hex[..2]).join(&hex[2..])
    }
}

impl ObjectStore for FileObjectStore {
    fn has(&self, hash: &Hash) -> StorageResult<bool> {
        Ok(self.path_of(hash).is_file())
    }

    fn get(&self, hash: &Hash) -> StorageResult<ObjectValue> {
        let path = self.path_of(hash);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(hash.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let mtime = fs::metadata(&path)?.modified()?.into();
        Ok(ObjectValue { content, mtime })
    }

    fn put(&self, hash: &Hash, compressed: &[u8]) -> StorageResult<()> {
        let path = self.path_of(hash);
        if path.is_file() {
            return Ok(());
        }
        let shard = path
            .parent()
            .ok_or_else(|| StorageError::Corrupted(format!("no shard for {hash}")))?;
        fs::create_dir_all(shard)?;

        let temp = shard.join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let mut file = File::create(&temp)?;
        file.write_all(compressed)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            // Another writer may have landed the same object first.
            if path.is_file() {
                return Ok(());
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn iterate(&self, since: Timestamp) -> StorageResult<ObjectIter<'_>> {
        Ok(Box::new(ShardWalk {
            shards: fs::read_dir(&self.objects)?,
            current: None,
            since,
        }))
    }

    fn cursor(&self) -> StorageResult<SyncCursor> {
        match fs::read(&self.state) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SyncCursor::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn set_cursor(&self, cursor: SyncCursor) -> StorageResult<()> {
        let temp = self.state.with_extension("json.tmp");
        fs::write(&temp, serde_json::to_vec(&cursor)?)?;
        fs::rename(&temp, &self.state)?;
        Ok(())
    }
}

/// Two-level directory walk over `objects/<2>/<38>`.
struct ShardWalk {
    shards: ReadDir,
    current: Option<(String, ReadDir)>,
    since: Timestamp,
}

impl ShardWalk {
    fn next_shard(&mut self) -> Option<StorageResult<()>> {
        loop {
            let entry = match self.shards.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.len() != 2 || !entry.path().is_dir() {
                continue;
            }
            match fs::read_dir(entry.path()) {
                Ok(files) => {
                    self.current = Some((name, files));
                    return Some(Ok(()));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    fn read_entry(&self, prefix: &str, file: &fs::DirEntry) -> StorageResult<Option<ObjectEntry>> {
        let rest = file.file_name().to_string_lossy().into_owned();
        let Ok(hash) = Hash::parse(&format!("{prefix}{rest}")) else {
            // temp files and strays
            return Ok(None);
        };
        let mtime: Timestamp = file.metadata()?.modified()?.into();
        if mtime < self.since {
            return Ok(None);
        }
        let content = fs::read(file.path())?;
        Ok(Some(ObjectEntry {
            hash,
            content,
            mtime,
        }))
    }
}

impl Iterator for ShardWalk {
    type Item = StorageResult<ObjectEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                if let Err(e) = self.next_shard()? {
                    return Some(Err(e));
                }
            }
            let (prefix, files) = self.current.as_mut()?;
            let prefix = prefix.clone();
            match files.next() {
                None => self.current = None,
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(file)) => match self.read_entry(&prefix, &file) {
                    Ok(Some(entry)) => return Some(Ok(entry)),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}
