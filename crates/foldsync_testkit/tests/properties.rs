//! Property tests over stores, trees and merges.

use foldsync_codec::{decode_commit, encode_commit, hash_object, CommitEntry, ObjectKind, TreeEntry};
use foldsync_core::{RepoLayout, Repository, TreeDiffEntry, DEFAULT_META_DIR};
use foldsync_storage::{
    FileObjectStore, MemoryObjectStore, ObjectStore, StorageResult, Timestamp,
};
use foldsync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Writes `files` into a fresh directory and snapshots it into `store`.
fn snapshot(store: &Arc<MemoryObjectStore>, files: &BTreeMap<String, Vec<u8>>) -> Vec<TreeEntry> {
    let temp = TempDir::new().unwrap();
    for (path, content) in files {
        write_file(temp.path(), path, content);
    }
    let repo = Repository::new(
        RepoLayout::new(temp.path(), DEFAULT_META_DIR),
        Arc::clone(store) as Arc<dyn ObjectStore>,
    );
    repo.build_working_tree().unwrap()
}

fn detached_repo(store: &Arc<MemoryObjectStore>) -> (TempDir, Repository) {
    let temp = TempDir::new().unwrap();
    let repo = Repository::new(
        RepoLayout::new(temp.path(), DEFAULT_META_DIR),
        Arc::clone(store) as Arc<dyn ObjectStore>,
    );
    (temp, repo)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn put_is_idempotent(content in file_content_strategy()) {
        let temp = TempDir::new().unwrap();
        let store = FileObjectStore::open(temp.path()).unwrap();
        let (hash, framed) = hash_object(ObjectKind::Blob, &content);
        let compressed = foldsync_codec::compress(&framed).unwrap();

        store.put(&hash, &compressed).unwrap();
        store.put(&hash, &compressed).unwrap();

        let stored = store
            .iterate(Timestamp::EPOCH)
            .unwrap()
            .collect::<StorageResult<Vec<_>>>()
            .unwrap();
        prop_assert_eq!(stored.len(), 1);
        prop_assert_eq!(&stored[0].hash, &hash);
    }

    #[test]
    fn diff_of_a_tree_with_itself_is_empty(files in file_set_strategy()) {
        let store = Arc::new(MemoryObjectStore::new());
        let tree = snapshot(&store, &files);
        let (_temp, repo) = detached_repo(&store);
        prop_assert!(repo.diff_tree(&tree, &tree).unwrap().is_empty());
    }

    #[test]
    fn merging_identical_sides_is_clean(
        base in file_set_strategy(),
        side in file_set_strategy(),
    ) {
        let store = Arc::new(MemoryObjectStore::new());
        let base = snapshot(&store, &base);
        let side = snapshot(&store, &side);
        let (_temp, repo) = detached_repo(&store);

        let outcome = repo.three_way_merge(&base, &side, &side).unwrap();
        prop_assert!(outcome.conflicts.is_empty());
        prop_assert!(outcome.to_a.is_empty());
        // deletions already made on both sides are dropped
        let mut expected = repo.diff_tree(&base, &side).unwrap();
        expected.retain(|d| !matches!(d, TreeDiffEntry::Deleted { .. }));
        prop_assert_eq!(outcome.to_b, expected);
    }

    #[test]
    fn commits_keep_their_author(author in author_strategy(), message in text_strategy()) {
        let tree = hash_object(ObjectKind::Tree, b"").0;
        let commit = CommitEntry {
            tree,
            parents: vec![],
            committer: author.clone(),
            author,
            message,
        };
        prop_assert_eq!(decode_commit(&encode_commit(&commit)).unwrap(), commit);
    }
}
