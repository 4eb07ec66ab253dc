//! Object hash vectors.
//!
//! Objects are framed and hashed the way git does it, so known git object
//! ids double as golden values for the codec.

use foldsync_codec::{encode_tree, FileName, Hash, ObjectKind, TreeEntry};

/// A framed object and the id it must hash to.
#[derive(Debug, Clone)]
pub struct ObjectVector {
    /// Unique identifier for this vector.
    pub id: &'static str,
    /// Object type.
    pub kind: ObjectKind,
    /// Content before framing.
    pub content: Vec<u8>,
    /// Expected id, hex-encoded.
    pub expected_hash: &'static str,
}

fn blob(id: &'static str, content: &str, expected_hash: &'static str) -> ObjectVector {
    ObjectVector {
        id,
        kind: ObjectKind::Blob,
        content: content.as_bytes().to_vec(),
        expected_hash,
    }
}

/// Blob and tree vectors.
pub fn object_vectors() -> Vec<ObjectVector> {
    let version_one = Hash::parse("83baae61804e65cc73a7201a7252750c76066a30")
        .expect("Valid vector hash");
    let single_file_tree = encode_tree(&[TreeEntry::file(
        FileName::parse("test.txt").expect("Valid vector name"),
        version_one,
    )]);

    vec![
        blob("blob_empty", "", "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"),
        blob("blob_hello", "hello\n", "ce013625030ba8dba906f756967f9e9ca394464a"),
        blob(
            "blob_hello_world",
            "hello world\n",
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad",
        ),
        blob(
            "blob_test_content",
            "test content\n",
            "d670460b4b4aece5915caf5c68d12f560a9fe3e4",
        ),
        blob("blob_version_1", "version 1\n", "83baae61804e65cc73a7201a7252750c76066a30"),
        blob("blob_version_2", "version 2\n", "1f7a7a472abf3dd9643fd615f6da379c4acb3e3a"),
        ObjectVector {
            id: "tree_empty",
            kind: ObjectKind::Tree,
            content: Vec::new(),
            expected_hash: "4b825dc642cb6eb9a060e54bf8d69288fbee4904",
        },
        ObjectVector {
            id: "tree_single_file",
            kind: ObjectKind::Tree,
            content: single_file_tree,
            expected_hash: "d8329fc1cc938780ffdd9f94e0d364e0ea74f579",
        },
    ]
}
