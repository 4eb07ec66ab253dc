//! # foldsync Codec
//!
//! Stateless byte transforms for the foldsync object model.
//!
//! Objects are framed as `"<kind> <length>\0<content>"`, identified by the
//! SHA-1 of the framed bytes, and stored zlib-compressed. This crate also
//! holds the binary tree layout and the textual commit layout.
//!
//! ## Usage
//!
//! ```
//! use foldsync_codec::{compress, hash_object, unpack_object, ObjectKind};
//!
//! let (hash, framed) = hash_object(ObjectKind::Blob, b"hello");
//! assert_eq!(hash.as_str(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
//!
//! let stored = compress(&framed).unwrap();
//! let (kind, content) = unpack_object(&stored).unwrap();
//! assert_eq!(kind, ObjectKind::Blob);
//! assert_eq!(content, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod commit;
mod error;
mod hash;
mod object;
mod tree;

pub use commit::{decode_commit, encode_commit, Author, CommitEntry};
pub use error::{CodecError, CodecResult};
pub use hash::{hash_bytes, Hash, HEX_HASH_LEN, RAW_HASH_LEN};
pub use object::{
    compress, decode_object, decompress, encode_object, hash_object, unpack_object, ObjectKind,
};
pub use tree::{decode_tree, encode_tree, sort_entries, FileName, Mode, TreeEntry};
