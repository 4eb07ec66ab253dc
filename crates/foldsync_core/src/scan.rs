//! Discovery of working copies below a directory.

use crate::error::CoreResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Finds every working copy at or below `root`.
///
/// Working copies nested inside other working copies are reported too.
/// The metadata directories themselves are not descended into. Unreadable
/// directories are skipped. Results are sorted.
pub fn scan_working_copies(root: &Path, meta_name: &str) -> CoreResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        if dir.join(meta_name).is_dir() {
            found.push(dir.clone());
        }
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if dir == root => return Err(e.into()),
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        for item in listing.flatten() {
            if item.file_type().is_ok_and(|t| t.is_dir()) && item.file_name() != meta_name {
                pending.push(item.path());
            }
        }
    }
    found.sort();
    Ok(found)
}
