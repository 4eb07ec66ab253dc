//! Object inspection commands.

use super::{open, CliResult};
use foldsync_codec::{Hash, ObjectKind, TreeEntry};
use foldsync_core::{PathInRepo, RefName};
use foldsync_sync_engine::SyncConfig;
use std::io::Write;
use std::path::Path;

/// Prints the type and content of any object.
pub fn cat_file(dir: &Path, hash: &str, config: SyncConfig) -> CliResult {
    let engine = open(dir, config)?;
    let object = engine.cat_file(&Hash::parse(hash)?)?;

    println!("Type: {}", object.kind);
    match object.kind {
        ObjectKind::Tree => {
            for entry in foldsync_codec::decode_tree(&object.content)? {
                print_entry(&entry, entry.name.as_str());
            }
        }
        _ => {
            let mut out = std::io::stdout().lock();
            out.write_all(&object.content)?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Lists a tree. `hash` may name a tree or a commit; without it the tree
/// of the current head is listed.
pub fn ls_tree(dir: &Path, hash: Option<&str>, recursive: bool, config: SyncConfig) -> CliResult {
    let engine = open(dir, config)?;
    let repo = engine.repository();

    let start = match hash {
        Some(hash) => Hash::parse(hash)?,
        None => {
            let branch = engine.branch()?;
            repo.read_head(&RefName::local(&branch))?
                .ok_or_else(|| format!("Branch {branch} has no commits yet"))?
        }
    };
    let tree = match engine.cat_file(&start)?.kind {
        ObjectKind::Commit => repo.read_commit(&start)?.tree,
        ObjectKind::Tree => start,
        ObjectKind::Blob => return Err(format!("{start} is a blob").into()),
    };

    if recursive {
        for item in repo.walk_tree(&tree)? {
            let (path, entry) = item?;
            print_entry(&entry, &display_path(&path, &entry));
        }
    } else {
        for entry in repo.read_tree(&tree)? {
            print_entry(&entry, entry.name.as_str());
        }
    }
    Ok(())
}

fn display_path(path: &PathInRepo, entry: &TreeEntry) -> String {
    if entry.mode.is_dir() {
        format!("{path}/")
    } else {
        path.to_string()
    }
}

fn print_entry(entry: &TreeEntry, name: &str) {
    let kind = if entry.mode.is_dir() { "tree" } else { "blob" };
    println!("{} {kind} {}\t{name}", entry.mode, entry.hash);
}
