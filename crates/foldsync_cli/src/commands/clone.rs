//! Clone command implementation.

use super::{connector, CliResult};
use foldsync_core::BranchName;
use foldsync_sync_engine::{AllowNonEmpty, CloneOptions, SyncConfig, SyncEngine};
use std::path::Path;

/// Runs the clone command.
pub fn run(
    dir: &Path,
    server_url: &str,
    repo_id: &str,
    branch: &str,
    allow_non_empty: Option<AllowNonEmpty>,
    config: SyncConfig,
) -> CliResult {
    let mut options = CloneOptions::default().with_branch(BranchName::parse(branch)?);
    if let Some(mode) = allow_non_empty {
        options = options.allow_non_empty(mode);
    }
    println!("Cloning into {}...", dir.display());
    let connector = connector(&config)?;
    SyncEngine::clone_remote(dir, server_url, repo_id, config, options, &connector)?;
    Ok(())
}
