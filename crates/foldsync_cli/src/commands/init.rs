//! Init command implementation.

use super::{connector, CliResult};
use foldsync_sync_engine::{SyncConfig, SyncEngine};
use std::path::Path;

/// Runs the init command.
pub fn run(dir: &Path, server_url: &str, config: SyncConfig) -> CliResult {
    let connector = connector(&config)?;
    let engine = SyncEngine::init(dir, server_url, config, &connector)?;
    println!(
        "Initialized new repository with id: {}",
        engine.remote().repo_id()
    );
    Ok(())
}
