//! Commit and sync command implementations.

use super::{open, CliResult};
use foldsync_sync_engine::{ConflictPolicy, SyncConfig, SyncStatus};
use std::path::Path;

/// Runs the commit command.
pub fn commit(dir: &Path, config: SyncConfig) -> CliResult {
    let engine = open(dir, config)?;
    let hash = engine.commit()?;
    println!("{}: {hash}", engine.branch()?);
    Ok(())
}

/// Runs the sync command.
pub fn run(dir: &Path, policy: ConflictPolicy, config: SyncConfig) -> CliResult {
    let engine = open(dir, config)?;
    let status = engine.sync_with_retry(policy)?;
    println!("{}", describe(&status));
    if let Some(last) = engine.stats().last_status.filter(SyncStatus::is_conflicted) {
        if last != status {
            println!("{}", describe(&last));
        }
        if let SyncStatus::Conflicted { paths } = &last {
            for path in paths {
                println!("  {path}");
            }
        }
    }
    Ok(())
}

/// One-line summary of a sync outcome.
fn describe(status: &SyncStatus) -> String {
    match status {
        SyncStatus::NewlyPushed => "Created the remote branch".to_string(),
        SyncStatus::NoChanges => "Already up to date".to_string(),
        SyncStatus::Pushed => "Pushed".to_string(),
        SyncStatus::Pulled => "Updated from remote".to_string(),
        SyncStatus::AutoMerged => "Merged remote changes".to_string(),
        SyncStatus::HeadMoved { actual } => format!("Remote moved to {actual}, try again"),
        SyncStatus::Conflicted { paths } => format!(
            "CONFLICT: remote versions saved to {} file(s); sync again once resolved",
            paths.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldsync_core::PathInRepo;

    #[test]
    fn conflict_summary_counts_files() {
        let status = SyncStatus::Conflicted {
            paths: vec![PathInRepo::parse("a(12345678).txt").unwrap()],
        };
        assert!(describe(&status).contains("1 file(s)"));
        assert_eq!(describe(&SyncStatus::NoChanges), "Already up to date");
    }
}
