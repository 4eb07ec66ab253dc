//! Scan command implementation.

use super::CliResult;
use foldsync_core::{scan_working_copies, RepoLayout};
use foldsync_sync_engine::SyncConfig;
use std::path::Path;

/// Runs the scan command.
pub fn run(
    dir: &Path,
    show_id: bool,
    show_url: bool,
    show_key: bool,
    shell: bool,
    config: &SyncConfig,
) -> CliResult {
    for copy in scan_working_copies(dir, &config.meta_dir)? {
        if shell {
            println!("cd {} ; foldsync sync", shell_quote(&copy.display().to_string()));
            continue;
        }
        let mut fields = vec![copy.display().to_string()];
        if show_id || show_url || show_key {
            let remote = RepoLayout::new(&copy, &config.meta_dir).load_config()?;
            if show_url {
                fields.push(remote.server_url);
            }
            if show_id {
                fields.push(remote.repo_id);
            }
            if show_key {
                fields.push(remote.api_key);
            }
        }
        println!("{}", fields.join(" "));
    }
    Ok(())
}

/// Single-quotes a path for POSIX shells.
fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("/tmp/a b"), "'/tmp/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
