//! foldsync CLI
//!
//! Command-line client that keeps a folder in sync with a remote.
//!
//! # Commands
//!
//! - `init` - Create a remote repository for the current folder
//! - `clone` - Check out an existing remote repository
//! - `commit` - Snapshot the folder without syncing
//! - `sync` - Commit, then push, pull or merge (the default)
//! - `newer` - Sync, resolving conflicts in favour of the newer side
//! - `log` - Show the history of the current branch
//! - `cat-file` / `ls-tree` - Inspect stored objects
//! - `scan` - List working copies below a folder

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::CliResult;
use foldsync_sync_engine::{AllowNonEmpty, ConflictPolicy, SyncConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Decentralized folder sync.
#[derive(Parser)]
#[command(name = "foldsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder to operate on (defaults to the current directory)
    #[arg(global = true, short = 'C', long)]
    path: Option<PathBuf>,

    /// Name recorded in commits
    #[arg(global = true, long)]
    author: Option<String>,

    /// E-mail recorded in commits
    #[arg(global = true, long)]
    email: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a remote repository for this folder
    Init {
        /// Server URL, usually ending in `.php` or `/`
        server_url: String,
    },

    /// Check out an existing remote repository into this folder
    Clone {
        /// Server URL
        server_url: String,

        /// Repository id printed by `init`
        repo_id: String,

        /// Branch to check out
        #[arg(default_value = "main")]
        branch: String,

        /// Set up a non-empty folder without touching its files
        #[arg(long, conflicts_with = "overwrite")]
        no_checkout: bool,

        /// Check out over the files of a non-empty folder
        #[arg(long)]
        overwrite: bool,
    },

    /// Snapshot the folder into a local commit
    Commit,

    /// Commit, then push, pull or merge with the remote
    Sync {
        /// How files changed on both sides are resolved
        #[arg(long, value_enum, default_value_t = PolicyArg::SaveHashedRemote)]
        policy: PolicyArg,
    },

    /// Sync, keeping whichever side of a conflict is newer
    Newer,

    /// Show the history of the current branch
    Log {
        /// Maximum number of commits to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print a stored object
    CatFile {
        /// Object hash
        hash: String,
    },

    /// List a tree (defaults to the tree of the current head)
    LsTree {
        /// Tree or commit hash
        hash: Option<String>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// List working copies below the folder
    Scan {
        /// Also print repository ids
        #[arg(long)]
        id: bool,

        /// Also print server URLs
        #[arg(long)]
        url: bool,

        /// Also print api keys
        #[arg(long)]
        key: bool,

        /// Print a shell line syncing each working copy
        #[arg(long)]
        shell: bool,
    },

    /// Show version information
    Version,
}

/// Conflict policy names on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Keep local files and save remote versions next to them
    SaveHashedRemote,
    /// Take the remote version
    IgnoreLocal,
    /// Keep the local version
    IgnoreRemote,
    /// Keep whichever side is newer
    Newer,
}

impl From<PolicyArg> for ConflictPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::SaveHashedRemote => ConflictPolicy::SaveHashedRemote,
            PolicyArg::IgnoreLocal => ConflictPolicy::IgnoreLocal,
            PolicyArg::IgnoreRemote => ConflictPolicy::IgnoreRemote,
            PolicyArg::Newer => ConflictPolicy::Newer,
        }
    }
}

impl Cli {
    fn sync_config(&self) -> SyncConfig {
        let defaults = SyncConfig::default();
        let name = self.author.clone().unwrap_or(defaults.author_name.clone());
        let email = self.email.clone().unwrap_or(defaults.author_email.clone());
        defaults.with_author(name, email)
    }
}

fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dir = match &cli.path {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let config = cli.sync_config();

    match cli.command.unwrap_or(Commands::Sync {
        policy: PolicyArg::SaveHashedRemote,
    }) {
        Commands::Init { server_url } => commands::init::run(&dir, &server_url, config)?,
        Commands::Clone {
            server_url,
            repo_id,
            branch,
            no_checkout,
            overwrite,
        } => {
            let allow = if no_checkout {
                Some(AllowNonEmpty::SkipCheckout)
            } else if overwrite {
                Some(AllowNonEmpty::Overwrite)
            } else {
                None
            };
            commands::clone::run(&dir, &server_url, &repo_id, &branch, allow, config)?;
        }
        Commands::Commit => commands::sync::commit(&dir, config)?,
        Commands::Sync { policy } => commands::sync::run(&dir, policy.into(), config)?,
        Commands::Newer => commands::sync::run(&dir, ConflictPolicy::Newer, config)?,
        Commands::Log { limit, format } => commands::log::run(&dir, limit, &format, config)?,
        Commands::CatFile { hash } => commands::inspect::cat_file(&dir, &hash, config)?,
        Commands::LsTree { hash, recursive } => {
            commands::inspect::ls_tree(&dir, hash.as_deref(), recursive, config)?;
        }
        Commands::Scan {
            id,
            url,
            key,
            shell,
        } => commands::scan::run(&dir, id, url, key, shell, &config)?,
        Commands::Version => {
            println!("foldsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_sync() {
        let cli = Cli::try_parse_from(["foldsync"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn clone_flags_are_exclusive() {
        let parsed = Cli::try_parse_from([
            "foldsync",
            "clone",
            "https://example.com/sync.php",
            "abc",
            "--no-checkout",
            "--overwrite",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from([
            "foldsync",
            "clone",
            "https://example.com/sync.php",
            "abc",
            "work",
            "--overwrite",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Clone {
                branch, overwrite, ..
            }) => {
                assert_eq!(branch, "work");
                assert!(overwrite);
            }
            _ => panic!("expected clone"),
        }
    }

    #[test]
    fn policy_names() {
        let cli =
            Cli::try_parse_from(["foldsync", "sync", "--policy", "ignore-local"]).unwrap();
        match cli.command {
            Some(Commands::Sync { policy }) => {
                assert_eq!(ConflictPolicy::from(policy), ConflictPolicy::IgnoreLocal);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn identity_overrides() {
        let cli = Cli::try_parse_from(["foldsync", "commit", "--author", "Ada"]).unwrap();
        let config = cli.sync_config();
        assert_eq!(config.author_name, "Ada");
        assert_eq!(config.author_email, SyncConfig::default().author_email);
    }
}
