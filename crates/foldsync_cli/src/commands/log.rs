//! Log command implementation.

use super::{open, CliResult};
use foldsync_sync_engine::{LogEntry, SyncConfig};
use serde::Serialize;
use std::path::Path;

/// One commit as printed by `log --format json`.
#[derive(Debug, Serialize)]
pub struct LogLine {
    /// Commit hash.
    pub hash: String,
    /// Root tree hash.
    pub tree: String,
    /// Parent hashes, first parent first.
    pub parents: Vec<String>,
    /// Author as `name <email>`.
    pub author: String,
    /// Author date, RFC 3339.
    pub date: String,
    /// Commit message.
    pub message: String,
}

impl From<&LogEntry> for LogLine {
    fn from(entry: &LogEntry) -> Self {
        let author = &entry.commit.author;
        Self {
            hash: entry.hash.to_string(),
            tree: entry.commit.tree.to_string(),
            parents: entry.commit.parents.iter().map(ToString::to_string).collect(),
            author: format!("{} <{}>", author.name, author.email),
            date: author.date.to_rfc3339(),
            message: entry.commit.message.clone(),
        }
    }
}

/// Runs the log command.
pub fn run(dir: &Path, limit: Option<usize>, format: &str, config: SyncConfig) -> CliResult {
    let engine = open(dir, config)?;
    let mut entries = engine.log()?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    let lines: Vec<LogLine> = entries.iter().map(LogLine::from).collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&lines)?),
        "text" => {
            for line in &lines {
                print_text(line);
            }
        }
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn print_text(line: &LogLine) {
    println!("commit {}", line.hash);
    if let Some(merged) = line.parents.get(1) {
        println!("Merge: {} {}", &line.parents[0][..8], &merged[..8]);
    }
    println!("Author: {}", line.author);
    println!("Date:   {}", line.date);
    println!();
    for text in line.message.lines() {
        println!("    {text}");
    }
    println!();
}
