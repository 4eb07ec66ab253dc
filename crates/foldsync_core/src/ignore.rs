//! `.gitignore`-style ignore rules.
//!
//! Rules accumulate top-down: a `.gitignore` found in a directory applies to
//! that directory and everything below it. The accumulated rules form an
//! [`IgnoreStack`], an immutable cons list, so sibling walks never observe
//! each other's rules.

use crate::types::PathInRepo;
use glob::{MatchOptions, Pattern};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Name of the per-directory rule file.
pub const IGNORE_FILE: &str = ".gitignore";

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct Rule {
    pattern: Pattern,
    negated: bool,
    dir_only: bool,
    anchored: bool,
}

impl Rule {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', ' ']);
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (negated, line) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line.strip_prefix('\\').unwrap_or(line)),
        };
        let (dir_only, line) = match line.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, line),
        };
        let anchored = line.contains('/');
        let line = line.strip_prefix('/').unwrap_or(line);
        if line.is_empty() {
            return None;
        }
        match Pattern::new(line) {
            Ok(pattern) => Some(Self {
                pattern,
                negated,
                dir_only,
                anchored,
            }),
            Err(e) => {
                warn!(pattern = line, error = %e, "skipping invalid ignore pattern");
                None
            }
        }
    }

    fn matches(&self, rel: &str, name: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        let subject = if self.anchored { rel } else { name };
        self.pattern.matches_with(subject, MATCH)
    }
}

/// Rules from one ignore file, matched relative to the file's directory.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl IgnoreRules {
    /// Parses ignore file text. Invalid patterns are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self {
            rules: text.lines().filter_map(Rule::parse).collect(),
        }
    }

    /// Rules that always apply: `.git` and the metadata directory.
    #[must_use]
    pub fn builtin(meta_name: &str) -> Self {
        Self::parse(&format!(".git\n{meta_name}\n"))
    }

    /// Returns true when no rule is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Checks a `/`-separated path relative to the rules' directory.
    ///
    /// A path is ignored if it, or any directory above it, is ignored.
    /// Within one path the last matching rule wins.
    #[must_use]
    pub fn ignores(&self, rel: &str, is_dir: bool) -> bool {
        if self.rules.is_empty() || rel.is_empty() {
            return false;
        }
        let parts: Vec<&str> = rel.split('/').filter(|c| !c.is_empty()).collect();
        let mut end = 0;
        for (i, name) in parts.iter().enumerate() {
            end += name.len() + usize::from(i > 0);
            let prefix = &rel[..end];
            let prefix_is_dir = i + 1 < parts.len() || is_dir;
            if self.decide(prefix, name, prefix_is_dir) == Some(true) {
                return true;
            }
        }
        false
    }

    fn decide(&self, rel: &str, name: &str, is_dir: bool) -> Option<bool> {
        self.rules
            .iter()
            .rev()
            .find(|r| r.matches(rel, name, is_dir))
            .map(|r| !r.negated)
    }
}

#[derive(Debug)]
struct Layer {
    dir: PathBuf,
    rules: IgnoreRules,
    parent: IgnoreStack,
}

/// Immutable stack of ignore rule layers.
///
/// [`IgnoreStack::pushed`] returns a new stack sharing the old one as its
/// tail; the receiver is never modified.
#[derive(Debug, Clone, Default)]
pub struct IgnoreStack {
    top: Option<Arc<Layer>>,
}

impl IgnoreStack {
    /// An empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stack extended with the rules of `dir/.gitignore`, if any.
    #[must_use]
    pub fn pushed(&self, dir: &Path) -> Self {
        let path = dir.join(IGNORE_FILE);
        let rules = match fs::read_to_string(&path) {
            Ok(text) => IgnoreRules::parse(&text),
            Err(_) => return self.clone(),
        };
        if rules.is_empty() {
            return self.clone();
        }
        self.with_rules(dir, rules)
    }

    /// Returns a stack extended with explicit rules for `dir`.
    #[must_use]
    pub fn with_rules(&self, dir: &Path, rules: IgnoreRules) -> Self {
        Self {
            top: Some(Arc::new(Layer {
                dir: dir.to_path_buf(),
                rules,
                parent: self.clone(),
            })),
        }
    }

    /// Checks an absolute path against every layer whose directory contains it.
    #[must_use]
    pub fn ignores(&self, path: &Path, is_dir: bool) -> bool {
        let mut current = self.top.as_deref();
        while let Some(layer) = current {
            if let Ok(rel) = path.strip_prefix(&layer.dir) {
                let rel = rel_to_slash(rel);
                if layer.rules.ignores(&rel, is_dir) {
                    return true;
                }
            }
            current = layer.parent.top.as_deref();
        }
        false
    }
}

fn rel_to_slash(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Answers "is this repository path ignored?" for arbitrary paths.
///
/// Builds and caches the ignore stack of each directory on demand by
/// pushing every ancestor from the working directory root down.
#[derive(Debug)]
pub struct IgnoreChecker {
    work_dir: PathBuf,
    builtin: IgnoreRules,
    stacks: HashMap<PathInRepo, IgnoreStack>,
}

impl IgnoreChecker {
    /// Creates a checker for a working directory.
    #[must_use]
    pub fn new(work_dir: &Path, meta_name: &str) -> Self {
        let mut stacks = HashMap::new();
        stacks.insert(PathInRepo::root(), IgnoreStack::new().pushed(work_dir));
        Self {
            work_dir: work_dir.to_path_buf(),
            builtin: IgnoreRules::builtin(meta_name),
            stacks,
        }
    }

    /// Returns true if `path` is excluded from snapshots and diffs.
    pub fn ignores(&mut self, path: &PathInRepo, is_dir: bool) -> bool {
        if path.is_root() {
            return false;
        }
        if self.builtin.ignores(path.as_str(), is_dir) {
            return true;
        }
        let parent = path.parent().unwrap_or_default();
        let stack = self.stack_for(&parent);
        stack.ignores(&path.to_fs_path(&self.work_dir), is_dir)
    }

    fn stack_for(&mut self, dir: &PathInRepo) -> IgnoreStack {
        if let Some(stack) = self.stacks.get(dir) {
            return stack.clone();
        }
        let parent = dir.parent().unwrap_or_default();
        let stack = self
            .stack_for(&parent)
            .pushed(&dir.to_fs_path(&self.work_dir));
        self.stacks.insert(dir.clone(), stack.clone());
        stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn basename_patterns_match_at_any_depth() {
        let rules = IgnoreRules::parse("*.log\nbuild\n");
        assert!(rules.ignores("a.log", false));
        assert!(rules.ignores("deep/dir/a.log", false));
        assert!(rules.ignores("build", true));
        assert!(rules.ignores("src/build/out.o", false));
        assert!(!rules.ignores("src/main.rs", false));
    }

    #[test]
    fn anchored_patterns() {
        let rules = IgnoreRules::parse("/top.txt\ndocs/*.tmp\n");
        assert!(rules.ignores("top.txt", false));
        assert!(!rules.ignores("sub/top.txt", false));
        assert!(rules.ignores("docs/x.tmp", false));
        assert!(!rules.ignores("other/docs/x.tmp", false));
    }

    #[test]
    fn negation_last_match_wins() {
        let rules = IgnoreRules::parse("*.txt\n!keep.txt\n");
        assert!(rules.ignores("a.txt", false));
        assert!(!rules.ignores("keep.txt", false));
    }

    #[test]
    fn dir_only_patterns() {
        let rules = IgnoreRules::parse("cache/\n");
        assert!(rules.ignores("cache", true));
        assert!(!rules.ignores("cache", false));
        assert!(rules.ignores("cache/data.bin", false));
    }

    #[test]
    fn comments_and_blanks() {
        let rules = IgnoreRules::parse("# comment\n\n\\#hash\n");
        assert!(rules.ignores("#hash", false));
        assert!(!rules.ignores("comment", false));
    }

    #[test]
    fn stack_push_is_persistent() {
        let temp = tempdir().unwrap();
        let sub = temp.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(temp.path().join(IGNORE_FILE), "*.bak\n").unwrap();
        fs::write(sub.join(IGNORE_FILE), "secret\n").unwrap();

        let root = IgnoreStack::new().pushed(temp.path());
        let nested = root.pushed(&sub);
        assert!(nested.ignores(&sub.join("secret"), false));
        assert!(nested.ignores(&sub.join("x.bak"), false));
        // the parent stack is unaffected
        assert!(!root.ignores(&sub.join("secret"), false));
        // rules of sub do not leak to siblings
        assert!(!nested.ignores(&temp.path().join("secret"), false));
    }

    #[test]
    fn checker_uses_nested_files_and_builtins() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/.gitignore"), "*.tmp\n").unwrap();

        let mut checker = IgnoreChecker::new(temp.path(), ".foldsync");
        let p = |s: &str| PathInRepo::parse(s).unwrap();
        assert!(checker.ignores(&p("a/b/x.tmp"), false));
        assert!(!checker.ignores(&p("x.tmp"), false));
        assert!(checker.ignores(&p(".foldsync"), true));
        assert!(checker.ignores(&p("sub/.git/config"), false));
        assert!(!checker.ignores(&p("a/b/x.txt"), false));
    }
}
