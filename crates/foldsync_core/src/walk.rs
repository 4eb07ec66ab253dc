//! Iterators over trees and commit history.

use crate::error::CoreResult;
use crate::repo::Repository;
use crate::types::PathInRepo;
use foldsync_codec::{CommitEntry, Hash, TreeEntry};
use std::collections::VecDeque;

/// Pre-order walk over every entry below a tree.
///
/// Directories are yielded before their contents. Subtrees are read
/// lazily, one at a time, when their directory entry is reached.
pub struct TreeWalk<'a> {
    repo: &'a Repository,
    stack: Vec<(PathInRepo, VecDeque<TreeEntry>)>,
}

impl<'a> TreeWalk<'a> {
    fn new(repo: &'a Repository, root: Vec<TreeEntry>) -> Self {
        Self {
            repo,
            stack: vec![(PathInRepo::root(), root.into())],
        }
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = CoreResult<(PathInRepo, TreeEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, pending) = self.stack.last_mut()?;
            let Some(entry) = pending.pop_front() else {
                self.stack.pop();
                continue;
            };
            let path = prefix.join(&entry.name);
            if entry.mode.is_dir() {
                match self.repo.read_tree(&entry.hash) {
                    Ok(children) => self.stack.push((path.clone(), children.into())),
                    Err(e) => {
                        self.stack.clear();
                        return Some(Err(e));
                    }
                }
            }
            return Some(Ok((path, entry)));
        }
    }
}

/// First-parent history, newest first.
pub struct History<'a> {
    repo: &'a Repository,
    next: Option<Hash>,
}

impl Iterator for History<'_> {
    type Item = CoreResult<(Hash, CommitEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.repo.read_commit(&hash) {
            Ok(commit) => {
                self.next = commit.parents.first().cloned();
                Some(Ok((hash, commit)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl Repository {
    /// Walks every entry below the tree `hash`.
    pub fn walk_tree(&self, hash: &Hash) -> CoreResult<TreeWalk<'_>> {
        Ok(TreeWalk::new(self, self.read_tree(hash)?))
    }

    /// Follows first parents starting at `start`.
    #[must_use]
    pub fn history(&self, start: &Hash) -> History<'_> {
        History {
            repo: self,
            next: Some(start.clone()),
        }
    }

    /// Resolves a path inside a tree to its entry.
    pub fn lookup_path(&self, tree: &Hash, path: &PathInRepo) -> CoreResult<Option<TreeEntry>> {
        let mut entries = self.read_tree(tree)?;
        let mut components = path.components().peekable();
        while let Some(name) = components.next() {
            let Some(entry) = entries.into_iter().find(|e| e.name.as_str() == name) else {
                return Ok(None);
            };
            if components.peek().is_none() {
                return Ok(Some(entry));
            }
            if !entry.mode.is_dir() {
                return Ok(None);
            }
            entries = self.read_tree(&entry.hash)?;
        }
        Ok(None)
    }
}
