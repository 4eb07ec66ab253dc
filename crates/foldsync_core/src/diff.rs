//! Tree diffing, merge-base search and three-way merge.

use crate::error::{CoreError, CoreResult};
use crate::ignore::IgnoreChecker;
use crate::repo::Repository;
use crate::types::PathInRepo;
use foldsync_codec::{Hash, TreeEntry};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

/// A file-level change between two trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeDiffEntry {
    /// File exists only in the new tree.
    Added {
        /// Location of the file.
        path: PathInRepo,
        /// New blob.
        new: Hash,
    },
    /// File content changed.
    Modified {
        /// Location of the file.
        path: PathInRepo,
        /// Previous blob.
        old: Hash,
        /// New blob.
        new: Hash,
    },
    /// File exists only in the old tree.
    Deleted {
        /// Location of the file.
        path: PathInRepo,
        /// Previous blob.
        old: Hash,
    },
}

impl TreeDiffEntry {
    /// Location of the changed file.
    #[must_use]
    pub fn path(&self) -> &PathInRepo {
        match self {
            Self::Added { path, .. } | Self::Modified { path, .. } | Self::Deleted { path, .. } => {
                path
            }
        }
    }

    /// Blob after the change, if the file still exists.
    #[must_use]
    pub fn new_hash(&self) -> Option<&Hash> {
        match self {
            Self::Added { new, .. } | Self::Modified { new, .. } => Some(new),
            Self::Deleted { .. } => None,
        }
    }

    /// Blob before the change, if the file existed.
    #[must_use]
    pub fn old_hash(&self) -> Option<&Hash> {
        match self {
            Self::Modified { old, .. } | Self::Deleted { old, .. } => Some(old),
            Self::Added { .. } => None,
        }
    }
}

impl fmt::Display for TreeDiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { path, .. } => write!(f, "A {path}"),
            Self::Modified { path, .. } => write!(f, "M {path}"),
            Self::Deleted { path, .. } => write!(f, "D {path}"),
        }
    }
}

/// A path changed differently on both sides of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Location of the file.
    pub path: PathInRepo,
    /// Common version; absent when both sides added the file.
    pub base: Option<Hash>,
    /// Blob on side A (local).
    pub a: Hash,
    /// Blob on side B (remote).
    pub b: Hash,
}

/// Result of [`Repository::three_way_merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Changes side A must apply to include B's work.
    pub to_a: Vec<TreeDiffEntry>,
    /// Changes side B must apply to include A's work.
    pub to_b: Vec<TreeDiffEntry>,
    /// Paths needing a decision.
    pub conflicts: Vec<Conflict>,
}

impl MergeOutcome {
    /// Returns true if the merge needs no decision.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

impl Repository {
    /// Computes file-level changes from `old` to `new`.
    ///
    /// Directories present on one side only are expanded into per-file
    /// additions or deletions. A path switching between file and directory
    /// yields the deletions first, then the additions. Ignored paths never
    /// appear.
    pub fn diff_tree(&self, old: &[TreeEntry], new: &[TreeEntry]) -> CoreResult<Vec<TreeDiffEntry>> {
        let mut checker = IgnoreChecker::new(self.work_dir(), self.layout.meta_name());
        let mut out = Vec::new();
        self.diff_into(&PathInRepo::root(), old, new, &mut checker, &mut out)?;
        Ok(out)
    }

    fn diff_into(
        &self,
        prefix: &PathInRepo,
        old: &[TreeEntry],
        new: &[TreeEntry],
        checker: &mut IgnoreChecker,
        out: &mut Vec<TreeDiffEntry>,
    ) -> CoreResult<()> {
        let old_map: BTreeMap<&str, &TreeEntry> = old.iter().map(|e| (e.name.as_str(), e)).collect();
        let new_map: BTreeMap<&str, &TreeEntry> = new.iter().map(|e| (e.name.as_str(), e)).collect();
        let names: BTreeSet<&str> = old_map.keys().chain(new_map.keys()).copied().collect();

        for name in names {
            let old_entry = old_map.get(name).copied();
            let new_entry = new_map.get(name).copied();
            let Some(entry) = old_entry.or(new_entry) else {
                continue;
            };
            let path = prefix.join(&entry.name);
            let is_dir = entry.mode.is_dir();
            if checker.ignores(&path, is_dir) {
                continue;
            }

            match (old_entry, new_entry) {
                (Some(o), Some(n)) if o.hash == n.hash && o.mode == n.mode => {}
                (Some(o), Some(n)) if o.mode.is_dir() && n.mode.is_dir() => {
                    let (old_sub, new_sub) = (self.read_tree(&o.hash)?, self.read_tree(&n.hash)?);
                    self.diff_into(&path, &old_sub, &new_sub, checker, out)?;
                }
                (Some(o), Some(n)) if !o.mode.is_dir() && !n.mode.is_dir() => {
                    out.push(TreeDiffEntry::Modified {
                        path,
                        old: o.hash.clone(),
                        new: n.hash.clone(),
                    });
                }
                (Some(o), Some(n)) => {
                    self.expand_side(&path, o, false, checker, out)?;
                    self.expand_side(&path, n, true, checker, out)?;
                }
                (Some(o), None) => self.expand_side(&path, o, false, checker, out)?,
                (None, Some(n)) => self.expand_side(&path, n, true, checker, out)?,
                (None, None) => {}
            }
        }
        Ok(())
    }

    /// Emits an entry present on one side only, recursing into directories.
    fn expand_side(
        &self,
        path: &PathInRepo,
        entry: &TreeEntry,
        added: bool,
        checker: &mut IgnoreChecker,
        out: &mut Vec<TreeDiffEntry>,
    ) -> CoreResult<()> {
        if entry.mode.is_dir() {
            let sub = self.read_tree(&entry.hash)?;
            return if added {
                self.diff_into(path, &[], &sub, checker, out)
            } else {
                self.diff_into(path, &sub, &[], checker, out)
            };
        }
        out.push(if added {
            TreeDiffEntry::Added {
                path: path.clone(),
                new: entry.hash.clone(),
            }
        } else {
            TreeDiffEntry::Deleted {
                path: path.clone(),
                old: entry.hash.clone(),
            }
        });
        Ok(())
    }

    /// Finds the nearest common ancestor of two commits.
    ///
    /// Walks both histories breadth-first, alternating one step on each
    /// side, and returns the first commit reached by one side that the
    /// other has already visited.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnrelatedHistory`] if both walks run out.
    pub fn find_merge_base(&self, a: &Hash, b: &Hash) -> CoreResult<Hash> {
        let mut visited_a: HashSet<Hash> = HashSet::new();
        let mut visited_b: HashSet<Hash> = HashSet::new();
        let mut queue_a = VecDeque::from([a.clone()]);
        let mut queue_b = VecDeque::from([b.clone()]);

        while !queue_a.is_empty() || !queue_b.is_empty() {
            if let Some(found) = self.merge_base_step(&mut queue_a, &mut visited_a, &visited_b)? {
                return Ok(found);
            }
            if let Some(found) = self.merge_base_step(&mut queue_b, &mut visited_b, &visited_a)? {
                return Ok(found);
            }
        }
        Err(CoreError::UnrelatedHistory {
            a: a.clone(),
            b: b.clone(),
        })
    }

    fn merge_base_step(
        &self,
        queue: &mut VecDeque<Hash>,
        visited: &mut HashSet<Hash>,
        other: &HashSet<Hash>,
    ) -> CoreResult<Option<Hash>> {
        let Some(hash) = queue.pop_front() else {
            return Ok(None);
        };
        if other.contains(&hash) {
            return Ok(Some(hash));
        }
        if visited.insert(hash.clone()) {
            queue.extend(self.read_commit(&hash)?.parents);
        }
        Ok(None)
    }

    /// Merges two trees that diverged from `base`.
    ///
    /// | A \ B       | untouched | deleted | modified/added  |
    /// |-------------|-----------|---------|-----------------|
    /// | untouched   | -         | to A    | to A            |
    /// | deleted     | to B      | dropped | B's change to A |
    /// | changed     | to B      | A's change to B | conflict unless identical |
    ///
    /// Deletions made on both sides are dropped. Other identical changes
    /// land in `to_b`, where applying them is a no-op. A modification on one side paired with an addition on
    /// the other, or modifications of different base blobs, cannot happen
    /// for trees sharing `base` and are reported as
    /// [`CoreError::MergeInvariant`].
    pub fn three_way_merge(
        &self,
        base: &[TreeEntry],
        a: &[TreeEntry],
        b: &[TreeEntry],
    ) -> CoreResult<MergeOutcome> {
        let diff_a = self.diff_tree(base, a)?;
        let diff_b = self.diff_tree(base, b)?;

        // Walk A's paths in diff order, then paths only B touched.
        let mut paths: Vec<PathInRepo> = diff_a.iter().map(|d| d.path().clone()).collect();
        let seen: HashSet<PathInRepo> = paths.iter().cloned().collect();
        paths.extend(
            diff_b
                .iter()
                .map(|d| d.path().clone())
                .filter(|p| !seen.contains(p)),
        );
        let diff_a = index_by_path(diff_a);
        let diff_b = index_by_path(diff_b);

        let mut outcome = MergeOutcome::default();
        for path in &paths {
            match (diff_a.get(path), diff_b.get(path)) {
                (Some(da), Some(db)) => merge_both(da, db, &mut outcome)?,
                (Some(da), None) => outcome.to_b.push(da.clone()),
                (None, Some(db)) => outcome.to_a.push(db.clone()),
                (None, None) => {}
            }
        }
        Ok(outcome)
    }
}

fn index_by_path(diffs: Vec<TreeDiffEntry>) -> HashMap<PathInRepo, TreeDiffEntry> {
    diffs.into_iter().map(|d| (d.path().clone(), d)).collect()
}

fn merge_both(da: &TreeDiffEntry, db: &TreeDiffEntry, outcome: &mut MergeOutcome) -> CoreResult<()> {
    use TreeDiffEntry::{Added, Deleted, Modified};

    if da == db {
        if !matches!(da, Deleted { .. }) {
            outcome.to_b.push(da.clone());
        }
        return Ok(());
    }
    match (da, db) {
        (Deleted { .. }, _) => outcome.to_a.push(db.clone()),
        (_, Deleted { .. }) => outcome.to_b.push(da.clone()),
        (
            Modified {
                path,
                old: old_a,
                new: new_a,
            },
            Modified {
                old: old_b,
                new: new_b,
                ..
            },
        ) => {
            if old_a != old_b {
                return Err(CoreError::merge_invariant(format!(
                    "{path}: base blob differs between sides ({old_a} vs {old_b})"
                )));
            }
            outcome.conflicts.push(Conflict {
                path: path.clone(),
                base: Some(old_a.clone()),
                a: new_a.clone(),
                b: new_b.clone(),
            });
        }
        (Added { path, new: new_a }, Added { new: new_b, .. }) => {
            outcome.conflicts.push(Conflict {
                path: path.clone(),
                base: None,
                a: new_a.clone(),
                b: new_b.clone(),
            });
        }
        _ => {
            return Err(CoreError::merge_invariant(format!(
                "{}: incompatible changes {da} and {db}",
                da.path()
            )));
        }
    }
    Ok(())
}
