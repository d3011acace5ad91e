//! Comparison of two documents leaf by leaf.

use crate::fieldpath::{Path, Set};
use crate::value::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Comparison holds the result of comparing two documents.
///
/// No path appears in more than one of the three sets. If all of them are
/// empty the documents have the same leaves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Leaves in the left-hand side but not the right-hand side.
    pub removed: Set,
    /// Leaves in both with different values.
    pub modified: Set,
    /// Leaves in the right-hand side but not the left-hand side.
    pub added: Set,
}

impl Comparison {
    /// Creates a new empty Comparison.
    pub fn new() -> Self {
        Comparison::default()
    }

    /// Compares `lhs` against `rhs`.
    pub fn between(lhs: &Map, rhs: &Map) -> Self {
        let left: BTreeMap<Path, Value> = lhs.leaves().into_iter().collect();
        let right: BTreeMap<Path, Value> = rhs.leaves().into_iter().collect();

        let mut comparison = Comparison::new();
        for (path, value) in &left {
            match right.get(path) {
                None => comparison.removed.insert(path),
                Some(other) if other != value => comparison.modified.insert(path),
                Some(_) => {}
            }
        }
        for path in right.keys() {
            if !left.contains_key(path) {
                comparison.added.insert(path);
            }
        }
        comparison
    }

    /// Returns true if there are no changes.
    pub fn is_same(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty() && self.added.is_empty()
    }

    /// Returns the paths that were written: modified or added.
    pub fn changed(&self) -> Set {
        self.modified.union(&self.added)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sections = [
            ("Modified Fields", &self.modified),
            ("Added Fields", &self.added),
            ("Removed Fields", &self.removed),
        ];
        let mut first = true;
        for (title, set) in sections {
            if set.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "- {}:", title)?;
            for path in set.paths() {
                write!(f, "\n  {}", path)?;
            }
        }
        Ok(())
    }
}
