//! Conflict types for merge operations.

use crate::fieldpath::{Path, Set};
use crate::value::Value;
use std::fmt;

/// Conflict is a field a different manager owns with a value the incoming
/// document disagrees with.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// The manager that owns the conflicting field.
    pub manager: String,
    /// The path owned by that manager.
    pub path: Path,
    /// The value currently stored at the path.
    pub value: Option<Value>,
}

impl Conflict {
    /// Creates a new conflict.
    pub fn new(manager: impl Into<String>, path: Path, value: Option<Value>) -> Self {
        Conflict {
            manager: manager.into(),
            path,
            value,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflict with {:?}: .{}", self.manager, self.path)?;
        if let Some(value) = &self.value {
            write!(f, " (current value {})", value)?;
        }
        Ok(())
    }
}

impl std::error::Error for Conflict {}

/// Conflicts is a collection of conflicts, ordered by manager then path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conflicts {
    conflicts: Vec<Conflict>,
}

impl Conflicts {
    /// Creates a new empty Conflicts collection.
    pub fn new() -> Self {
        Conflicts {
            conflicts: Vec::new(),
        }
    }

    /// Adds a conflict unless the same (manager, path) is already recorded.
    pub fn add(&mut self, conflict: Conflict) {
        let key = |c: &Conflict| (c.manager.clone(), c.path.clone());
        match self
            .conflicts
            .binary_search_by_key(&key(&conflict), key)
        {
            Ok(_) => {}
            Err(pos) => self.conflicts.insert(pos, conflict),
        }
    }

    /// Returns true if there are no conflicts.
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Returns the number of conflicts.
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Returns an iterator over the conflicts.
    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter()
    }

    /// Returns the conflicting paths owned by `manager`.
    pub fn paths_of(&self, manager: &str) -> Set {
        self.conflicts
            .iter()
            .filter(|c| c.manager == manager)
            .map(|c| &c.path)
            .collect()
    }

    /// Returns the distinct managers involved, in order.
    pub fn managers(&self) -> Vec<&str> {
        let mut managers: Vec<&str> = self.conflicts.iter().map(|c| c.manager.as_str()).collect();
        managers.dedup();
        managers
    }

    /// Converts the conflicts to a Set of paths.
    pub fn to_set(&self) -> Set {
        self.conflicts.iter().map(|c| &c.path).collect()
    }
}

impl IntoIterator for Conflicts {
    type Item = Conflict;
    type IntoIter = std::vec::IntoIter<Conflict>;

    fn into_iter(self) -> Self::IntoIter {
        self.conflicts.into_iter()
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, conflict) in self.conflicts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", conflict)?;
        }
        Ok(())
    }
}

impl std::error::Error for Conflicts {}
