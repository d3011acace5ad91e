//! Field path module - Represents field paths and tracks who owns them.
//!
//! [`ManagedFields`] records, per manager, the set of paths that manager
//! currently owns inside one resource.

mod path;
mod serialize;
mod set;

pub use path::*;
pub use serialize::*;
pub use set::*;

use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static EMPTY_SET: Set = Set::new();

/// Operation is the kind of write a manager last performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// An intent-based apply.
    Apply,
    /// A plain create or update.
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Apply => write!(f, "Apply"),
            Operation::Update => write!(f, "Update"),
        }
    }
}

/// ManagedFieldEntry is one manager's ownership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFieldEntry {
    pub operation: Operation,
    /// Resource version produced by this manager's last write.
    pub applied_at_version: u64,
    #[serde(rename = "fieldsV1")]
    pub fields: Set,
    /// Owned paths last set by a plain create or update and not applied
    /// since. Releasing them keeps their values.
    #[serde(skip)]
    pub written: Set,
}

impl ManagedFieldEntry {
    /// Creates a new ManagedFieldEntry.
    pub fn new(fields: Set, operation: Operation, applied_at_version: u64) -> Self {
        ManagedFieldEntry {
            operation,
            applied_at_version,
            fields,
            written: Set::new(),
        }
    }

    /// Returns the owned paths.
    pub fn fields(&self) -> &Set {
        &self.fields
    }
}

/// ManagedFields tracks what each manager owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedFields {
    managers: BTreeMap<String, ManagedFieldEntry>,
}

impl ManagedFields {
    /// Creates a new empty ManagedFields.
    pub const fn new() -> Self {
        ManagedFields {
            managers: BTreeMap::new(),
        }
    }

    /// Returns the number of managers.
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    /// Returns true if there are no managers.
    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Gets the entry for a manager.
    pub fn get(&self, manager: &str) -> Option<&ManagedFieldEntry> {
        self.managers.get(manager)
    }

    /// Returns true if the manager has an entry.
    pub fn contains(&self, manager: &str) -> bool {
        self.managers.contains_key(manager)
    }

    /// Returns an iterator over managers and their entries, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManagedFieldEntry)> {
        self.managers.iter()
    }

    /// Returns an iterator over manager names.
    pub fn managers(&self) -> impl Iterator<Item = &String> {
        self.managers.keys()
    }

    /// Returns the manager owning exactly `path`, if any.
    pub fn owner_of(&self, path: &Path) -> Option<&str> {
        self.managers
            .iter()
            .find(|(_, entry)| entry.fields.has(path))
            .map(|(manager, _)| manager.as_str())
    }

    /// Returns the paths owned by `manager`; empty for unknown managers.
    pub fn paths_owned_by(&self, manager: &str) -> &Set {
        self.managers
            .get(manager)
            .map_or(&EMPTY_SET, |entry| &entry.fields)
    }

    /// Returns the owned paths `manager` last set through a plain create or
    /// update.
    pub fn paths_written_by(&self, manager: &str) -> &Set {
        self.managers
            .get(manager)
            .map_or(&EMPTY_SET, |entry| &entry.written)
    }

    /// Replaces the owned set of `manager` and returns the paths it released.
    ///
    /// An `Apply` clears the plain-write marks of `manager`; an `Update`
    /// keeps those still owned. A manager left owning nothing loses its
    /// entry.
    pub fn record_apply(
        &mut self,
        manager: &str,
        owned: Set,
        operation: Operation,
        version: u64,
    ) -> Set {
        let released = self.paths_owned_by(manager).difference(&owned);
        if owned.is_empty() {
            self.managers.remove(manager);
            return released;
        }
        let written = match operation {
            Operation::Apply => Set::new(),
            Operation::Update => self.paths_written_by(manager).intersection(&owned),
        };
        let mut entry = ManagedFieldEntry::new(owned, operation, version);
        entry.written = written;
        self.managers.insert(manager.to_string(), entry);
        released
    }

    /// Marks the owned `paths` of `manager` as set through a plain create or
    /// update. Paths `manager` does not own are skipped.
    pub fn mark_written(&mut self, manager: &str, paths: &Set) {
        if let Some(entry) = self.managers.get_mut(manager) {
            entry.written = entry.written.union(&entry.fields.intersection(paths));
        }
    }

    /// Drops `paths` from the owned set of `manager`, keeping the rest of its
    /// entry as it was.
    pub fn release(&mut self, manager: &str, paths: &Set) {
        if let Some(entry) = self.managers.get_mut(manager) {
            entry.fields = entry.fields.difference(paths);
            entry.written = entry.written.difference(paths);
            if entry.fields.is_empty() {
                self.managers.remove(manager);
            }
        }
    }

    /// Returns the (manager, owned path) pairs, for managers other than
    /// `except`, whose owned path is `path`, an ancestor of it or a
    /// descendant of it.
    pub fn overlapping(&self, path: &Path, except: &str) -> Vec<(String, Path)> {
        let mut out = Vec::new();
        for (manager, entry) in &self.managers {
            if manager == except {
                continue;
            }
            let fields = &entry.fields;
            for ancestor in path.ancestors() {
                if fields.has(&ancestor) {
                    out.push((manager.clone(), ancestor));
                }
            }
            if fields.has(path) {
                out.push((manager.clone(), path.clone()));
            }
            for descendant in fields.descendants_of(path) {
                out.push((manager.clone(), descendant));
            }
        }
        out
    }

    /// Returns true if both hold the same owned sets, ignoring operations
    /// and versions.
    pub fn same_ownership(&self, other: &ManagedFields) -> bool {
        self.managers.len() == other.managers.len()
            && self.managers.iter().all(|(manager, entry)| {
                other
                    .managers
                    .get(manager)
                    .is_some_and(|o| o.fields == entry.fields)
            })
    }

    /// Returns true if no path, and no path overlapping it, is owned by more
    /// than one manager.
    pub fn is_exclusive(&self) -> bool {
        let mut seen = Set::new();
        for entry in self.managers.values() {
            let mut clash = false;
            entry.fields.iterate(|path| {
                if seen.covers(path) || seen.has_descendants_of(path) {
                    clash = true;
                }
            });
            if clash {
                return false;
            }
            seen = seen.union(&entry.fields);
        }
        true
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManagedFieldsRecord<'a> {
    manager: &'a str,
    #[serde(flatten)]
    entry: &'a ManagedFieldEntry,
}

impl Serialize for ManagedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.managers.len()))?;
        for (manager, entry) in &self.managers {
            seq.serialize_element(&ManagedFieldsRecord { manager, entry })?;
        }
        seq.end()
    }
}

impl fmt::Display for ManagedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (manager, entry) in &self.managers {
            writeln!(f, "{}:", manager)?;
            writeln!(f, "- Operation: {}", entry.operation)?;
            writeln!(f, "- AppliedAtVersion: {}", entry.applied_at_version)?;
            writeln!(f, "- Set: {}", entry.fields.to_json_value())?;
        }
        Ok(())
    }
}
