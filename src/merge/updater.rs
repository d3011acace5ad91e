//! Updater for merge operations.

use super::{Comparison, Conflict, Conflicts};
use crate::fieldpath::{ManagedFields, Operation, Path, Set};
use crate::value::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// MergeOutcome is the state a successful merge would commit.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged value.
    pub value: Map,
    /// The ownership map after the merge.
    pub managers: ManagedFields,
    /// Conflicts that were overridden by force, or fields taken over by a
    /// plain update.
    pub overridden: Conflicts,
    /// Paths the writing manager stopped owning.
    pub released: Set,
}

impl MergeOutcome {
    /// Returns true if committing would change neither the value nor any
    /// owned set.
    pub fn is_noop(&self, live: &Map, managers: &ManagedFields) -> bool {
        self.value == *live && self.managers.same_ownership(managers)
    }
}

/// UpdaterBuilder is a builder for creating an Updater.
#[derive(Debug, Default)]
pub struct UpdaterBuilder {
    ignored_fields: HashMap<String, Set>,
}

impl UpdaterBuilder {
    /// Creates a new UpdaterBuilder.
    pub fn new() -> Self {
        UpdaterBuilder::default()
    }

    /// Adds ignored fields for a resource kind.
    ///
    /// Ignored fields, and everything beneath them, are written to the value
    /// but never owned, never conflict and are never released.
    pub fn ignored_fields(mut self, kind: impl Into<String>, fields: Set) -> Self {
        self.ignored_fields
            .entry(kind.into())
            .and_modify(|existing| *existing = existing.union(&fields))
            .or_insert(fields);
        self
    }

    /// Builds the Updater.
    pub fn build(self) -> Updater {
        Updater {
            ignored_fields: self.ignored_fields,
        }
    }
}

/// Updater computes merged values and ownership transfers.
///
/// It never touches storage: callers pass the live state in and commit the
/// returned [`MergeOutcome`] themselves.
#[derive(Debug, Default)]
pub struct Updater {
    ignored_fields: HashMap<String, Set>,
}

impl Updater {
    /// Creates a new UpdaterBuilder.
    pub fn builder() -> UpdaterBuilder {
        UpdaterBuilder::new()
    }

    fn is_ignored(&self, kind: &str, path: &Path) -> bool {
        self.ignored_fields
            .get(kind)
            .is_some_and(|ignored| ignored.covers(path))
    }

    /// Drops ignored paths from `set`.
    fn tracked(&self, kind: &str, set: Set) -> Set {
        if !self.ignored_fields.contains_key(kind) {
            return set;
        }
        set.paths()
            .into_iter()
            .filter(|path| !self.is_ignored(kind, path))
            .collect()
    }

    /// Apply merges `config` into `live` on behalf of `manager`.
    ///
    /// The leaves of `config` become exactly the set `manager` owns
    /// afterwards, minus fields another manager already holds with the same
    /// value. Leaves `manager` owned before but omits now are released and,
    /// when nobody else owns them, removed from the value. Leaves `manager`
    /// last set through [`create`](Self::create) or [`update`](Self::update)
    /// are released but keep their values.
    ///
    /// Ignored leaves below a field somebody owns are not written.
    ///
    /// Conflicts are collected on the pre-merge state. Without `force` any
    /// conflict fails the whole merge.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        kind: &str,
        live: &Map,
        managers: &ManagedFields,
        config: &Map,
        manager: &str,
        force: bool,
        version: u64,
    ) -> Result<MergeOutcome, Conflicts> {
        let (ignored, tracked): (Vec<_>, Vec<_>) = config
            .leaves()
            .into_iter()
            .partition(|(path, _)| self.is_ignored(kind, path));

        let mut conflicts = Conflicts::new();
        let mut shared = Set::new();
        for (path, value) in &tracked {
            for (owner, owned) in managers.overlapping(path, manager) {
                let current = live.get_path(&owned);
                if owned == *path && current == Some(value) {
                    shared.insert(path);
                    continue;
                }
                conflicts.add(Conflict::new(owner, owned, current.cloned()));
            }
        }

        if !force && !conflicts.is_empty() {
            return Err(conflicts);
        }

        let mut next = managers.clone();
        for owner in conflicts.managers() {
            next.release(owner, &conflicts.paths_of(owner));
        }

        let mut value = live.clone();
        let mut owned = Set::new();
        for (path, leaf) in tracked {
            if shared.has(&path) {
                continue;
            }
            value.set_path(&path, leaf);
            owned.insert(&path);
        }

        let written = managers.paths_written_by(manager);
        let released = next.record_apply(manager, owned, Operation::Apply, version);

        for (path, leaf) in ignored {
            if let Some(ancestor) = path.ancestors().find(|a| next.owner_of(a).is_some()) {
                debug!(%path, %ancestor, "skipping ignored field below an owned field");
                continue;
            }
            value.set_path(&path, leaf);
        }
        prune_released(&mut value, &next, &released.difference(written));

        Ok(MergeOutcome {
            value,
            managers: next,
            overridden: conflicts,
            released,
        })
    }

    /// Update replaces `live` with `new` on behalf of `manager`.
    ///
    /// This never conflicts: fields `manager` changes are taken from their
    /// previous owners, removed fields are dropped from every owner, and
    /// unchanged fields keep whoever owned them.
    pub fn update(
        &self,
        kind: &str,
        live: &Map,
        managers: &ManagedFields,
        new: &Map,
        manager: &str,
        version: u64,
    ) -> MergeOutcome {
        let compare = Comparison::between(live, new);
        let changed = self.tracked(kind, compare.changed());

        let mut overridden = Conflicts::new();
        let mut next = managers.clone();
        let others: Vec<String> = managers
            .managers()
            .filter(|m| m.as_str() != manager)
            .cloned()
            .collect();
        for other in &others {
            let taken = managers.paths_owned_by(other).intersection(&changed);
            taken.iterate(|path| {
                overridden.add(Conflict::new(other.as_str(), path.clone(), live.get_path(path).cloned()));
            });
            next.release(other, &compare.removed.union(&taken));
        }

        let owned = managers
            .paths_owned_by(manager)
            .difference(&compare.removed)
            .union(&changed);
        let released = next.record_apply(manager, owned, Operation::Update, version);
        next.mark_written(manager, &changed);

        MergeOutcome {
            value: new.clone(),
            managers: next,
            overridden,
            released,
        }
    }

    /// Create records `document` as a new value wholly owned by `manager`.
    pub fn create(&self, kind: &str, document: &Map, manager: &str, version: u64) -> MergeOutcome {
        let owned = self.tracked(kind, document.to_field_set());
        let mut managers = ManagedFields::new();
        managers.record_apply(manager, owned.clone(), Operation::Update, version);
        managers.mark_written(manager, &owned);

        MergeOutcome {
            value: document.clone(),
            managers,
            overridden: Conflicts::new(),
            released: Set::new(),
        }
    }
}

/// Removes released leaves nobody owns any more.
///
/// A released path that became a mapping through the same merge is kept.
fn prune_released(value: &mut Map, managers: &ManagedFields, released: &Set) {
    released.iterate(|path| {
        let orphaned = managers.owner_of(path).is_none();
        let is_leaf = matches!(value.get_path(path), Some(Value::Scalar(_)));
        if orphaned && is_leaf {
            value.remove_path(path);
        }
    });
}
