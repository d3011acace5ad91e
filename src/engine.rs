//! Apply orchestrator.
//!
//! [`Engine`] is the public entry point. Each operation validates its input,
//! then runs lookup, merge and commit inside the store's per-identity
//! critical section, so a caller sees either the whole write or none of it.

use crate::error::EngineError;
use crate::fieldpath::{ManagedFields, Set};
use crate::merge::{MergeOutcome, Updater, UpdaterBuilder};
use crate::store::{Resource, ResourceIdentity, ResourceStore};
use crate::value::{Map, ValidationError, ValidationErrors};
use tracing::{debug, info, warn};

/// EngineBuilder is a builder for creating an Engine.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    updater: UpdaterBuilder,
    skip_noop_commits: bool,
}

impl EngineBuilder {
    /// Creates a new EngineBuilder.
    pub fn new() -> Self {
        EngineBuilder::default()
    }

    /// Sets whether writes that change nothing are committed.
    ///
    /// When set, such a write returns the current resource and its version
    /// does not move.
    pub fn skip_noop_commits(mut self, skip: bool) -> Self {
        self.skip_noop_commits = skip;
        self
    }

    /// Adds fields of `kind` that are never owned.
    pub fn ignored_fields(mut self, kind: impl Into<String>, fields: Set) -> Self {
        self.updater = self.updater.ignored_fields(kind, fields);
        self
    }

    /// Builds the Engine.
    pub fn build(self) -> Engine {
        Engine {
            store: ResourceStore::new(),
            updater: self.updater.build(),
            skip_noop_commits: self.skip_noop_commits,
        }
    }
}

/// Engine stores resources and reconciles writes from many managers.
#[derive(Debug, Default)]
pub struct Engine {
    store: ResourceStore,
    updater: Updater,
    skip_noop_commits: bool,
}

impl Engine {
    /// Creates an Engine with default options.
    pub fn new() -> Self {
        Engine::default()
    }

    /// Creates a new EngineBuilder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Apply merges the partial `document` into the resource on behalf of
    /// `manager`, creating the resource if it does not exist.
    ///
    /// The leaves of `document` are exactly what `manager` owns afterwards.
    /// If another manager owns any of them with a different value the call
    /// fails with every conflict and changes nothing, unless `force` is set,
    /// in which case ownership of those fields moves to `manager`.
    pub fn apply(
        &self,
        identity: &ResourceIdentity,
        document: &Map,
        manager: &str,
        force: bool,
    ) -> Result<Resource, EngineError> {
        debug!(%identity, manager, force, "apply");
        validate_request(identity, manager, document)?;

        self.store.transact(identity, |slot| {
            let empty_value = Map::new();
            let empty_managers = ManagedFields::new();
            let (live, managers, version) = match slot.as_ref() {
                Some(current) => (&current.value, &current.managed_fields, current.version),
                None => (&empty_value, &empty_managers, 0),
            };

            let outcome = self
                .updater
                .apply(&identity.kind, live, managers, document, manager, force, version + 1)
                .map_err(|conflicts| {
                    warn!(%identity, manager, conflicts = conflicts.len(), "apply rejected");
                    EngineError::Conflict(conflicts)
                })?;
            if !outcome.overridden.is_empty() {
                warn!(
                    %identity,
                    manager,
                    managers = ?outcome.overridden.managers(),
                    "force apply took over {} field(s)",
                    outcome.overridden.len()
                );
            }

            Ok(self.commit(slot, identity, outcome))
        })
    }

    /// Create stores `document` verbatim as a new resource wholly owned by
    /// `manager`. Fails if the resource already exists.
    pub fn create(
        &self,
        identity: &ResourceIdentity,
        document: &Map,
        manager: &str,
    ) -> Result<Resource, EngineError> {
        debug!(%identity, manager, "create");
        validate_request(identity, manager, document)?;

        self.store.transact(identity, |slot| {
            if slot.is_some() {
                return Err(EngineError::AlreadyExists(identity.clone()));
            }
            let outcome = self.updater.create(&identity.kind, document, manager, 1);
            Ok(self.commit(slot, identity, outcome))
        })
    }

    /// Update replaces the whole value of an existing resource with
    /// `document` on behalf of `manager`. It never conflicts.
    pub fn update(
        &self,
        identity: &ResourceIdentity,
        document: &Map,
        manager: &str,
    ) -> Result<Resource, EngineError> {
        debug!(%identity, manager, "update");
        validate_request(identity, manager, document)?;

        self.store.transact(identity, |slot| {
            let current = slot
                .as_ref()
                .ok_or_else(|| EngineError::NotFound(identity.clone()))?;
            let outcome = self.updater.update(
                &identity.kind,
                &current.value,
                &current.managed_fields,
                document,
                manager,
                current.version + 1,
            );
            if !outcome.overridden.is_empty() {
                debug!(%identity, manager, "update took over {} field(s)", outcome.overridden.len());
            }
            Ok(self.commit(slot, identity, outcome))
        })
    }

    /// Returns the current resource.
    pub fn get(&self, identity: &ResourceIdentity) -> Result<Resource, EngineError> {
        debug!(%identity, "get");
        self.store.get(identity)
    }

    /// Removes the resource together with its ownership map.
    ///
    /// The removal is visible to every later call on the same identity.
    pub fn delete(&self, identity: &ResourceIdentity) -> Result<(), EngineError> {
        debug!(%identity, "delete");
        let removed = self.store.delete(identity)?;
        info!(%identity, version = removed.version, "deleted");
        Ok(())
    }

    /// Returns every resource of `kind` in `namespace`, sorted by name.
    pub fn list(&self, kind: &str, namespace: &str) -> Vec<Resource> {
        self.store.list(kind, namespace)
    }

    fn commit(
        &self,
        slot: &mut Option<Resource>,
        identity: &ResourceIdentity,
        outcome: MergeOutcome,
    ) -> Resource {
        if let Some(current) = slot.as_ref() {
            if self.skip_noop_commits && outcome.is_noop(&current.value, &current.managed_fields) {
                debug!(%identity, version = current.version, "nothing changed, commit skipped");
                return current.clone();
            }
        }
        debug_assert!(
            outcome.managers.is_exclusive(),
            "overlapping ownership in {identity}:\n{}",
            outcome.managers
        );

        let version = slot.as_ref().map_or(0, |current| current.version) + 1;
        let resource = Resource::new(identity.clone(), outcome.value, outcome.managers, version);
        info!(%identity, version, managers = resource.managed_fields.len(), "committed");
        *slot = Some(resource.clone());
        resource
    }
}

/// Rejects malformed requests before the store is touched.
fn validate_request(
    identity: &ResourceIdentity,
    manager: &str,
    document: &Map,
) -> Result<(), EngineError> {
    let mut errs = ValidationErrors::new();
    if let Err(e) = identity.validate() {
        errs.extend(e);
    }
    if manager.is_empty() {
        errs.add(ValidationError::missing_value("manager"));
    }
    if let Err(e) = document.validate() {
        errs.extend(e);
    }
    if errs.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Invalid(errs))
    }
}
