//! Resource store.
//!
//! Every identity maps to its own slot guarded by a mutex, so operations on
//! one identity are serialized while distinct identities never wait on each
//! other. The outer map is only write-locked to add or drop a slot.

use crate::error::EngineError;
use crate::fieldpath::ManagedFields;
use crate::value::{Map, ValidationError, ValidationErrors};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// ResourceIdentity uniquely identifies a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ResourceIdentity {
    /// Creates a new ResourceIdentity.
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        ResourceIdentity {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks that kind and name are set. The namespace may be empty.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        if self.kind.is_empty() {
            errs.add(ValidationError::missing_value("kind"));
        }
        if self.name.is_empty() {
            errs.add(ValidationError::missing_value("name"));
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.kind, self.name)
        } else {
            write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
        }
    }
}

/// Resource is a stored value together with its ownership map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(flatten)]
    pub identity: ResourceIdentity,
    /// Incremented on every commit. Starts at 1.
    pub version: u64,
    pub managed_fields: ManagedFields,
    pub value: Map,
}

impl Resource {
    /// Creates a new Resource.
    pub fn new(identity: ResourceIdentity, value: Map, managed_fields: ManagedFields, version: u64) -> Self {
        Resource {
            identity,
            version,
            managed_fields,
            value,
        }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn value(&self) -> &Map {
        &self.value
    }

    pub fn managed_fields(&self) -> &ManagedFields {
        &self.managed_fields
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

type Slot = Arc<Mutex<Option<Resource>>>;

/// ResourceStore holds the current state of every resource.
#[derive(Debug, Default)]
pub struct ResourceStore {
    slots: RwLock<HashMap<ResourceIdentity, Slot>>,
}

impl ResourceStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        ResourceStore::default()
    }

    fn existing(&self, identity: &ResourceIdentity) -> Option<Slot> {
        self.slots.read().get(identity).cloned()
    }

    fn slot(&self, identity: &ResourceIdentity) -> Slot {
        if let Some(slot) = self.existing(identity) {
            return slot;
        }
        self.slots
            .write()
            .entry(identity.clone())
            .or_default()
            .clone()
    }

    /// Runs `f` with exclusive access to the slot of `identity`.
    ///
    /// The value and the ownership map of a resource only ever change inside
    /// this critical section, and `f` sees either a fully committed resource
    /// or none at all.
    pub fn transact<R, F>(&self, identity: &ResourceIdentity, f: F) -> R
    where
        F: FnOnce(&mut Option<Resource>) -> R,
    {
        let slot = self.slot(identity);
        let (result, vacant) = {
            let mut guard = slot.lock();
            let result = f(&mut *guard);
            (result, guard.is_none())
        };
        if vacant {
            self.compact(identity, &slot);
        }
        result
    }

    /// Drops the slot of `identity` if it is vacant and nobody else holds it.
    fn compact(&self, identity: &ResourceIdentity, slot: &Slot) {
        let mut slots = self.slots.write();
        let removable = match slots.get(identity) {
            // One reference in the map, one held by the caller.
            Some(current) if Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2 => {
                slot.try_lock().is_some_and(|guard| guard.is_none())
            }
            _ => false,
        };
        if removable {
            slots.remove(identity);
            debug!(%identity, "dropped vacant slot");
        }
    }

    /// Returns a snapshot of the resource.
    pub fn get(&self, identity: &ResourceIdentity) -> Result<Resource, EngineError> {
        let slot = self
            .existing(identity)
            .ok_or_else(|| EngineError::NotFound(identity.clone()))?;
        let resource = slot.lock().clone();
        resource.ok_or_else(|| EngineError::NotFound(identity.clone()))
    }

    /// Stores `resource`, replacing whatever was there.
    pub fn put(&self, resource: Resource) {
        let identity = resource.identity.clone();
        self.transact(&identity, |slot| *slot = Some(resource));
    }

    /// Removes the resource and its ownership map.
    pub fn delete(&self, identity: &ResourceIdentity) -> Result<Resource, EngineError> {
        self.transact(identity, Option::take)
            .ok_or_else(|| EngineError::NotFound(identity.clone()))
    }

    /// Returns every present resource of `kind` in `namespace`, sorted by name.
    pub fn list(&self, kind: &str, namespace: &str) -> Vec<Resource> {
        let slots: Vec<Slot> = self
            .slots
            .read()
            .iter()
            .filter(|(id, _)| id.kind == kind && id.namespace == namespace)
            .map(|(_, slot)| slot.clone())
            .collect();
        let mut resources: Vec<Resource> = slots
            .iter()
            .filter_map(|slot| slot.lock().clone())
            .collect();
        resources.sort_by(|a, b| a.identity.name.cmp(&b.identity.name));
        resources
    }

    /// Returns the number of present resources.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.read().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::document_from_yaml;
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ResourceIdentity {
        ResourceIdentity::new("ConfigMap", "default", name)
    }

    fn resource(name: &str, yaml: &str) -> Resource {
        Resource::new(id(name), document_from_yaml(yaml).unwrap(), ManagedFields::new(), 1)
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(id("cm").to_string(), "ConfigMap default/cm");
        assert_eq!(ResourceIdentity::new("Namespace", "", "demo").to_string(), "Namespace demo");
    }

    #[test]
    fn test_identity_validate() {
        assert!(id("cm").validate().is_ok());
        let errs = ResourceIdentity::new("", "default", "").validate().unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs.to_string(), "kind: must not be empty\nname: must not be empty");
    }

    #[test]
    fn test_put_get_delete() {
        let store = ResourceStore::new();
        assert!(store.get(&id("cm")).unwrap_err().is_not_found());

        store.put(resource("cm", "key: value\n"));
        assert_eq!(store.get(&id("cm")).unwrap(), resource("cm", "key: value\n"));
        assert_eq!(store.len(), 1);

        let removed = store.delete(&id("cm")).unwrap();
        assert_eq!(removed.identity, id("cm"));
        assert!(store.get(&id("cm")).unwrap_err().is_not_found());
        assert!(store.delete(&id("cm")).unwrap_err().is_not_found());
        assert!(store.is_empty());
    }

    #[test]
    fn test_vacant_slots_are_dropped() {
        let store = ResourceStore::new();
        store.transact(&id("cm"), |slot| slot.is_some());
        assert!(store.slots.read().is_empty());

        store.put(resource("cm", "a: 1\n"));
        store.delete(&id("cm")).unwrap();
        assert!(store.slots.read().is_empty());
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let store = ResourceStore::new();
        store.put(resource("b", "x: 1\n"));
        store.put(resource("a", "x: 2\n"));
        store.put(Resource::new(
            ResourceIdentity::new("ConfigMap", "other", "c"),
            Map::new(),
            ManagedFields::new(),
            1,
        ));
        store.put(Resource::new(
            ResourceIdentity::new("Secret", "default", "d"),
            Map::new(),
            ManagedFields::new(),
            1,
        ));

        let names: Vec<String> = store
            .list("ConfigMap", "default")
            .into_iter()
            .map(|r| r.identity.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_resource_serialize() {
        let json = serde_json::to_string(&resource("cm", "key: value\n")).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"ConfigMap","namespace":"default","name":"cm","version":1,"managedFields":[],"value":{"key":"value"}}"#
        );
    }
}
