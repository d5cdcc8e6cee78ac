//! The per-session identity map (§4.1).
//!
//! Two indices are kept in lock-step: by `(class, key)` for assigned
//! entities, and by handle identity for every tracked record regardless of
//! whether a key has been assigned yet.

use std::collections::HashMap;

use uow_core::{EntityKey, Error, Result};

use crate::handle::EntityHandle;
use crate::state::{LifecycleState, TransitionLog};

/// The per-entity metadata the session owns for the entity's managed
/// lifetime (§3 `EntityRecord`).
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub handle: EntityHandle,
    pub class: &'static str,
    pub state: LifecycleState,
    pub snapshot: Option<HashMap<String, uow_core::Value>>,
    pub transitions: TransitionLog,
}

/// Registry guaranteeing at most one in-memory object per `(class, pk)`.
#[derive(Debug, Default)]
pub struct IdentityMap {
    by_key: HashMap<EntityKey, EntityHandle>,
    by_handle: HashMap<EntityHandle, EntityRecord>,
}

impl IdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            by_handle: HashMap::new(),
        }
    }

    /// Register a new record. If `key` is `Some`, a duplicate `(class, key)`
    /// is rejected with `DuplicateIdentity`.
    pub fn add(
        &mut self,
        handle: EntityHandle,
        key: Option<EntityKey>,
        state: LifecycleState,
        log_capacity: usize,
    ) -> Result<()> {
        if let Some(ref key) = key {
            if self.by_key.contains_key(key) {
                return Err(Error::duplicate_identity(key));
            }
        }
        let class = handle.class_name();
        let record = EntityRecord {
            handle: handle.clone(),
            class,
            state,
            snapshot: None,
            transitions: TransitionLog::new(log_capacity),
        };
        if let Some(key) = key {
            self.by_key.insert(key, handle.clone());
        }
        self.by_handle.insert(handle, record);
        Ok(())
    }

    /// Move a handle-only record into the keyed index after an insert
    /// assigns it a primary key.
    pub fn promote(&mut self, handle: &EntityHandle, key: EntityKey) -> Result<()> {
        if self.by_key.contains_key(&key) {
            return Err(Error::duplicate_identity(&key));
        }
        self.by_key.insert(key, handle.clone());
        Ok(())
    }

    /// Reverse a `promote`, used when a flush is rolled back.
    pub fn demote(&mut self, key: &EntityKey) {
        self.by_key.remove(key);
    }

    #[must_use]
    pub fn lookup(&self, key: &EntityKey) -> Option<EntityHandle> {
        self.by_key.get(key).cloned()
    }

    #[must_use]
    pub fn metadata(&self, handle: &EntityHandle) -> Option<&EntityRecord> {
        self.by_handle.get(handle)
    }

    pub fn metadata_mut(&mut self, handle: &EntityHandle) -> Option<&mut EntityRecord> {
        self.by_handle.get_mut(handle)
    }

    /// Remove a record from both indices; the handle is DETACHED from this
    /// session's perspective afterward.
    pub fn remove(&mut self, handle: &EntityHandle) {
        if let Some(record) = self.by_handle.remove(handle) {
            if let Some(pk) = record.handle.read().primary_key() {
                let key = EntityKey::new(record.class, pk);
                self.by_key.remove(&key);
            }
        }
    }

    pub fn all_of_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a EntityHandle> + 'a {
        self.by_handle
            .values()
            .filter(move |record| record.class == class)
            .map(|record| &record.handle)
    }

    #[must_use]
    pub fn all_handles(&self) -> impl Iterator<Item = &EntityHandle> {
        self.by_handle.keys()
    }

    #[must_use]
    pub fn contains(&self, handle: &EntityHandle) -> bool {
        self.by_handle.contains_key(handle)
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
        self.by_handle.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use uow_core::{Entity, Value};

    #[derive(Debug, Clone)]
    struct Dummy {
        id: Option<i64>,
    }

    impl Entity for Dummy {
        fn class_name(&self) -> &'static str {
            "Dummy"
        }
        fn primary_key(&self) -> Option<Vec<Value>> {
            self.id.map(|id| vec![Value::BigInt(id)])
        }
        fn current_fields(&self) -> Map<String, Value> {
            Map::new()
        }
        fn apply_fields(&mut self, _values: &Map<String, Value>) {}
    }

    #[test]
    fn add_then_lookup_by_key() {
        let mut map = IdentityMap::new();
        let handle = EntityHandle::new(Dummy { id: Some(1) });
        let key = EntityKey::new("Dummy", vec![Value::BigInt(1)]);
        map.add(handle.clone(), Some(key.clone()), LifecycleState::Managed, 8)
            .unwrap();
        assert_eq!(map.lookup(&key), Some(handle));
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut map = IdentityMap::new();
        let key = EntityKey::new("Dummy", vec![Value::BigInt(1)]);
        map.add(
            EntityHandle::new(Dummy { id: Some(1) }),
            Some(key.clone()),
            LifecycleState::Managed,
            8,
        )
        .unwrap();
        let err = map
            .add(
                EntityHandle::new(Dummy { id: Some(1) }),
                Some(key),
                LifecycleState::Managed,
                8,
            )
            .unwrap_err();
        assert!(matches!(err, uow_core::Error::DuplicateIdentity { .. }));
    }

    #[test]
    fn new_entity_without_key_is_tracked_by_handle_only() {
        let mut map = IdentityMap::new();
        let handle = EntityHandle::new(Dummy { id: None });
        map.add(handle.clone(), None, LifecycleState::New, 8).unwrap();
        assert!(map.contains(&handle));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_drops_from_both_indices() {
        let mut map = IdentityMap::new();
        let handle = EntityHandle::new(Dummy { id: Some(2) });
        let key = EntityKey::new("Dummy", vec![Value::BigInt(2)]);
        map.add(handle.clone(), Some(key.clone()), LifecycleState::Managed, 8)
            .unwrap();
        map.remove(&handle);
        assert_eq!(map.lookup(&key), None);
        assert!(!map.contains(&handle));
    }

    #[test]
    fn promote_moves_into_keyed_index() {
        let mut map = IdentityMap::new();
        let handle = EntityHandle::new(Dummy { id: None });
        map.add(handle.clone(), None, LifecycleState::New, 8).unwrap();
        let key = EntityKey::new("Dummy", vec![Value::BigInt(9)]);
        map.promote(&handle, key.clone()).unwrap();
        assert_eq!(map.lookup(&key), Some(handle));
    }
}
