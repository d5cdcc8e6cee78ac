//! Opaque entity handles.
//!
//! A handle is the engine's only way of referring to an application entity.
//! Two handles are the same iff they denote the same in-memory object —
//! implemented here as pointer identity over a shared, lockable cell rather
//! than by comparing field values, which is what lets a `NEW` entity (with
//! no primary key yet) be tracked at all.

use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uow_core::Entity;

/// A stable, cloneable reference to a tracked entity.
#[derive(Clone)]
pub struct EntityHandle(Arc<RwLock<Box<dyn Entity>>>);

impl EntityHandle {
    /// Wrap an application entity for tracking.
    pub fn new(entity: impl Entity) -> Self {
        Self(Arc::new(RwLock::new(Box::new(entity))))
    }

    /// The class name of the wrapped entity.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        self.0.read().expect("entity lock poisoned").class_name()
    }

    /// Borrow the entity for reading.
    #[must_use]
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Entity>> {
        self.0.read().expect("entity lock poisoned")
    }

    /// Borrow the entity for writing (used by `refresh`/`merge` to apply
    /// reloaded field values).
    #[must_use]
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Entity>> {
        self.0.write().expect("entity lock poisoned")
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EntityHandle {}

impl Hash for EntityHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl std::fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHandle")
            .field("class", &self.class_name())
            .field("ptr", &Arc::as_ptr(&self.0))
            .finish()
    }
}
