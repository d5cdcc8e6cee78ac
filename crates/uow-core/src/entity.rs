//! The `Entity` contract and the identity tuple derived from it.

use std::collections::HashMap;
use std::fmt;

use crate::value::{Value, hash_values};

/// An application-defined value the engine can track.
///
/// The engine never reflects over an application type directly — it only
/// ever asks an `Entity` for its class name, its primary key (if any), and
/// its current field values, and only ever writes field values back through
/// `apply_fields`. Anything richer (column types, relation graphs, cascade
/// sets) is supplied by a [`crate::MetadataRegistry`] describing the class,
/// not by this trait.
pub trait Entity: fmt::Debug + Send + Sync + 'static {
    /// The class name used in `EntityKey` and passed to `MetadataRegistry::describe`.
    ///
    /// Stable for the lifetime of the type; two entities of the same Rust
    /// type must always return the same class name.
    fn class_name(&self) -> &'static str;

    /// The primary key value, or `None` if it has not been assigned yet
    /// (the entity is `NEW` and has no identity-map key).
    fn primary_key(&self) -> Option<Vec<Value>>;

    /// Current field values in normalized persistent form.
    ///
    /// Relation fields must be represented by their foreign-key value, never
    /// by the related entity.
    fn current_fields(&self) -> HashMap<String, Value>;

    /// Overwrite field values in place, e.g. from a loaded row or a merge
    /// source. Implementations should ignore fields they do not recognize.
    fn apply_fields(&mut self, values: &HashMap<String, Value>);
}

/// The tuple `(class-name, primary-key-value)`, unique within a session.
#[derive(Debug, Clone)]
pub struct EntityKey {
    class: &'static str,
    pk: Vec<Value>,
}

impl EntityKey {
    /// Build a key from a class name and an assigned primary key.
    #[must_use]
    pub fn new(class: &'static str, pk: Vec<Value>) -> Self {
        Self { class, pk }
    }

    /// Build a key from an entity, iff its primary key is assigned.
    #[must_use]
    pub fn from_entity(entity: &dyn Entity) -> Option<Self> {
        entity
            .primary_key()
            .map(|pk| Self::new(entity.class_name(), pk))
    }

    #[must_use]
    pub fn class(&self) -> &'static str {
        self.class
    }

    #[must_use]
    pub fn primary_key(&self) -> &[Value] {
        &self.pk
    }
}

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.pk == other.pk
    }
}

impl Eq for EntityKey {}

impl std::hash::Hash for EntityKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        hash_values(&self.pk).hash(state);
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.class, self.pk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_same_class_and_pk_are_equal() {
        let a = EntityKey::new("User", vec![Value::BigInt(1)]);
        let b = EntityKey::new("User", vec![Value::BigInt(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn keys_differ_by_class() {
        let a = EntityKey::new("User", vec![Value::BigInt(1)]);
        let b = EntityKey::new("Order", vec![Value::BigInt(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn keys_differ_by_pk() {
        let a = EntityKey::new("User", vec![Value::BigInt(1)]);
        let b = EntityKey::new("User", vec![Value::BigInt(2)]);
        assert_ne!(a, b);
    }
}
