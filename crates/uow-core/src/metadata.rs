//! The `MetadataRegistry` boundary — schema knowledge the engine consumes
//! but never produces.
//!
//! Column layout, relation shape, and cascade configuration all live outside
//! the unit-of-work core; the engine only ever calls `describe` to find out
//! how a class maps to a table.

/// Relationship shape between two classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// What should happen to related entities when this one is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadeAction {
    #[default]
    None,
    Persist,
    Remove,
    Refresh,
    All,
}

/// Metadata describing one relation field on a class.
#[derive(Debug, Clone)]
pub struct RelationInfo {
    pub kind: RelationKind,
    pub target_class: &'static str,
    pub foreign_key: &'static str,
    pub inverse_field: Option<&'static str>,
    pub cascade: &'static [CascadeAction],
}

/// Metadata describing one column-backed field on a class.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub column: &'static str,
    pub nullable: bool,
    pub default: Option<&'static str>,
    pub unique: bool,
    pub is_generated: bool,
}

/// Full schema description of a class, as returned by a `MetadataRegistry`.
#[derive(Debug, Clone)]
pub struct ClassMetadata {
    pub table: &'static str,
    pub primary_key_field: &'static str,
    pub field_map: Vec<(&'static str, ColumnInfo)>,
    pub relations: Vec<(&'static str, RelationInfo)>,
}

impl ClassMetadata {
    #[must_use]
    pub fn column_for(&self, field: &str) -> Option<&ColumnInfo> {
        self.field_map
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, info)| info)
    }

    #[must_use]
    pub fn relation(&self, field: &str) -> Option<&RelationInfo> {
        self.relations
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, info)| info)
    }
}

/// Read-only schema lookup consumed by the engine.
///
/// A `MetadataRegistry` implementation is expected to be pure from the
/// session's perspective — `describe` must not perform I/O and must return
/// the same `ClassMetadata` for a given class for the lifetime of the
/// registry.
pub trait MetadataRegistry: Send + Sync {
    /// Describe a class by name. Panics or returns a registry-specific
    /// error outside the engine's control if `class` is unknown; the engine
    /// only calls this for classes it has already seen on an `Entity`.
    fn describe(&self, class: &str) -> Option<ClassMetadata>;
}
