//! Dirty detection against a captured baseline snapshot (§4.3).

use std::collections::HashMap;

use uow_core::{Entity, Value};

use crate::config::SnapshotStrategy;

/// An immutable field-name to value mapping captured when an entity became
/// MANAGED.
pub type Snapshot = HashMap<String, Value>;

/// `{field: (old, new)}` for every field whose comparison against the
/// snapshot failed. Empty means the entity is not dirty.
pub type ChangeSet = HashMap<String, (Value, Value)>;

/// Capture a snapshot from an entity's current field values.
#[must_use]
pub fn capture(entity: &dyn Entity) -> Snapshot {
    entity.current_fields()
}

/// Resolve a dirty check against the session's `SnapshotStrategy` (§6).
///
/// A managed record with no snapshot yet only ever arises under
/// `SnapshotStrategy::Deferred`, which defers the baseline capture from the
/// managed-transition point to the entity's first dirty check: this call
/// treats `current` as that baseline, reports no changes (there is nothing
/// to compare against), and hands the baseline back to the caller to store.
/// Once a baseline exists — under either strategy — this is just `diff`.
#[must_use]
pub fn resolve(
    snapshot: Option<&Snapshot>,
    current: &Snapshot,
    strategy: SnapshotStrategy,
) -> (ChangeSet, Option<Snapshot>) {
    match snapshot {
        Some(baseline) => (diff(baseline, current), None),
        None => match strategy {
            SnapshotStrategy::Eager => (ChangeSet::new(), None),
            SnapshotStrategy::Deferred => (ChangeSet::new(), Some(current.clone())),
        },
    }
}

/// Compare `current` against `snapshot` field by field, per the comparison
/// rules in §4.3: scalars and relation foreign keys by normalized equality,
/// JSON by structural equality (both already fold out of `Value::eq`), and
/// `Null` never equal to any non-null value.
#[must_use]
pub fn diff(snapshot: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::new();
    for (field, new_value) in current {
        let old_value = snapshot.get(field).cloned().unwrap_or(Value::Null);
        if &old_value != new_value {
            changes.insert(field.clone(), (old_value, new_value.clone()));
        }
    }
    for (field, old_value) in snapshot {
        if !current.contains_key(field) {
            changes.insert(field.clone(), (old_value.clone(), Value::Null));
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_snapshots_have_no_changes() {
        let mut snap = Snapshot::new();
        snap.insert("name".into(), Value::Text("John".into()));
        let changes = diff(&snap, &snap.clone());
        assert!(changes.is_empty());
    }

    #[test]
    fn changed_field_is_reported() {
        let mut snap = Snapshot::new();
        snap.insert("name".into(), Value::Text("John".into()));
        let mut current = snap.clone();
        current.insert("name".into(), Value::Text("Jane".into()));
        let changes = diff(&snap, &current);
        assert_eq!(
            changes.get("name"),
            Some(&(Value::Text("John".into()), Value::Text("Jane".into())))
        );
    }

    #[test]
    fn null_is_not_equal_to_non_null() {
        let mut snap = Snapshot::new();
        snap.insert("middle_name".into(), Value::Null);
        let mut current = Snapshot::new();
        current.insert("middle_name".into(), Value::Text("Q".into()));
        let changes = diff(&snap, &current);
        assert!(changes.contains_key("middle_name"));
    }

    #[test]
    fn structural_json_equality_is_not_dirty() {
        let mut snap = Snapshot::new();
        snap.insert(
            "meta".into(),
            Value::Json(serde_json::json!({"a": 1, "b": [1, 2]})),
        );
        let mut current = Snapshot::new();
        current.insert(
            "meta".into(),
            Value::Json(serde_json::json!({"b": [1, 2], "a": 1})),
        );
        assert!(diff(&snap, &current).is_empty());
    }

    #[test]
    fn relation_field_dirty_iff_foreign_key_changes() {
        let mut snap = Snapshot::new();
        snap.insert("customer_id".into(), Value::BigInt(1));
        let mut current = snap.clone();
        current.insert("customer_id".into(), Value::BigInt(2));
        let changes = diff(&snap, &current);
        assert_eq!(
            changes.get("customer_id"),
            Some(&(Value::BigInt(1), Value::BigInt(2)))
        );
    }

    #[test]
    fn deferred_first_check_captures_current_as_baseline_and_reports_clean() {
        let mut current = Snapshot::new();
        current.insert("name".into(), Value::Text("John".into()));
        let (changes, baseline) = resolve(None, &current, SnapshotStrategy::Deferred);
        assert!(changes.is_empty());
        assert_eq!(baseline, Some(current));
    }

    #[test]
    fn eager_missing_snapshot_reports_clean_with_no_baseline_to_store() {
        let mut current = Snapshot::new();
        current.insert("name".into(), Value::Text("John".into()));
        let (changes, baseline) = resolve(None, &current, SnapshotStrategy::Eager);
        assert!(changes.is_empty());
        assert_eq!(baseline, None);
    }

    #[test]
    fn resolve_with_existing_baseline_is_a_plain_diff() {
        let mut snap = Snapshot::new();
        snap.insert("name".into(), Value::Text("John".into()));
        let mut current = snap.clone();
        current.insert("name".into(), Value::Text("Jane".into()));
        let (changes, baseline) = resolve(Some(&snap), &current, SnapshotStrategy::Deferred);
        assert_eq!(
            changes.get("name"),
            Some(&(Value::Text("John".into()), Value::Text("Jane".into())))
        );
        assert_eq!(baseline, None);
    }
}
