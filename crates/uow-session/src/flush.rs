//! The flush scheduler: gathers pending work, orders it, and drives one
//! transaction through an [`Executor`] (§4.4).

use std::collections::HashMap;

use uow_core::{
    ClassMetadata, Cx, Entity, EntityKey, Error, Executor, ExecutorError, ExecutorErrorKind,
    MetadataRegistry, Outcome, Value,
};

use crate::change_tracker::{self, ChangeSet};
use crate::config::{SessionConfig, SnapshotStrategy};
use crate::dependency::{DependencyCategory, DependencySolver};
use crate::handle::EntityHandle;
use crate::identity_map::IdentityMap;
use crate::state::LifecycleState;

/// What a successful flush did, for logging/introspection.
#[derive(Debug, Default)]
pub struct FlushReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

struct PendingUpdate {
    handle: EntityHandle,
    pk: Vec<Value>,
    changes: ChangeSet,
}

fn describe(registry: &dyn MetadataRegistry, class: &str) -> Result<ClassMetadata, Error> {
    registry
        .describe(class)
        .ok_or_else(|| Error::illegal_state("flush", "unknown-class"))
}

fn new_entities(identity_map: &IdentityMap) -> Vec<EntityHandle> {
    identity_map
        .all_handles()
        .filter(|h| {
            identity_map
                .metadata(h)
                .is_some_and(|r| r.state == LifecycleState::New)
        })
        .cloned()
        .collect()
}

fn removed_entities(identity_map: &IdentityMap) -> Vec<EntityHandle> {
    identity_map
        .all_handles()
        .filter(|h| {
            identity_map
                .metadata(h)
                .is_some_and(|r| r.state == LifecycleState::Removed)
        })
        .cloned()
        .collect()
}

/// Managed entities with a non-empty change set against their snapshot.
///
/// Under `SnapshotStrategy::Deferred` a managed record may have no baseline
/// yet (§6): this is this entity's first dirty check, so its baseline is
/// captured here (current fields become the snapshot) and written back —
/// it reports clean for this round, since there is nothing yet to compare
/// against.
fn dirty_entities(identity_map: &mut IdentityMap, strategy: SnapshotStrategy) -> Vec<PendingUpdate> {
    let handles: Vec<EntityHandle> = identity_map.all_handles().cloned().collect();
    let mut updates = Vec::new();
    for handle in handles {
        let Some(record) = identity_map.metadata(&handle) else {
            continue;
        };
        if record.state != LifecycleState::Managed {
            continue;
        }
        let current = handle.read().current_fields();
        let (changes, new_baseline) = change_tracker::resolve(record.snapshot.as_ref(), &current, strategy);
        if let Some(baseline) = new_baseline {
            if let Some(record) = identity_map.metadata_mut(&handle) {
                record.snapshot = Some(baseline);
            }
            continue;
        }
        if changes.is_empty() {
            continue;
        }
        let Some(pk) = handle.read().primary_key() else {
            continue;
        };
        updates.push(PendingUpdate {
            handle: handle.clone(),
            pk,
            changes,
        });
    }
    updates
}

fn to_executor_error(e: Error) -> ExecutorError {
    match e {
        Error::FlushAborted { cause } => cause,
        other => ExecutorError::new(ExecutorErrorKind::Other, other.to_string()),
    }
}

#[tracing::instrument(level = "debug", skip(cx, executor, tx, identity_map, promoted))]
async fn rollback<E: Executor>(
    cx: &Cx,
    executor: &E,
    tx: E::Tx,
    identity_map: &mut IdentityMap,
    promoted: &[EntityKey],
) {
    tracing::warn!(promoted = promoted.len(), "rolling back flush");
    let _ = executor.rollback(cx, tx).await;
    for key in promoted {
        identity_map.demote(key);
    }
}

fn to_static_columns(
    meta: &ClassMetadata,
    fields: &HashMap<String, Value>,
) -> HashMap<&'static str, Value> {
    let mut columns = HashMap::new();
    for (name, column) in &meta.field_map {
        if let Some(value) = fields.get(*name) {
            columns.insert(column.column, value.clone());
        }
    }
    columns
}

/// Run one flush to completion. Returns the committed report, or an error
/// after rolling back and restoring all promotions made during this attempt.
#[tracing::instrument(level = "debug", skip(cx, executor, registry, identity_map, solver))]
pub async fn run<E: Executor>(
    cx: &Cx,
    executor: &E,
    registry: &dyn MetadataRegistry,
    identity_map: &mut IdentityMap,
    solver: &DependencySolver,
    config: &SessionConfig,
) -> Outcome<FlushReport, Error> {
    let insertions = new_entities(identity_map);
    let deletions = removed_entities(identity_map);
    let updates = dirty_entities(identity_map, config.snapshot_strategy);

    tracing::info!(
        inserts = insertions.len(),
        updates = updates.len(),
        deletes = deletions.len(),
        "starting flush"
    );

    if insertions.is_empty() && updates.is_empty() && deletions.is_empty() {
        return Outcome::Ok(FlushReport::default());
    }

    let include_partial = !config.fail_on_cyclic_dependency;
    let insertion_order = match solver.order(DependencyCategory::Insertion, &insertions, include_partial) {
        Ok(order) => order,
        Err(err) => return Outcome::Err(err),
    };
    let update_handles: Vec<EntityHandle> = updates.iter().map(|u| u.handle.clone()).collect();
    let update_order = match solver.order(DependencyCategory::Update, &update_handles, include_partial) {
        Ok(order) => order,
        Err(err) => return Outcome::Err(err),
    };
    let mut deletion_order = match solver.order(DependencyCategory::Deletion, &deletions, include_partial) {
        Ok(order) => order,
        Err(err) => return Outcome::Err(err),
    };
    deletion_order.reverse();

    let tx = match executor.begin(cx).await {
        Outcome::Ok(tx) => tx,
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    };

    let mut promoted: Vec<EntityKey> = Vec::new();
    // Generated primary keys are only written back onto the entity once the
    // whole flush commits — applying them eagerly would leave a rolled-back
    // entity looking persisted even though its identity-map entry reverted.
    let mut generated_pks: Vec<(EntityHandle, String, Value)> = Vec::new();

    for handle in &insertion_order {
        let class = handle.class_name();
        let meta = match describe(registry, class) {
            Ok(m) => m,
            Err(e) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Err(Error::FlushAborted {
                    cause: to_executor_error(e),
                });
            }
        };
        let fields = handle.read().current_fields();
        let columns = to_static_columns(&meta, &fields);
        match executor.insert(cx, &tx, meta.table, &columns).await {
            Outcome::Ok(generated_pk) => {
                let Some(pk) = generated_pk.or_else(|| handle.read().primary_key()) else {
                    continue;
                };
                let key = EntityKey::new(class, pk.clone());
                if let Err(e) = identity_map.promote(handle, key.clone()) {
                    rollback(cx, executor, tx, identity_map, &promoted).await;
                    return Outcome::Err(Error::FlushAborted {
                        cause: to_executor_error(e),
                    });
                }
                promoted.push(key);
                if !fields.contains_key(meta.primary_key_field) {
                    generated_pks.push((
                        handle.clone(),
                        meta.primary_key_field.to_string(),
                        pk.first().cloned().unwrap_or(Value::Null),
                    ));
                }
            }
            Outcome::Err(e) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Err(Error::FlushAborted {
                    cause: to_executor_error(e),
                });
            }
            Outcome::Cancelled(r) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Cancelled(r);
            }
            Outcome::Panicked(p) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Panicked(p);
            }
        }
    }

    for handle in &update_order {
        let Some(pending) = updates.iter().find(|u| u.handle == *handle) else {
            continue;
        };
        let class = handle.class_name();
        let meta = match describe(registry, class) {
            Ok(m) => m,
            Err(e) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Err(Error::FlushAborted {
                    cause: to_executor_error(e),
                });
            }
        };
        let new_values: HashMap<String, Value> = pending
            .changes
            .iter()
            .map(|(field, (_, new))| (field.clone(), new.clone()))
            .collect();
        let columns = to_static_columns(&meta, &new_values);
        match executor.update(cx, &tx, meta.table, &pending.pk, &columns).await {
            Outcome::Ok(_rows) => {}
            Outcome::Err(e) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Err(Error::FlushAborted {
                    cause: to_executor_error(e),
                });
            }
            Outcome::Cancelled(r) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Cancelled(r);
            }
            Outcome::Panicked(p) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Panicked(p);
            }
        }
    }

    for handle in &deletion_order {
        let class = handle.class_name();
        let meta = match describe(registry, class) {
            Ok(m) => m,
            Err(e) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Err(Error::FlushAborted {
                    cause: to_executor_error(e),
                });
            }
        };
        let Some(pk) = handle.read().primary_key() else {
            continue;
        };
        match executor.delete(cx, &tx, meta.table, &pk).await {
            Outcome::Ok(_rows) => {}
            Outcome::Err(e) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Err(Error::FlushAborted {
                    cause: to_executor_error(e),
                });
            }
            Outcome::Cancelled(r) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Cancelled(r);
            }
            Outcome::Panicked(p) => {
                rollback(cx, executor, tx, identity_map, &promoted).await;
                return Outcome::Panicked(p);
            }
        }
    }

    match executor.commit(cx, tx).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => {
            for key in &promoted {
                identity_map.demote(key);
            }
            return Outcome::Err(Error::FlushAborted {
                cause: to_executor_error(e),
            });
        }
        Outcome::Cancelled(r) => {
            for key in &promoted {
                identity_map.demote(key);
            }
            return Outcome::Cancelled(r);
        }
        Outcome::Panicked(p) => {
            for key in &promoted {
                identity_map.demote(key);
            }
            return Outcome::Panicked(p);
        }
    }

    for (handle, field, value) in generated_pks {
        let mut values = HashMap::new();
        values.insert(field, value);
        handle.write().apply_fields(&values);
    }

    for handle in &insertion_order {
        let current = (config.snapshot_strategy == SnapshotStrategy::Eager)
            .then(|| handle.read().current_fields());
        if let Some(record) = identity_map.metadata_mut(handle) {
            record.state = LifecycleState::Managed;
            record
                .transitions
                .push(LifecycleState::New, LifecycleState::Managed, "flush");
            // Deferred: leave the baseline unset; the first post-flush dirty
            // check captures it (see `dirty_entities`).
            record.snapshot = current;
        }
    }
    for pending in &updates {
        if let Some(record) = identity_map.metadata_mut(&pending.handle) {
            record.snapshot = Some(pending.handle.read().current_fields());
        }
    }
    for handle in &deletion_order {
        identity_map.remove(handle);
    }

    let report = FlushReport {
        inserted: insertion_order.len(),
        updated: updates.len(),
        deleted: deletion_order.len(),
    };
    tracing::info!(
        inserted = report.inserted,
        updated = report.updated,
        deleted = report.deleted,
        "flush committed"
    );
    Outcome::Ok(report)
}
