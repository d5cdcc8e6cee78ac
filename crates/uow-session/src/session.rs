//! The session façade: the only entry point application code calls (§4.6).

use uow_core::{Cx, Entity, EntityKey, Error, Executor, MetadataRegistry, Outcome, Result};

use crate::change_tracker;
use crate::config::{SessionConfig, SnapshotStrategy};
use crate::dependency::{DependencyCategory, DependencySolver};
use crate::flush::{self, FlushReport};
use crate::handle::EntityHandle;
use crate::identity_map::IdentityMap;
use crate::state::{LifecycleState, Operation, StateValidator, TransitionRecord};

/// The unit-of-work boundary: one identity map, one pending-work set, one
/// `Executor`.
///
/// A session is single-threaded and cooperative (§5): nothing here is
/// internally synchronized, and only `flush`, `merge`, and `refresh` ever
/// suspend on the executor.
pub struct Session<E: Executor, M: MetadataRegistry> {
    executor: E,
    registry: M,
    identity_map: IdentityMap,
    solver: DependencySolver,
    config: SessionConfig,
    flushing: bool,
}

impl<E: Executor, M: MetadataRegistry> Session<E, M> {
    #[must_use]
    pub fn new(executor: E, registry: M) -> Self {
        Self::with_config(executor, registry, SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(executor: E, registry: M, config: SessionConfig) -> Self {
        Self {
            executor,
            registry,
            identity_map: IdentityMap::new(),
            solver: DependencySolver::new(),
            config,
            flushing: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn current_state(&self, handle: &EntityHandle) -> LifecycleState {
        self.identity_map
            .metadata(handle)
            .map_or(LifecycleState::Detached, |r| r.state)
    }

    fn validator(&self) -> StateValidator {
        StateValidator::new(self.config.strict_operation_validation)
    }

    /// Whether `op_name` would be legal to invoke on `handle` in its current
    /// state. Exposed for callers (e.g. a cascade layer) that resolve
    /// operations by name rather than through the typed methods below;
    /// consults `strict_operation_validation` (§6) for names outside the six
    /// operations this façade implements.
    #[must_use]
    pub fn is_operation_legal(&self, op_name: &str, handle: &EntityHandle) -> bool {
        self.validator().is_legal_by_name(op_name, self.current_state(handle))
    }

    /// Track a brand-new application entity, transitioning it to `NEW`
    /// (from `NEW` or `DETACHED`) and registering it in the identity map.
    pub fn persist(&mut self, entity: impl Entity) -> Result<EntityHandle> {
        let handle = EntityHandle::new(entity);
        self.persist_handle(handle)
    }

    /// `persist` taking an already-wrapped handle, used internally and by
    /// callers re-persisting a handle they already hold.
    #[tracing::instrument(level = "debug", skip(self, handle), fields(class = handle.class_name()))]
    pub fn persist_handle(&mut self, handle: EntityHandle) -> Result<EntityHandle> {
        let state = self.current_state(&handle);
        self.validator().check(Operation::Persist, state)?;
        self.identity_map
            .add(handle.clone(), None, LifecycleState::New, self.log_capacity())?;
        tracing::info!(class = handle.class_name(), "entity persisted");
        Ok(handle)
    }

    /// Schedule an entity for deletion (`MANAGED -> REMOVED`), or discard a
    /// `NEW` entity before it is ever flushed ("detached-discard", §9: no
    /// insert-then-delete is produced for this case).
    #[tracing::instrument(level = "debug", skip(self, handle), fields(class = handle.class_name()))]
    pub fn remove(&mut self, handle: &EntityHandle) -> Result<()> {
        let state = self.current_state(handle);
        self.validator().check(Operation::Remove, state)?;
        tracing::info!(class = handle.class_name(), ?state, "entity marked for removal");

        match state {
            LifecycleState::New => {
                self.identity_map.remove(handle);
                self.solver.clear_dependencies(handle);
            }
            LifecycleState::Managed => {
                self.transition(handle, LifecycleState::Removed, "remove")?;
            }
            LifecycleState::Detached => {
                // Already outside the session; nothing to schedule.
            }
            LifecycleState::Removed => unreachable!("validator rejects remove on REMOVED"),
        }
        Ok(())
    }

    /// Copy a detached entity's values onto the managed instance with the
    /// same key, returning the managed handle. If no managed instance with
    /// that key is tracked yet, `entity` itself adopts the MANAGED role
    /// directly rather than requiring a separate reload round-trip.
    pub fn merge(&mut self, entity: impl Entity) -> Result<EntityHandle> {
        let key = EntityKey::from_entity(&entity);
        let incoming_fields = entity.current_fields();

        if let Some(key) = &key {
            if let Some(existing) = self.identity_map.lookup(key) {
                existing.write().apply_fields(&incoming_fields);
                return Ok(existing);
            }
        }

        let handle = EntityHandle::new(entity);
        self.identity_map
            .add(handle.clone(), key, LifecycleState::Managed, self.log_capacity())?;
        // Deferred: leave the baseline unset; the first dirty check captures
        // it (§6 `SnapshotStrategy::Deferred`).
        if self.config.snapshot_strategy == SnapshotStrategy::Eager {
            if let Some(record) = self.identity_map.metadata_mut(&handle) {
                record.snapshot = Some(change_tracker::capture(&**handle.read()));
            }
        }
        Ok(handle)
    }

    /// Remove a handle from the session without scheduling any storage
    /// operation. The entity itself is unaffected; it is simply no longer
    /// tracked.
    pub fn detach(&mut self, handle: &EntityHandle) -> Result<()> {
        let state = self.current_state(handle);
        self.validator().check(Operation::Detach, state)?;
        self.identity_map.remove(handle);
        self.solver.clear_dependencies(handle);
        Ok(())
    }

    /// Reload a managed entity's fields from storage, replacing both
    /// current values and snapshot.
    pub async fn refresh(&mut self, cx: &Cx, handle: &EntityHandle) -> Outcome<(), Error> {
        let state = self.current_state(handle);
        if let Err(e) = self.validator().check(Operation::Refresh, state) {
            return Outcome::Err(e);
        }
        let Some(pk) = handle.read().primary_key() else {
            return Outcome::Err(Error::unmanaged(handle.class_name()));
        };
        let class = handle.class_name();
        let table = match self.registry.describe(class) {
            Some(meta) => meta.table,
            None => return Outcome::Err(Error::illegal_state("refresh", "unknown-class")),
        };
        match self.executor.reload(cx, table, &pk).await {
            Outcome::Ok(Some(values)) => {
                handle.write().apply_fields(&values);
                if let Some(record) = self.identity_map.metadata_mut(handle) {
                    record.snapshot = Some(values);
                }
                Outcome::Ok(())
            }
            Outcome::Ok(None) => Outcome::Err(Error::unmanaged(class)),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Run the flush scheduler (§4.4): order pending work, open a
    /// transaction, emit operations, and commit or roll back atomically.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn flush(&mut self, cx: &Cx) -> Outcome<FlushReport, Error> {
        if self.flushing {
            tracing::warn!("flush re-entered while already in progress");
            return Outcome::Err(Error::FlushInProgress);
        }
        self.flushing = true;
        let result = flush::run(
            cx,
            &self.executor,
            &self.registry,
            &mut self.identity_map,
            &self.solver,
            &self.config,
        )
        .await;
        self.flushing = false;
        result
    }

    /// Detach every `MANAGED`/`REMOVED` entity, discard every `NEW` entity,
    /// and drop all pending work and dependency edges.
    pub fn clear(&mut self) {
        self.identity_map.clear();
        self.solver = DependencySolver::new();
    }

    #[must_use]
    pub fn contains(&self, handle: &EntityHandle) -> bool {
        self.identity_map.contains(handle)
    }

    #[must_use]
    pub fn entity_state(&self, handle: &EntityHandle) -> LifecycleState {
        self.current_state(handle)
    }

    #[must_use]
    pub fn transition_history(&self, handle: &EntityHandle) -> Vec<TransitionRecord> {
        self.identity_map
            .metadata(handle)
            .map(|r| r.transitions.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn scheduled_insertions(&self) -> Vec<EntityHandle> {
        self.identity_map
            .all_handles()
            .filter(|h| self.current_state(h) == LifecycleState::New)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn scheduled_updates(&self) -> Vec<EntityHandle> {
        self.identity_map
            .all_handles()
            .filter(|h| {
                let Some(record) = self.identity_map.metadata(h) else {
                    return false;
                };
                if record.state != LifecycleState::Managed {
                    return false;
                }
                // A never-yet-captured baseline under `Deferred` reads as
                // clean here too, matching `flush`'s first-dirty-check
                // capture (this read-only call does not persist it).
                let current = h.read().current_fields();
                let (changes, _) =
                    change_tracker::resolve(record.snapshot.as_ref(), &current, self.config.snapshot_strategy);
                !changes.is_empty()
            })
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn scheduled_deletions(&self) -> Vec<EntityHandle> {
        self.identity_map
            .all_handles()
            .filter(|h| self.current_state(h) == LifecycleState::Removed)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn managed_entities(&self) -> Vec<EntityHandle> {
        self.identity_map
            .all_handles()
            .filter(|h| self.current_state(h) == LifecycleState::Managed)
            .cloned()
            .collect()
    }

    pub fn add_insertion_dependency(&mut self, dependent: &EntityHandle, dependency: &EntityHandle) {
        self.solver
            .add_edge(DependencyCategory::Insertion, dependent.clone(), dependency.clone());
    }

    pub fn add_update_dependency(&mut self, dependent: &EntityHandle, dependency: &EntityHandle) {
        self.solver
            .add_edge(DependencyCategory::Update, dependent.clone(), dependency.clone());
    }

    pub fn add_deletion_dependency(&mut self, dependent: &EntityHandle, dependency: &EntityHandle) {
        self.solver
            .add_edge(DependencyCategory::Deletion, dependent.clone(), dependency.clone());
    }

    pub fn clear_dependencies(&mut self, handle: &EntityHandle) {
        self.solver.clear_dependencies(handle);
    }

    fn log_capacity(&self) -> usize {
        self.config.transition_log_capacity
    }

    /// Transition a tracked handle, validating against the allowed-transition
    /// table and appending to its transition log.
    fn transition(&mut self, handle: &EntityHandle, to: LifecycleState, cause: &'static str) -> Result<()> {
        let from = self.current_state(handle);
        self.validator().check_transition(from, to)?;
        if let Some(record) = self.identity_map.metadata_mut(handle) {
            record.state = to;
            record.transitions.push(from, to, cause);
        }
        Ok(())
    }
}
