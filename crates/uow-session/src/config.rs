//! Session configuration (§6).

/// When a snapshot is captured for a newly-MANAGED entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotStrategy {
    /// Snapshot at every managed transition. The safer default: dirty
    /// checking never misses a mutation that happens between becoming
    /// MANAGED and the first `flush`.
    #[default]
    Eager,
    /// Snapshot only on first dirty check. Behaviorally identical to
    /// `Eager` unless a mutation happens between becoming MANAGED and the
    /// first `flush`, in which case that first mutation is invisible to
    /// dirty detection (the entity is considered clean as of the snapshot
    /// point).
    Deferred,
}

/// Recognized session options (§6).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `true` (default): `flush` raises `CyclicDependency` on a cycle.
    /// `false`: still raises, but the error carries a best-effort partial
    /// ordering computed from whatever was visited before the cycle closed.
    pub fail_on_cyclic_dependency: bool,
    pub snapshot_strategy: SnapshotStrategy,
    /// `true` (default): the state validator rejects operations it does not
    /// recognize. `false`: unrecognized operations are treated as legal.
    pub strict_operation_validation: bool,
    /// Cap on retained transition-log entries per entity; `0` means
    /// unbounded.
    pub transition_log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fail_on_cyclic_dependency: true,
            snapshot_strategy: SnapshotStrategy::default(),
            strict_operation_validation: true,
            transition_log_capacity: crate::state::TransitionLog::DEFAULT_CAPACITY,
        }
    }
}
