//! The lifecycle state machine: states, transitions, and operation legality.

use uow_core::Error;

/// The four lifecycle states an entity can occupy within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Managed,
    Removed,
    Detached,
}

impl LifecycleState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleState::New => "NEW",
            LifecycleState::Managed => "MANAGED",
            LifecycleState::Removed => "REMOVED",
            LifecycleState::Detached => "DETACHED",
        }
    }

    /// Whether `self -> to` appears in the allowed-transitions table (§4.2).
    #[must_use]
    pub const fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::{Detached, Managed, New, Removed};
        matches!(
            (self, to),
            (New, Managed) | (New, Removed) | (New, Detached)
                | (Managed, Removed) | (Managed, Detached)
                | (Detached, New)
        )
    }
}

/// One accepted transition, retained for diagnostics only.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from: LifecycleState,
    pub to: LifecycleState,
    pub seq: u64,
    pub cause: &'static str,
}

/// The per-entity append-only transition log.
///
/// Retention is capped (see [`TransitionLog::DEFAULT_CAPACITY`]) since the
/// source's unbounded log was flagged as an open question; the oldest
/// entries are dropped first, which is acceptable because the log is purely
/// diagnostic and never consulted for semantics beyond its last entry.
#[derive(Debug, Clone, Default)]
pub struct TransitionLog {
    records: Vec<TransitionRecord>,
    next_seq: u64,
    capacity: usize,
}

impl TransitionLog {
    pub const DEFAULT_CAPACITY: usize = 64;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            next_seq: 0,
            capacity,
        }
    }

    pub fn push(&mut self, from: LifecycleState, to: LifecycleState, cause: &'static str) {
        if self.capacity > 0 && self.records.len() >= self.capacity {
            self.records.remove(0);
        }
        self.records.push(TransitionRecord {
            from,
            to,
            seq: self.next_seq,
            cause,
        });
        self.next_seq += 1;
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Application-facing operation names, used both for validation and for
/// error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Persist,
    Update,
    Remove,
    Merge,
    Detach,
    Refresh,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Persist => "persist",
            Operation::Update => "update",
            Operation::Remove => "remove",
            Operation::Merge => "merge",
            Operation::Detach => "detach",
            Operation::Refresh => "refresh",
        }
    }

    /// Resolve a raw operation name (e.g. from a cascade layer or other
    /// caller outside the typed façade) to its `Operation`, if recognized.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "persist" => Some(Operation::Persist),
            "update" => Some(Operation::Update),
            "remove" => Some(Operation::Remove),
            "merge" => Some(Operation::Merge),
            "detach" => Some(Operation::Detach),
            "refresh" => Some(Operation::Refresh),
            _ => None,
        }
    }

    /// Whether `op` is admissible when the entity is in `state`, per the
    /// operation-legality table (§4.2).
    #[must_use]
    pub const fn legal_in(self, state: LifecycleState) -> bool {
        use LifecycleState::{Detached, Managed, New, Removed};
        use Operation::{Detach, Merge, Persist, Refresh, Remove, Update};
        matches!(
            (self, state),
            (Persist, New) | (Persist, Detached)
                | (Update, Managed)
                | (Remove, New) | (Remove, Managed) | (Remove, Detached)
                | (Merge, Detached)
                | (Detach, New) | (Detach, Managed)
                | (Refresh, Managed)
        )
    }
}

/// Validates a requested operation or transition against the current state,
/// producing the exact errors §7 names.
#[derive(Debug, Clone, Copy)]
pub struct StateValidator {
    pub strict: bool,
}

impl StateValidator {
    #[must_use]
    pub const fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Returns `Ok(())` iff `op` is legal in `state`.
    ///
    /// `Operation` is a closed enum, so every value reaching this call is
    /// already recognized; `strict` has no bearing here (see
    /// [`StateValidator::is_legal_by_name`] for the path it governs).
    pub fn check(self, op: Operation, state: LifecycleState) -> Result<(), Error> {
        if op.legal_in(state) {
            Ok(())
        } else {
            Err(Error::illegal_state(op.as_str(), state.as_str()))
        }
    }

    /// Returns whether `op_name` is legal in `state`, resolving it through
    /// [`Operation::from_name`] first.
    ///
    /// For callers outside the typed façade that resolve operations by raw
    /// string (e.g. a cascade layer dispatching by name), a name outside the
    /// six recognized operations is treated as legal iff `strict` is `false`
    /// — this is the `strict_operation_validation: false` path §6 names
    /// ("unrecognized operations return true").
    #[must_use]
    pub fn is_legal_by_name(self, op_name: &str, state: LifecycleState) -> bool {
        match Operation::from_name(op_name) {
            Some(op) => op.legal_in(state),
            None => !self.strict,
        }
    }

    /// Returns `Ok(())` iff `from -> to` is an allowed transition.
    pub fn check_transition(self, from: LifecycleState, to: LifecycleState) -> Result<(), Error> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(Error::illegal_transition(from.as_str(), to.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::{Detached, Managed, New, Removed};

    #[test]
    fn new_can_reach_managed_removed_and_detached() {
        assert!(New.can_transition_to(Managed));
        assert!(New.can_transition_to(Removed));
        assert!(New.can_transition_to(Detached));
    }

    #[test]
    fn removed_is_terminal() {
        assert!(!Removed.can_transition_to(Managed));
        assert!(!Removed.can_transition_to(New));
        assert!(!Removed.can_transition_to(Detached));
    }

    #[test]
    fn detached_can_only_reach_new() {
        assert!(Detached.can_transition_to(New));
        assert!(!Detached.can_transition_to(Managed));
        assert!(!Detached.can_transition_to(Removed));
    }

    #[test]
    fn persist_illegal_on_managed() {
        let v = StateValidator::new(true);
        let err = v.check(Operation::Persist, Managed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "operation 'persist' is not legal in state MANAGED"
        );
    }

    #[test]
    fn update_only_legal_on_managed() {
        let v = StateValidator::new(true);
        assert!(v.check(Operation::Update, Managed).is_ok());
        assert!(v.check(Operation::Update, New).is_err());
        assert!(v.check(Operation::Update, Removed).is_err());
        assert!(v.check(Operation::Update, Detached).is_err());
    }

    #[test]
    fn unrecognized_name_is_illegal_when_strict() {
        let v = StateValidator::new(true);
        assert!(!v.is_legal_by_name("archive", Managed));
    }

    #[test]
    fn unrecognized_name_is_legal_when_not_strict() {
        let v = StateValidator::new(false);
        assert!(v.is_legal_by_name("archive", Managed));
    }

    #[test]
    fn recognized_name_ignores_strict_and_follows_legality_table() {
        let strict = StateValidator::new(true);
        let lenient = StateValidator::new(false);
        assert!(strict.is_legal_by_name("update", Managed));
        assert!(lenient.is_legal_by_name("update", Managed));
        assert!(!strict.is_legal_by_name("update", New));
        assert!(!lenient.is_legal_by_name("update", New));
    }

    #[test]
    fn log_caps_retention() {
        let mut log = TransitionLog::new(2);
        log.push(New, Managed, "persist");
        log.push(Managed, Removed, "remove");
        log.push(Removed, Removed, "noop");
        assert_eq!(log.iter().count(), 2);
    }
}
