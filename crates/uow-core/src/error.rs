//! The engine's error taxonomy.
//!
//! Every fallible operation returns `Result<T>`; nothing is swallowed.
//! Pattern-match on `Error` where the source language would have used a
//! `catch` chain over distinct exception types.

use std::fmt;

use crate::entity::EntityKey;
use crate::executor::ExecutorError;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// The engine's tagged-sum error type.
#[derive(Debug, Clone)]
pub enum Error {
    /// The caller invoked `op` while the entity was in `state`.
    IllegalStateForOperation {
        op: &'static str,
        state: &'static str,
    },
    /// Internal logic requested a transition the state machine disallows.
    IllegalStateTransition {
        from: &'static str,
        to: &'static str,
    },
    /// Two distinct handles were registered for the same `(class, key)`.
    DuplicateIdentity { class: &'static str, key: String },
    /// An operation that requires a managed entity was called on one this
    /// session does not track.
    UnmanagedEntity { class: &'static str },
    /// The dependency graph has no valid topological order. `partial_order`
    /// holds every node fully ordered before the cycle closed; it is empty
    /// unless the caller asked for a best-effort partial ordering.
    CyclicDependency {
        cycle_path: Vec<String>,
        partial_order: Vec<String>,
    },
    /// `flush` was called while a flush was already in progress.
    FlushInProgress,
    /// The executor failed during flush; the transaction has been rolled
    /// back and in-memory state restored.
    FlushAborted { cause: ExecutorError },
    /// A managed/removed entity had no snapshot — an internal invariant
    /// violation surfaced for diagnostics rather than silently ignored.
    SnapshotMissing { class: &'static str, key: String },
}

impl Error {
    #[must_use]
    pub fn illegal_state(op: &'static str, state: &'static str) -> Self {
        Error::IllegalStateForOperation { op, state }
    }

    #[must_use]
    pub fn illegal_transition(from: &'static str, to: &'static str) -> Self {
        Error::IllegalStateTransition { from, to }
    }

    #[must_use]
    pub fn duplicate_identity(key: &EntityKey) -> Self {
        Error::DuplicateIdentity {
            class: key.class(),
            key: key.to_string(),
        }
    }

    #[must_use]
    pub fn unmanaged(class: &'static str) -> Self {
        Error::UnmanagedEntity { class }
    }

    #[must_use]
    pub fn snapshot_missing(key: &EntityKey) -> Self {
        Error::SnapshotMissing {
            class: key.class(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IllegalStateForOperation { op, state } => {
                write!(f, "operation '{op}' is not legal in state {state}")
            }
            Error::IllegalStateTransition { from, to } => {
                write!(f, "transition {from} -> {to} is not allowed")
            }
            Error::DuplicateIdentity { class, key } => {
                write!(f, "duplicate identity for {class}: {key}")
            }
            Error::UnmanagedEntity { class } => {
                write!(f, "entity of class {class} is not managed by this session")
            }
            Error::CyclicDependency {
                cycle_path,
                partial_order,
            } => {
                write!(f, "cyclic dependency: {}", cycle_path.join(" -> "))?;
                if !partial_order.is_empty() {
                    write!(f, " (partial order: {})", partial_order.join(" -> "))?;
                }
                Ok(())
            }
            Error::FlushInProgress => write!(f, "a flush is already in progress"),
            Error::FlushAborted { cause } => write!(f, "flush aborted: {cause}"),
            Error::SnapshotMissing { class, key } => {
                write!(f, "missing snapshot for managed entity {class}: {key}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FlushAborted { cause } => Some(cause),
            _ => None,
        }
    }
}
