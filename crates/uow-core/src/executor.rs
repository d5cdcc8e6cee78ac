//! The `Executor` boundary — the transactional I/O the flush scheduler drives.
//!
//! This is deliberately table/column shaped rather than SQL-string shaped:
//! the engine never builds SQL. An `Executor` implementation owns whatever
//! connection/driver/SQL-generation stack sits beneath it.

use std::collections::HashMap;
use std::future::Future;

use asupersync::{Cx, Outcome};

use crate::error::Error;
use crate::value::Value;

/// An open transaction handle. Opaque to the engine beyond being passed back
/// into `commit`/`rollback`.
pub trait TransactionHandle: Send {}

/// The transactional boundary the flush scheduler drives.
///
/// Every method suspends only at the points the session contract (see the
/// crate-level docs) allows: `begin`, `insert`, `update`, `delete`, `reload`,
/// `commit`, and `rollback` are the only async operations the engine ever
/// awaits.
pub trait Executor: Send + Sync {
    /// The transaction handle this executor hands back from `begin`.
    type Tx: TransactionHandle;

    /// Open a transaction.
    fn begin(&self, cx: &Cx) -> impl Future<Output = Outcome<Self::Tx, Error>> + Send;

    /// Commit a transaction.
    fn commit(&self, cx: &Cx, tx: Self::Tx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Roll back a transaction.
    fn rollback(&self, cx: &Cx, tx: Self::Tx) -> impl Future<Output = Outcome<(), Error>> + Send;

    /// Insert a row, returning the generated primary key if the table has one.
    fn insert(
        &self,
        cx: &Cx,
        tx: &Self::Tx,
        table: &str,
        columns: &HashMap<&'static str, Value>,
    ) -> impl Future<Output = Outcome<Option<Vec<Value>>, Error>> + Send;

    /// Update a row identified by primary key, returning rows affected.
    fn update(
        &self,
        cx: &Cx,
        tx: &Self::Tx,
        table: &str,
        pk: &[Value],
        columns: &HashMap<&'static str, Value>,
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Delete a row identified by primary key, returning rows affected.
    fn delete(
        &self,
        cx: &Cx,
        tx: &Self::Tx,
        table: &str,
        pk: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;

    /// Reload a row by primary key, outside of any transaction. Used by
    /// `refresh` and `merge`. Returns `None` if the row no longer exists.
    fn reload(
        &self,
        cx: &Cx,
        table: &str,
        pk: &[Value],
    ) -> impl Future<Output = Outcome<Option<HashMap<String, Value>>, Error>> + Send;
}

/// The fine-grained reason an executor call failed, distinguished so the
/// flush scheduler and the application can react appropriately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    SerializationFailure,
    ConnectionLost,
    Timeout,
    Other,
}

/// A structured executor failure.
#[derive(Debug, Clone)]
pub struct ExecutorError {
    pub kind: ExecutorErrorKind,
    pub message: String,
}

impl ExecutorError {
    #[must_use]
    pub fn new(kind: ExecutorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ExecutorError {}
