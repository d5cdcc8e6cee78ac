//! Core types and traits for the unit-of-work engine.
//!
//! `uow-core` is the **contract layer**: it defines the `Entity` trait
//! application types implement, the two boundaries the engine consumes
//! (`MetadataRegistry`, `Executor`), and the shared data types (`Value`,
//! `EntityKey`, `Error`) that flow between them.
//!
//! # Role in the architecture
//!
//! - `uow-session` depends on everything here to implement the identity map,
//!   lifecycle state machine, change tracker, dependency solver, and flush
//!   scheduler.
//! - Application code implements `Entity` for its own types and supplies a
//!   `MetadataRegistry` + `Executor` pair; it never needs to reach into
//!   `uow-session`'s internals.
//!
//! This crate has no opinion about SQL generation, connection pooling, or
//! driver protocols — those live entirely behind `Executor`.

pub use asupersync::{Cx, Outcome};

pub mod entity;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod value;

pub use entity::{Entity, EntityKey};
pub use error::{Error, Result};
pub use executor::{Executor, ExecutorError, ExecutorErrorKind, TransactionHandle};
pub use metadata::{CascadeAction, ClassMetadata, ColumnInfo, MetadataRegistry, RelationInfo, RelationKind};
pub use value::Value;
