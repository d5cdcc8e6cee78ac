//! The unit-of-work session: identity map, lifecycle state machine, change
//! tracker, dependency solver, and flush scheduler, composed behind one
//! façade.
//!
//! Application code implements [`uow_core::Entity`] for its own types and
//! supplies a [`uow_core::MetadataRegistry`] + [`uow_core::Executor`] pair to
//! [`Session::new`]. Everything else — tracking, dirty detection, ordering,
//! transactional flush — is this crate's job.
//!
//! A [`Session`] is a single-threaded, cooperative resource (see the crate
//! docs on concurrency in `uow-core`): it is not internally synchronized,
//! and only `flush`, `merge`, and `refresh` ever suspend on the `Executor`.

pub mod change_tracker;
pub mod config;
pub mod dependency;
pub mod flush;
pub mod handle;
pub mod identity_map;
pub mod session;
pub mod state;

pub use change_tracker::{ChangeSet, Snapshot};
pub use config::{SessionConfig, SnapshotStrategy};
pub use dependency::{DependencyCategory, DependencySolver};
pub use flush::FlushReport;
pub use handle::EntityHandle;
pub use identity_map::{EntityRecord, IdentityMap};
pub use session::Session;
pub use state::{LifecycleState, Operation, StateValidator, TransitionRecord};
