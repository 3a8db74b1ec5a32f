//! Lifecycle reconciliation for remote resources.
//!
//! This crate drives a remote object through its lifecycle against an
//! eventually-consistent control-plane API:
//!
//! ```text
//! Absent → Creating → Stabilizing → Present → Updating → Present → Deleting → Absent
//! ```
//!
//! A resource kind plugs in through two traits: [`RemoteClient`] (the
//! calls) and [`Resource`] (pure translation plus a static [`Schema`]). The
//! generic [`Reconciler`] then provides create, read, update, delete and
//! import with retry, stabilization and cancellation.
//!
//! # Example
//!
//! ```ignore
//! use lifecycle::{LogDiagnostics, MemoryStore, Reconciler};
//!
//! let store = MemoryStore::new();
//! let reconciler = Reconciler::new(&QueueResource, &client, &store, &LogDiagnostics);
//!
//! let state = reconciler.create(&desired)?;
//! reconciler.update(&state.id, &desired)?; // no-op, zero remote calls
//! reconciler.delete(&state.id)?;
//! reconciler.delete(&state.id)?; // already absent, still Ok
//! ```

pub mod cancel;
pub mod change;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod finder;
pub mod identifier;
pub mod phase;
pub mod reconciler;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod store;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::{CancelToken, Canceller, Cancelled, cancellation};
pub use change::{AttributeChange, ChangeSet, diff};
pub use config::{ReconcileConfig, RetryPolicy, StabilizeConfig};
pub use diagnostics::{Action, CollectDiagnostics, Diagnostic, Diagnostics, LogDiagnostics, Severity};
pub use error::{BoxError, ClassifiedError, Error, ErrorKind, Result, StoreError, TranslateError};
pub use finder::{Finder, Lookup};
pub use identifier::{ImportFormat, ResourceId};
pub use phase::Phase;
pub use reconciler::{DeleteOutcome, Drift, ObservedState, ReadOutcome, Reconciler, UpdateOutcome};
pub use resource::{RemoteClient, Resource};
pub use retry::with_retry;
pub use schema::{FieldSpec, Record, Schema, case_insensitive};
pub use store::{MemoryStore, ResourceRecord, StateStore};
pub use value::{Attributes, Value};
