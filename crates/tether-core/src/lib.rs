//! Tether core runtime
//!
//! This crate provides the reference-lifecycle half of the bridge between a
//! managed, garbage-collected object space and the native resources its
//! objects proxy:
//! - Opaque [`NativeHandle`]s with value equality
//! - [`HandleTable`], the concurrent handle-to-observation map
//! - [`ReferenceTracker`], weak observation plus deferred batched destruction
//! - [`DestroySink`], the native-side bulk release entry point

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod handle;
pub mod sink;
pub mod tracker;

pub use handle::{Modifiers, NativeHandle};
pub use sink::{DestroyOutcome, DestroySink, SinkFailure};
pub use tracker::{
    HandleTable, ManagedProxy, ReferenceTracker, TrackerOptions, TrackerState, TrackerStats,
    WeakObservation,
};

/// Reference-tracking errors
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum TrackerError {
    /// The handle is already present in the handle table
    #[error("handle {0} is already registered")]
    DuplicateRegistration(NativeHandle),

    /// The handle is not tracked
    #[error("handle {0} is not registered")]
    InvalidHandle(NativeHandle),

    /// The tracker no longer accepts registrations
    #[error("reference tracker is shut down")]
    Shutdown,
}

/// Reference-tracking result
pub type TrackerResult<T> = Result<T, TrackerError>;
