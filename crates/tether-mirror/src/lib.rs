//! Tether mirror: the native side of the managed type system
//!
//! Classes, methods and fields reference each other cyclically (a method
//! references its declaring class and its return and argument types; a class
//! references its methods), so the mirror is built in two phases. Allocation
//! hands out a stable [`tether_core::NativeHandle`] immediately, which other
//! resources may reference at once; member assignment later wires a class's
//! constructor, dispatch groups and fields into place, after which the class
//! is ready and structurally frozen.
//!
//! - [`TypeFactory`] — the registration protocol invoked by the managed runtime
//! - [`TypeManager`] — the arena implementation, which also implements
//!   [`tether_core::DestroySink`] so the reference tracker can release the
//!   resources it minted

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod factory;
pub mod manager;
pub mod resource;

pub use factory::TypeFactory;
pub use manager::TypeManager;
pub use resource::{
    ClassMembers, ClassResource, ClassState, Descriptor, DispatchGroup, FieldResource,
    MethodResource, PrimitiveKind, PrimitiveResource, Resource, ResourceKind,
};

use tether_core::NativeHandle;

/// Structural errors raised by the registration protocol.
///
/// Every variant indicates a programming error in class construction on the
/// managed side. They are surfaced synchronously to the caller and are never
/// recoverable by retrying.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A referenced handle was never allocated, or was already destroyed
    #[error("handle {0} was never allocated")]
    UnknownReference(NativeHandle),

    /// A referenced handle exists but is the wrong kind of resource
    #[error("handle {handle} is a {actual}, expected {expected}")]
    WrongKind {
        /// The offending handle
        handle: NativeHandle,
        /// What the operation required
        expected: &'static str,
        /// What the handle actually refers to
        actual: ResourceKind,
    },

    /// The class already has its members assigned; no further structural
    /// mutation is permitted
    #[error("class {0} already has members assigned")]
    AlreadyReady(NativeHandle),

    /// A dispatch group was defined with no methods
    #[error("dispatch group {name:?} on class {class} has no methods")]
    EmptyDispatch {
        /// Owning class handle
        class: NativeHandle,
        /// Dispatch name
        name: String,
    },

    /// A grouped or assigned member belongs to a different class
    #[error("member {member} belongs to class {owner}, not {class}")]
    ForeignMember {
        /// The offending member handle
        member: NativeHandle,
        /// The class the member actually belongs to
        owner: NativeHandle,
        /// The class the operation targeted
        class: NativeHandle,
    },

    /// The primitive code does not select a known primitive kind
    #[error("unknown primitive code {0}")]
    UnknownPrimitiveCode(i32),
}

/// Registration protocol result
pub type FactoryResult<T> = Result<T, ConfigurationError>;
