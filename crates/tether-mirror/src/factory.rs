//! The staged type-registration protocol

use tether_core::{DestroyOutcome, Modifiers, NativeHandle, SinkFailure};

use crate::resource::Descriptor;
use crate::FactoryResult;

/// Protocol invoked by the managed runtime to build the native mirror of its
/// type system.
///
/// Construction is two-phase. Every `define_*` operation allocates a resource
/// and returns a stable handle that other resources may reference
/// immediately, even though the resource is not yet complete;
/// [`assign_members`](TypeFactory::assign_members) later wires a class's
/// constructor, dispatch groups and fields once they all exist. This breaks
/// the class/member reference cycle without forward references at the data
/// level.
///
/// Define and assign operations validate every handle they are given and
/// fail whole-call with [`ConfigurationError`](crate::ConfigurationError);
/// only [`destroy`](TypeFactory::destroy) has per-handle failure semantics.
/// The managed runtime serializes class definition, but implementations must
/// not rely on that: each call stands alone.
pub trait TypeFactory {
    /// Allocate an array class.
    ///
    /// The component type (and the superclass, when given) must already be
    /// allocated.
    fn define_array_class(
        &self,
        descriptor: Descriptor,
        name: &str,
        superclass: Option<NativeHandle>,
        component: NativeHandle,
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle>;

    /// Allocate an object class.
    ///
    /// The superclass (when not the root) and every interface must already
    /// be allocated classes.
    fn define_object_class(
        &self,
        descriptor: Descriptor,
        name: &str,
        superclass: Option<NativeHandle>,
        interfaces: &[NativeHandle],
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle>;

    /// Allocate a primitive type.
    ///
    /// `code` selects a fixed [`PrimitiveKind`](crate::PrimitiveKind);
    /// `boxed` must be an already-allocated object class.
    fn define_primitive(
        &self,
        code: i32,
        descriptor: Descriptor,
        boxed: NativeHandle,
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle>;

    /// Allocate a field on `class`, which must still be awaiting member
    /// assignment. The field type must be an allocated type handle.
    fn define_field(
        &self,
        class: NativeHandle,
        name: &str,
        descriptor: Descriptor,
        field_type: NativeHandle,
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle>;

    /// Allocate a method on `class`, which must still be awaiting member
    /// assignment. All referenced type handles must be allocated; entries in
    /// `overloads` must be allocated methods (possibly inherited from a
    /// superclass). The descriptor passes through uninterpreted.
    #[allow(clippy::too_many_arguments)]
    fn define_method(
        &self,
        class: NativeHandle,
        name: &str,
        descriptor: Descriptor,
        return_type: NativeHandle,
        argument_types: &[NativeHandle],
        overloads: &[NativeHandle],
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle>;

    /// Group methods sharing `name` on `class` into one dispatch unit for
    /// name-based calls. The list must be non-empty and every member must be
    /// a method owned by `class`.
    fn define_method_dispatch(
        &self,
        class: NativeHandle,
        name: &str,
        methods: &[NativeHandle],
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle>;

    /// Wire a class's members and transition it to ready.
    ///
    /// Called exactly once per class, after all of its method, dispatch and
    /// field resources have been allocated. A second call, or a call on a
    /// class that is not in the allocated state, fails.
    fn assign_members(
        &self,
        class: NativeHandle,
        ctor: Option<NativeHandle>,
        dispatches: &[NativeHandle],
        fields: &[NativeHandle],
    ) -> FactoryResult<()>;

    /// Bulk-release handles of any kind.
    ///
    /// A handle unknown to the native side fails individually in the outcome
    /// without aborting the rest of the batch. An empty batch is a no-op.
    fn destroy(&self, handles: &[NativeHandle]) -> Result<DestroyOutcome, SinkFailure>;
}
