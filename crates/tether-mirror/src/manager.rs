//! Arena implementation of the type-registration protocol

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use tether_core::{DestroyOutcome, DestroySink, Modifiers, NativeHandle, SinkFailure};

use crate::factory::TypeFactory;
use crate::resource::{
    ClassMembers, ClassResource, ClassState, Descriptor, DispatchGroup, FieldResource,
    MethodResource, PrimitiveKind, PrimitiveResource, Resource, ResourceKind,
};
use crate::{ConfigurationError, FactoryResult};

type Arena = FxHashMap<NativeHandle, Resource>;

/// Arena of native resources indexed by stable integer handles.
///
/// Forward references are legal at the protocol level because an arena slot
/// exists (and its handle is valid to reference) before the slot's full
/// content is populated; invalid partially-populated states are rejected at
/// the ready transition, not at allocation time.
///
/// The managed runtime serializes class definition, but the manager does not
/// assume it: every call validates and mutates under one short lock, and the
/// handle mint is atomic. `TypeManager` also implements
/// [`DestroySink`], so a [`ReferenceTracker`](tether_core::ReferenceTracker)
/// can drive destruction of the resources it minted.
#[derive(Debug)]
pub struct TypeManager {
    arena: Mutex<Arena>,
    // Handle 0 is never minted, so a zero handle from a buggy caller can
    // never alias a live resource.
    next_handle: AtomicU64,
}

impl Default for TypeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            arena: Mutex::new(FxHashMap::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    fn mint(&self) -> NativeHandle {
        NativeHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.arena.lock().len()
    }

    /// Check whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.arena.lock().is_empty()
    }

    /// Check whether `handle` refers to a live resource
    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.arena.lock().contains_key(&handle)
    }

    /// The kind of resource behind `handle`, if live
    pub fn kind_of(&self, handle: NativeHandle) -> Option<ResourceKind> {
        self.arena.lock().get(&handle).map(Resource::kind)
    }

    /// A snapshot of the resource behind `handle`, if live
    pub fn resource(&self, handle: NativeHandle) -> Option<Resource> {
        self.arena.lock().get(&handle).cloned()
    }

    /// Check whether `handle` is a class with members assigned
    pub fn is_ready(&self, handle: NativeHandle) -> bool {
        matches!(
            self.arena.lock().get(&handle),
            Some(Resource::Class(class)) if class.is_ready()
        )
    }

    /// Look up the dispatch group for `name` on `class`, for name-based
    /// call dispatch
    pub fn dispatch_of(&self, class: NativeHandle, name: &str) -> Option<NativeHandle> {
        self.arena.lock().iter().find_map(|(&handle, resource)| {
            matches!(
                resource,
                Resource::Dispatch(group) if group.owner == class && group.name == name
            )
            .then_some(handle)
        })
    }
}

impl TypeFactory for TypeManager {
    fn define_array_class(
        &self,
        descriptor: Descriptor,
        name: &str,
        superclass: Option<NativeHandle>,
        component: NativeHandle,
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle> {
        let mut arena = self.arena.lock();
        if let Some(superclass) = superclass {
            expect_class(&arena, superclass)?;
        }
        expect_type(&arena, component)?;

        let handle = self.mint();
        arena.insert(
            handle,
            Resource::Class(ClassResource {
                descriptor,
                name: name.to_string(),
                superclass,
                interfaces: Vec::new(),
                component: Some(component),
                modifiers,
                state: ClassState::Allocated,
            }),
        );
        Ok(handle)
    }

    fn define_object_class(
        &self,
        descriptor: Descriptor,
        name: &str,
        superclass: Option<NativeHandle>,
        interfaces: &[NativeHandle],
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle> {
        let mut arena = self.arena.lock();
        if let Some(superclass) = superclass {
            expect_class(&arena, superclass)?;
        }
        for &interface in interfaces {
            expect_class(&arena, interface)?;
        }

        let handle = self.mint();
        arena.insert(
            handle,
            Resource::Class(ClassResource {
                descriptor,
                name: name.to_string(),
                superclass,
                interfaces: interfaces.to_vec(),
                component: None,
                modifiers,
                state: ClassState::Allocated,
            }),
        );
        Ok(handle)
    }

    fn define_primitive(
        &self,
        code: i32,
        descriptor: Descriptor,
        boxed: NativeHandle,
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle> {
        let kind =
            PrimitiveKind::from_code(code).ok_or(ConfigurationError::UnknownPrimitiveCode(code))?;

        let mut arena = self.arena.lock();
        expect_class(&arena, boxed)?;

        let handle = self.mint();
        arena.insert(
            handle,
            Resource::Primitive(PrimitiveResource {
                kind,
                descriptor,
                boxed,
                modifiers,
            }),
        );
        Ok(handle)
    }

    fn define_field(
        &self,
        class: NativeHandle,
        name: &str,
        descriptor: Descriptor,
        field_type: NativeHandle,
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle> {
        let mut arena = self.arena.lock();
        expect_open_class(&arena, class)?;
        expect_type(&arena, field_type)?;

        let handle = self.mint();
        arena.insert(
            handle,
            Resource::Field(FieldResource {
                owner: class,
                name: name.to_string(),
                descriptor,
                field_type,
                modifiers,
            }),
        );
        Ok(handle)
    }

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
    ) -> FactoryResult<NativeHandle> {
        let mut arena = self.arena.lock();
        expect_open_class(&arena, class)?;
        expect_type(&arena, return_type)?;
        for &argument in argument_types {
            expect_type(&arena, argument)?;
        }
        for &overload in overloads {
            // Inherited overloads belong to a superclass, so ownership is
            // deliberately not checked here.
            expect_method(&arena, overload)?;
        }

        let handle = self.mint();
        arena.insert(
            handle,
            Resource::Method(MethodResource {
                owner: class,
                name: name.to_string(),
                descriptor,
                return_type,
                argument_types: argument_types.to_vec(),
                overloads: overloads.to_vec(),
                modifiers,
            }),
        );
        Ok(handle)
    }

    fn define_method_dispatch(
        &self,
        class: NativeHandle,
        name: &str,
        methods: &[NativeHandle],
        modifiers: Modifiers,
    ) -> FactoryResult<NativeHandle> {
        if methods.is_empty() {
            return Err(ConfigurationError::EmptyDispatch {
                class,
                name: name.to_string(),
            });
        }

        let mut arena = self.arena.lock();
        expect_class(&arena, class)?;
        for &method in methods {
            let owner = expect_method(&arena, method)?;
            if owner != class {
                return Err(ConfigurationError::ForeignMember {
                    member: method,
                    owner,
                    class,
                });
            }
        }

        let handle = self.mint();
        arena.insert(
            handle,
            Resource::Dispatch(DispatchGroup {
                owner: class,
                name: name.to_string(),
                methods: methods.to_vec(),
                modifiers,
            }),
        );
        Ok(handle)
    }

    fn assign_members(
        &self,
        class: NativeHandle,
        ctor: Option<NativeHandle>,
        dispatches: &[NativeHandle],
        fields: &[NativeHandle],
    ) -> FactoryResult<()> {
        let mut arena = self.arena.lock();
        expect_open_class(&arena, class)?;

        if let Some(ctor) = ctor {
            let owner = expect_method(&arena, ctor)?;
            if owner != class {
                return Err(ConfigurationError::ForeignMember {
                    member: ctor,
                    owner,
                    class,
                });
            }
        }
        for &dispatch in dispatches {
            let owner = expect_dispatch(&arena, dispatch)?;
            if owner != class {
                return Err(ConfigurationError::ForeignMember {
                    member: dispatch,
                    owner,
                    class,
                });
            }
        }
        for &field in fields {
            let owner = expect_field(&arena, field)?;
            if owner != class {
                return Err(ConfigurationError::ForeignMember {
                    member: field,
                    owner,
                    class,
                });
            }
        }

        if let Some(Resource::Class(class_resource)) = arena.get_mut(&class) {
            class_resource.state = ClassState::Ready(ClassMembers {
                ctor,
                dispatches: dispatches.to_vec(),
                fields: fields.to_vec(),
            });
        }
        Ok(())
    }

    fn destroy(&self, handles: &[NativeHandle]) -> Result<DestroyOutcome, SinkFailure> {
        if handles.is_empty() {
            return Ok(DestroyOutcome::default());
        }

        let mut arena = self.arena.lock();
        let mut outcome = DestroyOutcome::default();
        for &handle in handles {
            if arena.remove(&handle).is_some() {
                outcome.destroyed += 1;
            } else {
                outcome.unknown.push(handle);
            }
        }
        Ok(outcome)
    }
}

impl DestroySink for TypeManager {
    fn destroy(&self, handles: &[NativeHandle]) -> Result<DestroyOutcome, SinkFailure> {
        TypeFactory::destroy(self, handles)
    }
}

fn lookup(arena: &Arena, handle: NativeHandle) -> FactoryResult<&Resource> {
    arena
        .get(&handle)
        .ok_or(ConfigurationError::UnknownReference(handle))
}

/// The handle must be an allocated class (object or array, ready or not)
fn expect_class(arena: &Arena, handle: NativeHandle) -> FactoryResult<()> {
    match lookup(arena, handle)? {
        Resource::Class(_) => Ok(()),
        other => Err(ConfigurationError::WrongKind {
            handle,
            expected: "class",
            actual: other.kind(),
        }),
    }
}

/// The handle must be a class still awaiting member assignment
fn expect_open_class(arena: &Arena, handle: NativeHandle) -> FactoryResult<()> {
    match lookup(arena, handle)? {
        Resource::Class(class) if class.is_ready() => {
            Err(ConfigurationError::AlreadyReady(handle))
        }
        Resource::Class(_) => Ok(()),
        other => Err(ConfigurationError::WrongKind {
            handle,
            expected: "class",
            actual: other.kind(),
        }),
    }
}

/// The handle must be a type usable as a field, return or argument type
fn expect_type(arena: &Arena, handle: NativeHandle) -> FactoryResult<()> {
    match lookup(arena, handle)? {
        Resource::Class(_) | Resource::Primitive(_) => Ok(()),
        other => Err(ConfigurationError::WrongKind {
            handle,
            expected: "class or primitive",
            actual: other.kind(),
        }),
    }
}

/// The handle must be a method; returns its owning class
fn expect_method(arena: &Arena, handle: NativeHandle) -> FactoryResult<NativeHandle> {
    match lookup(arena, handle)? {
        Resource::Method(method) => Ok(method.owner),
        other => Err(ConfigurationError::WrongKind {
            handle,
            expected: "method",
            actual: other.kind(),
        }),
    }
}

/// The handle must be a dispatch group; returns its owning class
fn expect_dispatch(arena: &Arena, handle: NativeHandle) -> FactoryResult<NativeHandle> {
    match lookup(arena, handle)? {
        Resource::Dispatch(group) => Ok(group.owner),
        other => Err(ConfigurationError::WrongKind {
            handle,
            expected: "dispatch group",
            actual: other.kind(),
        }),
    }
}

/// The handle must be a field; returns its owning class
fn expect_field(arena: &Arena, handle: NativeHandle) -> FactoryResult<NativeHandle> {
    match lookup(arena, handle)? {
        Resource::Field(field) => Ok(field.owner),
        other => Err(ConfigurationError::WrongKind {
            handle,
            expected: "field",
            actual: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_class(manager: &TypeManager) -> NativeHandle {
        manager
            .define_object_class(
                Descriptor::from("Ljava/lang/Object;"),
                "java.lang.Object",
                None,
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap()
    }

    #[test]
    fn test_define_object_class() {
        let manager = TypeManager::new();
        let root = root_class(&manager);

        let handle = manager
            .define_object_class(
                Descriptor::from("LThing;"),
                "Thing",
                Some(root),
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();

        assert_ne!(handle, root);
        assert_eq!(manager.kind_of(handle), Some(ResourceKind::Class));
        assert!(!manager.is_ready(handle));
    }

    #[test]
    fn test_define_object_class_unknown_superclass() {
        let manager = TypeManager::new();
        let bogus = NativeHandle::new(0xdead);
        assert_eq!(
            manager
                .define_object_class(
                    Descriptor::from("LThing;"),
                    "Thing",
                    Some(bogus),
                    &[],
                    Modifiers::NONE,
                )
                .unwrap_err(),
            ConfigurationError::UnknownReference(bogus)
        );
        assert!(manager.is_empty());
    }

    #[test]
    fn test_define_array_class() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        let boxed = manager
            .define_object_class(
                Descriptor::from("Ljava/lang/Integer;"),
                "java.lang.Integer",
                Some(root),
                &[],
                Modifiers::PUBLIC | Modifiers::FINAL,
            )
            .unwrap();
        let int = manager
            .define_primitive(5, Descriptor::from("I"), boxed, Modifiers::PUBLIC)
            .unwrap();

        let array = manager
            .define_array_class(
                Descriptor::from("[I"),
                "int[]",
                Some(root),
                int,
                Modifiers::PUBLIC | Modifiers::FINAL,
            )
            .unwrap();

        match manager.resource(array) {
            Some(Resource::Class(class)) => {
                assert_eq!(class.component, Some(int));
                assert_eq!(class.superclass, Some(root));
            }
            other => panic!("unexpected resource: {other:?}"),
        }
    }

    #[test]
    fn test_define_primitive_bad_code() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        assert_eq!(
            manager
                .define_primitive(99, Descriptor::from("?"), root, Modifiers::NONE)
                .unwrap_err(),
            ConfigurationError::UnknownPrimitiveCode(99)
        );
    }

    #[test]
    fn test_define_primitive_boxed_must_be_class() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        let boxed = manager
            .define_object_class(
                Descriptor::from("Ljava/lang/Boolean;"),
                "java.lang.Boolean",
                Some(root),
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();
        let boolean = manager
            .define_primitive(1, Descriptor::from("Z"), boxed, Modifiers::PUBLIC)
            .unwrap();

        // A primitive cannot box another primitive.
        assert_eq!(
            manager
                .define_primitive(2, Descriptor::from("B"), boolean, Modifiers::PUBLIC)
                .unwrap_err(),
            ConfigurationError::WrongKind {
                handle: boolean,
                expected: "class",
                actual: ResourceKind::Primitive,
            }
        );
    }

    #[test]
    fn test_members_reference_allocated_class() {
        // Methods and fields reference the already-allocated but
        // not-yet-member-assigned class handle; this is the cycle breaker.
        let manager = TypeManager::new();
        let root = root_class(&manager);

        let method = manager
            .define_method(
                root,
                "toString",
                Descriptor::from("()Ljava/lang/String;"),
                root,
                &[],
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();
        let field = manager
            .define_field(
                root,
                "value",
                Descriptor::from("LObject;"),
                root,
                Modifiers::PRIVATE,
            )
            .unwrap();

        assert_eq!(manager.kind_of(method), Some(ResourceKind::Method));
        assert_eq!(manager.kind_of(field), Some(ResourceKind::Field));
    }

    #[test]
    fn test_dispatch_requires_methods() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        assert_eq!(
            manager
                .define_method_dispatch(root, "f", &[], Modifiers::NONE)
                .unwrap_err(),
            ConfigurationError::EmptyDispatch {
                class: root,
                name: "f".to_string(),
            }
        );
    }

    #[test]
    fn test_dispatch_rejects_foreign_method() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        let other = manager
            .define_object_class(
                Descriptor::from("LOther;"),
                "Other",
                Some(root),
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();
        let method = manager
            .define_method(
                other,
                "f",
                Descriptor::from("()V"),
                root,
                &[],
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();

        assert_eq!(
            manager
                .define_method_dispatch(root, "f", &[method], Modifiers::NONE)
                .unwrap_err(),
            ConfigurationError::ForeignMember {
                member: method,
                owner: other,
                class: root,
            }
        );
    }

    #[test]
    fn test_assign_members_transitions_to_ready() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        let class = manager
            .define_object_class(
                Descriptor::from("LThing;"),
                "Thing",
                Some(root),
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();
        let ctor = manager
            .define_method(
                class,
                "<init>",
                Descriptor::from("()V"),
                root,
                &[],
                &[],
                Modifiers::PUBLIC | Modifiers::CTOR,
            )
            .unwrap();
        let method = manager
            .define_method(
                class,
                "f",
                Descriptor::from("()V"),
                root,
                &[],
                &[],
                Modifiers::PUBLIC | Modifiers::STATIC,
            )
            .unwrap();
        let dispatch = manager
            .define_method_dispatch(class, "f", &[method], Modifiers::STATIC)
            .unwrap();

        manager
            .assign_members(class, Some(ctor), &[dispatch], &[])
            .unwrap();

        assert!(manager.is_ready(class));
        assert_eq!(manager.dispatch_of(class, "f"), Some(dispatch));
        assert_eq!(manager.dispatch_of(class, "g"), None);
        match manager.resource(class) {
            Some(Resource::Class(ClassResource {
                state: ClassState::Ready(members),
                ..
            })) => {
                assert_eq!(members.ctor, Some(ctor));
                assert_eq!(members.dispatches, vec![dispatch]);
                assert!(members.fields.is_empty());
            }
            other => panic!("unexpected resource: {other:?}"),
        }
    }

    #[test]
    fn test_assign_members_twice_fails() {
        let manager = TypeManager::new();
        let root = root_class(&manager);

        manager.assign_members(root, None, &[], &[]).unwrap();
        assert_eq!(
            manager.assign_members(root, None, &[], &[]).unwrap_err(),
            ConfigurationError::AlreadyReady(root)
        );
    }

    #[test]
    fn test_assign_members_on_non_class_fails() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        let method = manager
            .define_method(
                root,
                "f",
                Descriptor::from("()V"),
                root,
                &[],
                &[],
                Modifiers::PUBLIC,
            )
            .unwrap();

        assert_eq!(
            manager.assign_members(method, None, &[], &[]).unwrap_err(),
            ConfigurationError::WrongKind {
                handle: method,
                expected: "class",
                actual: ResourceKind::Method,
            }
        );
    }

    #[test]
    fn test_define_on_ready_class_fails() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        manager.assign_members(root, None, &[], &[]).unwrap();

        assert_eq!(
            manager
                .define_field(
                    root,
                    "late",
                    Descriptor::from("LObject;"),
                    root,
                    Modifiers::NONE,
                )
                .unwrap_err(),
            ConfigurationError::AlreadyReady(root)
        );
    }

    #[test]
    fn test_destroy_empty_is_noop() {
        let manager = TypeManager::new();
        let outcome = TypeFactory::destroy(&manager, &[]).unwrap();
        assert_eq!(outcome, DestroyOutcome::default());
    }

    #[test]
    fn test_destroy_unknown_fails_per_handle() {
        let manager = TypeManager::new();
        let root = root_class(&manager);
        let bogus = NativeHandle::new(0xdead);

        let outcome = TypeFactory::destroy(&manager, &[root, bogus]).unwrap();
        assert_eq!(outcome.destroyed, 1);
        assert_eq!(outcome.unknown, vec![bogus]);
        assert!(!manager.contains(root));

        // Destroying again is a per-handle failure, not corruption.
        let outcome = TypeFactory::destroy(&manager, &[root]).unwrap();
        assert_eq!(outcome.unknown, vec![root]);
    }

    #[test]
    fn test_minted_handles_are_distinct() {
        let manager = TypeManager::new();
        let a = root_class(&manager);
        let b = root_class(&manager);
        assert_ne!(a, b);
        assert_ne!(a.raw(), 0);
    }
}
