//! Native resources mirroring the managed type system

use std::fmt;
use std::sync::Arc;

use tether_core::{Modifiers, NativeHandle};

/// Opaque reflective descriptor supplied by the managed runtime.
///
/// Descriptors are produced by the managed side's reflection layer, stored
/// verbatim on the resource, and handed back on request. This crate never
/// interprets their content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor(Arc<str>);

impl Descriptor {
    /// Wrap a raw descriptor
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    /// The raw descriptor text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Descriptor {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Descriptor {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed numeric primitive kinds selected by the protocol's primitive code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Code 0
    Void,
    /// Code 1
    Boolean,
    /// Code 2
    Byte,
    /// Code 3
    Char,
    /// Code 4
    Short,
    /// Code 5
    Int,
    /// Code 6
    Long,
    /// Code 7
    Float,
    /// Code 8
    Double,
}

impl PrimitiveKind {
    /// Map a protocol code to its kind
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Void),
            1 => Some(Self::Boolean),
            2 => Some(Self::Byte),
            3 => Some(Self::Char),
            4 => Some(Self::Short),
            5 => Some(Self::Int),
            6 => Some(Self::Long),
            7 => Some(Self::Float),
            8 => Some(Self::Double),
            _ => None,
        }
    }

    /// The protocol code for this kind
    pub fn code(self) -> i32 {
        match self {
            Self::Void => 0,
            Self::Boolean => 1,
            Self::Byte => 2,
            Self::Char => 3,
            Self::Short => 4,
            Self::Int => 5,
            Self::Long => 6,
            Self::Float => 7,
            Self::Double => 8,
        }
    }
}

/// Member wiring installed by `assign_members`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMembers {
    /// Constructor method, when the class has one
    pub ctor: Option<NativeHandle>,
    /// Method dispatch groups, one per overload name
    pub dispatches: Vec<NativeHandle>,
    /// Field resources
    pub fields: Vec<NativeHandle>,
}

/// Construction state of a class resource.
///
/// Allocation hands out a stable handle immediately, valid to reference from
/// other resources; the class becomes `Ready` once `assign_members` wires in
/// its members. `Ready` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassState {
    /// Handle exists and may be referenced; members are not yet queryable
    Allocated,
    /// Members assigned; no further structural mutation is permitted
    Ready(ClassMembers),
}

/// Native mirror of one managed class (object or array)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassResource {
    /// Opaque class descriptor from the reflection layer
    pub descriptor: Descriptor,
    /// Qualified class name
    pub name: String,
    /// Superclass handle; `None` for the root class
    pub superclass: Option<NativeHandle>,
    /// Implemented interface handles
    pub interfaces: Vec<NativeHandle>,
    /// Component type handle, for array classes
    pub component: Option<NativeHandle>,
    /// Modifier bits, stored verbatim
    pub modifiers: Modifiers,
    /// Construction state
    pub state: ClassState,
}

impl ClassResource {
    /// Check whether members have been assigned
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ClassState::Ready(_))
    }
}

/// Native mirror of one primitive type and its boxed class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveResource {
    /// Which primitive this is
    pub kind: PrimitiveKind,
    /// Opaque class descriptor from the reflection layer
    pub descriptor: Descriptor,
    /// Handle of the boxed object class
    pub boxed: NativeHandle,
    /// Modifier bits, stored verbatim
    pub modifiers: Modifiers,
}

/// Native mirror of one managed method or constructor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodResource {
    /// Declaring class handle
    pub owner: NativeHandle,
    /// Method name
    pub name: String,
    /// Opaque reflective method descriptor, passed through uninterpreted
    pub descriptor: Descriptor,
    /// Return type handle
    pub return_type: NativeHandle,
    /// Argument type handles, in declaration order
    pub argument_types: Vec<NativeHandle>,
    /// Previously defined methods this one shadows during overload resolution
    pub overloads: Vec<NativeHandle>,
    /// Modifier bits, stored verbatim
    pub modifiers: Modifiers,
}

/// Native mirror of one managed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldResource {
    /// Declaring class handle
    pub owner: NativeHandle,
    /// Field name
    pub name: String,
    /// Opaque reflective field descriptor, passed through uninterpreted
    pub descriptor: Descriptor,
    /// Field type handle
    pub field_type: NativeHandle,
    /// Modifier bits, stored verbatim
    pub modifiers: Modifiers,
}

/// Overload set: every method sharing one name on one class, collapsed into
/// a single unit for name-based call dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchGroup {
    /// Owning class handle
    pub owner: NativeHandle,
    /// Dispatch name
    pub name: String,
    /// Member method handles
    pub methods: Vec<NativeHandle>,
    /// Modifier bits (`CTOR`, `STATIC`) describing the dispatch
    pub modifiers: Modifiers,
}

/// Any resource living in the arena
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// Object or array class
    Class(ClassResource),
    /// Primitive type
    Primitive(PrimitiveResource),
    /// Method or constructor
    Method(MethodResource),
    /// Field
    Field(FieldResource),
    /// Overload dispatch group
    Dispatch(DispatchGroup),
}

impl Resource {
    /// The kind tag, for diagnostics
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Class(_) => ResourceKind::Class,
            Self::Primitive(_) => ResourceKind::Primitive,
            Self::Method(_) => ResourceKind::Method,
            Self::Field(_) => ResourceKind::Field,
            Self::Dispatch(_) => ResourceKind::Dispatch,
        }
    }
}

/// Resource kinds, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Object or array class
    Class,
    /// Primitive type
    Primitive,
    /// Method or constructor
    Method,
    /// Field
    Field,
    /// Overload dispatch group
    Dispatch,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Class => "class",
            Self::Primitive => "primitive",
            Self::Method => "method",
            Self::Field => "field",
            Self::Dispatch => "dispatch group",
        };
        f.write_str(name)
    }
}
