//! Opaque native handles and protocol modifier bits

use std::fmt;
use std::ops::BitOr;

/// Identifier for one resource in the native resource space.
///
/// Equality and hashing are defined by the raw integer value, never by the
/// identity of a wrapping object. A handle therefore survives being carried
/// across the weak-observation boundary after its proxy is gone, and handles
/// can be deduplicated in sets before destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(u64);

impl NativeHandle {
    /// Wrap a raw handle value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw integer value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Modifier bitmask carried through the registration protocol.
///
/// Stored on resources verbatim for the managed runtime to read back; the
/// core never interprets individual bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u32);

impl Modifiers {
    /// No modifiers
    pub const NONE: Self = Self(0);
    /// Public visibility
    pub const PUBLIC: Self = Self(0x0001);
    /// Private visibility
    pub const PRIVATE: Self = Self(0x0002);
    /// Protected visibility
    pub const PROTECTED: Self = Self(0x0004);
    /// Static member
    pub const STATIC: Self = Self(0x0008);
    /// Final class or member
    pub const FINAL: Self = Self(0x0010);
    /// Abstract class or method
    pub const ABSTRACT: Self = Self(0x0400);
    /// Constructor dispatch marker
    pub const CTOR: Self = Self(0x0001_0000);

    /// Wrap raw modifier bits
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get the raw modifier bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every bit in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
