//! Identifier types for registered descriptors and identity scopes.
//!
//! Descriptors live for the whole lifetime of the host runtime, so a plain
//! index into the registry is a stable identity. Two handles report the same
//! type exactly when their `DescriptorId`s compare equal.

use std::fmt;

/// Identifies a registered type descriptor.
///
/// Every native class name and its `const` shadow get one id each.
///
/// # Example
///
/// ```
/// use hostbridge_core::DescriptorId;
///
/// let id = DescriptorId::new(3);
/// assert_eq!(id.index(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u32);

impl DescriptorId {
    /// Create a descriptor id with the given registry index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Get the underlying registry index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type_{}", self.0)
    }
}

impl From<u32> for DescriptorId {
    fn from(index: u32) -> Self {
        Self::new(index)
    }
}

/// Identifies one weak identity map partition.
///
/// All classes of an inheritance chain share one scope, so a pointer pushed
/// as `Base` and later as `Derived` resolves to the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityScope(u32);

impl IdentityScope {
    /// The process-wide scope used by types that never declared inheritance.
    pub const GLOBAL: IdentityScope = IdentityScope(0);

    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IdentityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::GLOBAL {
            write!(f, "scope_global")
        } else {
            write!(f, "scope_{}", self.0)
        }
    }
}
