//! Opaque native pointer identity.

use std::fmt;

/// Address of a native object.
///
/// The bridge never dereferences a `NativePtr`; it is only compared and
/// hashed. Native callbacks translate it back into their own object type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePtr(usize);

impl NativePtr {
    pub const NULL: NativePtr = NativePtr(0);

    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Take the address of a live native object.
    #[inline]
    pub fn from_ref<T>(value: &T) -> Self {
        Self(value as *const T as usize)
    }

    #[inline]
    pub const fn addr(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativePtr({:#x})", self.0)
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for NativePtr {
    fn from(addr: usize) -> Self {
        Self::new(addr)
    }
}
