//! Ownership ledger.
//!
//! Records which native objects the bridge has agreed to destroy. An entry
//! maps the object's address to the descriptor it was claimed under; finalize
//! only destroys the object when the collected handle still agrees with that
//! descriptor.

use rustc_hash::FxHashMap;

use hostbridge_core::{DescriptorId, NativePtr};

/// Native pointer to the type the bridge owns it as.
#[derive(Debug, Default)]
pub struct OwnershipLedger {
    entries: FxHashMap<NativePtr, DescriptorId>,
}

impl OwnershipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `ptr` as `descriptor`.
    ///
    /// Returns false if the pointer is already owned.
    pub fn take(&mut self, ptr: NativePtr, descriptor: DescriptorId) -> bool {
        if self.entries.contains_key(&ptr) {
            return false;
        }
        self.entries.insert(ptr, descriptor);
        true
    }

    /// Give up the claim on `ptr`.
    ///
    /// Succeeds only if the claim was made under exactly `descriptor`.
    pub fn release(&mut self, ptr: NativePtr, descriptor: DescriptorId) -> bool {
        if self.entries.get(&ptr) == Some(&descriptor) {
            self.entries.remove(&ptr);
            true
        } else {
            false
        }
    }

    pub fn get(&self, ptr: NativePtr) -> Option<DescriptorId> {
        self.entries.get(&ptr).copied()
    }

    pub fn contains(&self, ptr: NativePtr) -> bool {
        self.entries.contains_key(&ptr)
    }

    pub(crate) fn remove(&mut self, ptr: NativePtr) -> Option<DescriptorId> {
        self.entries.remove(&ptr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_claim_fails() {
        let mut ledger = OwnershipLedger::new();
        let ptr = NativePtr::new(0x1000);
        assert!(ledger.take(ptr, DescriptorId::new(3)));
        assert!(!ledger.take(ptr, DescriptorId::new(3)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn release_requires_exact_descriptor() {
        let mut ledger = OwnershipLedger::new();
        let ptr = NativePtr::new(0x1000);
        ledger.take(ptr, DescriptorId::new(3));

        assert!(!ledger.release(ptr, DescriptorId::new(4)));
        assert!(ledger.release(ptr, DescriptorId::new(3)));
        assert!(!ledger.release(ptr, DescriptorId::new(3)));
        assert!(ledger.is_empty());
    }
}
