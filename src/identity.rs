//! Identity map: one live handle per native pointer.
//!
//! The map is partitioned by [`IdentityScope`]: every class in an inheritance
//! chain shares one partition, so a pointer first pushed as `Base` and later
//! as `Derived` resolves to the same handle. Entries are weak: the map never
//! adds a strong reference of its own, and an entry whose handle has become
//! unreachable counts as absent. The root table is the strong side: a rooted
//! pointer keeps one strong reference on its handle.

use rustc_hash::FxHashMap;
use tracing::trace;

use hostbridge_core::{
    DescriptorId, HandleHeap, HandleTag, IdentityScope, NativePtr, ObjectHandle, Ownership,
};
use hostbridge_registry::TypeRegistry;

use crate::OwnershipLedger;

/// Outcome of an intern request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interned {
    /// The pointer was null.
    Null,
    /// A live handle already existed.
    Existing(ObjectHandle),
    /// A new handle was allocated.
    Created(ObjectHandle),
}

impl Interned {
    pub fn handle(self) -> Option<ObjectHandle> {
        match self {
            Interned::Null => None,
            Interned::Existing(h) | Interned::Created(h) => Some(h),
        }
    }
}

/// Weak pointer-to-handle cache plus the strong root table.
#[derive(Debug, Default)]
pub struct IdentityMap {
    scopes: FxHashMap<IdentityScope, FxHashMap<NativePtr, ObjectHandle>>,
    roots: FxHashMap<NativePtr, ObjectHandle>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the live handle for `ptr` in `scope`.
    pub fn lookup(&self, heap: &HandleHeap, scope: IdentityScope, ptr: NativePtr) -> Option<ObjectHandle> {
        self.scopes
            .get(&scope)?
            .get(&ptr)
            .copied()
            .filter(|h| heap.is_reachable(*h))
    }

    /// Live handle for `ptr` in any scope.
    pub fn find(&self, heap: &HandleHeap, ptr: NativePtr) -> Option<ObjectHandle> {
        self.scopes
            .values()
            .filter_map(|map| map.get(&ptr))
            .copied()
            .find(|h| heap.is_reachable(*h))
    }

    /// Return the canonical handle for `ptr`, allocating one if needed.
    ///
    /// The returned handle carries one new strong reference for the caller.
    /// An existing handle is upgraded to `descriptor` when `descriptor` is a
    /// strict subtype of its current type; unrelated or less specific
    /// requests leave it unchanged.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn intern(
        &mut self,
        heap: &mut HandleHeap,
        registry: &TypeRegistry,
        ledger: &OwnershipLedger,
        ptr: NativePtr,
        descriptor: DescriptorId,
        add_to_root: bool,
    ) -> Interned {
        if ptr.is_null() {
            return Interned::Null;
        }
        let scope = registry.identity_scope(descriptor);

        let result = match self.lookup(heap, scope, ptr) {
            Some(handle) => {
                heap.add_ref(handle);
                if let Some(entry) = heap.get_mut(handle) {
                    let current = entry.tag.descriptor;
                    if current != descriptor && registry.is_a(descriptor, current) {
                        trace!(
                            ptr = %ptr,
                            from = registry.name(current).unwrap_or("?"),
                            to = registry.name(descriptor).unwrap_or("?"),
                            "specialized handle"
                        );
                        entry.tag.descriptor = descriptor;
                    }
                }
                Interned::Existing(handle)
            }
            None => {
                let ownership = if ledger.contains(ptr) {
                    Ownership::Owned
                } else {
                    Ownership::Borrowed
                };
                let handle = heap.allocate(
                    ptr,
                    HandleTag {
                        descriptor,
                        ownership,
                    },
                );
                self.scopes.entry(scope).or_default().insert(ptr, handle);
                trace!(ptr = %ptr, scope = %scope, handle = handle.index, "interned new handle");
                Interned::Created(handle)
            }
        };

        if add_to_root && let Some(handle) = result.handle() {
            self.add_to_root(heap, ptr, handle);
        }
        result
    }

    /// Keep `handle` alive through the root table.
    ///
    /// Returns false if `ptr` was already rooted.
    pub fn add_to_root(&mut self, heap: &mut HandleHeap, ptr: NativePtr, handle: ObjectHandle) -> bool {
        if let Some(existing) = self.roots.get(&ptr)
            && heap.is_reachable(*existing)
        {
            return false;
        }
        if !heap.add_ref(handle) {
            return false;
        }
        self.roots.insert(ptr, handle);
        true
    }

    /// Drop the root reference for `ptr`.
    pub fn remove_from_root(&mut self, heap: &mut HandleHeap, ptr: NativePtr) -> bool {
        match self.roots.remove(&ptr) {
            Some(handle) => {
                heap.release(handle);
                true
            }
            None => false,
        }
    }

    pub fn is_rooted(&self, ptr: NativePtr) -> bool {
        self.roots.contains_key(&ptr)
    }

    /// Remove the entry for a collected handle.
    ///
    /// Entries that already point at a newer handle for the same address are
    /// left alone.
    pub fn forget(&mut self, ptr: NativePtr, handle: ObjectHandle) {
        for map in self.scopes.values_mut() {
            if map.get(&ptr) == Some(&handle) {
                map.remove(&ptr);
            }
        }
        if self.roots.get(&ptr) == Some(&handle) {
            self.roots.remove(&ptr);
        }
    }

    /// Number of entries across all scopes, live or pending.
    pub fn len(&self) -> usize {
        self.scopes.values().map(|m| m.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
